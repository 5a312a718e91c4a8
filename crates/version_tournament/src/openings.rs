//! Opening positions shared by both sides of every pair

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Standard starting position
pub const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Pads or truncates a FEN-like record to the six FEN fields.
///
/// Returns `None` when fewer than four fields (placement, side, castling,
/// en passant) are present.
pub fn normalize_fen(fen_like: &str) -> Option<String> {
    let mut fields: Vec<&str> = fen_like.split_whitespace().collect();
    match fields.len() {
        0..=3 => return None,
        4 => fields.extend(["0", "1"]),
        5 => fields.push("1"),
        _ => fields.truncate(6),
    }
    Some(fields.join(" "))
}

/// Strips blank lines, `#` comment lines and trailing `#`/`;` comments
fn opening_line(raw: &str) -> Option<String> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.split('#').next().unwrap_or_default();
    let line = line.split(';').next().unwrap_or_default().trim();
    normalize_fen(line)
}

/// Parses every usable opening in `text`, in file order
pub fn parse_openings(text: &str) -> Vec<String> {
    text.lines().filter_map(opening_line).collect()
}

/// Loads openings from every existing file in `paths`; missing files are
/// skipped with a warning.
pub fn load_openings(paths: &[PathBuf]) -> Result<Vec<String>, ConfigError> {
    let mut out = Vec::new();
    for path in paths {
        match fs::read_to_string(path) {
            Ok(text) => {
                let found = parse_openings(&text);
                tracing::debug!(path = %path.display(), count = found.len(), "loaded openings");
                out.extend(found);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "openings file not found, skipping");
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
    if out.is_empty() {
        return Err(ConfigError::NoOpenings {
            paths: paths.to_vec(),
        });
    }
    Ok(out)
}

/// Writes one opening per line (LF endings) and returns `path`
pub fn write_openings_file(openings: &[String], path: &Path) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut body = openings.join("\n");
    body.push('\n');
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

/// Side to move of a FEN, `true` for white
pub fn white_to_move(fen: &str) -> bool {
    fen.split_whitespace().nth(1) != Some("b")
}

#[cfg(test)]
#[path = "openings_tests.rs"]
mod openings_tests;
