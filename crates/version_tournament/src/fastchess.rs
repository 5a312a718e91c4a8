//! Locating the fastchess match tool and scraping its console output.

use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use sprt_core::{Decision, LlrReport, SessionSummary};

use crate::error::{tail, ConfigError, MatchToolError, OUTPUT_TAIL_LINES};

/// Environment variable consulted when no explicit path is given
pub const FASTCHESS_ENV: &str = "FASTCHESS";

/// Printed by fastchess once the whole session has been played
pub const FINISHED_MARKER: &str = "Finished match";

const EXECUTABLES: [&str; 2] = ["fastchess", "fastchess.exe"];

/// Finds the match tool: `explicit`, then `$FASTCHESS`, then `PATH`.
///
/// An explicit path that does not exist is an error rather than a reason to
/// keep looking.
pub fn locate_fastchess(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    locate_from(explicit, std::env::var_os(FASTCHESS_ENV))
}

fn locate_from(explicit: Option<&Path>, env: Option<OsString>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ConfigError::MatchToolNotFound)
        };
    }

    if let Some(path) = env.filter(|v| !v.is_empty()).map(PathBuf::from) {
        if path.is_file() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{FASTCHESS_ENV} does not point at a file");
    }

    EXECUTABLES
        .iter()
        .find_map(|exe| which::which(exe).ok())
        .ok_or(ConfigError::MatchToolNotFound)
}

fn results_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)Games:\s*(?P<games>\d+),\s*Wins:\s*(?P<wins>\d+),\s*Losses:\s*(?P<losses>\d+),\s*Draws:\s*(?P<draws>\d+),\s*Points:\s*(?P<points>[-+]?\d+(?:\.\d+)?)",
        )
        .ok()
    })
    .as_ref()
}

fn llr_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)LLR:\s*(?P<llr>[-+]?\d+(?:\.\d+)?)\s*\([^)]+\)\s*\((?P<lower>[-+]?\d+(?:\.\d+)?),\s*(?P<upper>[-+]?\d+(?:\.\d+)?)\)",
        )
        .ok()
    })
    .as_ref()
}

fn unparseable(reason: impl Into<String>, output: &str) -> MatchToolError {
    MatchToolError::Unparseable {
        reason: reason.into(),
        tail: tail(output, OUTPUT_TAIL_LINES),
    }
}

/// Extracts the final totals, LLR and verdict from a session's output.
///
/// fastchess prints intermediate standings while the match runs, so the
/// last occurrence of each block is the one that counts.
pub fn parse_summary(output: &str) -> Result<SessionSummary, MatchToolError> {
    let caps = results_re()
        .and_then(|re| re.captures_iter(output).last())
        .ok_or_else(|| unparseable("no results block found", output))?;

    let count = |name: &str| -> Result<u32, MatchToolError> {
        caps[name]
            .parse()
            .map_err(|_| unparseable(format!("bad {name} count {:?}", &caps[name]), output))
    };
    let games = count("games")?;
    let wins = count("wins")?;
    let losses = count("losses")?;
    let draws = count("draws")?;
    let points: f64 = caps["points"]
        .parse()
        .map_err(|_| unparseable(format!("bad points {:?}", &caps["points"]), output))?;

    let llr = llr_re().and_then(|re| re.captures_iter(output).last()).and_then(|c| {
        Some(LlrReport {
            value: c["llr"].parse().ok()?,
            lower: c["lower"].parse().ok()?,
            upper: c["upper"].parse().ok()?,
        })
    });

    let verdict = if output.contains("SPRT: H1") {
        Some(Decision::H1)
    } else if output.contains("SPRT: H0") {
        Some(Decision::H0)
    } else {
        None
    };

    Ok(SessionSummary {
        games,
        wins,
        losses,
        draws,
        points,
        llr,
        verdict,
    })
}

#[cfg(test)]
#[path = "fastchess_tests.rs"]
mod fastchess_tests;
