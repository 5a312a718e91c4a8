//! UCI protocol client for engine processes.
//!
//! A reader thread forwards stdout lines over a channel so every wait can be
//! bounded with `recv_timeout`.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::MatchToolError;
use crate::game_runner::{EngineAdapter, EngineReply, GoLimits};

/// How long a stopped search gets to report its move before we give up on it
const STOP_WAIT: Duration = Duration::from_millis(500);

/// How long `quit` gets before the process is killed
const QUIT_WAIT: Duration = Duration::from_millis(500);

/// Score reported on an `info` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32),
}

/// Extracts `score cp N` / `score mate N` from an `info` line
pub fn parse_info_score(line: &str) -> Option<Score> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("info") {
        return None;
    }
    while let Some(token) = tokens.next() {
        if token == "score" {
            let kind = tokens.next()?;
            let value: i32 = tokens.next()?.parse().ok()?;
            return match kind {
                "cp" => Some(Score::Centipawns(value)),
                "mate" => Some(Score::Mate(value)),
                _ => None,
            };
        }
    }
    None
}

/// `bestmove` line to reply; `None` for any other line
pub fn parse_bestmove(line: &str, last_score: Option<Score>) -> Option<EngineReply> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("bestmove") {
        return None;
    }
    Some(match tokens.next() {
        Some(mv) if mv != "(none)" && mv != "0000" => EngineReply::Move(mv.to_string()),
        _ => EngineReply::NoMove {
            mated: last_score == Some(Score::Mate(0)),
        },
    })
}

pub fn position_command(fen: &str, moves: &[String]) -> String {
    let mut cmd = format!("position fen {fen}");
    if !moves.is_empty() {
        cmd.push_str(" moves ");
        cmd.push_str(&moves.join(" "));
    }
    cmd
}

pub fn go_command(limits: &GoLimits) -> String {
    match *limits {
        GoLimits::MoveTime(t) => format!("go movetime {}", t.as_millis().max(1)),
        GoLimits::Clock {
            wtime,
            btime,
            winc,
            binc,
            movestogo,
        } => {
            let mut cmd = format!(
                "go wtime {} btime {} winc {} binc {}",
                wtime.as_millis(),
                btime.as_millis(),
                winc.as_millis(),
                binc.as_millis()
            );
            if let Some(n) = movestogo {
                cmd.push_str(&format!(" movestogo {n}"));
            }
            cmd
        }
    }
}

/// A running UCI engine
pub struct UciEngine {
    name: String,
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    handshake_timeout: Duration,
}

impl UciEngine {
    /// Spawns `binary`, completes the `uci` handshake and applies `options`
    pub fn start(
        binary: &Path,
        name: &str,
        options: &[(String, String)],
        handshake_timeout: Duration,
    ) -> Result<Self, MatchToolError> {
        let mut child = Command::new(binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| MatchToolError::Spawn {
                command: binary.display().to_string(),
                source,
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MatchToolError::Engine {
                    engine: name.to_string(),
                    reason: "engine pipes unavailable".to_string(),
                });
            }
        };

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut engine = Self {
            name: name.to_string(),
            child,
            stdin,
            lines: rx,
            handshake_timeout,
        };
        engine.send("uci")?;
        engine.wait_for("uciok", handshake_timeout)?;
        for (option, value) in options {
            engine.send(&format!("setoption name {option} value {value}"))?;
        }
        engine.sync()?;
        tracing::debug!(engine = %engine.name, path = %binary.display(), "engine ready");
        Ok(engine)
    }

    fn error(&self, reason: impl Into<String>) -> MatchToolError {
        MatchToolError::Engine {
            engine: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn send(&mut self, command: &str) -> Result<(), MatchToolError> {
        tracing::trace!(engine = %self.name, "> {command}");
        writeln!(self.stdin, "{command}")
            .and_then(|_| self.stdin.flush())
            .map_err(|e| self.error(format!("write failed: {e}")))
    }

    /// Next line before `deadline`; `Ok(None)` when the deadline passes
    fn next_line(&mut self, deadline: Instant) -> Result<Option<String>, MatchToolError> {
        let wait = deadline.saturating_duration_since(Instant::now());
        match self.lines.recv_timeout(wait) {
            Ok(line) => {
                tracing::trace!(engine = %self.name, "< {line}");
                Ok(Some(line))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.error("engine closed its output")),
        }
    }

    fn wait_for(&mut self, token: &str, timeout: Duration) -> Result<(), MatchToolError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.next_line(deadline)? {
                Some(line) if line.trim() == token => return Ok(()),
                Some(_) => continue,
                None => return Err(self.error(format!("no {token} within {timeout:?}"))),
            }
        }
    }

    /// `isready` round trip
    pub fn sync(&mut self) -> Result<(), MatchToolError> {
        self.send("isready")?;
        self.wait_for("readyok", self.handshake_timeout)
    }
}

impl EngineAdapter for UciEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn new_game(&mut self) -> Result<(), MatchToolError> {
        self.send("ucinewgame")?;
        self.sync()
    }

    fn set_position(&mut self, fen: &str, moves: &[String]) -> Result<(), MatchToolError> {
        self.send(&position_command(fen, moves))
    }

    fn go(&mut self, limits: &GoLimits, deadline: Duration) -> Result<EngineReply, MatchToolError> {
        self.send(&go_command(limits))?;
        let until = Instant::now() + deadline;
        let mut last_score = None;
        loop {
            let Some(line) = self.next_line(until)? else {
                // Keep the protocol in step for the next game: the late
                // bestmove must not be read as the next reply.
                self.send("stop")?;
                let drain_until = Instant::now() + STOP_WAIT;
                while let Some(line) = self.next_line(drain_until)? {
                    if line.starts_with("bestmove") {
                        break;
                    }
                }
                return Ok(EngineReply::NoReply);
            };
            if let Some(score) = parse_info_score(&line) {
                last_score = Some(score);
            } else if let Some(reply) = parse_bestmove(&line, last_score) {
                return Ok(reply);
            }
        }
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        let _ = self.send("quit");
        let deadline = Instant::now() + QUIT_WAIT;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                _ => break,
            }
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
#[path = "uci_client_tests.rs"]
mod uci_client_tests;
