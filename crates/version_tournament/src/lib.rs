//! Version ranking for engine revisions
//!
//! This crate provides infrastructure for:
//! - Resolving a git revision range into candidate commits
//! - Building each candidate once into a cached binary
//! - Playing every pair of built candidates and deciding it with an SPRT
//! - Folding the pairwise decisions into a scoreboard
//!
//! Pairs are played either by handing the whole match to fastchess
//! ([`SessionEvaluator`]) or by driving single games over UCI
//! ([`GameEvaluator`]).
//!
//! # Usage
//!
//! ```bash
//! # Rank the last 6 first-parent commits of main
//! cargo run -p version_tournament -- rank --repo ../engine --rev main --max-commits 6
//!
//! # Re-render a saved report
//! cargo run -p version_tournament -- report sprt/report.json
//! ```

mod builder;
mod config;
mod error;
mod fastchess;
mod game_runner;
mod logging;
mod match_runner;
mod openings;
mod pipeline;
mod process;
mod ranking;
mod resolver;
mod results;
mod uci_client;
mod workspace;

pub use builder::*;
pub use config::*;
pub use error::*;
pub use fastchess::*;
pub use game_runner::*;
pub use logging::*;
pub use match_runner::*;
pub use openings::*;
pub use pipeline::*;
pub use process::*;
pub use ranking::*;
pub use resolver::*;
pub use results::*;
pub use uci_client::*;
pub use workspace::*;

pub use sprt_core;
