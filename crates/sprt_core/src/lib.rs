//! Statistical core for ranking engine versions.
//!
//! Everything in this crate is pure: no processes, no files. The pipeline
//! crate feeds it game outcomes and tool summaries and gets decisions back.

pub mod elo;
pub mod outcome;
pub mod sprt;
pub mod summary;
pub mod time_control;

pub use elo::*;
pub use outcome::*;
pub use sprt::*;
pub use summary::*;
pub use time_control::*;
