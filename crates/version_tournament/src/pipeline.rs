//! The ranking run: resolve, build, play every pair, fold, rank.

use chrono::Utc;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sprt_core::SprtResult;

use crate::builder::BuildCache;
use crate::error::{tail, PipelineError};
use crate::match_runner::PairEvaluator;
use crate::ranking::{RankingEntry, Scoreboard};
use crate::resolver::{short_id, ResolveRequest, VersionSource};
use crate::results::{BuildReport, PairReport, PairStatus, RunReport, RunSettings};

/// Fewest built versions a ranking makes sense for
pub const MIN_VERSIONS: usize = 2;

/// A built candidate, immutable from here on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub id: String,
    pub short: String,
    pub label: String,
    pub binary: PathBuf,
}

/// Cooperative cancellation, checked between builds and between pairs
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Seed for the pair at built-list positions `i < j`
pub fn pair_seed(base: u64, i: usize, j: usize) -> u64 {
    base.wrapping_add(i as u64 * 1000).wrapping_add(j as u64)
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub request: ResolveRequest,
    pub base_seed: u64,
    pub parallel_builds: usize,
    pub parallel_pairs: usize,
    /// Copied into the report
    pub settings: RunSettings,
}

pub struct Pipeline {
    source: Box<dyn VersionSource>,
    builds: BuildCache,
    evaluator: Box<dyn PairEvaluator>,
    options: PipelineOptions,
    cancel: CancelFlag,
}

/// One pair to play, in resolution order
struct PairJob<'a> {
    challenger: &'a Version,
    opponent: &'a Version,
    seed: u64,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn VersionSource>,
        builds: BuildCache,
        evaluator: Box<dyn PairEvaluator>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            source,
            builds,
            evaluator,
            options,
            cancel: CancelFlag::new(),
        }
    }

    /// Shares an existing flag, e.g. one wired to a signal handler
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that stops the run at the next build or pair boundary
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();

        let ids = self.source.resolve(&self.options.request)?;
        let labels: Vec<String> = ids.iter().map(|id| self.source.label(id)).collect();

        tracing::info!(count = ids.len(), "building candidates");
        let built = self
            .builds
            .build_all(&ids, self.options.parallel_builds, &self.cancel)
            .ok_or(PipelineError::Cancelled)?;

        let mut entries = Vec::with_capacity(ids.len());
        let mut builds = Vec::with_capacity(ids.len());
        let mut versions = Vec::new();
        for ((id, label), result) in ids.iter().zip(&labels).zip(built) {
            entries.push(RankingEntry::new(id.clone(), label.clone(), result.is_ok()));
            match result {
                Ok(binary) => {
                    builds.push(BuildReport {
                        id: id.clone(),
                        label: label.clone(),
                        binary: Some(binary.clone()),
                        log: None,
                        error: None,
                    });
                    versions.push(Version {
                        id: id.clone(),
                        short: short_id(id).to_string(),
                        label: label.clone(),
                        binary,
                    });
                }
                Err(failure) => {
                    tracing::warn!(
                        id = short_id(id),
                        command = %failure.failure.command,
                        stderr = %tail(&failure.failure.stderr, 10),
                        "skipping candidate"
                    );
                    builds.push(BuildReport {
                        id: id.clone(),
                        label: label.clone(),
                        binary: None,
                        log: failure.log_path.clone(),
                        error: Some(failure.failure.reason.clone()),
                    });
                }
            }
        }

        if versions.len() < MIN_VERSIONS {
            return Err(PipelineError::InsufficientVersions {
                built: versions.len(),
                total: ids.len(),
                required: MIN_VERSIONS,
            });
        }

        let scoreboard = Scoreboard::new(entries);
        let pairs = self.play_pairs(&ids, &versions, &scoreboard);

        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            settings: self.options.settings.clone(),
            builds,
            pairs,
            ranking: scoreboard.ranked(),
        })
    }

    /// Every unordered pair of resolved candidates, challenger being the
    /// earlier one. Pairs with an unbuilt side are reported as skipped.
    fn play_pairs(&self, ids: &[String], versions: &[Version], scoreboard: &Scoreboard) -> Vec<PairReport> {
        let built_index = |id: &str| versions.iter().position(|v| v.id == id);

        let mut slots: Vec<Result<PairJob<'_>, PairReport>> = Vec::new();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                let slot = match (built_index(a), built_index(b)) {
                    (Some(ia), Some(ib)) => Ok(PairJob {
                        challenger: &versions[ia],
                        opponent: &versions[ib],
                        seed: pair_seed(self.options.base_seed, ia, ib),
                    }),
                    (ia, _) => {
                        let missing = if ia.is_none() { a } else { b };
                        Err(PairReport {
                            challenger: a.clone(),
                            opponent: b.clone(),
                            seed: None,
                            status: PairStatus::Skipped {
                                reason: format!("{} did not build", short_id(missing)),
                            },
                            result: SprtResult::no_games(),
                            elapsed_secs: 0.0,
                        })
                    }
                };
                slots.push(slot);
            }
        }

        let play = |slot: &Result<PairJob<'_>, PairReport>| match slot {
            Ok(job) => self.play_pair(job, scoreboard),
            Err(skipped) => skipped.clone(),
        };

        let threads = self.options.parallel_pairs;
        if threads <= 1 {
            return slots.iter().map(play).collect();
        }
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| slots.par_iter().map(play).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "could not start pair pool, playing sequentially");
                slots.iter().map(play).collect()
            }
        }
    }

    fn play_pair(&self, job: &PairJob<'_>, scoreboard: &Scoreboard) -> PairReport {
        let (a, b) = (job.challenger, job.opponent);
        let mut report = PairReport {
            challenger: a.id.clone(),
            opponent: b.id.clone(),
            seed: Some(job.seed),
            status: PairStatus::Cancelled,
            result: SprtResult::no_games(),
            elapsed_secs: 0.0,
        };
        if self.cancel.is_cancelled() {
            return report;
        }

        tracing::info!(challenger = %a.short, opponent = %b.short, seed = job.seed, "playing pair");
        let started = Instant::now();
        match self.evaluator.evaluate(a, b, job.seed) {
            Ok(result) => {
                tracing::info!(
                    challenger = %a.short,
                    opponent = %b.short,
                    decision = %result.decision,
                    score = %result.score_line(),
                    games = result.games,
                    llr = result.llr,
                    "pair decided"
                );
                report.status = PairStatus::Decided;
                report.result = result;
            }
            Err(e) => {
                tracing::warn!(challenger = %a.short, opponent = %b.short, error = %e, "match failed, pair counted inconclusive");
                report.status = PairStatus::MatchError {
                    message: e.to_string(),
                };
            }
        }
        scoreboard.record(&a.id, &b.id, &report.result);
        report.elapsed_secs = started.elapsed().as_secs_f64();
        report
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod pipeline_tests;
