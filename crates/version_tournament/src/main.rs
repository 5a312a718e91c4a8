//! version-sprt CLI
//!
//! Build engine revisions, play every pair with an SPRT and print the
//! resulting scoreboard.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use version_tournament::sprt_core::{SessionSummary, SprtConfig, TimeControl};
use version_tournament::{
    init_tracing, load_openings, locate_fastchess, parse_level, print_scoreboard,
    write_openings_file, BuildCache, CmakeToolchain, CommandToolchain, FastchessRunner,
    GameEvaluator, GameRunner, GitResolver, GitWorktrees, MatchConfig, MatchStrategy,
    PairEvaluator, Pipeline, PipelineOptions, ResolveRequest, RunConfig, RunReport, RunSettings,
    SessionEvaluator, Toolchain, ToolchainKind,
};

#[derive(Parser)]
#[command(name = "version-sprt")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rank engine revisions with pairwise SPRT matches", long_about = None)]
struct Cli {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build revisions and rank them
    Rank(RankArgs),

    /// Print a saved report
    Report {
        /// report.json written by `rank`
        path: PathBuf,

        /// Print the markdown rendering instead of the tables
        #[arg(long)]
        markdown: bool,
    },

    /// LLR of a finished win/draw/loss record
    Llr {
        #[arg(long)]
        wins: u32,
        #[arg(long)]
        draws: u32,
        #[arg(long)]
        losses: u32,
        #[arg(long, default_value_t = 0.0)]
        elo0: f64,
        #[arg(long, default_value_t = 5.0)]
        elo1: f64,
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,
        #[arg(long, default_value_t = 0.05)]
        beta: f64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Fastchess,
    Games,
}

/// Flags override the config file, which overrides the defaults
#[derive(Args)]
struct RankArgs {
    /// TOML run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine git repository
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Revision expression to enumerate commits from
    #[arg(long)]
    rev: Option<String>,

    /// Use only the last N commits (0 = all)
    #[arg(long)]
    max_commits: Option<usize>,

    /// Follow every parent, not just the first
    #[arg(long)]
    all_parents: bool,

    /// Output directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Parallel build jobs per candidate
    #[arg(long)]
    jobs: Option<u32>,

    /// Candidates built at the same time
    #[arg(long)]
    parallel_builds: Option<usize>,

    /// Keep build worktrees after building
    #[arg(long)]
    keep_worktrees: bool,

    /// How pairs are played
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Path to the fastchess binary; otherwise the config file, then
    /// $FASTCHESS, then PATH
    #[arg(long)]
    fastchess: Option<PathBuf>,

    /// Time control, e.g. `10+0.1`, `40/60+0.5` or `st=0.2`
    #[arg(long)]
    tc: Option<String>,

    /// Fixed time per move; overrides --tc when above 0
    #[arg(long)]
    movetime_ms: Option<u64>,

    #[arg(long)]
    alpha: Option<f64>,
    #[arg(long)]
    beta: Option<f64>,
    #[arg(long)]
    elo0: Option<f64>,
    #[arg(long)]
    elo1: Option<f64>,
    #[arg(long)]
    min_games: Option<u32>,
    #[arg(long)]
    max_games: Option<u32>,

    /// Games per pair for the fastchess strategy
    #[arg(long)]
    games_per_match: Option<u32>,

    #[arg(long)]
    hash: Option<u32>,
    #[arg(long)]
    threads: Option<u32>,
    #[arg(long)]
    concurrency: Option<u32>,

    /// Pairs played at the same time
    #[arg(long)]
    parallel_pairs: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Opening files (FEN/EPD); defaults to <repo>/bench/fens.txt
    #[arg(long, num_args = 1..)]
    openings: Vec<PathBuf>,

    /// Save a PGN per pair
    #[arg(long)]
    save_pgn: bool,
}

impl RankArgs {
    fn apply(self, mut config: RunConfig) -> Result<RunConfig> {
        let r = &mut config.resolve;
        if let Some(repo) = self.repo {
            r.repo = repo;
        }
        if let Some(rev) = self.rev {
            r.revisions = rev;
        }
        if let Some(n) = self.max_commits {
            r.max_candidates = n;
        }
        if self.all_parents {
            r.first_parent = false;
        }

        let b = &mut config.build;
        if let Some(jobs) = self.jobs {
            b.jobs = jobs;
        }
        if let Some(n) = self.parallel_builds {
            b.parallel_builds = n;
        }
        if self.keep_worktrees {
            b.retain_workspaces = true;
        }

        let m = &mut config.matches;
        if let Some(strategy) = self.strategy {
            m.strategy = match strategy {
                StrategyArg::Fastchess => MatchStrategy::Fastchess,
                StrategyArg::Games => MatchStrategy::Games,
            };
        }
        if self.fastchess.is_some() {
            m.fastchess = self.fastchess;
        }
        if let Some(tc) = self.tc {
            m.time_control = tc
                .parse::<TimeControl>()
                .with_context(|| format!("invalid --tc {tc:?}"))?;
        }
        if self.movetime_ms.is_some() {
            m.movetime_ms = self.movetime_ms;
        }
        if let Some(n) = self.games_per_match {
            m.games_per_match = n;
        }
        if let Some(n) = self.hash {
            m.hash_mb = n;
        }
        if let Some(n) = self.threads {
            m.threads = n;
        }
        if let Some(n) = self.concurrency {
            m.concurrency = n;
        }
        if let Some(n) = self.parallel_pairs {
            m.parallel_pairs = n;
        }
        if let Some(seed) = self.seed {
            m.seed = seed;
        }
        if !self.openings.is_empty() {
            m.openings = self.openings;
        }
        if self.save_pgn {
            m.save_pgn = true;
        }

        let s = &mut config.sprt;
        s.alpha = self.alpha.unwrap_or(s.alpha);
        s.beta = self.beta.unwrap_or(s.beta);
        s.elo0 = self.elo0.unwrap_or(s.elo0);
        s.elo1 = self.elo1.unwrap_or(s.elo1);
        s.min_games = self.min_games.unwrap_or(s.min_games);
        s.max_games = self.max_games.unwrap_or(s.max_games);

        if let Some(out) = self.out {
            config.output.dir = out;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rank(args) => {
            let base = match &args.config {
                Some(path) => RunConfig::load(path)?,
                None => RunConfig::default(),
            };
            let config = args.apply(base)?;
            let level = cli.log_level.as_deref().unwrap_or(&config.output.log_level);
            init_tracing(cli.json || config.output.log_json, parse_level(level));
            run_rank(config)
        }
        Commands::Report { path, markdown } => {
            init_tracing(cli.json, parse_level(cli.log_level.as_deref().unwrap_or("warn")));
            let report = RunReport::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            if markdown {
                print!("{}", report.to_markdown());
            } else {
                report.print_pairs();
                print_scoreboard(&report.ranking);
            }
            Ok(())
        }
        Commands::Llr {
            wins,
            draws,
            losses,
            elo0,
            elo1,
            alpha,
            beta,
        } => {
            let sprt = SprtConfig {
                alpha,
                beta,
                elo0,
                elo1,
                ..Default::default()
            };
            sprt.validate()?;
            let summary = SessionSummary {
                games: wins + draws + losses,
                wins,
                losses,
                draws,
                points: wins as f64 + 0.5 * draws as f64,
                llr: None,
                verdict: None,
            };
            let result = summary.classify(&sprt);
            println!(
                "W-D-L {} games={} llr={:.3} bounds=({:.3}, {:.3}) decision={}",
                result.score_line(),
                result.games,
                result.llr,
                sprt.lower_bound(),
                sprt.upper_bound(),
                result.decision
            );
            Ok(())
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("cannot determine the working directory")?
        .join(path))
}

/// fastchess decides how many games to play from `games_per_match`; the
/// SPRT game limits only steer the `games` strategy
fn game_limits_ignored(config: &RunConfig) -> bool {
    let defaults = SprtConfig::default();
    config.matches.strategy == MatchStrategy::Fastchess
        && (config.sprt.min_games != defaults.min_games
            || config.sprt.max_games != defaults.max_games)
}

fn run_rank(config: RunConfig) -> Result<()> {
    config.validate()?;

    let repo = absolute(&config.resolve.repo)?;
    let out = absolute(&config.output.dir)?;
    std::fs::create_dir_all(&out)
        .with_context(|| format!("cannot create output directory {}", out.display()))?;

    let m = &config.matches;
    let time_control = m.effective_time_control();

    // Fail on configuration problems before spending time on builds.
    let evaluator: Box<dyn PairEvaluator> = match m.strategy {
        MatchStrategy::Fastchess => {
            let tool = locate_fastchess(m.fastchess.as_deref())?;
            println!("Using fastchess: {}", tool.display());
            if game_limits_ignored(&config) {
                tracing::warn!(
                    min_games = config.sprt.min_games,
                    max_games = config.sprt.max_games,
                    games_per_match = m.games_per_match,
                    "min/max games only apply to the games strategy; fastchess plays up to games_per_match"
                );
            }
            let openings = load_openings(&m.opening_paths(&repo))?;
            let openings_file = write_openings_file(&openings, &out.join("openings.epd"))
                .context("cannot write openings file")?;
            let match_config = MatchConfig {
                time_control,
                openings: openings_file,
                hash_mb: m.hash_mb,
                threads: m.threads,
                games_per_match: m.games_per_match,
                concurrency: m.concurrency,
                pgn_dir: m.save_pgn.then(|| out.join("pgn")),
                timeout: m.timeout_secs.map(std::time::Duration::from_secs),
            };
            Box::new(SessionEvaluator::new(
                FastchessRunner::new(tool),
                match_config,
                config.sprt,
            ))
        }
        MatchStrategy::Games => {
            let openings = load_openings(&m.opening_paths(&repo))?;
            write_openings_file(&openings, &out.join("openings.epd"))
                .context("cannot write openings file")?;
            Box::new(GameEvaluator::new(
                GameRunner::new(time_control).with_max_plies(m.max_plies),
                openings,
                config.sprt,
                m.hash_mb,
                m.threads,
            ))
        }
    };

    let b = &config.build;
    let toolchain: Box<dyn Toolchain> = match b.toolchain {
        ToolchainKind::Cmake => Box::new(CmakeToolchain::new(&b.binary_stem, b.jobs, b.timeout())),
        ToolchainKind::Command => Box::new(CommandToolchain {
            steps: b.steps.clone(),
            artifact: b.artifact.clone().unwrap_or_default(),
            timeout: b.timeout(),
        }),
    };
    let builds = BuildCache::new(
        &out,
        &b.binary_stem,
        Box::new(GitWorktrees::new(&repo, out.join("worktrees"), b.retain_workspaces)),
        toolchain,
    );

    let options = PipelineOptions {
        request: ResolveRequest {
            expr: config.resolve.revisions.clone(),
            first_parent: config.resolve.first_parent,
            max_candidates: config.resolve.max_candidates,
        },
        base_seed: m.seed,
        parallel_builds: b.parallel_builds,
        parallel_pairs: m.parallel_pairs,
        settings: RunSettings {
            revisions: config.resolve.revisions.clone(),
            strategy: m.strategy.as_str().to_string(),
            time_control: time_control.to_string(),
            games_per_match: m.games_per_match,
            base_seed: m.seed,
            sprt: config.sprt,
        },
    };

    let pipeline = Pipeline::new(Box::new(GitResolver::new(&repo)), builds, evaluator, options);
    let report = pipeline.run()?;

    let json_path = out.join("report.json");
    report
        .save(&json_path)
        .with_context(|| format!("failed to save {}", json_path.display()))?;
    let md_path = out.join("report.md");
    std::fs::write(&md_path, report.to_markdown())
        .with_context(|| format!("failed to write {}", md_path.display()))?;

    report.print_pairs();
    print_scoreboard(&report.ranking);
    println!("\nReport saved to: {}", json_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank_args(argv: &[&str]) -> RankArgs {
        let mut full = vec!["version-sprt", "rank"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Rank(args) => args,
            _ => panic!("expected rank"),
        }
    }

    #[test]
    fn test_config_fastchess_path_survives_environment() {
        std::env::set_var("FASTCHESS", "/stale/fastchess");
        let mut base = RunConfig::default();
        base.matches.fastchess = Some(PathBuf::from("/opt/tools/fastchess"));

        let config = rank_args(&[]).apply(base).unwrap();

        assert_eq!(
            config.matches.fastchess,
            Some(PathBuf::from("/opt/tools/fastchess"))
        );
    }

    #[test]
    fn test_flags_override_config() {
        let mut base = RunConfig::default();
        base.matches.fastchess = Some(PathBuf::from("/opt/tools/fastchess"));
        base.sprt.max_games = 50;

        let config = rank_args(&[
            "--fastchess",
            "/usr/local/bin/fastchess",
            "--tc",
            "5+0.05",
            "--max-commits",
            "3",
            "--all-parents",
        ])
        .apply(base)
        .unwrap();

        assert_eq!(
            config.matches.fastchess,
            Some(PathBuf::from("/usr/local/bin/fastchess"))
        );
        assert_eq!(config.matches.time_control, TimeControl::clock(5.0, 0.05));
        assert_eq!(config.resolve.max_candidates, 3);
        assert!(!config.resolve.first_parent);
        assert_eq!(config.sprt.max_games, 50);
    }

    #[test]
    fn test_game_limits_flagged_only_for_fastchess() {
        assert!(!game_limits_ignored(&RunConfig::default()));

        let config = rank_args(&["--max-games", "400"])
            .apply(RunConfig::default())
            .unwrap();
        assert!(game_limits_ignored(&config));

        let config = rank_args(&["--max-games", "400", "--strategy", "games"])
            .apply(RunConfig::default())
            .unwrap();
        assert!(!game_limits_ignored(&config));
    }

    #[test]
    fn test_bad_tc_flag_is_rejected() {
        assert!(rank_args(&["--tc", "fast"]).apply(RunConfig::default()).is_err());
    }
}
