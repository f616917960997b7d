//! matcheval CLI — evaluate keypoint matchers on homography datasets.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use matcheval::{
    load_artifact, load_homography, load_image_size, run_sweep, score_pair, EvalConfig,
    Evaluator, PairInput, RobustScoring, SweepConfig, TableKind,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "matcheval")]
#[command(about = "Matching accuracy (MMA) and homography estimation accuracy (HEA) evaluation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every algorithm's matches on a dataset and write the result tables.
    Evaluate(CliEvaluateArgs),

    /// Pick the best hyperparameter value per (algorithm, split) by AUC.
    Sweep(CliSweepArgs),

    /// Score a single image pair and print the result as JSON.
    ScorePair(CliScorePairArgs),

    /// Print the default evaluation configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliEvaluateArgs {
    /// Dataset root containing the manifest and ground-truth files.
    #[arg(long)]
    dataset_dir: PathBuf,

    /// Results directory holding `<algorithm>/outputs/...` artifacts.
    #[arg(long)]
    results_dir: PathBuf,

    /// Algorithms to evaluate, in output-row order.
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    algorithms: Vec<String>,

    #[command(flatten)]
    overrides: CliConfigArgs,

    /// Decimals written to the overall tables.
    #[arg(long)]
    precision: Option<usize>,

    /// Do not write per-pair `<algorithm>_{mma,hom}.csv` files.
    #[arg(long)]
    no_pair_rows: bool,
}

#[derive(Debug, Clone, Args)]
struct CliConfigArgs {
    /// Evaluation config (JSON). Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads for pair scoring (default: all cores).
    #[arg(long)]
    workers: Option<usize>,

    /// RANSAC inlier threshold in pixels.
    #[arg(long)]
    ransac_thresh_px: Option<f64>,

    /// Maximum RANSAC iterations.
    #[arg(long)]
    ransac_iters: Option<usize>,

    /// Use plain inlier counting instead of MSAC scoring.
    #[arg(long)]
    plain_ransac: bool,

    /// Base RNG seed; each pair uses `seed + manifest index`.
    #[arg(long)]
    seed: Option<u64>,
}

impl CliConfigArgs {
    fn to_config(&self) -> CliResult<EvalConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading config: {}", path.display());
                EvalConfig::from_json_file(path)?
            }
            None => EvalConfig::default(),
        };
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        let fit = &mut config.scoring.fit;
        if let Some(t) = self.ransac_thresh_px {
            fit.inlier_threshold_px = t;
        }
        if let Some(n) = self.ransac_iters {
            fit.max_iters = n;
        }
        if self.plain_ransac {
            fit.scoring = RobustScoring::Ransac;
        }
        if let Some(seed) = self.seed {
            fit.seed = seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Args)]
struct CliSweepArgs {
    /// Directory containing one results directory per hyperparameter value.
    #[arg(long)]
    results_root: PathBuf,

    /// Hyperparameter labels in sweep order (subdirectories of --results-root).
    #[arg(long, num_args = 1.., value_delimiter = ',', conflicts_with = "config")]
    values: Vec<String>,

    /// Sweep config (JSON) with labels, directories and layer schedules.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for the sweep reports (default: --results-root).
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliScorePairArgs {
    /// Correspondence artifact (JSON).
    #[arg(long)]
    artifact: PathBuf,

    /// Ground-truth homography file (9 reals, row-major).
    #[arg(long)]
    homography: PathBuf,

    /// Image A; only its dimensions are read.
    #[arg(long)]
    image: PathBuf,

    #[command(flatten)]
    overrides: CliConfigArgs,

    /// Path to write the scores (JSON). Prints to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate(args) => run_evaluate(&args),
        Commands::Sweep(args) => run_sweep_cmd(&args),
        Commands::ScorePair(args) => run_score_pair(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

// ── evaluate ───────────────────────────────────────────────────────────

fn run_evaluate(args: &CliEvaluateArgs) -> CliResult<()> {
    let mut config = args.overrides.to_config()?;
    if let Some(p) = args.precision {
        config.csv_precision = p;
    }
    if args.no_pair_rows {
        config.write_pair_rows = false;
    }
    config.validate()?;

    let layout = config.layout(&args.dataset_dir, &args.results_dir);
    tracing::info!(
        "Evaluating {} algorithm(s) on {}",
        args.algorithms.len(),
        args.dataset_dir.display()
    );

    let evaluator = Evaluator::new(config, layout)?;
    let evaluation = evaluator.evaluate(&args.algorithms)?;

    let written = evaluation.write_outputs(evaluator.layout(), evaluator.config())?;
    for path in &written {
        tracing::info!("Wrote {}", path.display());
    }

    if !evaluation.failures.is_empty() {
        let names: Vec<&str> = evaluation
            .failures
            .iter()
            .map(|f| f.algorithm.as_str())
            .collect();
        return Err(format!("evaluation failed for: {}", names.join(", ")).into());
    }
    Ok(())
}

// ── sweep ──────────────────────────────────────────────────────────────

fn run_sweep_cmd(args: &CliSweepArgs) -> CliResult<()> {
    let sweep = match &args.config {
        Some(path) => SweepConfig::from_json_file(path)?,
        None => SweepConfig::from_labels(args.values.iter().cloned()),
    };
    sweep.validate()?;

    let out_dir = args.out_dir.as_deref().unwrap_or(&args.results_root);
    std::fs::create_dir_all(out_dir).map_err(|e| -> CliError {
        format!("Failed to create {}: {}", out_dir.display(), e).into()
    })?;

    for kind in TableKind::ALL {
        let result = run_sweep(&sweep, &args.results_root, kind)?;
        let stem = kind.file_stem();

        let json_path = out_dir.join(format!("sweep_{stem}.json"));
        write_text(&json_path, &serde_json::to_string_pretty(&result)?)?;
        let csv_path = out_dir.join(format!("sweep_{stem}_winners.csv"));
        write_text(&csv_path, &result.winners_csv())?;

        for best in &result.overall {
            tracing::info!(
                "{} [{}]: best '{}' (AUC {:.3})",
                best.algorithm,
                stem,
                best.hyperparameter,
                best.auc
            );
        }
    }
    Ok(())
}

// ── score-pair ─────────────────────────────────────────────────────────

fn run_score_pair(args: &CliScorePairArgs) -> CliResult<()> {
    let config = args.overrides.to_config()?;

    tracing::info!("Loading artifact: {}", args.artifact.display());
    let correspondences = load_artifact(&args.artifact, "cli")?;
    let ground_truth = load_homography(&args.homography)?;
    let image_size = load_image_size(&args.image)?;
    tracing::info!("Image size: {}x{}", image_size[0], image_size[1]);

    let input = PairInput {
        correspondences: &correspondences,
        ground_truth: &ground_truth,
        image_size,
    };
    let scores = score_pair(&input, &config.scoring, config.scoring.fit.seed);
    tracing::info!(
        "{} matches, {} inliers",
        scores.mma.n_matches,
        scores.hea.n_inliers
    );

    let json = serde_json::to_string_pretty(&scores)?;
    match &args.out {
        Some(path) => {
            write_text(path, &json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&EvalConfig::default())?);
    Ok(())
}

fn write_text(path: &Path, text: &str) -> CliResult<()> {
    std::fs::write(path, text)
        .map_err(|e| -> CliError { format!("Failed to write {}: {}", path.display(), e).into() })
}
