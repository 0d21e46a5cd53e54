//! Correctness check for compiled 2-D matmul kernels
//!
//! Runs the matrix-vector, matrix-matrix and exhaustive campaigns (or the
//! ones selected with `--campaign`) against the native toolchain. Extra
//! arguments can be supplied through `TEST_ARGS`; they are parsed before the
//! command line, so explicit flags win.
//!
//! Exit codes: 0 success, 1 random campaign failure, 2 exhaustive
//! counterexample, 3 setup or usage error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use kernelcheck::campaign::config::{
    DEFAULT_BASE_PATH, DEFAULT_EXHAUSTIVE_BOUND, DEFAULT_INSTRUCTION_ENV, DEFAULT_NUM_CASES,
};
use kernelcheck::logging::init_logging_default;
use kernelcheck::{
    target_filename, ArtifactRemover, Campaign, CampaignDriver, CompilerOptions, HarnessConfig,
    HarnessError, MatMul2DLibBuilder, OptLevel, OptionKind, RandomSeed, RunSummary, Toolchain,
    Tolerance,
};

const TEST_ARGS_ENV: &str = "TEST_ARGS";

const EXIT_CAMPAIGN_FAILED: u8 = 1;
const EXIT_COUNTEREXAMPLE: u8 = 2;
const EXIT_SETUP_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "matmul2d-check", version)]
#[command(about = "Check compiled matmul kernels against a CPU reference", long_about = None)]
struct Cli {
    /// Optimization level (0-3); defaults to 3
    #[arg(short = 'O', long = "opt-level", value_name = "LEVEL")]
    opt_level: Option<String>,

    /// Target triple
    #[arg(long)]
    mtriple: Option<String>,

    /// Target architecture
    #[arg(long)]
    march: Option<String>,

    /// Target CPU
    #[arg(long)]
    mcpu: Option<String>,

    /// Target accelerator; repeat for several, NONE clears the list
    #[arg(long = "maccel", value_name = "NAME")]
    maccel: Vec<String>,

    /// Extra optimizer flags, forwarded to the native compiler
    #[arg(long, allow_hyphen_values = true)]
    xopt: Option<String>,

    /// Extra code generator flags, forwarded to the native compiler
    #[arg(long, allow_hyphen_values = true)]
    xllc: Option<String>,

    /// Flags passed through `-mllvm`
    #[arg(long, allow_hyphen_values = true)]
    mllvm: Option<String>,

    /// Keep the generated C source next to the artifact
    #[arg(long)]
    preserve_source: bool,

    /// Artifact path without the shared library suffix
    #[arg(long, default_value = DEFAULT_BASE_PATH)]
    base_path: PathBuf,

    /// Random configurations per random campaign
    #[arg(long, default_value_t = DEFAULT_NUM_CASES)]
    num_cases: usize,

    /// Largest dimension of the exhaustive sweep
    #[arg(long, default_value_t = DEFAULT_EXHAUSTIVE_BOUND)]
    exhaustive_bound: usize,

    /// Seed; overrides the seed environment variable
    #[arg(long)]
    seed: Option<u64>,

    /// Campaigns to run, in order; defaults to all three
    #[arg(long = "campaign", value_enum)]
    campaigns: Vec<CampaignArg>,

    /// Environment variable naming the instruction the artifact must contain
    #[arg(long, default_value = DEFAULT_INSTRUCTION_ENV)]
    instruction_env: String,

    #[arg(long)]
    atol: Option<f32>,

    #[arg(long)]
    rtol: Option<f32>,

    /// Add a constant to every compiled output (negative control)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    perturb_output: f32,

    /// C compiler; defaults to $CC or cc
    #[arg(long)]
    cc: Option<String>,

    /// Disassembler; defaults to $OBJDUMP or objdump
    #[arg(long)]
    objdump: Option<String>,

    /// Write a JSON run summary to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CampaignArg {
    MatrixVector,
    MatrixMatrix,
    Exhaustive,
}

impl CampaignArg {
    fn name(&self) -> &'static str {
        match self {
            CampaignArg::MatrixVector => "matrix-vector",
            CampaignArg::MatrixMatrix => "matrix-matrix",
            CampaignArg::Exhaustive => "exhaustive",
        }
    }
}

impl Cli {
    fn harness_config(&self) -> anyhow::Result<HarnessConfig> {
        let defaults = Tolerance::default();
        let tolerance = Tolerance::new(
            self.atol.unwrap_or(defaults.atol),
            self.rtol.unwrap_or(defaults.rtol),
        )?;

        let config = HarnessConfig::new()
            .with_base_path(&self.base_path)
            .with_num_cases(self.num_cases)
            .with_exhaustive_bound(self.exhaustive_bound)
            .with_instruction_env(&self.instruction_env)
            .with_tolerance(tolerance)
            .with_output_perturbation(self.perturb_output);
        config.validate()?;
        Ok(config)
    }

    /// O3 first, then whatever the flags say
    fn compiler_options(&self) -> anyhow::Result<CompilerOptions> {
        let mut flags: Vec<(OptionKind, &str)> = Vec::new();
        if let Some(level) = &self.opt_level {
            flags.push((OptionKind::CompilerOptLevel, level.as_str()));
        }
        for (kind, value) in [
            (OptionKind::TargetTriple, &self.mtriple),
            (OptionKind::TargetArch, &self.march),
            (OptionKind::TargetCpu, &self.mcpu),
            (OptionKind::OptFlag, &self.xopt),
            (OptionKind::LlcFlag, &self.xllc),
            (OptionKind::LlvmFlag, &self.mllvm),
        ] {
            if let Some(value) = value {
                flags.push((kind, value.as_str()));
            }
        }
        flags.extend(self.maccel.iter().map(|a| (OptionKind::TargetAccel, a.as_str())));

        let options = CompilerOptions::new()
            .with_opt_level(OptLevel::O3)
            .with_preserve_source(self.preserve_source)
            .with_options(flags)?;
        Ok(options)
    }

    fn toolchain(&self) -> Toolchain {
        let mut toolchain = Toolchain::new();
        if let Some(cc) = &self.cc {
            toolchain = toolchain.with_compiler(cc);
        }
        if let Some(objdump) = &self.objdump {
            toolchain = toolchain.with_disassembler(objdump);
        }
        toolchain
    }

    fn selected_campaigns(&self, config: &HarnessConfig) -> anyhow::Result<Vec<Campaign>> {
        if self.campaigns.is_empty() {
            return Ok(config.campaigns());
        }
        self.campaigns
            .iter()
            .map(|c| config.campaign_by_name(c.name()).map_err(anyhow::Error::from))
            .collect()
    }
}

/// `argv[0]`, then the `TEST_ARGS` tokens, then the real arguments
fn merged_args() -> Vec<String> {
    let mut args = std::env::args();
    let mut merged: Vec<String> = args.next().into_iter().collect();
    if let Ok(extra) = std::env::var(TEST_ARGS_ENV) {
        merged.extend(extra.split_whitespace().map(str::to_string));
    }
    merged.extend(args);
    merged
}

fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let config = cli.harness_config().context("invalid harness configuration")?;
    // Declared before the driver so the library is unloaded before the file goes
    let _remover = ArtifactRemover::new(target_filename(&config.base_path));

    let options = cli.compiler_options().context("invalid compiler options")?;
    let campaigns = cli.selected_campaigns(&config)?;

    let toolchain = cli.toolchain();
    if !toolchain.is_available() {
        return Err(HarnessError::InvalidConfiguration(format!(
            "C compiler {:?} is not runnable",
            toolchain.compiler()
        )))
        .context("toolchain probe failed");
    }

    let seed = match cli.seed {
        Some(value) => {
            tracing::info!(seed = value, "Using seed from --seed");
            RandomSeed::new(value)
        }
        None => RandomSeed::from_env(&config.seed_env)?,
    };

    let target_options = options.option(OptionKind::TargetAccel);
    println!("Target options: \"{}\"", target_options);
    let mut summary = RunSummary::new(seed, target_options);

    let builder = MatMul2DLibBuilder::new(&config.base_path, &options, toolchain, seed)
        .with_tolerance(config.tolerance)
        .with_output_offset(config.output_perturbation);
    let mut driver = CampaignDriver::new(builder, config.instruction_env.clone());
    let mut rng = seed.campaign_rng();

    let mut outcome: Result<(), HarnessError> = Ok(());
    for campaign in &campaigns {
        let report = driver.run_campaign(campaign, &mut rng, config.num_cases);
        let passed = report.ensure_passed();
        summary.push(report);
        if let Err(e) = passed {
            outcome = Err(e);
            break;
        }
    }

    if let Some(path) = &cli.report {
        let saved = summary
            .save_json(path)
            .with_context(|| format!("writing report to {}", path.display()));
        match (saved, &outcome) {
            (Err(e), Ok(())) => return Err(e),
            // The campaign failure decides the exit code
            (Err(e), Err(_)) => tracing::error!("{:#}", e),
            (Ok(()), _) => {}
        }
    }

    outcome?;
    tracing::info!(
        seed = seed.value(),
        attempted = summary.total_attempted(),
        "All campaigns passed"
    );
    Ok(summary)
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<HarnessError>() {
        Some(HarnessError::ExhaustiveCounterexample { .. }) => EXIT_COUNTEREXAMPLE,
        Some(HarnessError::CampaignFailed { .. }) => EXIT_CAMPAIGN_FAILED,
        _ => EXIT_SETUP_ERROR,
    }
}

fn main() -> ExitCode {
    init_logging_default();

    let cli = match Cli::try_parse_from(merged_args()) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_SETUP_ERROR)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}
