use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Duration;

use raidbot_engine::{
    Artifacts, Bot, BotConfig, CounterAfterRecovery, Device, InterruptToken, Jitter,
    SessionStats, TextReader,
};
use raidbot_runner::prompt::prompt_heroes;
use raidbot_runner::{
    AdbDevice, ArtifactWriter, RunPaths, TesseractReader, reports, requested_serial, run_tag,
    watcher,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CounterMode {
    /// Zero the counter after the recovery taps (recover once per streak)
    Reset,
    /// Keep counting (recover every cycle until something is read)
    Keep,
}

impl From<CounterMode> for CounterAfterRecovery {
    fn from(mode: CounterMode) -> Self {
        match mode {
            CounterMode::Reset => Self::Reset,
            CounterMode::Keep => Self::Keep,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "raidbot", version)]
#[command(about = "Loot-gated raid farming over adb, reading loot with Tesseract")]
struct Args {
    /// Device serial (default: ANDROID_SERIAL, ADB_SERIAL, then the first attached device)
    #[arg(long)]
    serial: Option<String>,

    /// Heroes available (0-5); asked interactively when omitted
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=5))]
    heroes: Option<u8>,

    /// JSON config overriding the built-in layout, thresholds and timings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session budget in minutes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    budget_mins: Option<u64>,

    /// Keep the device awake with periodic taps after the budget runs out
    #[arg(long)]
    keepalive: bool,

    /// Pause the bot whenever the mouse is clicked anywhere (Linux/X11)
    #[arg(long)]
    watch_clicks: bool,

    /// What the zero-reading counter does after the recovery taps
    #[arg(long, value_enum)]
    counter_after_recovery: Option<CounterMode>,

    /// Stop after this many cycles
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Directory for screenshots, overlays and the loot dataset
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Tag used in artifact names and log lines (RUN_TAG wins when set)
    #[arg(long)]
    run_tag: Option<String>,

    /// Skip the debug overlay and the loot dataset
    #[arg(long)]
    no_artifacts: bool,

    /// Seed for tap jitter and human delays
    #[arg(long)]
    seed: Option<u64>,

    /// adb executable
    #[arg(long, default_value = "adb")]
    adb: PathBuf,

    /// tesseract executable
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = build_config(&args)?;
    if maybe_print_config(&args, &config)? {
        return Ok(());
    }

    announce_banner();
    if args.heroes.is_none() {
        config.heroes = prompt_heroes(&mut std::io::stdin().lock(), &mut stdout())
            .context("failed to read hero count")?;
    }

    let device = AdbDevice::connect(&args.adb, requested_serial(args.serial.clone()))
        .await
        .context("no usable adb device")?;
    let tag = run_tag(
        std::env::var("RUN_TAG").ok(),
        args.run_tag.as_deref(),
        device.serial(),
    );
    std::fs::create_dir_all(&args.work_dir)
        .with_context(|| format!("failed to create {}", args.work_dir.display()))?;
    let paths = RunPaths::new(&args.work_dir, &tag);

    let token = InterruptToken::new();
    if !args.watch_clicks || !watcher::spawn(token.clone()) {
        info!("[{tag}] Running without click pausing.");
    }

    let jitter = args.seed.map_or_else(Jitter::from_entropy, Jitter::seeded);
    let artifacts = (!args.no_artifacts).then(|| ArtifactWriter::new(paths.clone(), &config));
    let bot = Bot::new(
        device,
        TesseractReader::new(&args.tesseract),
        config,
        paths.screen.clone(),
    )
    .with_token(token)
    .with_jitter(jitter)
    .with_run_tag(&tag);

    let finished = match artifacts {
        Some(writer) => run_until_ctrl_c(bot.with_artifacts(writer)).await,
        None => run_until_ctrl_c(bot).await,
    };
    let Some(stats) = finished else {
        eprintln!("{}", "🛑 Stopped by user (Ctrl-C).".red());
        return Ok(());
    };

    write_report(&args, &stats)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn announce_banner() {
    println!("{}", "⚔️  Raidbot".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

/// File config (or defaults) with the command-line overrides applied.
fn build_config(args: &Args) -> Result<BotConfig> {
    let mut config = match &args.config {
        Some(path) => BotConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BotConfig::default(),
    };
    if let Some(minutes) = args.budget_mins {
        config.session.budget = Duration::from_secs(minutes.saturating_mul(60));
    }
    if args.keepalive {
        config.session.keepalive = true;
    }
    if let Some(mode) = args.counter_after_recovery {
        config.failure.after_recovery = mode.into();
    }
    if let Some(limit) = args.max_cycles {
        config.session.max_cycles = Some(limit);
    }
    if let Some(heroes) = args.heroes {
        config.heroes = heroes;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn maybe_print_config(args: &Args, config: &BotConfig) -> Result<bool> {
    if !args.print_config {
        return Ok(false);
    }
    let mut out = open_output(args.output.as_deref())?;
    writeln!(out, "{}", config.to_pretty_json())?;
    out.flush()?;
    Ok(true)
}

async fn run_until_ctrl_c<D: Device, R: TextReader, A: Artifacts>(
    bot: Bot<D, R, A>,
) -> Option<SessionStats> {
    tokio::select! {
        stats = bot.run() => Some(stats),
        Ok(()) = tokio::signal::ctrl_c() => None,
    }
}

fn write_report(args: &Args, stats: &SessionStats) -> Result<()> {
    let mut out = open_output(args.output.as_deref())?;
    let render: fn(&mut dyn Write, &SessionStats) -> Result<()> = match args.report.as_str() {
        "json" => reports::generate_json_report,
        "markdown" => reports::generate_markdown_report,
        _ => reports::generate_console_report,
    };
    render(out.as_mut(), stats)?;
    writeln!(out, "\n🏁 Total time: {:?}", stats.elapsed)?;
    out.flush()?;
    Ok(())
}

/// Buffered writer for `--output`, or stdout when no path was given.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let Some(path) = path else {
        return Ok(Box::new(BufWriter::new(stdout())));
    };
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}
