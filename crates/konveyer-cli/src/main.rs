use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;

use konveyer_core::{
    BatchController, DelegateHandler, HandlerOptions, JobSource, ProcessMode, Provider, RunConfig,
    RunState, clean_links_file, convert_links_file, format_run_summary_readable,
};

const EXIT_CONFIG: i32 = 1;
const EXIT_PARTIAL: i32 = 2;
const EXIT_ABORTED: i32 = 3;

/// CLI wrapper for ProcessMode enum (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliMode {
    AudioOnly,
    #[default]
    Transcribe,
    Summarize,
    Context,
    BodyLanguage,
}

impl From<CliMode> for ProcessMode {
    fn from(cli: CliMode) -> Self {
        match cli {
            CliMode::AudioOnly => ProcessMode::AudioOnly,
            CliMode::Transcribe => ProcessMode::Transcribe,
            CliMode::Summarize => ProcessMode::Summarize,
            CliMode::Context => ProcessMode::Context,
            CliMode::BodyLanguage => ProcessMode::BodyLanguage,
        }
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "konveyer")]
#[command(
    about = "Batch download, transcribe and analyze YouTube videos with checkpointed resume"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a batch of YouTube URLs
    Run(RunArgs),
    /// Test every link in a file and write the valid ones to a cleaned file
    Clean { input: PathBuf, output: PathBuf },
    /// Rewrite live-stream URLs in a file to their watch form
    Convert { input: PathBuf, output: PathBuf },
}

#[derive(Args)]
struct RunArgs {
    /// Links file, one URL per line ('#' comments allowed)
    links_file: Option<PathBuf>,

    /// Enumerate a YouTube search instead of a file
    #[arg(long, conflicts_with = "links_file")]
    search: Option<String>,

    /// Maximum results for --search
    #[arg(long, default_value_t = 10)]
    search_limit: usize,

    /// Process the given URL directly (repeatable)
    #[arg(long = "url", conflicts_with_all = ["links_file", "search"])]
    urls: Vec<String>,

    /// Processing mode
    #[arg(short, long, value_enum, default_value = "transcribe")]
    mode: CliMode,

    /// Items per sub-batch between interactive pauses
    #[arg(long, default_value_t = 10)]
    batch_size: usize,

    /// Index to start from, overriding any stored checkpoint
    #[arg(long)]
    start_index: Option<u64>,

    /// Ask for confirmation between sub-batches
    #[arg(short, long)]
    interactive: bool,

    /// Abort the whole run on the first failed item
    #[arg(long)]
    stop_on_error: bool,

    /// Retries for transient failures (rate limits, network errors)
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Seconds to wait between retry attempts
    #[arg(long, default_value_t = 3)]
    retry_delay: u64,

    /// Seconds to wait between consecutive videos
    #[arg(long, default_value_t = 3)]
    item_delay: u64,

    /// Force re-processing even if artifacts already exist
    #[arg(short, long)]
    force: bool,

    /// Directory for output artifacts
    #[arg(short, long, default_value = "konveyer_output")]
    output_dir: PathBuf,

    /// Checkpoint file (defaults to <output-dir>/checkpoint.json)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Whisper model size (tiny, base, small, medium, large)
    #[arg(long, default_value = "base")]
    whisper_model: String,

    /// AI provider for the summarize mode
    #[arg(short, long, value_enum, default_value = "grok")]
    provider: CliProvider,

    /// Summary language (defaults to the detected transcript language)
    #[arg(long)]
    lang: Option<String>,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn banner() {
    println!(
        "\n{}  {}\n",
        style("konveyer").cyan().bold(),
        style("YouTube Batch Processor").dim()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_batch(args).await,
        Commands::Clean { input, output } => clean(input, output).await,
        Commands::Convert { input, output } => convert(input, output).await,
    }
}

async fn run_batch(args: RunArgs) -> Result<()> {
    let mode: ProcessMode = args.mode.into();
    let provider: Provider = args.provider.into();

    // Validate API key early: a missing key would otherwise fail every item.
    if mode == ProcessMode::Summarize {
        if let Err(e) = provider.validate_api_key() {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(EXIT_CONFIG);
        }
    }

    let source = if let Some(path) = args.links_file {
        JobSource::File(path)
    } else if let Some(query) = args.search {
        JobSource::Search {
            query,
            limit: args.search_limit,
        }
    } else if !args.urls.is_empty() {
        JobSource::List(args.urls)
    } else {
        eprintln!(
            "{} provide a links file, --search <QUERY> or --url <URL>",
            style("Error:").red().bold()
        );
        std::process::exit(EXIT_CONFIG);
    };

    banner();
    println!(
        "{} {}  {} {}\n",
        style("Source:").dim(),
        source.describe(),
        style("Mode:").dim(),
        mode.label()
    );

    fs::create_dir_all(&args.output_dir).await?;
    let checkpoint_path = args
        .checkpoint
        .unwrap_or_else(|| args.output_dir.join("checkpoint.json"));

    let handler = DelegateHandler::new(
        mode,
        HandlerOptions {
            output_dir: args.output_dir.clone(),
            overwrite: args.force,
            whisper_model: args.whisper_model,
            provider,
            summary_lang: args.lang,
        },
    );

    let config = RunConfig {
        batch_size: args.batch_size,
        start_index: args.start_index,
        interactive_mode: args.interactive,
        continue_on_error: !args.stop_on_error,
        max_retries: args.max_retries,
        rate_limit_delay: Duration::from_secs(args.retry_delay),
        item_delay: Duration::from_secs(args.item_delay),
        overwrite: args.force,
        checkpoint_path: checkpoint_path.clone(),
    };

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap(),
    );

    let progress_bar = bar.clone();
    let mut controller =
        BatchController::new(config, handler).with_progress(Box::new(move |index, total, url| {
            if progress_bar.length() != Some(total as u64) {
                progress_bar.set_length(total as u64);
            }
            progress_bar.set_position(index as u64);
            let short: String = url.chars().take(50).collect();
            progress_bar.set_message(short);
        }));

    if args.interactive {
        let prompt_bar = bar.clone();
        controller = controller.with_confirm(Box::new(move |next, total| {
            prompt_bar.suspend(|| {
                print!(
                    "{} Processed {}/{}. Continue with next batch? [Y/n] ",
                    style("?").yellow().bold(),
                    next,
                    total
                );
                let _ = std::io::stdout().flush();
                let mut answer = String::new();
                if std::io::stdin().read_line(&mut answer).is_err() {
                    return false;
                }
                !matches!(answer.trim().to_lowercase().as_str(), "n" | "no")
            })
        }));
    }

    let interrupt = controller.interrupt_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} finishing current item, then stopping...",
                style("Interrupted:").yellow().bold()
            );
            interrupt.store(true, Ordering::SeqCst);
        }
    });

    let summary = match controller.run(&source).await {
        Ok(summary) => summary,
        Err(e) => {
            bar.finish_and_clear();
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(EXIT_CONFIG);
        }
    };
    bar.finish_and_clear();

    let summary_path = args.output_dir.join("run_summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?).await?;

    println!("{}", style("─".repeat(60)).dim());
    println!("{}", format_run_summary_readable(&summary));
    println!(
        "{} {}",
        style("Saved:").dim(),
        style(summary_path.display()).cyan()
    );

    if summary.state == RunState::Aborted {
        println!(
            "{} re-run the same command to resume from {}",
            style("Tip:").dim(),
            style(checkpoint_path.display()).cyan()
        );
    }

    let code = if summary.is_full_success() {
        0
    } else if summary.state == RunState::Aborted {
        EXIT_ABORTED
    } else {
        EXIT_PARTIAL
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn clean(input: PathBuf, output: PathBuf) -> Result<()> {
    banner();
    let spinner = create_spinner("Testing links...");
    match clean_links_file(&input, &output, Duration::from_millis(500)).await {
        Ok(report) => {
            spinner.finish_with_message(format!(
                "{} {} valid, {} invalid",
                style("✓").green().bold(),
                report.valid.len(),
                report.invalid.len()
            ));
            if !report.invalid.is_empty() {
                println!("\n{}", style("Rejected links:").dim());
                for verdict in &report.invalid {
                    println!("  • {} - {}", verdict.url, verdict.reason);
                }
            }
            println!(
                "\n{} {}",
                style("Saved:").dim(),
                style(output.display()).cyan()
            );
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(EXIT_CONFIG);
        }
    }
}

async fn convert(input: PathBuf, output: PathBuf) -> Result<()> {
    banner();
    match convert_links_file(&input, &output).await {
        Ok(converted) => {
            println!(
                "{} Converted {} live URL(s)",
                style("✓").green().bold(),
                converted
            );
            println!(
                "\n{} {}",
                style("Saved:").dim(),
                style(output.display()).cyan()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(EXIT_CONFIG);
        }
    }
}
