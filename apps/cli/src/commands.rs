//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use articleforge_core::{GenerationOutput, Pipeline, ProgressReporter, RunPhase};
use articleforge_search::{HttpSearchClient, parse_topic_input, suggest_headings};
use articleforge_shared::{
    AppConfig, PipelineConfig, init_config, load_config, load_config_from, validate_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ArticleForge: research-backed article generation.
#[derive(Parser)]
#[command(
    name = "articleforge",
    version,
    about = "Generate multi-section articles from a topic, web sources, and an LLM.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.articleforge/articleforge.toml.
    #[arg(long, global = true, env = "ARTICLEFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate an article.
    Generate {
        /// Topic, optionally followed by headings: "Topic: First; Second; Third".
        input: String,

        /// Additional section heading (repeatable, appended in order).
        #[arg(long = "heading", short = 'H')]
        headings: Vec<String>,

        /// Number of headings to suggest from search when none are given.
        #[arg(long, default_value_t = 5)]
        suggest: usize,

        /// Write the article to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write the heading → facts assignment as JSON.
        #[arg(long)]
        facts_out: Option<PathBuf>,

        /// Write the full run report (sections, stats) as JSON.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Section units to run at once (overrides pipeline.section_concurrency).
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Suggest section headings for a topic from search results.
    Headings {
        /// Topic to search for.
        topic: String,

        /// Maximum number of headings.
        #[arg(short = 'n', long, default_value_t = 8)]
        count: usize,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout
/// carries only the article.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "articleforge=info",
        1 => "articleforge=debug",
        _ => "articleforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Generate {
            input,
            headings,
            suggest,
            out,
            facts_out,
            report,
            concurrency,
        } => {
            let opts = GenerateOptions {
                input,
                extra_headings: headings,
                suggest,
                out,
                facts_out,
                report,
                concurrency,
            };
            cmd_generate(config_path, opts).await
        }
        Command::Headings { topic, count } => cmd_headings(config_path, &topic, count).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

struct GenerateOptions {
    input: String,
    extra_headings: Vec<String>,
    suggest: usize,
    out: Option<PathBuf>,
    facts_out: Option<PathBuf>,
    report: Option<PathBuf>,
    concurrency: Option<usize>,
}

/// Topic and ordered headings from the positional input plus `--heading` flags.
fn collect_headings(input: &str, extra: &[String]) -> (String, Vec<String>) {
    let (topic, mut headings) = parse_topic_input(input);
    headings.extend(
        extra
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(String::from),
    );
    (topic, headings)
}

async fn cmd_generate(config_path: Option<&Path>, opts: GenerateOptions) -> Result<()> {
    // Validate API key before doing anything
    let config = resolve_config(config_path)?;
    validate_api_key(&config)?;

    let (topic, mut headings) = collect_headings(&opts.input, &opts.extra_headings);
    if topic.is_empty() {
        return Err(eyre!("topic must not be empty"));
    }

    if headings.is_empty() && opts.suggest > 0 {
        let search = HttpSearchClient::from_config(&config.search)?;
        headings = suggest_headings(&search, &topic, opts.suggest).await;
        if !headings.is_empty() {
            eprintln!("Suggested headings:");
            for h in &headings {
                eprintln!("  - {h}");
            }
        }
    }
    if headings.is_empty() {
        warn!(topic = %topic, "no headings given or suggested; the article will have no sections");
    }

    let mut pipeline_config = PipelineConfig::from(&config);
    if let Some(n) = opts.concurrency {
        pipeline_config.section_concurrency = n;
    }

    let pipeline = Pipeline::from_app_config(&config, pipeline_config)?;

    info!(
        topic = %topic,
        headings = headings.len(),
        concurrency = pipeline.config().section_concurrency,
        "generating article"
    );

    let reporter = CliProgress::new();
    let output = pipeline.generate(&topic, &headings, &reporter).await?;

    if let Some(path) = &opts.facts_out {
        write_file(path, &serde_json::to_string_pretty(&output.facts)?)?;
    }
    if let Some(path) = &opts.report {
        write_file(path, &serde_json::to_string_pretty(&output)?)?;
    }

    if let Some(kind) = output.stats.aborted {
        return Err(eyre!("{} ({kind} failure)", output.article));
    }

    match &opts.out {
        Some(path) => write_file(path, &output.article)?,
        None => println!("{}", output.article),
    }

    print_summary(&output, opts.out.as_deref());
    Ok(())
}

fn print_summary(output: &GenerationOutput, out: Option<&Path>) {
    let stats = &output.stats;
    eprintln!();
    eprintln!("  Article generated");
    eprintln!("  Run:       {}", output.run_id);
    eprintln!("  Sources:   {} fragments, {} raw facts", stats.fragments, stats.raw_facts);
    eprintln!("  Facts:     {} assigned", stats.assigned_facts);
    eprintln!(
        "  Sections:  {} ok, {} failed",
        stats.sections_ok, stats.sections_failed
    );
    eprintln!("  Words:     {}", stats.words);
    if let Some(path) = out {
        eprintln!("  Path:      {}", path.display());
    }
    eprintln!("  Time:      {:.1}s", stats.elapsed_ms as f64 / 1000.0);
    eprintln!();
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| eyre!("cannot create {}: {e}", parent.display()))?;
    }
    std::fs::write(path, contents).map_err(|e| eyre!("cannot write {}: {e}", path.display()))?;
    info!(path = %path.display(), bytes = contents.len(), "file written");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, phase: RunPhase) {
        self.spinner.set_message(phase.as_str());
    }

    fn section_finished(&self, heading: &str, ok: bool, finished: usize, total: usize) {
        if !ok {
            self.spinner.println(format!("  ✗ {heading}: generation failed"));
        }
        self.spinner
            .set_message(format!("Writing sections [{finished}/{total}] {heading}"));
    }

    fn done(&self, _output: &GenerationOutput) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// headings
// ---------------------------------------------------------------------------

async fn cmd_headings(config_path: Option<&Path>, topic: &str, count: usize) -> Result<()> {
    let config = resolve_config(config_path)?;
    let (topic, _) = parse_topic_input(topic);
    let search = HttpSearchClient::from_config(&config.search)?;

    info!(topic = %topic, count, "suggesting headings");
    let headings = suggest_headings(&search, &topic, count).await;
    if headings.is_empty() {
        return Err(eyre!("no headings found for '{topic}'"));
    }
    for h in headings {
        println!("{h}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
