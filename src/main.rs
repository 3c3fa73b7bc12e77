use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use redline_cli::attach::FileAttachment;
use redline_cli::compose;
use redline_cli::config::{self, ModelConfig};
use redline_cli::notice;
use redline_cli::report;
use redline_cli::resolve;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "redline",
    about = "Privacy compliance pre-check for documents and feature descriptions",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze documents and/or a free-text description for privacy red lines
    Analyze {
        /// Documents to check (pdf, docx, txt; at most 5)
        files: Vec<PathBuf>,

        /// Free-text description of the data practice to check
        #[arg(short, long, default_value = "")]
        text: String,

        /// API key (overrides the REDLINE_API_KEY environment variable)
        #[arg(long)]
        api_key: Option<String>,

        /// Model / endpoint ID (overrides the stored config)
        #[arg(long)]
        model_id: Option<String>,

        /// Endpoint base URL (overrides the stored config)
        #[arg(long)]
        base_url: Option<String>,

        /// Display name for the model (overrides the stored config)
        #[arg(long)]
        model_name: Option<String>,
    },

    /// Show the latest compliance notices
    Notices,

    /// Store endpoint settings in the config file (never the API key)
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Analyze {
            files,
            text,
            api_key,
            model_id,
            base_url,
            model_name,
        } => run_analyze(files, text, api_key, model_id, base_url, model_name).await,
        Command::Notices => run_notices().await,
        Command::Setup => {
            config::setup_interactive().map_err(anyhow::Error::msg)?;
            Ok(())
        }
    }
}

async fn run_analyze(
    files: Vec<PathBuf>,
    text: String,
    api_key: Option<String>,
    model_id: Option<String>,
    base_url: Option<String>,
    model_name: Option<String>,
) -> Result<()> {
    if files.is_empty() && text.trim().is_empty() {
        bail!("Nothing to analyze: pass at least one file or --text");
    }

    let config = assemble_config(api_key, model_id, base_url, model_name)?;

    if !files.is_empty() {
        eprintln!("  Loading {} file(s)...", files.len());
    }
    let attachments = FileAttachment::load_all(&files)?;
    compose::ensure_input(&text, &attachments)?;

    let sources = attachments.len().max(1);
    let shown_model = if config.model_name.is_empty() {
        config.model_id.clone()
    } else {
        config.model_name.clone()
    };
    eprintln!("  Analyzing {} source(s) with {}...", sources, shown_model);

    let results = resolve::analyze_compliance(&text, &attachments, &config).await?;

    report::render_results(&results);
    Ok(())
}

async fn run_notices() -> Result<()> {
    let mut config = ModelConfig::load();
    if let Some(key) = config::api_key_from_env() {
        config.api_key = key;
    }
    // deep analysis only makes sense with usable credentials
    let model_config = if config.api_key.is_empty() || config.model_id.is_empty() {
        None
    } else {
        Some(&config)
    };

    eprintln!("  Fetching compliance notices...");
    let notices = notice::fetch_latest(model_config).await;

    println!();
    for item in &notices {
        println!(
            "  [{}] {}  {:6}  {}",
            item.kind.label(),
            item.date,
            item.priority.label(),
            item.title
        );
        if let Some(link) = &item.link {
            println!("         ↳ {}", link);
        }
    }
    println!();
    Ok(())
}

fn assemble_config(
    api_key: Option<String>,
    model_id: Option<String>,
    base_url: Option<String>,
    model_name: Option<String>,
) -> Result<ModelConfig> {
    let mut config = ModelConfig::load();

    if let Some(model_id) = model_id {
        config.model_id = model_id;
    }
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }
    if let Some(model_name) = model_name {
        config.model_name = model_name;
    }
    config.api_key = api_key
        .or_else(config::api_key_from_env)
        .unwrap_or_default();

    if let Some(warning) = config.check_base_url().map_err(anyhow::Error::msg)? {
        eprintln!("  Warning: {}", warning);
    }

    Ok(config)
}
