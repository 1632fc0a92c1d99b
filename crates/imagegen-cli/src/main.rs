use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use imagegen_contracts::events::{ActivityJournal, JournalEvent};
use imagegen_contracts::history::{
    FileSlot, GeneratedImageRecord, HistoryCollection, HistoryStore, HISTORY_SLOT_NAME,
};
use imagegen_contracts::prompts::validate;
use imagegen_contracts::request::{AspectRatio, GenerationRequest, GenerationResult, Quality};
use imagegen_contracts::styles::StyleCatalog;
use imagegen_engine::config::timeout_from_secs;
use imagegen_engine::{GenerationClient, GeneratorConfig, ImageDownloader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for rejected prompts, failed generations and rejected imports.
const EXIT_USER_ERROR: i32 = 2;
const PROMPT_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Parser)]
#[command(name = "imagegen", version, about = "Text-to-image generation client")]
struct Cli {
    /// History file. Defaults to $IMAGEGEN_HISTORY or the platform data dir.
    #[arg(long, global = true)]
    history: Option<PathBuf>,
    /// Append pipeline events to this JSONL file.
    #[arg(long, global = true)]
    journal: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Validate(ValidateArgs),
    Styles,
    History(HistoryArgs),
    Download(DownloadArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    style: Option<String>,
    #[arg(long, default_value = "1:1")]
    aspect_ratio: AspectRatio,
    #[arg(long, default_value = "standard")]
    quality: Quality,
    /// Do not record the result in the history.
    #[arg(long)]
    no_save: bool,
    /// Also download the image into this directory.
    #[arg(long)]
    download: Option<PathBuf>,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[command(subcommand)]
    action: HistoryAction,
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    Remove {
        id: String,
    },
    Clear,
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Import {
        file: PathBuf,
    },
    Usage,
}

#[derive(Debug, Args)]
struct DownloadArgs {
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    id: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    filename: Option<String>,
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("imagegen error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "imagegen=info,imagegen_engine=info,imagegen_contracts=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<i32> {
    dispatch(Cli::parse(), dirs::data_dir)
}

/// Runs one command. `data_dir` locates the default history file and is only
/// consulted by commands that touch the history.
fn dispatch(cli: Cli, data_dir: fn() -> Option<PathBuf>) -> Result<i32> {
    let history = cli.history;
    let open_store = move || -> Result<HistoryStore<FileSlot>> {
        let path = resolve_history_path(history, data_dir)?;
        tracing::debug!(path = %path.display(), "using history file");
        Ok(HistoryStore::new(FileSlot::new(path)))
    };
    let journal = cli
        .journal
        .map(|path| ActivityJournal::new(path, format!("cli-{}", std::process::id())));

    match cli.command {
        Command::Generate(args) => {
            let store = open_store()?;
            block_on(run_generate(args, &store, journal.as_ref()))
        }
        Command::Validate(args) => run_validate(args),
        Command::Styles => {
            run_styles();
            Ok(0)
        }
        Command::History(args) => run_history(args.action, &open_store()?, journal.as_ref()),
        Command::Download(args) => {
            let store = open_store()?;
            block_on(run_download(args, &store, journal.as_ref()))
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<i32>>>(future: F) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(future)
}

fn resolve_history_path(
    explicit: Option<PathBuf>,
    data_dir: fn() -> Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Some(path) = non_empty_env("IMAGEGEN_HISTORY") {
        return Ok(PathBuf::from(path));
    }
    let base = data_dir().ok_or_else(|| anyhow!("no data directory available; pass --history"))?;
    Ok(base
        .join("imagegen")
        .join(format!("{HISTORY_SLOT_NAME}.json")))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn run_generate(
    args: GenerateArgs,
    store: &HistoryStore<FileSlot>,
    journal: Option<&ActivityJournal>,
) -> Result<i32> {
    let check = validate(&args.prompt);
    if let Some(reason) = check.reason {
        eprintln!("Invalid prompt: {reason}");
        return Ok(EXIT_USER_ERROR);
    }

    let mut config = GeneratorConfig::from_env();
    if let Some(endpoint) = args.endpoint.clone() {
        config = config.with_endpoint(endpoint);
    }
    if let Some(model) = args.model.clone() {
        config = config.with_model(model);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(timeout_from_secs(secs));
    }
    let client = GenerationClient::new(config)?;

    let mut request = GenerationRequest::new(args.prompt.clone())
        .with_aspect_ratio(args.aspect_ratio)
        .with_quality(args.quality);
    if let Some(style) = args.style.clone() {
        request = request.with_style(style);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    note(
        journal,
        JournalEvent::GenerationStarted {
            prompt: request.prompt.clone(),
            style: request.style.clone(),
            aspect_ratio: request.aspect_ratio,
            quality: request.quality,
            model: client.config().model.clone(),
        },
    );
    let result = client.generate_with_cancellation(&request, &cancel).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    let image_url = match &result {
        GenerationResult::Failure { error } => {
            note(
                journal,
                JournalEvent::GenerationFailed {
                    error: error.clone(),
                },
            );
            if !args.json {
                eprintln!("Generation failed: {error}");
            }
            return Ok(EXIT_USER_ERROR);
        }
        GenerationResult::Success {
            image_url,
            metadata,
        } => {
            note(
                journal,
                JournalEvent::GenerationSucceeded {
                    image_url: image_url.clone(),
                    model: metadata.model.clone(),
                    elapsed_ms: metadata.elapsed_ms,
                },
            );
            if !args.json {
                println!("{image_url}");
            }
            image_url.clone()
        }
    };

    if !args.no_save {
        if let Some(record) = GeneratedImageRecord::from_result(&request, &result) {
            let id = record.id.clone();
            store.append(record);
            let history = store.read_all();
            note(
                journal,
                JournalEvent::HistoryAppended {
                    id: id.clone(),
                    count: history.len(),
                },
            );
            if !args.json {
                println!("Saved {id} ({} in history)", history.len());
            }
        }
    }

    if let Some(out_dir) = args.download.as_deref() {
        let downloaded = ImageDownloader::new()
            .download(&image_url, out_dir, None)
            .await?;
        note(
            journal,
            JournalEvent::ImageDownloaded {
                url: image_url.clone(),
                path: downloaded.path.clone(),
                bytes: downloaded.bytes,
            },
        );
        if !args.json {
            println!("Downloaded {}", downloaded.path.display());
        }
    }

    Ok(0)
}

fn run_validate(args: ValidateArgs) -> Result<i32> {
    let check = validate(&args.prompt);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&check)?);
    } else if let Some(reason) = &check.reason {
        println!("invalid: {reason}");
    } else {
        println!("valid");
    }
    Ok(if check.valid { 0 } else { EXIT_USER_ERROR })
}

fn run_styles() {
    for style in StyleCatalog::default().list() {
        println!("{:<16} {:<16} {}", style.id, style.name, style.description);
    }
    println!();
    for ratio in AspectRatio::ALL {
        let (width, height) = ratio.dimensions();
        println!("{:<6} {:<22} {width}x{height}", ratio.as_str(), ratio.label());
    }
}

fn run_history(
    action: HistoryAction,
    store: &HistoryStore<FileSlot>,
    journal: Option<&ActivityJournal>,
) -> Result<i32> {
    match action {
        HistoryAction::List { limit, json } => {
            let history = store.read_all();
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                for line in history_lines(&history, limit) {
                    println!("{line}");
                }
            }
            Ok(0)
        }
        HistoryAction::Remove { id } => {
            let before = store.read_all().len();
            let after = store.remove(&id).len();
            if after == before {
                println!("No history entry with id {id}");
            } else {
                println!("Removed {id} ({after} in history)");
            }
            Ok(0)
        }
        HistoryAction::Clear => {
            store.clear();
            println!("History cleared");
            Ok(0)
        }
        HistoryAction::Export { out } => {
            let snapshot = store.export_snapshot();
            match out {
                Some(path) => {
                    write_file(&path, &snapshot)?;
                    println!("Exported history to {}", path.display());
                }
                None => println!("{snapshot}"),
            }
            Ok(0)
        }
        HistoryAction::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed reading {}", file.display()))?;
            if !store.import_snapshot(&raw) {
                eprintln!("Import failed: {} is not a valid history snapshot", file.display());
                return Ok(EXIT_USER_ERROR);
            }
            let count = store.read_all().len();
            note(
                journal,
                JournalEvent::HistoryImported {
                    source: file.clone(),
                    count,
                },
            );
            println!("Imported {count} images");
            Ok(0)
        }
        HistoryAction::Usage => {
            let usage = store.storage_usage();
            println!(
                "{} of {} used ({}%)",
                format_file_size(usage.used_bytes),
                format_file_size(usage.max_bytes),
                usage.percentage
            );
            Ok(0)
        }
    }
}

async fn run_download(
    args: DownloadArgs,
    store: &HistoryStore<FileSlot>,
    journal: Option<&ActivityJournal>,
) -> Result<i32> {
    let url = match (&args.id, &args.url) {
        (Some(id), _) => {
            let record = store
                .find(id)
                .ok_or_else(|| anyhow!("no history entry with id {id}"))?;
            record.download_url.unwrap_or(record.url)
        }
        (None, Some(url)) => url.clone(),
        (None, None) => return Err(anyhow!("either --id or --url is required")),
    };

    let downloaded = ImageDownloader::new()
        .download(&url, &args.out, args.filename.as_deref())
        .await?;
    note(
        journal,
        JournalEvent::ImageDownloaded {
            url: url.clone(),
            path: downloaded.path.clone(),
            bytes: downloaded.bytes,
        },
    );
    println!(
        "Downloaded {} ({})",
        downloaded.path.display(),
        format_file_size(downloaded.bytes)
    );
    Ok(0)
}

fn note(journal: Option<&ActivityJournal>, event: JournalEvent) {
    if let Some(journal) = journal {
        journal.record(event);
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed writing {}", path.display()))
}

fn history_lines(history: &HistoryCollection, limit: Option<usize>) -> Vec<String> {
    history
        .images
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|image| {
            format!(
                "{}  {}  {:<14}  {:<5}  {}  {}",
                image.id,
                image.created_at.format("%Y-%m-%d %H:%M"),
                image.style.as_deref().unwrap_or("none"),
                image.aspect_ratio.as_deref().unwrap_or("-"),
                truncate_prompt(&image.prompt, PROMPT_PREVIEW_CHARS),
                image.url
            )
        })
        .collect()
}

fn truncate_prompt(prompt: &str, max_chars: usize) -> String {
    if prompt.chars().count() <= max_chars {
        return prompt.to_string();
    }
    let head: String = prompt.chars().take(max_chars).collect();
    format!("{}...", head.trim())
}

fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let scaled = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = format!("{scaled:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[exponent])
}
