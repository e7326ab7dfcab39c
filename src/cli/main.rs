/**
 * fieldsync CLI
 *
 * Inspect and drive the local capture queue from a terminal: queue
 * captures, run a sync pass, retry failures and purge synced photos.
 */

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use fieldsync::app::SyncApp;
use fieldsync::offline::PhotoFile;
use fieldsync::shared::{AppConfig, AssessmentPayload, Result, SyncError};

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(about = "Offline capture queue and sync for condition assessments")]
struct Cli {
    /// TOML config file; environment variables override it
    #[arg(long, global = true, env = "FIELDSYNC_CONFIG")]
    config: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue counts per category and the last successful sync
    Status,
    /// Run one drain pass
    Sync,
    /// Reset failed records to pending, then sync if online
    Retry,
    /// Delete synced photos whose blobs were already released
    Purge,
    /// Queue an assessment from inline JSON or `@file.json`
    QueueAssessment { json: String },
    /// Queue a photo for an assessment
    QueuePhoto {
        file: PathBuf,
        /// Local or server id of the assessment
        #[arg(long)]
        parent: String,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Queue a voice note
    QueueRecording {
        file: PathBuf,
        /// Assessment or deficiency the note belongs to
        #[arg(long, default_value = "")]
        context: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "fieldsync=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();
}

fn mime_for(path: &Path, fallback: &str) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("webm") => "audio/webm",
        Some("ogg") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a" | "mp4") => "audio/mp4",
        _ => fallback,
    }
    .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("capture")
        .to_string()
}

fn print(json: bool, value: &impl serde::Serialize, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

async fn sync(app: &SyncApp, json: bool) -> Result<()> {
    if !app.network().probe().await {
        return Err(SyncError::network("Server unreachable, records stay queued"));
    }
    let result = app.sync_now().await?;
    print(json, &result, || {
        format!(
            "synced {} | failed {}{}",
            result.synced,
            result.failed,
            if result.aborted { " | aborted" } else { "" }
        )
    })
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let app = SyncApp::open(config).await?;

    match cli.command {
        Commands::Status => {
            app.network().probe().await;
            let status = app.status().await?;
            print(cli.json, &status, || {
                let mut lines = vec![format!(
                    "{} | pending {} | failed {} | total {}",
                    if status.online { "online" } else { "offline" },
                    status.stats.pending,
                    status.stats.failed,
                    status.stats.total
                )];
                for (category, counts) in &status.stats.categories {
                    lines.push(format!(
                        "  {:<11} pending {} uploading {} synced {} failed {}",
                        category.to_string(),
                        counts.pending,
                        counts.uploading,
                        counts.synced,
                        counts.failed
                    ));
                }
                lines.push(format!(
                    "last sync: {}",
                    status.last_sync.as_deref().unwrap_or("never")
                ));
                lines.join("\n")
            })?;
        }
        Commands::Sync => sync(&app, cli.json).await?,
        Commands::Retry => {
            let reset = app.store().reset_failed(None).await?;
            tracing::info!("Reset {} failed record(s)", reset);
            sync(&app, cli.json).await?;
        }
        Commands::Purge => {
            let purged = app.store().purge_synced().await?;
            print(cli.json, &purged, || format!("purged {} synced record(s)", purged))?;
        }
        Commands::QueueAssessment { json } => {
            let text = match json.strip_prefix('@') {
                Some(path) => tokio::fs::read_to_string(path).await?,
                None => json,
            };
            let assessment: AssessmentPayload = serde_json::from_str(&text)?;
            let local_id = app.capture().save_assessment(assessment).await?;
            print(cli.json, &local_id, || format!("queued assessment {}", local_id))?;
        }
        Commands::QueuePhoto {
            file,
            parent,
            caption,
        } => {
            let data = tokio::fs::read(&file).await?;
            let photo = PhotoFile::new(file_name(&file), mime_for(&file, "image/jpeg"), data);
            let receipt = app.photos().attach_photo(&parent, photo, caption).await?;
            if let Some(warning) = &receipt.warning {
                tracing::warn!("{}", warning);
            }
            print(cli.json, &receipt.local_id, || {
                format!(
                    "queued photo {} ({}% smaller)",
                    receipt.local_id, receipt.compression_ratio
                )
            })?;
        }
        Commands::QueueRecording { file, context } => {
            let audio = tokio::fs::read(&file).await?;
            let local_id = app
                .recordings()
                .queue_recording(audio, &mime_for(&file, "audio/webm"), &context)
                .await?;
            print(cli.json, &local_id, || format!("queued recording {}", local_id))?;
        }
    }

    app.shutdown().await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
