//! splat-forge command line
//!
//! Run with: cargo run -p splat-forge -- convert photo.jpg

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use splat_forge::export::{encode_ply_file, render_share_document, share_filename, ShareAssets};
use splat_forge::gallery;
use splat_forge::{JobStatus, SplatForgeConfig, SplatService};

/// Poll cadence while jobs are queued or running
const ACTIVE_POLL: Duration = Duration::from_millis(500);
/// Poll cadence once nothing is active
const IDLE_POLL: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "splat-forge", version, about = "Turn images into Gaussian-splat models")]
struct Cli {
    /// Settings file (input_folder / output_folder and tool options)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Queue images for reconstruction and wait for every job to finish
    Convert {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Write a compact .splat file for a finished model
    Export {
        /// Model id (file stem in the output folder) or a path to a .ply
        model: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a self-contained HTML viewer for a finished model
    Share {
        model: String,
        #[arg(long)]
        template: PathBuf,
        /// three.js module
        #[arg(long)]
        three: PathBuf,
        /// Gaussian splat viewer module
        #[arg(long)]
        splats: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List finished models, newest first
    List,
    /// Delete a model and its source image
    Delete { model: String },
    /// Show or update the persisted input/output folders
    Settings {
        #[arg(long)]
        input_folder: Option<PathBuf>,
        #[arg(long)]
        output_folder: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "splat_forge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = SplatForgeConfig::load(&cli.config);

    match cli.command {
        Command::Convert { images } => convert(config, images).await,
        Command::Export { model, output } => {
            let (id, ply) = resolve_model(&config, &model)?;
            let splat = encode_ply_file(&ply)?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.splat", id)));
            fs::write(&output, &splat)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{} -> {} ({} bytes)", ply.display(), output.display(), splat.len());
            Ok(())
        }
        Command::Share {
            model,
            template,
            three,
            splats,
            output,
        } => {
            let (id, ply) = resolve_model(&config, &model)?;
            let splat = encode_ply_file(&ply)?;

            let template = fs::read_to_string(&template)
                .with_context(|| format!("reading {}", template.display()))?;
            let three_js = fs::read(&three).with_context(|| format!("reading {}", three.display()))?;
            let splats_js = fs::read(&splats).with_context(|| format!("reading {}", splats.display()))?;

            let html = render_share_document(
                &id,
                &splat,
                &ShareAssets {
                    template: &template,
                    three_js: &three_js,
                    splats_js: &splats_js,
                },
            );
            let output = output.unwrap_or_else(|| PathBuf::from(share_filename(&id)));
            fs::write(&output, html).with_context(|| format!("writing {}", output.display()))?;
            println!("{} -> {}", ply.display(), output.display());
            Ok(())
        }
        Command::List => {
            let models = gallery::list_models(
                &config.storage.output_folder,
                &config.storage.input_folder,
                &config.converter.ply_extension,
            )?;
            for model in &models {
                println!(
                    "{:<32} {:>12} bytes  {}  {}",
                    model.id,
                    model.size,
                    model.modified.format("%Y-%m-%d %H:%M:%S"),
                    model
                        .image_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            println!("{} models", models.len());
            Ok(())
        }
        Command::Delete { model } => {
            let removed = gallery::delete_model(
                &config.storage.output_folder,
                &config.storage.input_folder,
                &config.converter.ply_extension,
                &model,
            )?;
            for path in removed {
                println!("removed {}", path.display());
            }
            Ok(())
        }
        Command::Settings {
            input_folder,
            output_folder,
        } => {
            let mut config = config;
            let changed = input_folder.is_some() || output_folder.is_some();
            if let Some(folder) = input_folder {
                config.storage.input_folder = folder;
            }
            if let Some(folder) = output_folder {
                config.storage.output_folder = folder;
            }
            if changed {
                config.ensure_directories()?;
                config.save(&cli.config)?;
                println!("saved {}", cli.config.display());
            }
            println!("input_folder:  {}", config.storage.input_folder.display());
            println!("output_folder: {}", config.storage.output_folder.display());
            Ok(())
        }
    }
}

/// `model` is either an existing `.ply` path or an id in the output folder
fn resolve_model(config: &SplatForgeConfig, model: &str) -> anyhow::Result<(String, PathBuf)> {
    let direct = Path::new(model);
    let path = if direct.is_file() {
        direct.to_path_buf()
    } else {
        config
            .storage
            .output_folder
            .join(format!("{}.{}", model, config.converter.ply_extension))
    };

    if !path.is_file() {
        bail!("Model not found: {}", model);
    }
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| model.to_string());
    Ok((id, path))
}

async fn convert(config: SplatForgeConfig, images: Vec<PathBuf>) -> anyhow::Result<()> {
    let service = SplatService::start(config)?;
    let input_folder = service.config().storage.input_folder.clone();

    let mut submitted = HashSet::new();
    for image in images {
        if !image.is_file() {
            bail!("not a file: {}", image.display());
        }
        let filename = image
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .with_context(|| format!("no file name in {}", image.display()))?;

        let stored = input_folder.join(&filename);
        if fs::canonicalize(&image).ok() != fs::canonicalize(&stored).ok() {
            fs::copy(&image, &stored)
                .with_context(|| format!("copying {} to {}", image.display(), stored.display()))?;
        }

        let id = service.submit(filename.clone(), stored);
        println!("queued {} ({})", filename, id);
        submitted.insert(id);
    }

    loop {
        let listing = service.list_jobs();
        let finished = listing
            .jobs
            .iter()
            .filter(|job| submitted.contains(&job.id) && job.status.is_terminal())
            .count();
        if finished == submitted.len() {
            break;
        }
        tokio::time::sleep(if listing.has_active { ACTIVE_POLL } else { IDLE_POLL }).await;
    }

    let mut failures = 0;
    for job in service.list_jobs().jobs.iter().rev() {
        if !submitted.contains(&job.id) {
            continue;
        }
        match job.status {
            JobStatus::Completed => println!("completed {}", job.filename),
            _ => {
                failures += 1;
                println!(
                    "failed    {}: {}",
                    job.filename,
                    job.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} jobs failed", failures, submitted.len());
    }
    Ok(())
}
