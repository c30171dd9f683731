use anyhow::Result;
use dotenvy::dotenv;

use tunecore::core::{config, init_logger, log_pipeline_configuration};
use tunecore::{Acquisition, MediaKind, MediaPipeline, PipelineConfig, VideoSource};

mod cli;

use cli::{Cli, Commands};

/// Entry point: runs one pipeline command and prints its result to stdout.
///
/// # Errors
/// Returns an error if logging can't be initialised or the command fails
/// (for acquisitions, the error lists every stage that was tried).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    init_logger(&config::log_file_path())?;

    let config = PipelineConfig::from_env();
    log_pipeline_configuration(&config);
    let pipeline = MediaPipeline::new(config);

    match cli.command {
        Commands::Song { link } => print_acquisition(pipeline.download(&link, MediaKind::Audio).await?),
        Commands::Video { link } => print_acquisition(pipeline.download(&link, MediaKind::Video).await?),
        Commands::Stream { link } => match pipeline.video_source(&link).await? {
            VideoSource::File(path) => println!("{}", path.display()),
            VideoSource::Stream(url) => println!("{}", url),
        },
        Commands::Playlist { link, limit } => {
            for id in pipeline.playlist(&link, limit).await? {
                println!("{}", id);
            }
        }
        Commands::Formats { link } => {
            for format in pipeline.formats(&link).await? {
                println!(
                    "{:<8} {:<6} {:<12} {}",
                    format.format_id.as_deref().unwrap_or("?"),
                    format.ext.as_deref().unwrap_or("?"),
                    format.format_note.as_deref().unwrap_or(""),
                    format
                        .filesize
                        .map(|size| format!("{:.2} MB", size / (1024.0 * 1024.0)))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Size { link } => match pipeline.total_filesize(&link).await? {
            Some(bytes) => println!("{} bytes ({:.2} MB)", bytes, bytes as f64 / (1024.0 * 1024.0)),
            None => println!("unknown"),
        },
        Commands::Info { link, json } => {
            let track = pipeline.track(&link).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&track)?);
            } else {
                println!("{}", track.title);
                println!("  by {}", track.performer);
                if let Some(duration) = &track.duration_min {
                    println!("  duration: {} ({}s)", duration, track.duration_sec);
                }
                println!("  {}", track.link);
            }
        }
    }

    Ok(())
}

fn print_acquisition(acquisition: Acquisition) {
    match acquisition {
        Acquisition::Cached { file_id } => println!("file_id: {}", file_id),
        Acquisition::Local { artifact, file_id } => {
            println!("{}", artifact.path.display());
            if let Some(file_id) = file_id {
                println!("file_id: {}", file_id);
            }
        }
    }
}
