/// Reprise - replay recorded event streams from the command line
use anyhow::Context;
use clap::{Parser, Subcommand};
use reprise_cli::{config::CliConfig, output};
use reprise_playback::{EventPlayer, PlayerEvent, Recording, Topic};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf};
use tokio::{sync::mpsc, time::Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "reprise")]
#[command(about = "Replay recorded event streams with their original timing", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "REPRISE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recording, printing each notification as it fires
    Play {
        /// Recording file (`{"startTime", "items"}` document or bare item array)
        file: PathBuf,

        /// Cap every wait at this many milliseconds (negative: no cap)
        #[arg(short, long, allow_negative_numbers = true)]
        max_delay: Option<i64>,
    },
    /// Summarize a recording without replaying it
    Inspect {
        /// Recording file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reprise=info,reprise_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { file, max_delay } => {
            play(&file, max_delay, cli.config.as_deref()).await?;
        }
        Commands::Inspect { file } => {
            inspect(&file)?;
        }
    }

    Ok(())
}

fn read_recording(path: &Path) -> anyhow::Result<Recording> {
    let file =
        File::open(path).with_context(|| format!("Failed to open recording {}", path.display()))?;
    Recording::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse recording {}", path.display()))
}

async fn play(path: &Path, max_delay: Option<i64>, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = CliConfig::load(config_path)?;
    config.validate()?;

    let player_config = config.player_config_with_override(max_delay)?;

    let recording = read_recording(path)?;
    tracing::info!(
        "Replaying {} items from {}",
        recording.items.len(),
        path.display()
    );
    if let Some(cap) = player_config.max_delay_ms {
        tracing::info!("Max delay: {}ms", cap);
    }

    let player = EventPlayer::with_items(recording.into_items(), player_config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    player.subscribe(Topic::All, move |event| {
        let _ = tx.send((Instant::now(), event.clone()));
    });

    let started = Instant::now();
    player.start()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some((at, event)) = received else { break };
                let elapsed = at.duration_since(started).as_millis();
                if let Some(line) = output::format_event(elapsed, &event, &config.output) {
                    println!("{}", line);
                }
                if event == PlayerEvent::Complete {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                player.stop();
                tracing::info!("Interrupted with {} items remaining", player.queue_len());
                break;
            }
        }
    }

    Ok(())
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let recording = read_recording(path)?;
    println!("{}", output::format_summary(&recording));
    Ok(())
}
