//! Notification Relay CLI
//!
//! Runs the relay over stdio: commands in on stdin, responses and events out
//! on stdout, logs on stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notification_relay::{
    BootTrigger, CommandHandler, LineWriter, MemoryPlatform, MemorySmsInbox, Normalizer,
    PlatformEvent, RawNotification, RelayConfig, RelayServer, RelayService, SmsMessage,
    StreamChannel,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "nrelay")]
#[command(about = "Notification Relay - capture, dedup and relay system notifications")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/notification-relay/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay over stdin/stdout
    Run {
        /// Replay platform events from a JSON-lines file
        #[arg(long)]
        events: Option<PathBuf>,
        /// Serve getSmsMessages from a JSON array of messages
        #[arg(long)]
        sms: Option<PathBuf>,
        /// Start through a boot signal instead of directly
        /// (boot-completed, my-package-replaced, package-replaced:<pkg>)
        #[arg(long)]
        boot: Option<BootTrigger>,
        /// Do not start capturing until startBackgroundService
        #[arg(long)]
        no_start: bool,
        /// Attach stdout as the event consumer right away
        #[arg(long)]
        listen: bool,
    },
    /// Print the effective config
    Config,
    /// Normalize raw notifications (JSON array or JSON lines) and print records
    Normalize {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=debug nrelay run
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notification_relay=info,nrelay=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let config = RelayConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { events, sms, boot, no_start, listen } => {
            run_relay(config, events, sms, boot, no_start, listen).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Normalize { file } => {
            let normalizer = Normalizer::from_config(&config);
            for raw in read_raw_notifications(&file)? {
                let record = normalizer.normalize(&raw);
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }

    Ok(())
}

async fn run_relay(
    config: RelayConfig,
    events: Option<PathBuf>,
    sms: Option<PathBuf>,
    boot: Option<BootTrigger>,
    no_start: bool,
    listen: bool,
) -> Result<()> {
    let (platform, platform_events) = MemoryPlatform::new(config.package_name.clone());
    let relay = RelayService::spawn(config, platform.clone());
    let pump = relay.spawn_event_pump(platform_events);

    let inbox = match sms {
        Some(path) => MemorySmsInbox::new(read_sms(&path)?),
        None => MemorySmsInbox::default(),
    };

    let writer = Arc::new(LineWriter::stdout());
    let handler = CommandHandler::new(relay.clone(), platform.clone(), Arc::new(inbox), writer.clone());
    if listen {
        relay.sink().attach(Arc::new(StreamChannel::new(writer.clone())));
    }

    let boot_task = match boot {
        Some(trigger) => relay.supervisor().on_boot_signal(trigger),
        None if no_start => None,
        None => {
            relay.supervisor().start()?;
            None
        }
    };

    let replay = match events {
        Some(path) => {
            let platform = platform.clone();
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open events file {}", path.display()))?;
            Some(tokio::spawn(async move {
                let mut lines = BufReader::new(file).lines();
                let mut count = 0usize;
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<PlatformEvent>(line) {
                                Ok(event) => {
                                    platform.inject(event);
                                    count += 1;
                                }
                                Err(e) => warn!(error = %e, "Skipping malformed platform event"),
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "Failed to read events file");
                            break;
                        }
                    }
                }
                info!(count, "Event replay finished");
            }))
        }
        None => None,
    };

    let server = RelayServer::new(handler, writer);
    if let Err(e) = server.run(BufReader::new(tokio::io::stdin())).await {
        error!(error = %e, "Command server stopped");
    }

    if let Some(task) = boot_task {
        let _ = task.await;
    }
    if let Some(task) = replay {
        let _ = task.await;
    }
    // Give the pump a moment to drain replayed events
    tokio::time::sleep(Duration::from_millis(50)).await;
    relay.settle().await;
    relay.shutdown()?;
    pump.abort();
    Ok(())
}

fn read_raw_notifications(path: &Path) -> Result<Vec<RawNotification>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()));
    }

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse {} entry {}", path.display(), i + 1))
        })
        .collect()
}

fn read_sms(path: &Path) -> Result<Vec<SmsMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
