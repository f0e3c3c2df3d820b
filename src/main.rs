//! media-dl - command-line front end
//!
//! Loads the input table, queues one task per row, prints a status line for
//! every state change and accepts control commands on stdin:
//!
//! ```text
//! pause <id|all>
//! resume <id|all>
//! cancel <id|all>
//! status
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use media_dl::input::ensure_directory;
use media_dl::{
    Config, Event, FfmpegTagger, InputBatch, MediaDownloader, TaskId, YtDlpFetcher, load_jobs,
    resolve_tools, wait_for_signal,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const FINISH_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Command-line arguments for media-dl
#[derive(Parser, Debug)]
#[command(name = "media-dl")]
#[command(about = "Download and tag the media listed in a CSV table")]
#[command(version)]
struct Args {
    /// CSV file listing titles, dates, speakers, series and URLs
    #[arg(short, long)]
    input: PathBuf,

    /// Directory that receives the downloaded files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of simultaneous downloads
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// JSON configuration file
    #[arg(short, long, env = "MEDIA_DL_CONFIG")]
    config: Option<PathBuf>,
}

/// Which tasks a command applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    All,
    One(TaskId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Pause(Target),
    Resume(Target),
    Cancel(Target),
    Status,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();
    if verb == "status" {
        return Some(Command::Status);
    }

    let target = match words.next()? {
        "all" | "*" => Target::All,
        id => Target::One(id.parse().ok()?),
    };
    if words.next().is_some() {
        return None;
    }
    match verb.as_str() {
        "pause" | "p" => Some(Command::Pause(target)),
        "resume" | "r" => Some(Command::Resume(target)),
        "cancel" | "c" => Some(Command::Cancel(target)),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,media_dl=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "media-dl failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Everything the run needs, checked before any download starts
struct Prepared {
    config: Config,
    fetcher: YtDlpFetcher,
    tagger: FfmpegTagger,
    batch: InputBatch,
}

/// Resolve the external tools, then create the output directory and read the table
async fn prepare(config: Config, input: &Path) -> media_dl::Result<Prepared> {
    config.validate()?;
    let (fetcher, tagger) = resolve_tools(&config.tools)?;

    ensure_directory(config.download_dir()).await?;
    let batch = load_jobs(input, config.download_dir(), &config.input).await?;
    Ok(Prepared {
        config,
        fetcher,
        tagger,
        batch,
    })
}

async fn run(args: Args) -> media_dl::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(output) = args.output {
        config.download.download_dir = output;
    }
    if let Some(concurrency) = args.concurrency {
        config.download.max_concurrent_downloads = concurrency;
    }

    let Prepared {
        config,
        fetcher,
        tagger,
        batch,
    } = prepare(config, &args.input).await?;
    for warning in &batch.warnings {
        println!("row {}: {}", warning.sequence + 1, warning.message);
    }

    let downloader =
        MediaDownloader::with_adapters(config, Arc::new(fetcher), Arc::new(tagger)).await?;
    let printer = tokio::spawn(print_events(downloader.clone(), downloader.subscribe()));
    let ids = downloader.add_jobs(batch.jobs).await?;
    println!(
        "Queued {} downloads. Commands: pause|resume|cancel <id|all>, status",
        ids.len()
    );
    let commands = tokio::spawn(read_commands(downloader.clone()));

    tokio::select! {
        _ = wait_for_finish(&downloader) => {}
        _ = wait_for_signal() => println!("Interrupted, cleaning up"),
    }

    downloader.shutdown().await?;
    commands.abort();
    // Let the printer drain the last events before it is dropped
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();

    let stats = downloader.stats().await;
    println!(
        "Done: {} completed, {} failed, {} terminated",
        stats.completed, stats.failed, stats.terminated
    );
    Ok(())
}

async fn wait_for_finish(downloader: &MediaDownloader) {
    while !downloader.is_finished().await {
        tokio::time::sleep(FINISH_POLL_INTERVAL).await;
    }
}

async fn print_status(downloader: &MediaDownloader, id: TaskId) {
    if let Some(info) = downloader.task(id).await {
        println!("[{:>3}] {:<48} {}", id, info.title, info.status_text());
    }
}

async fn print_events(downloader: MediaDownloader, mut events: broadcast::Receiver<Event>) {
    // Last printed tenth of a percent range per task, to keep output readable
    let mut printed_decile: HashMap<TaskId, u32> = HashMap::new();

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Status printer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        match event {
            Event::Rejected { sequence, reason } => {
                println!("row {}: skipped ({})", sequence + 1, reason);
            }
            Event::Progress { id, percent, .. } => {
                let decile = (percent / 10.0) as u32;
                if printed_decile.get(&id).is_none_or(|last| decile > *last) {
                    printed_decile.insert(id, decile);
                    print_status(&downloader, id).await;
                }
            }
            Event::Queued { id, .. }
            | Event::Started { id, .. }
            | Event::Paused { id, .. }
            | Event::Resumed { id }
            | Event::AddingMetadata { id }
            | Event::Completed { id, .. }
            | Event::Failed { id, .. }
            | Event::Terminated { id } => print_status(&downloader, id).await,
            Event::QueuePaused => println!("All downloads paused"),
            Event::QueueResumed => println!("All downloads resumed"),
            Event::Shutdown => return,
        }
    }
}

async fn read_commands(downloader: MediaDownloader) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin, command input disabled");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let Some(command) = parse_command(&line) else {
            println!("unknown command: {}", line.trim());
            continue;
        };
        let result = match command {
            Command::Pause(Target::All) => downloader.pause_all().await,
            Command::Pause(Target::One(id)) => downloader.pause(id).await,
            Command::Resume(Target::All) => downloader.resume_all().await,
            Command::Resume(Target::One(id)) => downloader.resume(id).await,
            Command::Cancel(Target::All) => downloader.cancel_all().await,
            Command::Cancel(Target::One(id)) => downloader.cancel(id).await,
            Command::Status => {
                for info in downloader.tasks().await {
                    println!("[{:>3}] {:<48} {}", info.id, info.title, info.status_text());
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_control_commands() {
        assert_eq!(
            parse_command("pause 3"),
            Some(Command::Pause(Target::One(TaskId(3))))
        );
        assert_eq!(parse_command("RESUME all"), Some(Command::Resume(Target::All)));
        assert_eq!(parse_command("c *"), Some(Command::Cancel(Target::All)));
        assert_eq!(parse_command("  status "), Some(Command::Status));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(parse_command("pause"), None);
        assert_eq!(parse_command("pause three"), None);
        assert_eq!(parse_command("stop 1"), None);
        assert_eq!(parse_command("cancel 1 2"), None);
        assert_eq!(parse_command(""), None);
    }

    #[tokio::test]
    async fn missing_tool_is_reported_before_the_table_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.download.download_dir = dir.path().join("out");
        config.tools.search_path = false;

        let result = prepare(config, &dir.path().join("missing.csv")).await;

        assert!(matches!(result, Err(media_dl::Error::ToolMissing { .. })));
        assert!(!dir.path().join("out").exists());
    }
}
