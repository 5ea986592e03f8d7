use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use lyric_sync_core::{
    read_lyric_file, AppConfig, LyricDocument, LyricsSource, LyricsView, Orientation,
    PlaybackClock, Player,
};
use tracing_subscriber::EnvFilter;

/// How long the last line stays on screen before playback ends.
const TAIL_MS: i64 = 3_000;

#[tokio::main]
async fn main() -> lyric_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            file,
            translation,
            config,
            start,
            landscape,
            full,
            width,
        } => {
            let options = PlayOptions {
                translation,
                start,
                landscape,
                full,
                width,
            };
            run_play(&file, config.as_ref(), options).await
        }
        Commands::Resolve {
            file,
            position,
            config,
        } => run_resolve(&file, position, config.as_ref()),
    }
}

struct PlayOptions {
    translation: Option<PathBuf>,
    start: i64,
    landscape: bool,
    full: bool,
    width: usize,
}

async fn run_play(
    file: &PathBuf,
    config: Option<&PathBuf>,
    options: PlayOptions,
) -> lyric_sync_core::Result<()> {
    let config = load_config(config)?;
    let (source, document) = load_lyrics(file, options.translation.as_ref(), &config)?;
    tracing::info!(
        ?file,
        lines = document.len(),
        synced = document.is_synced(),
        "starting playback"
    );

    if !document.is_synced() || !config.lyrics.show_lyrics {
        let view = LyricsView::build(&document, &source, &Default::default(), &config.lyrics);
        print!("{}", view.draw(options.width));
        return Ok(());
    }

    let clock = Arc::new(PlaybackClock::playing_from(options.start));
    let end = document
        .lines()
        .last()
        .map(|line| line.time_ms + TAIL_MS)
        .unwrap_or(0);
    clock.set_duration(Some(end));

    let mut session = lyric_sync_core::spawn(&config, clock.clone(), Arc::new(|| None::<i64>));
    if options.landscape {
        session.handle.set_orientation(Orientation::Landscape)?;
    }
    session.handle.set_source(source.clone())?;

    let mut state = session.handle.subscribe();
    let mut finished = tokio::time::interval(Duration::from_millis(250));
    let mut last_displayed = -1;

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                if snapshot.displayed_line_index == last_displayed {
                    continue;
                }
                last_displayed = snapshot.displayed_line_index;

                let view = LyricsView::build(&document, &source, &snapshot, &config.lyrics);
                if options.full {
                    println!("{}", view.draw(options.width));
                } else if let Some(line) =
                    view.highlighted().and_then(|index| document.line(index))
                {
                    println!("[{}] {}", format_time(line.time_ms), line.text);
                }
            }
            Some(request) = session.scrolls.recv() => {
                tracing::debug!(?request, position_ms = clock.current_position(), "scroll");
            }
            _ = finished.tick() => {
                if clock.is_finished() {
                    tracing::info!("playback finished");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    session.handle.shutdown()?;
    if let Err(err) = session.task.await {
        tracing::warn!(%err, "sync driver ended abnormally");
    }
    Ok(())
}

fn run_resolve(
    file: &PathBuf,
    position: i64,
    config: Option<&PathBuf>,
) -> lyric_sync_core::Result<()> {
    let config = load_config(config)?;
    let (_, document) = load_lyrics(file, None, &config)?;
    let index = document.current_line_index(position);
    tracing::debug!(?file, position, index, "resolved line");

    match usize::try_from(index).ok().and_then(|i| document.line(i)) {
        Some(line) => println!("{index}\t{}", line.text),
        None => println!("{index}"),
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> lyric_sync_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

fn load_lyrics(
    file: &PathBuf,
    translation: Option<&PathBuf>,
    config: &AppConfig,
) -> lyric_sync_core::Result<(LyricsSource, LyricDocument)> {
    let raw = read_lyric_file(file)?;
    let translated = translation.map(|path| read_lyric_file(path)).transpose()?;
    let source = LyricsSource::for_preferences(Some(&raw), translated.as_deref(), &config.lyrics);
    let document = LyricDocument::from_source(&source, &config.lyrics);
    Ok((source, document))
}

fn format_time(ms: i64) -> String {
    format!("{:02}:{:02}.{:02}", ms / 60_000, (ms / 1_000) % 60, (ms % 1_000) / 10)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Synchronised lyrics in the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a lyric file against a simulated clock, printing each line as it
    /// becomes current.
    Play {
        /// LRC or plain-text lyric file.
        file: PathBuf,
        /// Translated lyric file, shown when `translate` is enabled.
        #[arg(short, long)]
        translation: Option<PathBuf>,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Start position in milliseconds.
        #[arg(short, long, default_value_t = 0)]
        start: i64,
        /// Use landscape line-break offsets.
        #[arg(long)]
        landscape: bool,
        /// Redraw the whole lyrics view on every change.
        #[arg(long)]
        full: bool,
        /// Column width used for alignment.
        #[arg(short, long, default_value_t = 60)]
        width: usize,
    },
    /// Print the line that is current at a given position.
    Resolve {
        file: PathBuf,
        /// Playback position in milliseconds.
        #[arg(short, long, allow_negative_numbers = true)]
        position: i64,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

