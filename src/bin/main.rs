use std::{
    fs,
    io,
    path::PathBuf,
    process::ExitCode,
    str::FromStr,
    sync::atomic::Ordering,
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use embassy_futures::block_on;
use log::{LevelFilter, debug, error, info, warn};
use readily_engine::{
    InvalidDocument, ReaderSettings, ReadingMode, ReadingSession, TickResult,
    progress::MemoryProgressStore,
    session::SessionConfig,
    progress::ProgressStore,
    settings::{SettingsStore, SettingsSync},
};
use thiserror::Error;

use settings_file::{FileSettingsStore, with_reader_edits};
use stdin_input::StdinInput;
use terminal::{TerminalRenderer, TerminalViewport};

#[path = "main/settings_file.rs"]
mod settings_file;
#[path = "main/stdin_input.rs"]
mod stdin_input;
#[path = "main/terminal.rs"]
mod terminal;

const USER_ID: &str = "local";
const IDLE_POLL_MS: u64 = 20;
const VIEWPORT_LINES: usize = 24;
const WORDS_PER_LINE: usize = 12;

#[derive(Parser)]
#[command(name = "readily-stream")]
#[command(about = "Speed reader for plain-text files, one word at a time or as flowing text")]
#[command(version)]
struct Cli {
    #[arg(help = "Plain-text file to read")]
    file: PathBuf,

    #[arg(long, help = "Reading speed in words per minute")]
    wpm: Option<u16>,

    #[arg(long, help = "Words per chunk")]
    chunk_size: Option<usize>,

    #[arg(long, help = "Show flowing text with auto-scroll instead of single words")]
    full_text: bool,

    #[arg(long, help = "Do not linger on sentence-ending words")]
    no_punctuation_pause: bool,

    #[arg(long, help = "TOML settings file, created on the first saved edit")]
    settings: Option<PathBuf>,

    #[arg(
        long,
        default_value = "warn",
        help = "Log level (off, error, warn, info, debug, trace)"
    )]
    log_level: String,
}

#[derive(Debug, Error)]
enum RunError {
    #[error("cannot read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("{0}")]
    Document(#[from] InvalidDocument),
    #[error("terminal output failed: {0}")]
    Output(#[from] io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("unknown log level {level:?}; using warn");
        LevelFilter::Warn
    });
    env_logger::Builder::new()
        .filter_level(filter)
        .format_timestamp_millis()
        .init();
}

fn run(cli: &Cli) -> Result<(), RunError> {
    let text = fs::read_to_string(&cli.file).map_err(|source| RunError::Read {
        path: cli.file.display().to_string(),
        source,
    })?;
    let file_id = cli.file.file_name().map_or_else(
        || cli.file.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );

    let mut settings_store = cli.settings.clone().map(FileSettingsStore::new);
    let stored = match settings_store.as_mut().map(FileSettingsStore::load) {
        Some(Ok(Some(settings))) => settings,
        Some(Ok(None)) | None => ReaderSettings::default(),
        Some(Err(err)) => {
            warn!("settings: load failed ({}); using defaults", err);
            ReaderSettings::default()
        }
    };
    let settings = with_overrides(stored, cli).normalized();
    let mut settings_sync = SettingsSync::new(stored);

    let mode = if cli.full_text {
        ReadingMode::FullText
    } else {
        ReadingMode::WordByWord
    };
    let config = SessionConfig {
        settings,
        mode,
        ..SessionConfig::default()
    };
    let (input, quit) = StdinInput::spawn();
    let viewport = TerminalViewport::new(VIEWPORT_LINES, WORDS_PER_LINE);
    let mut session = ReadingSession::new(&text, USER_ID, &file_id, config, viewport, input)?;
    let mut progress_store = MemoryProgressStore::new();

    let started = Instant::now();
    let now_ms = || u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let cursor = block_on(session.resume_from(&mut progress_store, now_ms()));
    info!(
        "reader: file={} words={} mode={:?} wpm={} cursor={}",
        file_id,
        session.playback().total_words(),
        mode,
        settings.wpm,
        cursor
    );

    let stdout = io::stdout();
    let mut renderer = TerminalRenderer::new(stdout.lock(), WORDS_PER_LINE);
    renderer.banner(&session.view())?;
    if !session.is_finished() {
        session.play(now_ms());
    }

    loop {
        let now = now_ms();
        let window_start = session
            .view()
            .active_window
            .first()
            .map_or(0, |chunk| chunk.start_word);
        session.viewport_mut().set_window_start(window_start);

        if session.tick(now) == TickResult::RenderRequested {
            renderer.render(&session.view())?;
        }
        if let Some(record) = session.take_due_progress(now) {
            let result = block_on(progress_store.upsert_progress(&record));
            if let Err(err) = session.complete_progress(result) {
                debug!("reader: progress sync deferred: {}", err);
            }
        }

        let view = session.view();
        settings_sync.track_current(
            with_reader_edits(stored, settings, view.words_per_minute, view.auto_scroll_enabled),
            now,
        );
        if let Some(store) = settings_store.as_mut() {
            settings_sync.flush_if_due(store, now);
        }

        if quit.load(Ordering::Relaxed) || session.reached_end() {
            break;
        }

        let wait_ms = session
            .playback()
            .next_tick_ms()
            .map_or(IDLE_POLL_MS, |due| due.saturating_sub(now))
            .clamp(1, IDLE_POLL_MS);
        thread::sleep(Duration::from_millis(wait_ms));
    }

    session.leave(now_ms());
    let mut written = 0usize;
    while let Some(record) = session.take_pending_progress() {
        let result = block_on(progress_store.upsert_progress(&record));
        if let Err(err) = session.complete_progress(result) {
            warn!("reader: final progress flush failed: {}", err);
            break;
        }
        written += 1;
    }
    debug!("reader: final progress flush wrote={}", written);
    if let Some(store) = settings_store.as_mut()
        && !settings_sync.flush_now(store)
    {
        warn!("settings: final save failed");
    }

    let stats = session.stats();
    renderer.summary(
        progress_store.record(USER_ID, &file_id),
        stats.words_advanced,
        stats.chunk_navigations,
    )?;
    Ok(())
}

fn with_overrides(mut settings: ReaderSettings, cli: &Cli) -> ReaderSettings {
    if let Some(wpm) = cli.wpm {
        settings.wpm = wpm;
    }
    if let Some(chunk_size) = cli.chunk_size {
        settings.chunk_size = chunk_size;
    }
    if cli.no_punctuation_pause {
        settings.pause_on_punctuation = false;
    }
    settings
}
