// chapterplay - console audio-book player
// Loads a book, wires backend + resolver into the player runtime and hands stdin to the console UI

use anyhow::{Context, Result};
use chapterplay::{
    audio::{book_resolver, AudioBackend, ResourceResolver, SimulatedBackend},
    book::Book,
    config::Config,
    player::{format_clock, PlaybackReducer, PlayerRuntime, PlayerState},
    service::PlaybackService,
    ui::ConsoleApp,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "chapterplay")]
#[command(about = "Listen to chapter-based audio books from the terminal")]
struct Args {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable developer logging (stderr + debug output)
    #[arg(long, global = true)]
    dev: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a book interactively
    Play {
        /// Book manifest (TOML or JSON); defaults to the configured one
        #[arg(long)]
        book: Option<PathBuf>,

        /// Use the simulated engine instead of the sound card
        #[arg(long)]
        simulate: bool,

        /// Chapter to start from, counting from 1
        #[arg(long, default_value_t = 1)]
        chapter: usize,
    },
    /// Print a book's chapters and durations
    Inspect {
        #[arg(long)]
        book: Option<PathBuf>,
    },
    /// Write the default config file
    InitConfig,
}

fn init_logging(config: &Config, dev: bool) -> Result<WorkerGuard> {
    let log_dir = &config.logging.directory;
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(log_dir, "chapterplay.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    if dev {
        eprintln!("Dev mode: debug output enabled to stderr + file");
    }

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn load_book(requested: Option<PathBuf>, config: &Config) -> Result<Book> {
    match requested.or_else(|| config.library.book_manifest.clone()) {
        Some(path) => {
            Book::load(&path).with_context(|| format!("loading book {}", path.display()))
        }
        None => {
            info!("No book manifest configured, using the sample book");
            Ok(Book::sample())
        }
    }
}

type Wiring = (Arc<dyn AudioBackend>, Arc<dyn ResourceResolver>);

fn wire_audio(book: &Book, config: &Config, simulate: bool) -> Result<Wiring> {
    if simulate {
        debug!("Using the simulated engine");
        let backend: Arc<dyn AudioBackend> = Arc::new(SimulatedBackend::for_book(book));
        let resolver: Arc<dyn ResourceResolver> = Arc::new(book_resolver(book));
        return Ok((backend, resolver));
    }
    wire_device(config)
}

#[cfg(feature = "audio")]
fn wire_device(config: &Config) -> Result<Wiring> {
    use chapterplay::audio::{DirectoryResolver, RodioBackend};

    let backend: Arc<dyn AudioBackend> =
        Arc::new(RodioBackend::new().context("opening the audio output device")?);
    let resolver: Arc<dyn ResourceResolver> = Arc::new(DirectoryResolver::new(
        config.library.audio_dir.clone(),
        config.library.audio_extension.clone(),
    ));
    Ok((backend, resolver))
}

#[cfg(not(feature = "audio"))]
fn wire_device(_config: &Config) -> Result<Wiring> {
    anyhow::bail!("this build has no audio output; rebuild with `--features audio` or pass --simulate")
}

async fn play(config: Config, book: Book, simulate: bool, chapter: usize) -> Result<()> {
    let (backend, resolver) = wire_audio(&book, &config, simulate)?;

    let state = PlayerState::starting_at(book, chapter.saturating_sub(1))
        .with_speed(config.playback.default_speed);
    let service = PlaybackService::new(backend, config.service_settings());
    let reducer = PlaybackReducer::new(resolver);
    let (runtime, handle) = PlayerRuntime::new(state, reducer, service, config.runtime_settings());

    let runtime_task = tokio::spawn(runtime.run());
    ConsoleApp::new(handle).run().await?;

    let state = runtime_task.await.context("player runtime crashed")?;
    info!(
        "Left off at chapter {} ({})",
        state.current_chapter_index() + 1,
        format_clock(state.playback_info().current_time)
    );
    Ok(())
}

fn inspect(book: &Book) {
    println!("Book {} (cover: {})", book.id(), book.image_ref());
    for (index, chapter) in book.chapters().iter().enumerate() {
        println!(
            "{:>3}. {}  {}  [{}]",
            index + 1,
            format_clock(chapter.duration),
            chapter.description,
            chapter.audio_ref
        );
    }
    println!(
        "{} chapters, {} total",
        book.chapter_count(),
        format_clock(book.total_duration())
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let _guard = init_logging(&config, args.dev)?;

    info!("chapterplay starting up");

    match args.command {
        Command::Play {
            book,
            simulate,
            chapter,
        } => {
            let book = load_book(book, &config)?;
            play(config, book, simulate, chapter).await
        }
        Command::Inspect { book } => {
            inspect(&load_book(book, &config)?);
            Ok(())
        }
        Command::InitConfig => {
            let path = match args.config {
                Some(path) => path,
                None => Config::config_path()?,
            };
            Config::default().save_to(&path)?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
    }
}
