use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pennote_client::config::DEFAULT_API_URL;
use pennote_client::{
    spawn_device_feed, AuthClient, CanvasStyle, CanvasSurface, ClientConfig, ConnectionState,
    DeviceSession, ExportFormat, GoogleDriveSync, HttpNotesStore, NoteSession, NotesStore,
    OcrLanguage, Settings, SharedCanvas, TesseractOcr,
};

mod replay;

use crate::replay::{parse_capture, ReplayHost};

#[derive(Parser, Debug)]
#[command(name = "pennote", author, version, about = "Smart pen notes client")]
struct Cli {
    #[arg(long, env = "PENNOTE_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Bearer token returned by `login`.
    #[arg(long, env = "PENNOTE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// JSON settings file; defaults apply when absent.
    #[arg(long, env = "PENNOTE_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Checks that the backend answers.
    Health,
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PENNOTE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PENNOTE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Create {
        #[arg(long)]
        title: Option<String>,
    },
    Delete {
        note_id: String,
    },
    Export {
        note_id: String,
        #[arg(long, default_value = "png", value_parser = parse_format)]
        format: ExportFormat,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Recognizes handwriting in a note and stores the text with it.
    Ocr {
        note_id: String,
        #[arg(long, value_parser = parse_language)]
        language: Option<OcrLanguage>,
        #[arg(long, default_value = "tesseract")]
        tesseract: PathBuf,
    },
    /// Replays a recorded pen capture into a note.
    Capture {
        file: PathBuf,
        /// Draw into an existing note instead of creating one.
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// Save even when auto-save is off.
        #[arg(long)]
        save: bool,
    },
}

fn parse_format(value: &str) -> Result<ExportFormat, String> {
    value.parse().map_err(|error: pennote_client::ExportError| error.to_string())
}

fn parse_language(value: &str) -> Result<OcrLanguage, String> {
    value.parse().map_err(|error: pennote_client::OcrError| error.to_string())
}

struct App {
    config: ClientConfig,
    settings: Settings,
    token: Option<String>,
}

impl App {
    fn store(&self) -> Result<HttpNotesStore> {
        let token = self
            .token
            .as_deref()
            .context("not logged in; pass --token or set PENNOTE_TOKEN")?;
        Ok(HttpNotesStore::new(&self.config, token)?)
    }

    fn canvas(&self) -> Result<SharedCanvas> {
        let surface = CanvasSurface::new(
            self.config.canvas_width,
            self.config.canvas_height,
            CanvasStyle::from_settings(&self.settings),
        )?;
        Ok(surface.into_shared())
    }

    /// Saves the note and, when enabled, pushes it to cloud storage.
    async fn persist(&self, store: &HttpNotesStore, note: &mut NoteSession) -> Result<()> {
        note.save(store).await?;
        if self.settings.sync_to_cloud {
            if let Err(error) = note.sync_to_cloud(&GoogleDriveSync).await {
                tracing::warn!(note = %note.id(), error = %error, "cloud sync failed");
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let app = App {
        config: ClientConfig::new(cli.api_url),
        settings,
        token: cli.token,
    };

    match cli.command {
        Command::Health => {
            let health = AuthClient::new(&app.config)?.health().await?;
            println!("{}", health.status);
        }
        Command::Login { email, password } => {
            let token = AuthClient::new(&app.config)?.login(&email, &password).await?;
            println!("{}", token.token);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let token = AuthClient::new(&app.config)?
                .register(&username, &email, &password)
                .await?;
            println!("{}", token.token);
        }
        Command::List { search } => {
            let notes = app.store()?.list(search.as_deref()).await?;
            for note in notes {
                let updated = note
                    .updated_at
                    .or(note.created_at)
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default();
                println!("{}\t{}\t{}", note.id, note.title, updated);
            }
        }
        Command::Create { title } => {
            let store = app.store()?;
            let note = NoteSession::create(&store, app.canvas()?, title.as_deref()).await?;
            println!("{}", note.id());
        }
        Command::Delete { note_id } => {
            let store = app.store()?;
            NoteSession::open(&store, app.canvas()?, &note_id)
                .await?
                .delete(&store)
                .await?;
        }
        Command::Export {
            note_id,
            format,
            dir,
        } => {
            let store = app.store()?;
            let note = NoteSession::open(&store, app.canvas()?, &note_id).await?;
            let dir = dir.unwrap_or_else(|| app.config.download_dir.clone());
            let path = note.export(format, &dir).await?;
            println!("{}", path.display());
        }
        Command::Ocr {
            note_id,
            language,
            tesseract,
        } => {
            let store = app.store()?;
            let mut note = NoteSession::open(&store, app.canvas()?, &note_id).await?;
            let language = language.unwrap_or(app.settings.ocr_language);
            let text = note
                .recognize_text(&TesseractOcr::with_program(tesseract), language)
                .await?
                .to_string();
            app.persist(&store, &mut note).await?;
            println!("{text}");
        }
        Command::Capture {
            file,
            note,
            title,
            save,
        } => capture(&app, &file, note.as_deref(), title.as_deref(), save).await?,
    }
    Ok(())
}

async fn capture(
    app: &App,
    file: &Path,
    note_id: Option<&str>,
    title: Option<&str>,
    save: bool,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read capture {}", file.display()))?;
    let lines = parse_capture(&raw)?;

    let store = app.store()?;
    let canvas = app.canvas()?;
    let mut note = match note_id {
        Some(id) => {
            let mut note = NoteSession::open(&store, canvas.clone(), id).await?;
            if let Some(title) = title {
                note.set_title(title);
            }
            note
        }
        None => NoteSession::create(&store, canvas.clone(), title).await?,
    };

    let device = app.config.device.clone();
    let pen_lift_gap = device.pen_lift_gap;
    let (session, events) = DeviceSession::new(Arc::new(ReplayHost::new(lines)), device);
    let feed = spawn_device_feed(canvas.clone(), events, pen_lift_gap);
    let mut state = session.subscribe();
    session.connect().await?;
    state
        .wait_for(|state| *state == ConnectionState::Disconnected)
        .await?;
    drop(session);
    feed.await?;

    let strokes = canvas.lock().await.history().len();
    tracing::info!(note = %note.id(), strokes, "capture replayed");
    if save || app.settings.auto_save {
        app.persist(&store, &mut note).await?;
    } else {
        tracing::info!(note = %note.id(), "auto-save is off, capture not saved");
    }
    println!("{}", note.id());
    Ok(())
}
