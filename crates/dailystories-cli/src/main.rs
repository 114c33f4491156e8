mod host;

use anyhow::Context;
use clap::Parser;
use dailystories_api::{NewStory, PushSubscription, StoryClient, StoryQuery};
use dailystories_cache::{BookmarkStore, CacheStorage};
use dailystories_core::models::{sort_newest_first, story_to_saved};
use dailystories_core::{
    dispatch, CacheGateway, ClickOutcome, Config, HttpFetcher, Notification, OfflineWorker,
    Request, Session, SessionStore, WorkerEvent, WorkerOutcome,
};
use host::{BrowserClients, ConsoleNotifier};
use reqwest::{Method, Url};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dailystories")]
#[command(version, about = "Daily Stories: offline cache worker, saved stories and API client", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/dailystories/config.toml)
    #[arg(long, global = true, env = "DAILYSTORIES_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Drive the offline cache worker
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },
    /// Show or write the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Stories saved on this device
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
    /// Create an account
    Register {
        name: String,
        email: String,
        #[arg(long, env = "DAILYSTORIES_PASSWORD")]
        password: String,
    },
    /// Log in and remember the session
    Login {
        email: String,
        #[arg(long, env = "DAILYSTORIES_PASSWORD")]
        password: String,
    },
    /// Forget the current session
    Logout,
    /// List stories from the feed
    Stories {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        size: Option<u32>,
        /// Only stories with coordinates
        #[arg(long)]
        location: bool,
    },
    /// Show one story
    Story { id: String },
    /// Post a new story
    Post {
        #[arg(long)]
        description: String,
        #[arg(long)]
        photo: PathBuf,
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },
    /// Register a browser push subscription with the API
    Subscribe {
        #[arg(long)]
        endpoint: String,
        /// base64url key from PushSubscription.toJSON()
        #[arg(long)]
        p256dh: String,
        /// base64url key from PushSubscription.toJSON()
        #[arg(long)]
        auth: String,
    },
    /// Remove a push subscription
    Unsubscribe {
        #[arg(long)]
        endpoint: String,
    },
}

#[derive(clap::Subcommand)]
enum WorkerAction {
    /// Pre-cache the manifest into the current generation
    Install,
    /// Drop every cache generation but the current one
    Activate,
    /// Send a request through the cache gateway
    Fetch {
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Extra header as `name: value`
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
    },
    /// Deliver a push message (JSON payload optional)
    Push {
        #[arg(long)]
        data: Option<String>,
    },
    /// Click a notification (built from the same optional JSON payload as `push`)
    Click {
        #[arg(long)]
        data: Option<String>,
    },
    /// List cache generations
    Caches,
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the effective config as TOML
    Show,
    /// Write the effective config to disk so it can be edited
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Subcommand)]
enum SavedAction {
    /// Saved stories, newest first
    List,
    /// Is this story saved?
    Check { id: String },
    /// Fetch a story from the API and save it
    Add { id: String },
    /// Remove a saved story
    Remove { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dailystories=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = config.data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let sessions = SessionStore::new(config.session_path()?);
    let api = StoryClient::with_base_url(config.api.base_url.clone())
        .with_retry_config(config.api.retry_config());

    match cli.command {
        Commands::Config { action } => run_config(&config, cli.config.as_deref(), action)?,
        Commands::Worker { action } => run_worker(&config, action).await?,
        Commands::Saved { action } => run_saved(&config, &sessions, &api, action).await?,
        Commands::Register {
            name,
            email,
            password,
        } => {
            let message = api.register(&name, &email, &password).await?;
            println!("{}", message);
        }
        Commands::Login { email, password } => {
            let login = api.login(&email, &password).await?;
            let session = Session::from(login);
            sessions.save(&session)?;
            println!("Logged in as {}", session.name);
        }
        Commands::Logout => {
            if sessions.clear()? {
                println!("Logged out");
            } else {
                println!("Not logged in");
            }
        }
        Commands::Stories {
            page,
            size,
            location,
        } => {
            let token = sessions.token()?;
            let query = StoryQuery {
                page,
                size,
                with_location: location,
            };
            let stories = api.list_stories(&token, &query).await?;
            for story in &stories {
                println!(
                    "{}  {}  {}",
                    story.created_at.format("%Y-%m-%d %H:%M"),
                    story.id,
                    story.name
                );
            }
            println!("{} stories", stories.len());
        }
        Commands::Story { id } => {
            let token = sessions.token()?;
            let story = api.get_story(&token, &id).await?;
            println!("{}", serde_json::to_string_pretty(&story)?);
        }
        Commands::Post {
            description,
            photo,
            lat,
            lon,
        } => {
            let token = sessions.token()?;
            let bytes = std::fs::read(&photo)
                .with_context(|| format!("Failed to read {}", photo.display()))?;
            let file_name = photo
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "photo.jpg".to_string());

            let message = api
                .add_story(
                    &token,
                    NewStory {
                        description,
                        photo: bytes,
                        file_name,
                        lat,
                        lon,
                    },
                )
                .await?;
            println!("{}", message);
        }
        Commands::Subscribe {
            endpoint,
            p256dh,
            auth,
        } => {
            let token = sessions.token()?;
            let subscription = PushSubscription::from_browser_keys(&endpoint, &p256dh, &auth)?;
            let message = api.subscribe_push(&token, &subscription).await?;
            println!("{}", message);
        }
        Commands::Unsubscribe { endpoint } => {
            let token = sessions.token()?;
            let message = api.unsubscribe_push(&token, &endpoint).await?;
            println!("{}", message);
        }
    }

    Ok(())
}

fn run_config(config: &Config, path: Option<&Path>, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let contents = toml::to_string_pretty(config).context("Failed to render config")?;
            print!("{}", contents);
        }
        ConfigAction::Init { force } => {
            let target = match path {
                Some(path) => path.to_path_buf(),
                None => Config::config_path()?,
            };
            if target.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", target.display());
            }
            // An explicit --config path wins over the platform default
            match path {
                Some(path) => config.save_to(path)?,
                None => config.save()?,
            }
            println!("Wrote {}", target.display());
        }
    }

    Ok(())
}

fn build_worker(config: &Config) -> anyhow::Result<OfflineWorker> {
    let origin = Url::parse(&config.worker.origin)
        .with_context(|| format!("Invalid worker origin {}", config.worker.origin))?;

    let storage = Arc::new(CacheStorage::open(&config.cache_db_path()?)?);
    let fetcher = Arc::new(HttpFetcher::new(origin.clone()));
    let gateway = CacheGateway::new(&config.worker, storage, fetcher)?;

    Ok(OfflineWorker::new(
        &config.worker,
        gateway,
        Arc::new(ConsoleNotifier),
        Arc::new(BrowserClients::new(origin)),
    ))
}

async fn run_worker(config: &Config, action: WorkerAction) -> anyhow::Result<()> {
    let worker = build_worker(config)?;

    let event = match action {
        WorkerAction::Caches => {
            let storage = worker.gateway().storage();
            for name in storage.keys()? {
                let marker = if name == config.worker.cache_name { "*" } else { " " };
                println!("{} {} ({} entries)", marker, name, storage.entry_count(&name)?);
            }
            return Ok(());
        }
        WorkerAction::Install => WorkerEvent::Install,
        WorkerAction::Activate => WorkerEvent::Activate,
        WorkerAction::Fetch {
            url,
            method,
            headers,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid method {}", method))?;
            let mut request = Request::new(method, url);
            for header in &headers {
                let (name, value) = header
                    .split_once(':')
                    .with_context(|| format!("Header must be `name: value`, got {}", header))?;
                request = request.header(name.trim(), value.trim());
            }
            WorkerEvent::Fetch(request)
        }
        WorkerAction::Push { data } => WorkerEvent::Push(data.map(String::into_bytes)),
        WorkerAction::Click { data } => WorkerEvent::NotificationClick(Notification::from_push(
            data.as_deref().map(str::as_bytes),
            &config.worker.notification,
        )),
    };

    match dispatch(&worker, event).await? {
        WorkerOutcome::Installed(count) => {
            println!("Installed {} ({} entries)", config.worker.cache_name, count)
        }
        WorkerOutcome::Activated(deleted) if deleted.is_empty() => {
            println!("No stale cache generations")
        }
        WorkerOutcome::Activated(deleted) => {
            for name in deleted {
                println!("Deleted {}", name);
            }
        }
        WorkerOutcome::Responded(response) => {
            eprintln!("{} {}", response.status, response.url);
            println!("{}", response.text());
        }
        WorkerOutcome::Shown(_) => {}
        WorkerOutcome::Clicked(ClickOutcome::Focused(window)) => {
            println!("Focused {}", window.url)
        }
        WorkerOutcome::Clicked(ClickOutcome::Opened(url)) => println!("Opened {}", url),
    }

    Ok(())
}

async fn run_saved(
    config: &Config,
    sessions: &SessionStore,
    api: &StoryClient,
    action: SavedAction,
) -> anyhow::Result<()> {
    let store = BookmarkStore::new(config.bookmark_db_path()?, config.storage.database_version);

    match action {
        SavedAction::List => {
            let mut stories = store.list_all();
            sort_newest_first(&mut stories);
            for story in &stories {
                println!("{}  {}  {}", story.created_at, story.id, story.name);
            }
            println!("{} saved stories", stories.len());
        }
        SavedAction::Check { id } => {
            if store.exists(&id) {
                println!("{} is saved", id);
            } else {
                println!("{} is not saved", id);
            }
        }
        SavedAction::Add { id } => {
            if store.exists(&id) {
                println!("{} is already saved", id);
                return Ok(());
            }
            let token = sessions.token()?;
            let story = api.get_story(&token, &id).await?;
            if !store.save(&story_to_saved(&story)) {
                anyhow::bail!("Could not save {}", id);
            }
            println!("Saved {}", id);
        }
        SavedAction::Remove { id } => {
            if !store.delete(&id) {
                anyhow::bail!("Could not remove {}", id);
            }
            println!("Removed {}", id);
        }
    }

    Ok(())
}
