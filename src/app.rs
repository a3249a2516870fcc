use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::api;
use crate::auth;
use crate::cli::{Cli, Commands, UploadArgs};
use crate::config::{self, Config};
use crate::data::{self, ProfileService};
use crate::error::FeedError;
use crate::feed::{FeedContext, ReelFeed};
use crate::player::{Player, PlayerOptions};
use crate::session;
use crate::storage;
use crate::ui;
use crate::upload::{self, ImageKitHost, UploadRequest};

const PASSWORD_ENV: &str = "REELS_PASSWORD";

pub fn run(cli: Cli) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: cli.config.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    init_logging(&cfg.log, cli.command.is_none())?;

    let Some(command) = cli.command else {
        return run_tui(&cfg, cli.offline);
    };
    match command {
        Commands::Server { url } => {
            let path = config::save_base_url(cli.config, &url)?;
            println!("Saved server {} to {}", url.trim(), friendly_path(Some(&path)));
            Ok(())
        }
        Commands::Login { email } => {
            let manager = session_manager(build_client(&cfg)?)?;
            let password = read_password()?;
            let session = manager.sign_in(&email, &password)?;
            println!("Signed in as {}.", session.email);
            Ok(())
        }
        Commands::Logout => {
            let manager = session_manager(build_client(&cfg)?)?;
            if manager.sign_out()? {
                println!("Signed out.");
            } else {
                println!("No stored session.");
            }
            Ok(())
        }
        Commands::Register { email } => {
            let flow = auth::Flow::new(build_client(&cfg)?);
            let password = read_password()?;
            let registration = flow.register(&email, &password)?;
            println!("{}", registration.message);
            if registration.requires_verification {
                println!("Check your inbox, then run `reels-tui verify <TOKEN>`.");
            }
            Ok(())
        }
        Commands::Verify { token } => {
            let flow = auth::Flow::new(build_client(&cfg)?);
            println!("{}", flow.verify_email(&token)?);
            Ok(())
        }
        Commands::Upload(args) => run_upload(&cfg, args),
        Commands::Profile { user } => {
            let service = data::ApiProfileService::new(build_client(&cfg)?);
            let profile = service.load_profile(&user)?;
            println!("{}", profile.user.display_name());
            if let Some(bio) = profile.bio.as_deref().filter(|bio| !bio.trim().is_empty()) {
                println!("{}", bio.trim());
            }
            println!(
                "{} videos · {} followers · {} following",
                profile.stats.videos, profile.stats.followers, profile.stats.following
            );
            for video in &profile.videos {
                println!(
                    "  {}  {}  ({} likes)",
                    video.duration_label(),
                    video.title,
                    video.likes
                );
            }
            Ok(())
        }
    }
}

fn run_tui(cfg: &Config, offline: bool) -> Result<()> {
    let (ctx, profiles, status_message) = if offline {
        let backend = Arc::new(data::MockBackend::default());
        let ctx = FeedContext {
            feed: backend.clone(),
            engagement: backend.clone(),
            comments: backend.clone(),
            session: Some(data::offline_session()),
            page_size: cfg.feed.page_size,
        };
        let profiles: Arc<dyn ProfileService> = backend;
        (
            ctx,
            profiles,
            "Offline sample feed. j/k to scroll, space to play, q to quit.".to_string(),
        )
    } else {
        let client = build_client(cfg)?;
        let session = match session_manager(Arc::clone(&client)) {
            Ok(manager) => manager.load_existing().unwrap_or_else(|err| {
                warn!(error = %format!("{err:#}"), "could not restore session");
                None
            }),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "session storage unavailable");
                None
            }
        };
        let status = match &session {
            Some(session) => format!(
                "Signed in as {}. j/k to scroll, space to play, q to quit.",
                session.email
            ),
            None => format!(
                "Browsing {} as a guest. Likes and comments need `reels-tui login`.",
                client.base_url()
            ),
        };
        let ctx = FeedContext {
            feed: Arc::new(data::ApiFeedService::new(Arc::clone(&client))),
            engagement: Arc::new(data::ApiEngagementService::new(Arc::clone(&client))),
            comments: Arc::new(data::ApiCommentService::new(Arc::clone(&client))),
            session,
            page_size: cfg.feed.page_size,
        };
        let profiles: Arc<dyn ProfileService> = Arc::new(data::ApiProfileService::new(client));
        (ctx, profiles, status)
    };

    info!(offline, page_size = cfg.feed.page_size, "starting feed");
    let feed = ReelFeed::new(ctx, Vec::new());
    let player = Player::new(
        PlayerOptions {
            mpv_path: cfg.player.mpv_path.clone(),
            extra_args: cfg.player.extra_args.clone(),
            fullscreen: cfg.player.fullscreen,
            user_agent: cfg.server.user_agent.clone(),
        },
        feed.event_sender(),
    );

    let mut model = ui::Model::new(ui::Options {
        feed,
        player: Some(player),
        profiles,
        status_message,
    });
    model.run()
}

fn run_upload(cfg: &Config, args: UploadArgs) -> Result<()> {
    let client = build_client(cfg)?;
    let manager = session_manager(Arc::clone(&client))?;
    let session = manager
        .load_existing()?
        .ok_or(FeedError::Unauthorized)
        .context("upload: sign in with `reels-tui login <email>` first")?;
    let host = ImageKitHost::new(cfg.media.upload_url.clone(), cfg.media.upload_timeout)?;
    let request = UploadRequest {
        video: args.video,
        thumbnail: args.thumbnail,
        title: args.title,
        description: args.description,
        duration: args.duration,
    };
    let record = upload::publish(&client, &host, &session, &cfg.media.auth_path, &request)?;
    println!("Published \"{}\" ({})", record.title, record.id);
    Ok(())
}

fn build_client(cfg: &Config) -> Result<Arc<api::Client>> {
    let user_agent = if cfg.server.user_agent.trim().is_empty() {
        format!("reels-tui/{}", crate::VERSION)
    } else {
        cfg.server.user_agent.clone()
    };
    let client = api::Client::new(api::ClientConfig {
        base_url: cfg.server.base_url.clone(),
        user_agent,
        timeout: Some(cfg.server.timeout),
        http_client: None,
    })
    .context("build api client")?;
    Ok(Arc::new(client))
}

fn session_manager(client: Arc<api::Client>) -> Result<Arc<session::Manager>> {
    let store =
        Arc::new(storage::Store::open(storage::Options::default()).context("open storage")?);
    let flow = Arc::new(auth::Flow::new(client));
    Ok(Arc::new(session::Manager::new(store, flow)))
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    eprint!("Password: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// File logging when configured; stderr only for one-shot commands so the TUI stays clean.
fn init_logging(cfg: &config::LogConfig, interactive: bool) -> Result<()> {
    if interactive && cfg.file.is_none() {
        return Ok(());
    }
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &cfg.file {
        Some(path) => Some(
            fmt::layer()
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_ansi(false)
                .with_target(false),
        ),
        None => None,
    };
    let stderr_layer = cfg
        .file
        .is_none()
        .then(|| fmt::layer().with_writer(io::stderr).with_target(false));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("log: create directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("log: open {}", path.display()))
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/reels-tui/config.yaml".to_string()
    }
}
