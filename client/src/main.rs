use clap::Parser;
use client::config::{ClientConfig, LocalAuthority, TransportKind};
use client::input::MacroquadHost;
use client::level::{Director, MenuLevel};
use client::rendering::Renderer;
use client::session::SessionConnector;
use log::{error, info};
use macroquad::prelude::{is_key_pressed, next_frame, screen_height, screen_width, Conf, KeyCode};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::Duration;

static ARGS: OnceLock<Args> = OnceLock::new();

fn args() -> &'static Args {
    ARGS.get_or_init(Args::parse)
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short = 'c', long)]
    config: Option<String>,

    /// Server address to connect to
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Local address to bind before connecting
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Transport used to reach the server
    #[arg(short = 't', long, value_enum)]
    transport: Option<TransportKind>,

    /// Player name sent during the handshake
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Player skin sent during the handshake
    #[arg(long)]
    skin: Option<String>,

    /// Snap the local player to the server when it drifts further than this
    #[arg(short = 'r', long)]
    reconcile_threshold: Option<f32>,

    /// Window width
    #[arg(short = 'w', long, default_value = "1600")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "900")]
    height: i32,
}

impl Args {
    fn resolve_config(&self) -> Result<ClientConfig, client::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };

        if let Some(server) = &self.server {
            config.server_addr = server.clone();
        }
        if let Some(bind) = &self.bind {
            config.bind_addr = Some(bind.clone());
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(name) = &self.name {
            config.player_name = name.clone();
        }
        if let Some(skin) = &self.skin {
            config.player_skin = skin.clone();
        }
        if let Some(threshold) = self.reconcile_threshold {
            config.local_authority = LocalAuthority::ServerReconciled { threshold };
        }
        Ok(config)
    }
}

fn window_conf() -> Conf {
    let args = args();
    Conf {
        window_title: "Capture Point Client".to_string(),
        window_width: args.width,
        window_height: args.height,
        window_resizable: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = match args().resolve_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start tokio runtime: {}", e);
            return;
        }
    };

    info!("Starting client...");
    info!("Controls: Up/Down to pick a skin, Enter to join");
    info!("In game: W/A/S/D to move, P to pull, O to push, Escape to quit");

    let connector = Rc::new(RefCell::new(SessionConnector::new(runtime.handle().clone())));
    let mut director = Director::new(Box::new(MenuLevel::new(config, connector)));
    let mut renderer = Renderer::new();

    loop {
        let layout = director.layout(screen_width(), screen_height());
        let host = MacroquadHost;

        director.update(&host);
        let frame = director.render(&host);
        renderer.render(&frame, &layout);

        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        next_frame().await;
    }

    drop(director);
    runtime.shutdown_timeout(Duration::from_millis(500));
    info!("Client stopped");
}
