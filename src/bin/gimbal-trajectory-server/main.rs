mod handlers;
mod static_files;


use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use axum_template::engine::Engine;

use minijinja::Environment;

use gimbal_trajectory::Config;

pub(crate) type AppEngine = Engine<Environment<'static>>;

#[derive(Clone, FromRef)]
pub(crate) struct AppState {
    engine: AppEngine,
    config: Arc<Config>,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Gimbal trajectory designer web server")]
struct Cli {
    /// Config file, default: <config dir>/gimbal-trajectory/config.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override ListenAddr
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override OutputDir
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
}

pub(crate) fn template_engine() -> Result<AppEngine, minijinja::Error> {
    let mut minijinja = Environment::new();
    minijinja.add_template("index", include_str!("wwwroot/html/index.html"))?;
    Ok(Engine::from(minijinja))
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::handle_index))
        .route("/plot", post(handlers::handle_plot))
        .route("/profile", post(handlers::handle_profile))
        .route("/discretize", post(handlers::handle_discretize))
        .route("/discretize_all", post(handlers::handle_discretize_all))
        .route("/static/:path/:file", get(static_files::handle_static))
        .with_state(state)
        // Using tower to add tracing layer
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| {
                    "gimbal_trajectory=debug,gimbal_trajectory_server=debug,tower_http=info".into()
                }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Cli::parse();

    let (mut config, config_file) = Config::load(args.config.as_deref())?;
    if let Some(out_dir) = args.out_dir {
        config.output_dir = out_dir;
    }
    let addr = match args.listen {
        Some(addr) => addr,
        None => config.listen_addr.parse::<SocketAddr>()?,
    };

    tracing::info!("Config {:?}:\n{}", config_file, config);

    let app = build_router(AppState {
        engine: template_engine()?,
        config: Arc::new(config),
    });

    tracing::info!("Listening on {}", addr);
    axum_server::bind(addr).serve(app.into_make_service()).await?;

    Ok(())
}
