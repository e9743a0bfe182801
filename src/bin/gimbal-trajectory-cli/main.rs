mod cli;

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use futures::FutureExt;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::Mutex,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gimbal_trajectory::{
    client::TrajectoryClient,
    controller::{Action, Debouncer, Workspace},
    Config,
};

use cli::{parse_cli_command, process_cli_command, refresh_preview, CliError, Context, Session};

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive trajectory editor")]
struct Args {
    /// Server URL, default: ServerUrl from config
    #[arg(short, long)]
    server: Option<String>,

    /// Where plot.png and profile.png are written
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gimbal_trajectory=info,gimbal_trajectory_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();

    let (config, _) = Config::load(args.config.as_deref())?;
    let server = args.server.unwrap_or_else(|| config.server_url.clone());
    tokio::fs::create_dir_all(&args.out_dir).await?;

    let client = TrajectoryClient::new(server)?;
    tracing::info!("Using server {}", client.base_url());

    let session = Arc::new(Mutex::new(Session {
        workspace: Workspace::new(),
        resolution: config.default_resolution(),
    }));

    let action: Action = {
        let session = session.clone();
        let client = client.clone();
        let out_dir = args.out_dir.clone();
        Arc::new(move || refresh_preview(session.clone(), client.clone(), out_dir.clone()).boxed())
    };

    let mut ctx = Context {
        session,
        client,
        preview: Debouncer::new(Duration::from_millis(config.debounce_ms), action),
    };

    println!("Type 'help' to see the list of commands!");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        match parse_cli_command(line) {
            Ok(cmd) => process_cli_command(&mut ctx, cmd).await,
            Err(CliError::Parse(e)) => println!("{}", e),
            Err(CliError::Exit) => break,
        }
    }

    println!("Exiting...");
    Ok(())
}
