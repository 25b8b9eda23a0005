use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tcp_chat_relay::{
    cli::{Cli, Command},
    client,
    server::Server,
};

fn env_filter() -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init();
}

/// The client's stdout is the chat itself, so its logs go to stderr.
fn init_client_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => {
            init_tracing();
            let config = args.resolve()?;
            let server = Server::bind(&config)
                .await
                .context("failed to start chat server")?;
            let addr = server.local_addr()?;
            info!("server listening on {}", addr);
            server.run_until_ctrl_c().await;
        }
        Command::Client(args) => {
            init_client_tracing();
            let config = args.resolve()?;
            client::run(config).await?;
        }
    }

    Ok(())
}
