use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    config::{ClientConfig, ServerConfig},
    error::ConfigError,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat relay server.
    Server(ServerArgs),
    /// Connect to a relay server and chat from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// JSON file with server settings. Flags below take precedence over it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to bind to [default: 0.0.0.0].
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port to listen on. Use 0 for an ephemeral port [default: 12347].
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum number of bytes taken by one line read [default: 1024].
    #[arg(long)]
    pub read_buffer_size: Option<usize>,

    /// Listen backlog [default: 10].
    #[arg(long)]
    pub backlog: Option<u32>,

    /// Milliseconds a send may block before the peer is dropped [default: 5000].
    #[arg(long)]
    pub write_timeout_ms: Option<u64>,
}

impl ServerArgs {
    pub fn resolve(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(size) = self.read_buffer_size {
            config.read_buffer_size = size;
        }
        if let Some(backlog) = self.backlog {
            config.backlog = backlog;
        }
        if let Some(timeout) = self.write_timeout_ms {
            config.write_timeout_ms = timeout;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ClientArgs {
    /// JSON file with client settings. Flags below take precedence over it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Server address to connect to [default: 127.0.0.1].
    #[arg(long)]
    pub host: Option<String>,

    /// Server port [default: 12347].
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum number of bytes taken by one socket read [default: 1024].
    #[arg(long)]
    pub read_buffer_size: Option<usize>,

    /// Name to join with. When omitted the name is read from stdin.
    #[arg(long)]
    pub name: Option<String>,
}

impl ClientArgs {
    pub fn resolve(&self) -> Result<ClientConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(size) = self.read_buffer_size {
            config.read_buffer_size = size;
        }
        if let Some(name) = &self.name {
            config.name = Some(name.clone());
        }

        config.validate()?;
        Ok(config)
    }
}
