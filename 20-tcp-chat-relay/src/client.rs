use anyhow::{Context, Result};
use tokio::{
    io::{
        self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    },
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{config::ClientConfig, protocol};

/// Connects to the server and chats through the terminal until `/quit`,
/// end of input or the server going away.
pub async fn run(config: ClientConfig) -> Result<()> {
    let address = config.address();
    let stream = TcpStream::connect(&address)
        .await
        .with_context(|| format!("failed to connect to {address}"))?;
    debug!("connected to {address}");

    let stdin = BufReader::new(tokio::io::stdin());
    run_with_io(stream, stdin, tokio::io::stdout(), &config).await
}

/// Client logic over an arbitrary input and output, used by `run` with the
/// terminal and by tests with in-memory pipes.
///
/// Everything the server sends is copied to `output` verbatim by a
/// background task while this task forwards `input` line by line.
pub async fn run_with_io<I, O>(
    stream: TcpStream,
    mut input: I,
    mut output: O,
    config: &ClientConfig,
) -> Result<()>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Send + Unpin + 'static,
{
    let (mut reader, mut writer) = stream.into_split();
    let mut buffer = vec![0u8; config.read_buffer_size];

    let bytes = reader
        .read(&mut buffer)
        .await
        .context("failed to read name prompt")?;
    if bytes == 0 {
        anyhow::bail!("server closed the connection before prompting for a name");
    }
    write_output(&mut output, &buffer[..bytes]).await?;

    let name = choose_name(config.name.as_deref(), &mut input, &mut output).await?;
    writer
        .write_all(format!("{name}\n").as_bytes())
        .await
        .context("failed to send name")?;

    let mut receiver = tokio::spawn(receive_loop(reader, output, buffer));
    let result = send_loop(&mut input, &mut writer, &mut receiver).await;

    shutdown_connection(&mut writer).await;
    receiver.abort();

    result
}

async fn choose_name<I, O>(
    configured: Option<&str>,
    input: &mut I,
    output: &mut O,
) -> Result<String>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let raw = match configured {
        Some(name) => {
            // Nobody typed the name, so show it after the prompt instead.
            write_output(output, format!("{name}\n").as_bytes()).await?;
            name.to_string()
        }
        None => {
            let mut line = String::new();
            input
                .read_line(&mut line)
                .await
                .context("failed to read name")?;
            line
        }
    };

    let name = raw.trim();
    if name.is_empty() {
        return Ok(protocol::DEFAULT_CLIENT_NAME.to_string());
    }
    Ok(name.to_string())
}

async fn send_loop<I>(
    input: &mut I,
    writer: &mut OwnedWriteHalf,
    receiver: &mut JoinHandle<()>,
) -> Result<()>
where
    I: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        select! {
            bytes_read = input.read_line(&mut line) => {
                if !handle_input_line(bytes_read, &line, writer).await? {
                    break;
                }
            }
            _ = &mut *receiver => {
                debug!("receiver stopped, leaving");
                break;
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                handle_ctrl_c(ctrl_c);
                break;
            }
        }
    }
    Ok(())
}

async fn handle_input_line(
    bytes_read: io::Result<usize>,
    line: &str,
    writer: &mut OwnedWriteHalf,
) -> Result<bool> {
    if bytes_read.context("failed to read input")? == 0 {
        return Ok(false);
    }

    let text = line.trim_end_matches(['\r', '\n']);
    writer
        .write_all(format!("{text}\n").as_bytes())
        .await
        .context("failed to send message")?;

    Ok(!protocol::is_quit(text))
}

async fn receive_loop<O>(mut reader: OwnedReadHalf, mut output: O, mut buffer: Vec<u8>)
where
    O: AsyncWrite + Unpin,
{
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("server closed the connection");
                break;
            }
            Ok(bytes) => {
                if let Err(error) = write_output(&mut output, &buffer[..bytes]).await {
                    debug!(?error, "failed to display server output");
                    break;
                }
            }
            Err(error) => {
                debug!(?error, "failed to read from server");
                break;
            }
        }
    }
}

fn handle_ctrl_c(result: io::Result<()>) {
    if let Err(error) = result {
        warn!(?error, "ctrl-c handler failed");
    }
}

async fn shutdown_connection(writer: &mut OwnedWriteHalf) {
    if let Err(error) = writer.shutdown().await {
        debug!(?error, "connection already closed");
    }
}

async fn write_output<O>(output: &mut O, bytes: &[u8]) -> io::Result<()>
where
    O: AsyncWrite + Unpin,
{
    output.write_all(bytes).await?;
    output.flush().await
}
