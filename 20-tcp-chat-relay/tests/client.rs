use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use tcp_chat_relay::{
    client,
    config::{ClientConfig, ServerConfig},
    protocol,
    server::Server,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream},
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(2);

async fn start_server() -> Result<(SocketAddr, oneshot::Sender<()>)> {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).await?;
    let addr = server.local_addr()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(server.run_until(async move {
        let _ = shutdown_rx.await;
    }));
    Ok((addr, shutdown_tx))
}

/// A client driven through in-memory stdin/stdout pipes.
struct Terminal {
    input: DuplexStream,
    output: BufReader<DuplexStream>,
    task: JoinHandle<Result<()>>,
}

impl Terminal {
    async fn launch(addr: SocketAddr, name: Option<&str>) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (input, input_rx) = tokio::io::duplex(1024);
        let (output_tx, output) = tokio::io::duplex(4096);
        let config = ClientConfig {
            port: addr.port(),
            name: name.map(str::to_string),
            ..ClientConfig::default()
        };

        let task = tokio::spawn(async move {
            client::run_with_io(stream, BufReader::new(input_rx), output_tx, &config).await
        });

        let mut terminal = Self {
            input,
            output: BufReader::new(output),
            task,
        };
        terminal.expect_prompt().await?;
        Ok(terminal)
    }

    async fn expect_prompt(&mut self) -> Result<()> {
        let mut prompt = vec![0u8; protocol::NAME_PROMPT.len()];
        timeout(READ_TIMEOUT, self.output.read_exact(&mut prompt)).await??;
        assert_eq!(String::from_utf8_lossy(&prompt), protocol::NAME_PROMPT);
        Ok(())
    }

    async fn type_line(&mut self, line: &str) -> Result<()> {
        self.input.write_all(format!("{line}\n").as_bytes()).await?;
        Ok(())
    }

    async fn next_line(&mut self) -> Result<String> {
        let mut line = String::new();
        timeout(READ_TIMEOUT, self.output.read_line(&mut line)).await??;
        Ok(line)
    }

    async fn finished(self) -> Result<()> {
        timeout(READ_TIMEOUT, self.task).await???;
        Ok(())
    }
}

#[tokio::test]
async fn typed_lines_are_sent_and_server_output_is_shown() -> Result<()> {
    let (addr, _shutdown) = start_server().await?;
    let mut alice = Terminal::launch(addr, None).await?;

    alice.type_line("alice").await?;
    assert_eq!(alice.next_line().await?, protocol::welcome("alice"));

    alice.type_line("hello").await?;
    assert_eq!(alice.next_line().await?, "alice: hello\n");

    alice.type_line("/QUIT").await?;
    alice.finished().await
}

#[tokio::test]
async fn blank_name_becomes_guest() -> Result<()> {
    let (addr, _shutdown) = start_server().await?;
    let mut guest = Terminal::launch(addr, None).await?;

    guest.type_line("   ").await?;
    assert_eq!(guest.next_line().await?, protocol::welcome("guest"));

    guest.type_line("/quit").await?;
    guest.finished().await
}

#[tokio::test]
async fn configured_name_is_shown_after_prompt() -> Result<()> {
    let (addr, _shutdown) = start_server().await?;
    let mut carol = Terminal::launch(addr, Some("carol")).await?;

    assert_eq!(carol.next_line().await?, "carol\n");
    assert_eq!(carol.next_line().await?, protocol::welcome("carol"));

    carol.type_line("/quit").await?;
    carol.finished().await
}

#[tokio::test]
async fn end_of_input_leaves_the_chat() -> Result<()> {
    let (addr, _shutdown) = start_server().await?;
    let mut bob = Terminal::launch(addr, Some("bob")).await?;
    bob.next_line().await?;
    bob.next_line().await?;

    let mut alice = Terminal::launch(addr, Some("alice")).await?;
    alice.next_line().await?;
    alice.next_line().await?;
    assert_eq!(bob.next_line().await?, protocol::joined("alice"));

    let Terminal { input, task, .. } = alice;
    drop(input);
    timeout(READ_TIMEOUT, task).await???;

    assert_eq!(bob.next_line().await?, protocol::left("alice"));
    bob.type_line("/quit").await?;
    bob.finished().await
}

#[tokio::test]
async fn client_stops_when_server_goes_away() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let fake_server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let (reader, mut writer) = stream.into_split();
        writer.write_all(protocol::NAME_PROMPT.as_bytes()).await?;
        let mut name = String::new();
        BufReader::new(reader).read_line(&mut name).await?;
        writer.write_all(b"bye\n").await?;
        anyhow::Ok(name)
    });

    let mut terminal = Terminal::launch(addr, None).await?;
    terminal.type_line("dave").await?;

    let name = timeout(READ_TIMEOUT, fake_server).await???;
    assert_eq!(name, "dave\n");
    assert_eq!(terminal.next_line().await?, "bye\n");
    terminal.finished().await
}

#[tokio::test]
async fn connect_failure_is_an_error() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let config = ClientConfig {
        port,
        ..ClientConfig::default()
    };
    let result = client::run(config).await;

    assert!(result.is_err());
    Ok(())
}
