use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Greeting sent as soon as a connection is accepted. Not newline terminated.
pub const NAME_PROMPT: &str = "Введите ник: ";
pub const QUIT_COMMAND: &str = "/quit";
pub const DEFAULT_CLIENT_NAME: &str = "guest";
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

const SERVER_TAG: &str = "[Сервер]";

pub fn welcome(name: &str) -> String {
    format!("{SERVER_TAG} Привет, {name}! Команда: {QUIT_COMMAND} чтобы выйти.\n")
}

pub fn joined(name: &str) -> String {
    format!("{SERVER_TAG} {name} вошел в чат.\n")
}

pub fn left(name: &str) -> String {
    format!("{SERVER_TAG} {name} вышел из чата.\n")
}

pub fn chat(name: &str, text: &str) -> String {
    format!("{name}: {text}\n")
}

/// Name given to a client that answered the prompt with an empty line.
pub fn default_name(port: u16) -> String {
    format!("user_{port}")
}

pub fn is_quit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(QUIT_COMMAND)
}

/// Reads one `\n` terminated line, consuming at most `limit` bytes.
///
/// A line longer than `limit` comes back in `limit` sized pieces over
/// successive calls. Invalid UTF-8 is replaced rather than rejected, so a
/// misbehaving peer can never fail a read. Returns `Ok(None)` once the peer
/// has closed its side of the stream.
pub async fn read_line<R>(reader: &mut R, limit: usize) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = (&mut *reader).take(limit as u64);
    let bytes = limited.read_until(b'\n', &mut buf).await?;
    if bytes == 0 {
        return Ok(None);
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
