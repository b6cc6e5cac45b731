//! Newline-delimited text transport over any async byte stream.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// One side of a line-oriented conversation.
///
/// Reads block until a whole line is available; a closed stream is reported
/// as `UnexpectedEof` so callers can treat it like any other I/O failure.
#[derive(Debug)]
pub struct Connection<S> {
    stream: BufReader<S>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    pub async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        let writer = self.stream.get_mut();
        writer.write_all(format!("{line}\n").as_bytes()).await?;
        writer.flush().await
    }

    pub async fn send_lines<I, T>(&mut self, lines: I) -> std::io::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut payload = String::new();
        for line in lines {
            payload.push_str(line.as_ref());
            payload.push('\n');
        }

        let writer = self.stream.get_mut();
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await
    }

    /// Receives one line without its terminator (`\n` or `\r\n`).
    pub async fn recv_line(&mut self) -> std::io::Result<String> {
        let mut line = String::new();
        if self.stream.read_line(&mut line).await? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ));
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }
}
