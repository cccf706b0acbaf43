// ABOUTME: SCP copy protocol spoken over an exec channel.
// ABOUTME: Runs `scp -t` / `scp -f` remotely and exchanges C-records with acknowledgements.

use super::handler::SshHandler;
use crate::ssh::error::TransportError;
use russh::client::Handle;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const ACK: u8 = 0;
const WARNING: u8 = 1;
const FATAL: u8 = 2;

/// Longest protocol record accepted from the remote side.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A `C` record announcing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileHeader {
    pub mode: u32,
    pub size: u64,
    pub name: String,
}

impl FileHeader {
    /// Parse `C<mode> <size> <name>` (without the trailing newline).
    pub(crate) fn parse(line: &str) -> Result<Self, TransportError> {
        let malformed = || TransportError::Rejected(format!("malformed scp header: {:?}", line));

        let rest = line.strip_prefix('C').ok_or_else(malformed)?;
        let mut parts = rest.splitn(3, ' ');
        let mode = parts
            .next()
            .and_then(|m| u32::from_str_radix(m, 8).ok())
            .ok_or_else(malformed)?;
        let size = parts
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(malformed)?;
        let name = parts.next().filter(|n| !n.is_empty()).ok_or_else(malformed)?;

        Ok(Self {
            mode,
            size,
            name: name.to_string(),
        })
    }

    fn render(&self) -> String {
        format!("C{:04o} {} {}\n", self.mode & 0o7777, self.size, self.name)
    }
}

/// Upload `local` to `remote` with the given permissions.
pub(crate) async fn send(
    handle: &Handle<SshHandler>,
    local: &Path,
    remote: &str,
    mode: u32,
) -> Result<(), TransportError> {
    let mut file = tokio::fs::File::open(local).await?;
    let size = file.metadata().await?.len();

    let channel = handle.channel_open_session().await?;
    channel
        .exec(true, format!("scp -t {}", shell_quote(remote)))
        .await?;
    let mut stream = channel.into_stream();

    send_over(&mut stream, &mut file, size, remote_file_name(remote), mode).await?;
    tracing::debug!("scp sent {} bytes to {}", size, remote);
    Ok(())
}

/// Feed a remote `scp -t`: `size` bytes from `source` become file `name`.
async fn send_over<S, R>(
    stream: &mut S,
    source: &mut R,
    size: u64,
    name: &str,
    mode: u32,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    read_ack(stream).await?;

    let header = FileHeader {
        mode,
        size,
        name: name.to_string(),
    };
    stream.write_all(header.render().as_bytes()).await?;
    read_ack(stream).await?;

    let copied = tokio::io::copy(&mut (&mut *source).take(size), stream).await?;
    if copied != size {
        return Err(TransportError::Rejected(format!(
            "local file shrank during transfer: sent {} of {} bytes",
            copied, size
        )));
    }
    stream.write_all(&[ACK]).await?;
    stream.flush().await?;
    read_ack(stream).await?;

    stream.shutdown().await?;
    Ok(())
}

/// Download `remote` into `local`.
///
/// The local file is only created once the remote side has announced it.
pub(crate) async fn recv(
    handle: &Handle<SshHandler>,
    remote: &str,
    local: &Path,
) -> Result<(), TransportError> {
    let channel = handle.channel_open_session().await?;
    channel
        .exec(true, format!("scp -f {}", shell_quote(remote)))
        .await?;
    let mut stream = channel.into_stream();

    let header = recv_header(&mut stream).await?;
    let mut file = tokio::fs::File::create(local).await?;

    let received = async {
        recv_body(&mut stream, header.size, &mut file).await?;
        file.flush().await?;
        Ok::<(), TransportError>(())
    }
    .await;

    if let Err(e) = received {
        if let Err(rm) = tokio::fs::remove_file(local).await {
            tracing::debug!("could not remove partial {}: {}", local.display(), rm);
        }
        return Err(e);
    }

    tracing::debug!("scp received {} bytes from {}", header.size, remote);
    Ok(())
}

/// Start a download and read up to the file's `C` record, skipping timestamps.
async fn recv_header<S>(stream: &mut S) -> Result<FileHeader, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&[ACK]).await?;
    stream.flush().await?;

    let header = loop {
        let line = read_record(stream).await?;
        if line.starts_with('T') {
            // Timestamps are not preserved.
            stream.write_all(&[ACK]).await?;
            stream.flush().await?;
            continue;
        }
        break FileHeader::parse(&line)?;
    };
    stream.write_all(&[ACK]).await?;
    stream.flush().await?;
    Ok(header)
}

/// Copy `size` announced bytes into `sink` and finish the exchange.
async fn recv_body<S, W>(stream: &mut S, size: u64, sink: &mut W) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = tokio::io::copy(&mut (&mut *stream).take(size), sink).await?;
    if copied != size {
        return Err(TransportError::ChannelClosed);
    }
    read_ack(stream).await?;

    stream.write_all(&[ACK]).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Wait for the remote side's status byte.
async fn read_ack<S>(stream: &mut S) -> Result<(), TransportError>
where
    S: AsyncRead + Unpin,
{
    let status = stream.read_u8().await.map_err(eof_as_closed)?;
    match status {
        ACK => Ok(()),
        WARNING | FATAL => {
            let message = read_line(stream).await?;
            Err(TransportError::Rejected(message.trim().to_string()))
        }
        other => Err(TransportError::Rejected(format!(
            "unexpected scp status byte {}",
            other
        ))),
    }
}

/// Read one protocol record; status bytes 1 and 2 become errors.
async fn read_record<S>(stream: &mut S) -> Result<String, TransportError>
where
    S: AsyncRead + Unpin,
{
    let first = stream.read_u8().await.map_err(eof_as_closed)?;
    let rest = read_line(stream).await?;
    match first {
        WARNING | FATAL => Err(TransportError::Rejected(rest.trim().to_string())),
        byte => Ok(format!("{}{}", byte as char, rest)),
    }
}

async fn read_line<S>(stream: &mut S) -> Result<String, TransportError>
where
    S: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let byte = stream.read_u8().await.map_err(eof_as_closed)?;
        if byte == b'\n' {
            break;
        }
        if line.len() >= MAX_LINE_LENGTH {
            return Err(TransportError::Rejected(format!(
                "scp record longer than {} bytes",
                MAX_LINE_LENGTH
            )));
        }
        line.push(byte);
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

fn eof_as_closed(e: std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::ChannelClosed
    } else {
        TransportError::Io(e)
    }
}

fn remote_file_name(remote: &str) -> &str {
    let trimmed = remote.trim_end_matches('/');
    trimmed.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or("file")
}

/// Quote `value` for a POSIX shell.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
