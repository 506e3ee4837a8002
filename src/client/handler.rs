//! Control connection handler
//!
//! Runs one session: greeting, then a strict read/dispatch/reply loop until
//! the client quits, the peer goes away, or the server closes the session.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::watch;
use tokio::time::{Instant, timeout};

use crate::client::context::SessionContext;
use crate::client::registry::SessionRegistry;
use crate::client::session::Session;
use crate::middleware::logging::{log_command, log_disconnection};
use crate::protocol::responses::{self, Reply};
use crate::protocol::{CommandStatus, handle_command, parse_command};

/// Upper bound for the best-effort goodbye on a server-initiated close
const CLOSE_NOTICE_TIMEOUT: Duration = Duration::from_secs(2);

/// How the command loop ended
enum SessionEnd {
    ClientQuit,
    PeerClosed,
    ServerClosed,
}

#[derive(Clone, Copy)]
enum LineRead {
    Closed,
    Line(usize),
    TooLong(usize),
}

/// Handles one FTP control connection until it ends, then releases the
/// transport and unregisters the session.
///
/// Works on any byte stream, so tests can drive it over `tokio::io::duplex`.
pub async fn handle_client<S>(
    stream: S,
    session: Arc<Session>,
    context: Arc<SessionContext>,
    registry: Arc<SessionRegistry>,
    shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let client_addr = session.client_addr();
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    match run_session(&mut reader, &mut writer, &session, &context, shutdown).await {
        Ok(SessionEnd::ClientQuit) => info!("Client {} requested to quit", client_addr),
        Ok(SessionEnd::PeerClosed) => info!("Connection closed by client {}", client_addr),
        Ok(SessionEnd::ServerClosed) => {
            info!("Closing control connection to {}", client_addr);
            // Bounded, so a peer that stopped reading cannot hold the task.
            let notice = Reply::new(responses::SERVICE_UNAVAILABLE, "Closing control connection");
            let _ = timeout(
                CLOSE_NOTICE_TIMEOUT,
                send_reply(&mut writer, &session, &context, &notice),
            )
            .await;
        }
        Err(e) => {
            warn!("Connection error with {}: {}", client_addr, e);
            context.stats.error();
        }
    }

    session.disconnect();
    let _ = timeout(CLOSE_NOTICE_TIMEOUT, writer.shutdown()).await;
    registry.remove(session.id()).await;
    context.stats.connection_closed();

    let commands = session.client().commands_executed();
    log_disconnection(client_addr, commands);
}

async fn run_session<R, W>(
    reader: &mut R,
    writer: &mut W,
    session: &Session,
    context: &SessionContext,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<SessionEnd>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut close = session.close_signal();
    let greeting = Reply::new(
        responses::READY,
        session.virtual_host().welcome_message.clone(),
    );
    if !deliver(writer, session, context, &[greeting], &mut shutdown, &mut close).await? {
        return Ok(SessionEnd::ServerClosed);
    }

    let mut line = Vec::with_capacity(context.max_command_length + 2);
    loop {
        let read = tokio::select! {
            biased;
            _ = stopped(&mut shutdown, &mut close) => return Ok(SessionEnd::ServerClosed),
            read = read_command_line(reader, &mut line, context.max_command_length) => read?,
        };

        let bytes = match read {
            LineRead::Closed => return Ok(SessionEnd::PeerClosed),
            LineRead::Line(bytes) | LineRead::TooLong(bytes) => bytes as u64,
        };
        session.client().record_received(bytes);
        context.stats.add_bytes_received(bytes);

        let replies = if let LineRead::TooLong(_) = read {
            vec![Reply::new(responses::SYNTAX_ERROR, "Command line too long")]
        } else {
            let text = String::from_utf8_lossy(&line);
            let Some(command) = parse_command(text.trim_end()) else {
                continue;
            };
            log_command(session.client_addr(), &command);

            if !context.rate_limiter.allow_request(session.ip()) {
                session.client().record_command(Instant::now());
                context.stats.command_executed();
                vec![Reply::new(responses::SERVICE_UNAVAILABLE, "Request rate limit exceeded")]
            } else {
                // Checked under the same lock as dispatch, so a disconnect
                // either lands before the command or after it.
                let result = {
                    let mut client = session.client();
                    if client.is_closed() {
                        return Ok(SessionEnd::ServerClosed);
                    }
                    let result = handle_command(&mut client, &command, context);
                    client.record_command(Instant::now());
                    result
                };
                context.stats.command_executed();

                if result.status == CommandStatus::CloseConnection {
                    deliver(writer, session, context, &result.replies, &mut shutdown, &mut close)
                        .await?;
                    return Ok(SessionEnd::ClientQuit);
                }
                result.replies
            }
        };

        if !deliver(writer, session, context, &replies, &mut shutdown, &mut close).await? {
            return Ok(SessionEnd::ServerClosed);
        }
    }
}

/// Resolves once the server shuts down or the session is told to close.
async fn stopped(shutdown: &mut watch::Receiver<bool>, close: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() || *close.borrow_and_update() {
            return;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            changed = close.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

/// Writes `replies` in order. A stop request arriving mid-write leaves the
/// peer `CLOSE_NOTICE_TIMEOUT` to drain what is pending; a peer that still
/// does not read gets a `TimedOut` error. Returns `false` when the replies
/// went out but the session has been told to stop.
async fn deliver<W>(
    writer: &mut W,
    session: &Session,
    context: &SessionContext,
    replies: &[Reply],
    shutdown: &mut watch::Receiver<bool>,
    close: &mut watch::Receiver<bool>,
) -> io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    let sending = async {
        for reply in replies {
            send_reply(&mut *writer, session, context, reply).await?;
        }
        Ok::<(), io::Error>(())
    };
    tokio::pin!(sending);

    tokio::select! {
        sent = &mut sending => return sent.map(|()| true),
        _ = stopped(shutdown, close) => {}
    }

    match timeout(CLOSE_NOTICE_TIMEOUT, sending).await {
        Ok(sent) => sent.map(|()| false),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "peer stopped reading replies",
        )),
    }
}

/// Reads one `\n`-terminated line into `buf`, never buffering more than the
/// length limit plus the terminator. An oversized line is drained up to its
/// newline and reported as `TooLong` with the total byte count.
async fn read_command_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_length: usize,
) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = (max_length + 2) as u64;
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(LineRead::Closed);
    }

    let terminated = buf.last() == Some(&b'\n');
    let content = if terminated {
        let without_lf = &buf[..buf.len() - 1];
        without_lf.strip_suffix(b"\r").unwrap_or(without_lf).len()
    } else {
        buf.len()
    };
    if content <= max_length {
        return Ok(LineRead::Line(read));
    }
    if terminated {
        return Ok(LineRead::TooLong(read));
    }

    let mut total = read;
    let mut scratch = Vec::new();
    loop {
        scratch.clear();
        let n = (&mut *reader).take(limit).read_until(b'\n', &mut scratch).await?;
        total += n;
        if n == 0 || scratch.last() == Some(&b'\n') {
            break;
        }
    }
    buf.clear();
    Ok(LineRead::TooLong(total))
}

/// Writes one reply, counting the bytes the transport actually accepted.
async fn send_reply<W>(
    writer: &mut W,
    session: &Session,
    context: &SessionContext,
    reply: &Reply,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let wire = reply.to_string();
    let mut pending = wire.as_bytes();
    while !pending.is_empty() {
        let written = writer.write(pending).await?;
        if written == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        session.client().record_sent(written as u64);
        context.stats.add_bytes_sent(written as u64);
        pending = &pending[written..];
    }
    writer.flush().await
}
