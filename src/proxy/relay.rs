//! Duplex relay engine
//!
//! Copies bytes between the client and upstream legs in two independent tasks.
//! The first direction to stop (clean EOF or error) records why, then both
//! directions drop their halves so both sockets close together. Data still in
//! flight on the other direction is not drained.

use log::{debug, warn};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

/// How bytes are moved from one leg to the other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyStrategy {
    /// `tokio::io::copy_buf` over a buffered reader
    #[default]
    Bulk,
    /// Hand-written read/write loop over one reusable buffer
    Explicit,
}

impl CopyStrategy {
    /// Strategy selected by the `io-copy-hack` flag
    pub fn from_hack_flag(io_copy_hack: bool) -> Self {
        if io_copy_hack {
            Self::Explicit
        } else {
            Self::Bulk
        }
    }
}

/// Tunables for one relay session
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    pub strategy: CopyStrategy,
    pub buffer_size: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            strategy: CopyStrategy::default(),
            buffer_size: 32 * 1024,
        }
    }
}

/// One of the two copy directions of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToUpstream => write!(f, "client -> upstream"),
            Self::UpstreamToClient => write!(f, "upstream -> client"),
        }
    }
}

/// Why a session ended; only the first cause is kept
#[derive(Debug, Clone)]
pub enum Termination {
    /// Source of the given direction reached end-of-stream
    Eof(Direction),
    /// A read or write failed on the given direction
    Failed {
        direction: Direction,
        error: Arc<io::Error>,
    },
    /// Both directions exited without recording a cause
    Aborted,
}

impl Termination {
    /// Whether the session ended because of an I/O failure
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Eof(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof(direction) => write!(f, "end of stream on {}", direction),
            Self::Failed { direction, error } => write!(f, "{} failed: {}", direction, error),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Outcome of a finished relay session
#[derive(Debug, Clone)]
pub struct RelayReport {
    /// Bytes written to the upstream leg
    pub client_to_upstream: u64,
    /// Bytes written back to the client leg
    pub upstream_to_client: u64,
    pub termination: Termination,
}

/// State shared by the two directions of one session
struct Session {
    outcome: OnceLock<Termination>,
    closed: CancellationToken,
}

impl Session {
    fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
            closed: CancellationToken::new(),
        }
    }

    /// Record `termination` if nothing has been recorded yet, then close both legs
    fn finish(&self, termination: Termination) {
        if self.outcome.set(termination).is_ok() {
            match self.outcome.get() {
                Some(t @ Termination::Failed { .. }) => warn!("Relay terminated: {}", t),
                Some(t) => debug!("Relay terminated: {}", t),
                None => {}
            }
        }
        self.closed.cancel();
    }

    fn termination(&self) -> Termination {
        self.outcome.get().cloned().unwrap_or(Termination::Aborted)
    }
}

/// Relay bytes between `client` and `upstream` until either side stops
///
/// Returns once both directions have exited and both streams are dropped.
pub async fn relay<A, B>(client: A, upstream: B, options: RelayOptions) -> RelayReport
where
    A: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    B: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let session = Arc::new(Session::new());

    let (client_reader, client_writer) = tokio::io::split(client);
    let (upstream_reader, upstream_writer) = tokio::io::split(upstream);

    let outbound = tokio::spawn(run_direction(
        Direction::ClientToUpstream,
        client_reader,
        upstream_writer,
        options,
        Arc::clone(&session),
    ));
    let inbound = tokio::spawn(run_direction(
        Direction::UpstreamToClient,
        upstream_reader,
        client_writer,
        options,
        Arc::clone(&session),
    ));

    let (outbound, inbound) = tokio::join!(outbound, inbound);

    RelayReport {
        client_to_upstream: joined_count(Direction::ClientToUpstream, outbound),
        upstream_to_client: joined_count(Direction::UpstreamToClient, inbound),
        termination: session.termination(),
    }
}

fn joined_count(direction: Direction, joined: Result<u64, tokio::task::JoinError>) -> u64 {
    joined.unwrap_or_else(|e| {
        warn!("Relay task for {} did not complete: {}", direction, e);
        0
    })
}

async fn run_direction<R, W>(
    direction: Direction,
    mut reader: R,
    writer: W,
    options: RelayOptions,
    session: Arc<Session>,
) -> u64
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    // Stops the peer direction however this one exits, panics included
    let _close_on_exit = session.closed.clone().drop_guard();
    let mut writer = CountingWriter::new(writer);

    let copied = tokio::select! {
        result = copy(options, &mut reader, &mut writer) => Some(result),
        _ = session.closed.cancelled() => None,
    };

    match copied {
        Some(Ok(())) => session.finish(Termination::Eof(direction)),
        Some(Err(error)) => session.finish(Termination::Failed {
            direction,
            error: Arc::new(error),
        }),
        // The other direction finished first
        None => {}
    }

    writer.written()
}

async fn copy<R, W>(options: RelayOptions, reader: &mut R, writer: &mut W) -> io::Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    match options.strategy {
        CopyStrategy::Bulk => {
            let mut reader = BufReader::with_capacity(options.buffer_size, reader);
            tokio::io::copy_buf(&mut reader, writer).await?;
        }
        CopyStrategy::Explicit => {
            let mut buffer = vec![0u8; options.buffer_size];
            loop {
                let n = reader.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                writer.write_all(&buffer[..n]).await?;
                writer.flush().await?;
            }
        }
    }
    Ok(())
}

/// Write adapter that counts the bytes accepted by the inner writer
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    fn written(&self) -> u64 {
        self.written
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            self.written += n as u64;
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
