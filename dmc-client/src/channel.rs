//! # Delimited Message Channel
//!
//! Purpose: Own one TCP connection and expose blocking
//! `read_message` / `write_message` calls framed by a caller-chosen
//! delimiter.
//!
//! ## Design Principles
//! 1. **Explicit Lifecycle**: `Unopened -> Open -> Closed`; misuse returns a
//!    typed error instead of touching a missing socket.
//! 2. **Exclusive Ownership**: All I/O takes `&mut self`; one channel per
//!    concurrent flow.
//! 3. **Fail Fast**: Transport errors surface immediately, nothing is retried.
//! 4. **Buffer Reuse**: The frame accumulator and the encode buffer live on the
//!    channel.

use std::io::{self, BufReader, BufWriter, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use dmc_common::{ChannelError, ChannelResult, FrameReader, RemainderPolicy, TextEncoding};
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::events::ChannelEvents;

/// Observable lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Created, never connected (or the last `open` failed).
    Unopened,
    /// Connected; reads and writes are allowed.
    Open,
    /// Released by `close`; cannot be reopened.
    Closed,
}

enum Slot {
    Unopened,
    Open(Connection),
    Closed,
}

/// Socket plus its buffered input and output sides.
struct Connection {
    socket: TcpStream,
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
}

impl Connection {
    fn connect(config: &ChannelConfig) -> ChannelResult<Self> {
        let addr = config.addr();
        let candidates: Vec<SocketAddr> = (config.resolve_host(), config.port)
            .to_socket_addrs()
            .map_err(|source| ChannelError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .collect();
        if candidates.is_empty() {
            return Err(ChannelError::Resolve {
                addr,
                source: io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
            });
        }

        let mut last_err = None;
        for candidate in candidates {
            let attempt = match config.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => {
                    return Self::from_stream(stream, config)
                        .map_err(|source| ChannelError::Connect { addr, source });
                }
                Err(err) => {
                    debug!(%candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(ChannelError::Connect {
            addr,
            source: last_err.unwrap_or_else(|| ErrorKind::NotFound.into()),
        })
    }

    fn from_stream(socket: TcpStream, config: &ChannelConfig) -> io::Result<Self> {
        socket.set_read_timeout(config.read_timeout)?;
        socket.set_write_timeout(config.write_timeout)?;
        socket.set_nodelay(config.nodelay)?;
        let peer = socket.peer_addr()?;

        Ok(Connection {
            reader: BufReader::new(socket.try_clone()?),
            writer: BufWriter::new(socket.try_clone()?),
            socket,
            peer,
        })
    }

    /// Releases the input side, the output side and the socket, in that
    /// order. Every step runs; the first failure is returned.
    fn release(self) -> ChannelResult<()> {
        let Connection {
            socket,
            reader,
            mut writer,
            ..
        } = self;
        let mut first_err = None;

        keep_first(&mut first_err, reader.get_ref().shutdown(Shutdown::Read));
        drop(reader);

        keep_first(&mut first_err, writer.flush());
        keep_first(&mut first_err, writer.get_ref().shutdown(Shutdown::Write));
        drop(writer);

        drop(socket);

        match first_err {
            Some(err) => Err(ChannelError::Io(err)),
            None => Ok(()),
        }
    }
}

fn keep_first(first: &mut Option<io::Error>, result: io::Result<()>) {
    let err = match result {
        Ok(()) => return,
        Err(err) => err,
    };
    // The peer already tore the connection down; nothing left to release.
    if err.kind() == ErrorKind::NotConnected {
        debug!(error = %err, "socket already disconnected during close");
        return;
    }
    if first.is_none() {
        *first = Some(err);
    } else {
        warn!(error = %err, "additional error while closing channel");
    }
}

fn open_connection(slot: &mut Slot) -> ChannelResult<&mut Connection> {
    match slot {
        Slot::Open(conn) => Ok(conn),
        Slot::Unopened => Err(ChannelError::NotOpen),
        Slot::Closed => Err(ChannelError::AlreadyClosed),
    }
}

/// A TCP connection speaking a delimiter-framed text protocol.
///
/// ```no_run
/// use dmc_client::Channel;
///
/// let mut channel = Channel::connect("127.0.0.1", 9000)?;
/// channel.write_message("ping<<END>>", None)?;
/// let reply = channel.read_message(1024, "<<END>>")?;
/// println!("{reply}");
/// channel.close()?;
/// # Ok::<(), dmc_client::ChannelError>(())
/// ```
pub struct Channel {
    config: ChannelConfig,
    slot: Slot,
    frames: FrameReader,
    events: ChannelEvents,
    write_buf: Vec<u8>,
}

impl Channel {
    /// Creates an unopened channel for `host:port` with default settings.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(ChannelConfig::new(host, port))
    }

    /// Creates an unopened channel from a full configuration.
    pub fn with_config(config: ChannelConfig) -> Self {
        Self::from_parts(config, ChannelEvents::default())
    }

    /// Starts a builder for channels with hooks or non-default settings.
    pub fn builder(host: impl Into<String>, port: u16) -> ChannelBuilder {
        ChannelBuilder {
            config: ChannelConfig::new(host, port),
            events: ChannelEvents::default(),
        }
    }

    /// Creates a channel and opens it.
    pub fn connect(host: impl Into<String>, port: u16) -> ChannelResult<Self> {
        let mut channel = Self::new(host, port);
        channel.open()?;
        Ok(channel)
    }

    fn from_parts(config: ChannelConfig, events: ChannelEvents) -> Self {
        let frames = FrameReader::new(config.remainder).with_max_message_size(config.max_message_size);
        Channel {
            config,
            slot: Slot::Unopened,
            frames,
            events,
            write_buf: Vec::with_capacity(256),
        }
    }

    /// Connects to the configured endpoint.
    ///
    /// On failure the channel stays `Unopened` and may be opened again.
    pub fn open(&mut self) -> ChannelResult<()> {
        match self.slot {
            Slot::Unopened => {}
            Slot::Open(_) => return Err(ChannelError::AlreadyOpen),
            Slot::Closed => return Err(ChannelError::AlreadyClosed),
        }

        let conn = match Connection::connect(&self.config) {
            Ok(conn) => conn,
            Err(err) => {
                warn!(addr = %self.config.addr(), error = %err, "failed to open channel");
                return Err(err);
            }
        };
        let peer = conn.peer;
        self.slot = Slot::Open(conn);
        info!(addr = %self.config.addr(), %peer, "channel opened");

        self.events.connected(peer);
        Ok(())
    }

    /// Closes the input stream, output stream and socket.
    ///
    /// The channel is `Closed` afterwards even when an error is returned.
    /// Closing twice fails with `AlreadyClosed`.
    pub fn close(&mut self) -> ChannelResult<()> {
        let conn = match std::mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Open(conn) => conn,
            Slot::Closed => return Err(ChannelError::AlreadyClosed),
            Slot::Unopened => {
                self.slot = Slot::Unopened;
                return Err(ChannelError::NotOpen);
            }
        };

        let peer = conn.peer;
        let dropped = self.frames.buffered();
        self.frames.clear();
        let result = conn.release();
        match &result {
            Ok(()) => info!(%peer, dropped, "channel closed"),
            Err(err) => warn!(%peer, error = %err, "channel closed with errors"),
        }
        result
    }

    /// True while the channel is open and the socket still has a peer.
    pub fn is_connected(&self) -> bool {
        match &self.slot {
            Slot::Open(conn) => conn.socket.peer_addr().is_ok(),
            _ => false,
        }
    }

    /// Blocks until a message terminated by `delimiter` has arrived and
    /// returns it without the delimiter.
    ///
    /// Input is read in chunks of at most `buffer_size` bytes. The delimiter
    /// is encoded with the channel encoding and matched on raw bytes; the
    /// payload is decoded afterwards.
    ///
    /// # Errors
    ///
    /// - `NotOpen` / `AlreadyClosed` outside the open state.
    /// - `UnencodableDelimiter` if the channel encoding cannot represent the
    ///   delimiter; nothing is read.
    /// - `Truncated` if the peer closes before the delimiter arrives.
    /// - `Io` for transport failures, including configured read timeouts.
    pub fn read_message(&mut self, buffer_size: usize, delimiter: &str) -> ChannelResult<String> {
        let encoding = self.config.encoding;
        let conn = open_connection(&mut self.slot)?;

        let delimiter = encoding
            .try_encode(delimiter)
            .ok_or_else(|| ChannelError::UnencodableDelimiter {
                delimiter: delimiter.to_string(),
                encoding: encoding.name(),
            })?;
        let payload = self
            .frames
            .read_frame(&mut conn.reader, buffer_size, &delimiter, encoding.unit_width())?;
        let text = encoding.decode(&payload);
        debug!(
            peer = %conn.peer,
            bytes = payload.len(),
            buffered = self.frames.buffered(),
            "message received"
        );

        self.events.message(&text);
        Ok(text)
    }

    /// Encodes `text` and writes all of it, then flushes.
    ///
    /// `None` uses the channel encoding (US-ASCII unless configured).
    pub fn write_message(&mut self, text: &str, encoding: Option<TextEncoding>) -> ChannelResult<()> {
        let encoding = encoding.unwrap_or(self.config.encoding);
        let conn = open_connection(&mut self.slot)?;

        self.write_buf.clear();
        encoding.encode_into(text, &mut self.write_buf);
        conn.writer.write_all(&self.write_buf)?;
        conn.writer.flush()?;
        debug!(peer = %conn.peer, bytes = self.write_buf.len(), %encoding, "message sent");
        Ok(())
    }

    /// Writes pre-encoded bytes, then flushes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> ChannelResult<()> {
        let conn = open_connection(&mut self.slot)?;
        conn.writer.write_all(bytes)?;
        conn.writer.flush()?;
        debug!(peer = %conn.peer, bytes = bytes.len(), "bytes sent");
        Ok(())
    }

    pub fn state(&self) -> ChannelState {
        match self.slot {
            Slot::Unopened => ChannelState::Unopened,
            Slot::Open(_) => ChannelState::Open,
            Slot::Closed => ChannelState::Closed,
        }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Peer address while open.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match &self.slot {
            Slot::Open(conn) => Some(conn.peer),
            _ => None,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("addr", &self.config.addr())
            .field("state", &self.state())
            .field("peer", &self.peer_addr())
            .field("buffered", &self.frames.buffered())
            .field("events", &self.events)
            .finish()
    }
}

/// Builder for channels with hooks or non-default settings.
pub struct ChannelBuilder {
    config: ChannelConfig,
    events: ChannelEvents,
}

impl ChannelBuilder {
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn remainder_policy(mut self, policy: RemainderPolicy) -> Self {
        self.config.remainder = policy;
        self
    }

    pub fn max_message_size(mut self, limit: usize) -> Self {
        self.config.max_message_size = Some(limit);
        self
    }

    pub fn connect_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.write_timeout = Some(timeout);
        self
    }

    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.config.nodelay = enabled;
        self
    }

    /// Replaces all event sinks at once.
    pub fn events(mut self, events: ChannelEvents) -> Self {
        self.events = events;
        self
    }

    /// Sink fired once after a successful `open`.
    pub fn on_connected<F>(mut self, hook: F) -> Self
    where
        F: FnMut(SocketAddr) + Send + 'static,
    {
        self.events = self.events.on_connected(hook);
        self
    }

    /// Sink fired once per completed `read_message`.
    pub fn on_message<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.events = self.events.on_message(hook);
        self
    }

    /// Builds an unopened channel.
    pub fn build(self) -> Channel {
        Channel::from_parts(self.config, self.events)
    }

    /// Builds and opens the channel.
    pub fn connect(self) -> ChannelResult<Channel> {
        let mut channel = self.build();
        channel.open()?;
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_channel_is_unopened() {
        let channel = Channel::new("127.0.0.1", 9000);
        assert_eq!(channel.state(), ChannelState::Unopened);
        assert!(!channel.is_connected());
        assert_eq!(channel.peer_addr(), None);
        assert_eq!(channel.host(), "127.0.0.1");
        assert_eq!(channel.port(), 9000);
    }

    #[test]
    fn io_before_open_is_rejected() {
        let mut channel = Channel::new("127.0.0.1", 9000);
        assert!(matches!(channel.read_message(16, "\n"), Err(ChannelError::NotOpen)));
        assert!(matches!(channel.write_message("x", None), Err(ChannelError::NotOpen)));
        assert!(matches!(channel.write_bytes(b"x"), Err(ChannelError::NotOpen)));
        assert!(matches!(channel.close(), Err(ChannelError::NotOpen)));
        assert_eq!(channel.state(), ChannelState::Unopened);
    }

    #[test]
    fn builder_carries_settings() {
        let channel = Channel::builder("localhost", 7000)
            .encoding(TextEncoding::Utf8)
            .remainder_policy(RemainderPolicy::Retain)
            .max_message_size(64)
            .nodelay(false)
            .build();
        let config = channel.config();
        assert_eq!(config.encoding, TextEncoding::Utf8);
        assert_eq!(config.remainder, RemainderPolicy::Retain);
        assert_eq!(config.max_message_size, Some(64));
        assert!(!config.nodelay);
    }
}
