// TCP client for connecting to a keeper server.
//
// Architecture:
// - `connect()` performs the TCP connect and sends `Hello` on the calling
//   thread, then spawns a background reader thread.
// - The reader thread calls `read_frame()` in a loop, decodes each frame as
//   a `NotificationKind`, and pushes it into an `mpsc` channel. A malformed
//   frame ends the session; the server never sends one.
// - `poll()` drains the inbox without blocking; `recv_timeout()` waits for
//   the next notification.
//
// The client doesn't interpret notifications. Each received item carries
// the raw frame too, so callers that keep a mirror map can feed it straight
// to `GameMap::apply_server_packet`.
//
// See also: `server.rs` for the other end of the handshake.

use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use keeper_protocol::{Hello, read_frame, write_frame};
use keeper_sim::NotificationKind;
use tracing::{debug, warn};

/// One frame received from the server: the raw bytes and their decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedNotification {
    pub bytes: Vec<u8>,
    pub kind: NotificationKind,
}

pub struct NetClient {
    stream: TcpStream,
    inbox: Receiver<ReceivedNotification>,
    _reader_thread: Option<JoinHandle<()>>,
}

impl NetClient {
    /// Connect to a server and send the `Hello` handshake.
    pub fn connect(addr: impl ToSocketAddrs, player_name: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let reader_stream = stream.try_clone()?;

        let mut writer = BufWriter::new(stream.try_clone()?);
        write_frame(&mut writer, Hello::new(player_name).encode().as_bytes())?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || {
            reader_loop(BufReader::new(reader_stream), tx);
        });

        Ok(Self {
            stream,
            inbox: rx,
            _reader_thread: Some(reader_thread),
        })
    }

    /// Drain all queued notifications (non-blocking).
    pub fn poll(&self) -> Vec<ReceivedNotification> {
        self.inbox.try_iter().collect()
    }

    /// Wait up to `timeout` for the next notification.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ReceivedNotification, RecvTimeoutError> {
        self.inbox.recv_timeout(timeout)
    }

    /// Wait until a notification matching `pred` arrives, discarding the
    /// ones before it. Gives up after `timeout`.
    pub fn recv_until(
        &self,
        timeout: Duration,
        mut pred: impl FnMut(&NotificationKind) -> bool,
    ) -> Option<ReceivedNotification> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let received = self.inbox.recv_timeout(remaining).ok()?;
            if pred(&received.kind) {
                return Some(received);
            }
        }
    }

    /// Close the connection. The reader thread exits on the resulting EOF.
    pub fn disconnect(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!(error = %e, "shutdown on an already closed stream");
        }
    }
}

/// Reader thread: read framed notifications in a loop, push to channel.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ReceivedNotification>) {
    while let Ok(bytes) = read_frame(&mut reader) {
        let kind = match NotificationKind::decode(&bytes) {
            Ok(kind) => kind,
            Err(e) => {
                warn!(error = %e, "malformed notification from server");
                break;
            }
        };
        if tx.send(ReceivedNotification { bytes, kind }).is_err() {
            break; // Owner dropped the receiver
        }
    }
}
