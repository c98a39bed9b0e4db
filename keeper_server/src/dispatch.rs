// Network-send side of the server: turns queued `ServerNotification`s into
// framed bytes on client streams.
//
// The dispatch thread is the only writer to client sockets. It owns a
// `Dispatcher`, which maps each connected player to their write half.
// Reader threads only read. The listener hands new write halves over through
// a `Connection` channel, and the dispatch loop drains that channel before
// delivering each notification. Because the listener registers a connection
// before announcing the join to the sim thread, the first notification
// addressed to a new player always finds its stream.
//
// A registered client receives broadcasts only once its `Welcome` has been
// written. Broadcasts already queued when the join was announced would
// otherwise overtake it.
//
// Each notification is encoded once, then written to every recipient in
// the order it was received. A write failure drops that client; the reader
// thread notices the closed socket and reports the departure to the sim.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use keeper_protocol::{PlayerId, write_frame};
use keeper_sim::notification::{
    NotificationKind, NotificationReceiver, Recipient, ServerNotification,
};
use tracing::{debug, trace, warn};

/// How long the dispatch loop waits for a notification before re-checking
/// the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A freshly handshaken client's write half.
pub struct Connection<W> {
    pub player: PlayerId,
    pub stream: W,
}

struct Client<W> {
    stream: W,
    welcomed: bool,
}

pub struct Dispatcher<W: Write> {
    clients: BTreeMap<PlayerId, Client<W>>,
}

impl<W: Write> Default for Dispatcher<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Dispatcher<W> {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, connection: Connection<W>) {
        debug!(player = %connection.player, "registered client stream");
        let client = Client {
            stream: connection.stream,
            welcomed: false,
        };
        if self.clients.insert(connection.player, client).is_some() {
            warn!(player = %connection.player, "replaced an existing client stream");
        }
    }

    pub fn is_connected(&self, player: PlayerId) -> bool {
        self.clients.contains_key(&player)
    }

    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Write one notification to its recipients. Returns how many streams
    /// it reached.
    pub fn deliver(&mut self, notification: &ServerNotification) -> usize {
        let targets: Vec<PlayerId> = match notification.recipient {
            Recipient::All => self
                .clients
                .iter()
                .filter(|(_, client)| client.welcomed)
                .map(|(&player, _)| player)
                .collect(),
            Recipient::Player(player) => {
                if !self.clients.contains_key(&player) {
                    trace!(%player, "recipient not connected; dropping notification");
                    return 0;
                }
                vec![player]
            }
            Recipient::Nobody => return 0,
        };
        if targets.is_empty() {
            return 0;
        }

        let packet = notification.encode();
        let is_welcome = matches!(notification.kind, NotificationKind::Welcome { .. });
        let mut delivered = 0;
        for player in targets {
            let Some(client) = self.clients.get_mut(&player) else {
                continue;
            };
            match write_frame(&mut client.stream, packet.as_bytes()) {
                Ok(()) => {
                    client.welcomed |= is_welcome;
                    delivered += 1;
                }
                Err(e) => {
                    warn!(%player, error = %e, "write failed; dropping client");
                    self.clients.remove(&player);
                }
            }
        }
        trace!(
            kind = ?notification.kind.notification_type(),
            delivered,
            "dispatched notification"
        );
        delivered
    }

    fn accept_pending(&mut self, connections: &Receiver<Connection<W>>) {
        while let Ok(connection) = connections.try_recv() {
            self.register(connection);
        }
    }
}

/// Dispatch loop. Runs until `keep_running` is cleared or the sim side of
/// the notification channel goes away.
pub fn run_dispatch<W: Write>(
    notifications: NotificationReceiver,
    connections: Receiver<Connection<W>>,
    keep_running: Arc<AtomicBool>,
) {
    let mut dispatcher = Dispatcher::new();
    while keep_running.load(Ordering::SeqCst) {
        match notifications.recv_timeout(POLL_INTERVAL) {
            Ok(notification) => {
                dispatcher.accept_pending(&connections);
                dispatcher.deliver(&notification);
            }
            Err(RecvTimeoutError::Timeout) => dispatcher.accept_pending(&connections),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(clients = dispatcher.num_clients(), "dispatch loop stopped");
}
