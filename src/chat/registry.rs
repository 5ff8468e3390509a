use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::chat::ChatError;
use crate::protocol::Msg;
use crate::transport::ClientId;

/// Queue depth used when none is configured.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Work item for a connection's writer thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Msg),
    Stop,
}

/// A connection admitted to the chat room.
#[derive(Debug)]
pub struct ChatParticipant {
    pub outbound: SyncSender<Outbound>,
    pub peer: SocketAddr,
    pub joined_at: SystemTime,
    /// Shut down when the participant is evicted for not keeping up.
    conn: Option<TcpStream>,
}

impl ChatParticipant {
    pub fn new(peer: SocketAddr, outbound: SyncSender<Outbound>) -> Self {
        Self {
            outbound,
            peer,
            joined_at: SystemTime::now(),
            conn: None,
        }
    }

    pub fn with_connection(mut self, conn: TcpStream) -> Self {
        self.conn = Some(conn);
        self
    }

    /// `false` when the queue is full. A writer that already exited is
    /// cleaned up by its own session.
    fn deliver(&self, msg: Msg) -> bool {
        !matches!(
            self.outbound.try_send(Outbound::Frame(msg)),
            Err(TrySendError::Full(_))
        )
    }

    fn hang_up(&self) {
        if let Some(conn) = &self.conn {
            let _ = conn.shutdown(Shutdown::Both);
        }
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    connections: HashMap<ClientId, SocketAddr>,
    participants: HashMap<ClientId, ChatParticipant>,
}

impl RegistryInner {
    /// Queue `msg` for everyone except `except`. Participants whose queue is
    /// full are removed, announced as gone and pushed onto `evicted`.
    fn announce_to_others(
        &mut self,
        except: ClientId,
        msg: &Msg,
        evicted: &mut Vec<ChatParticipant>,
    ) -> usize {
        let mut delivered = 0;
        let mut lagging = Vec::new();
        for (id, p) in &self.participants {
            if *id == except {
                continue;
            }
            if p.deliver(msg.clone()) {
                delivered += 1;
            } else {
                lagging.push(*id);
            }
        }
        for id in lagging {
            if let Some(gone) = self.participants.remove(&id) {
                let msg = Msg::LeaveAnnouncement {
                    peer: gone.peer.to_string(),
                };
                evicted.push(gone);
                self.announce_to_others(id, &msg, evicted);
            }
        }
        delivered
    }
}

/// Close the sockets of evicted participants. Called with the lock released.
fn hang_up_all(evicted: Vec<ChatParticipant>) {
    for p in evicted {
        p.hang_up();
    }
}

/// Live connections and chat participants behind one lock.
///
/// Membership changes and broadcast fan-out are serialized: every recipient
/// observes broadcasts in the same relative order, and a participant never
/// receives anything enqueued after its removal. Delivery only enqueues onto
/// in-memory queues, so the lock is never held across a socket write.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // A panicking session never leaves the maps half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_connection(&self, id: ClientId, peer: SocketAddr) {
        self.lock().connections.insert(id, peer);
    }

    /// Forget a connection, leaving the chat room first if it was a member.
    pub fn unregister_connection(&self, id: ClientId) -> Option<SocketAddr> {
        let mut evicted = Vec::new();
        let removed = {
            let mut inner = self.lock();
            if let Some(p) = inner.participants.remove(&id) {
                let msg = Msg::LeaveAnnouncement {
                    peer: p.peer.to_string(),
                };
                inner.announce_to_others(id, &msg, &mut evicted);
            }
            inner.connections.remove(&id)
        };
        hang_up_all(evicted);
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    pub fn participant_count(&self) -> usize {
        self.lock().participants.len()
    }

    pub fn is_participant(&self, id: ClientId) -> bool {
        self.lock().participants.contains_key(&id)
    }

    /// Admit `id`: it gets `Joined { welcome }` first, everybody else a
    /// `JoinAnnouncement`. Returns how many others were notified.
    pub fn join(&self, id: ClientId, participant: ChatParticipant, welcome: &str) -> usize {
        let mut evicted = Vec::new();
        let notified = {
            let mut inner = self.lock();
            let peer = participant.peer;
            participant.deliver(Msg::Joined {
                text: welcome.to_owned(),
            });
            inner.participants.insert(id, participant);
            inner.announce_to_others(
                id,
                &Msg::JoinAnnouncement {
                    peer: peer.to_string(),
                },
                &mut evicted,
            )
        };
        hang_up_all(evicted);
        notified
    }

    /// Fan `text` out to every participant except its sender.
    ///
    /// A recipient whose queue is full is evicted from the room and its
    /// connection shut down; it does not count as delivered.
    pub fn broadcast(&self, from: ClientId, text: &str) -> Result<usize, ChatError> {
        let mut evicted = Vec::new();
        let delivered = {
            let mut inner = self.lock();
            let sender = inner.participants.get(&from).ok_or(ChatError::NotJoined)?;
            let msg = Msg::ChatBroadcast {
                from: sender.peer.to_string(),
                text: text.to_owned(),
            };
            inner.announce_to_others(from, &msg, &mut evicted)
        };
        hang_up_all(evicted);
        Ok(delivered)
    }

    /// Remove `id` from the room and tell the others. The removed participant
    /// is handed back so the caller can finish its queue.
    pub fn leave(&self, id: ClientId) -> Option<ChatParticipant> {
        let mut evicted = Vec::new();
        let gone = {
            let mut inner = self.lock();
            let gone = inner.participants.remove(&id)?;
            inner.announce_to_others(
                id,
                &Msg::LeaveAnnouncement {
                    peer: gone.peer.to_string(),
                },
                &mut evicted,
            );
            gone
        };
        hang_up_all(evicted);
        Some(gone)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::sync::mpsc::{self, Receiver};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn joined(reg: &ConnectionRegistry, id: ClientId) -> Receiver<Outbound> {
        joined_with_capacity(reg, id, 4096)
    }

    fn joined_with_capacity(reg: &ConnectionRegistry, id: ClientId, cap: usize) -> Receiver<Outbound> {
        let (tx, rx) = mpsc::sync_channel(cap);
        let peer = addr(40_000 + id as u16);
        reg.register_connection(id, peer);
        reg.join(id, ChatParticipant::new(peer, tx), "welcome");
        rx
    }

    fn frames(rx: &Receiver<Outbound>) -> Vec<Msg> {
        rx.try_iter()
            .filter_map(|o| match o {
                Outbound::Frame(m) => Some(m),
                Outbound::Stop => None,
            })
            .collect()
    }

    fn texts(rx: &Receiver<Outbound>) -> Vec<String> {
        frames(rx)
            .into_iter()
            .filter_map(|m| match m {
                Msg::ChatBroadcast { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn joiner_gets_welcome_and_others_get_announcement() {
        let reg = ConnectionRegistry::new();
        let a = joined(&reg, 1);
        assert_eq!(frames(&a), vec![Msg::Joined { text: "welcome".into() }]);

        let b = joined(&reg, 2);
        assert_eq!(frames(&b), vec![Msg::Joined { text: "welcome".into() }]);
        assert_eq!(
            frames(&a),
            vec![Msg::JoinAnnouncement { peer: "127.0.0.1:40002".into() }]
        );
        assert_eq!(reg.participant_count(), 2);
    }

    #[test]
    fn broadcast_reaches_others_but_not_sender() {
        let reg = ConnectionRegistry::new();
        let a = joined(&reg, 1);
        let b = joined(&reg, 2);
        frames(&a);
        frames(&b);

        assert_eq!(reg.broadcast(1, "hi").unwrap(), 1);
        assert!(frames(&a).is_empty());
        assert_eq!(
            frames(&b),
            vec![Msg::ChatBroadcast { from: "127.0.0.1:40001".into(), text: "hi".into() }]
        );
    }

    #[test]
    fn non_member_cannot_broadcast() {
        let reg = ConnectionRegistry::new();
        assert!(matches!(reg.broadcast(9, "x"), Err(ChatError::NotJoined)));
    }

    #[test]
    fn leave_announces_and_is_idempotent() {
        let reg = ConnectionRegistry::new();
        let a = joined(&reg, 1);
        let _b = joined(&reg, 2);
        frames(&a);

        assert!(reg.leave(2).is_some());
        assert!(reg.leave(2).is_none());
        assert_eq!(
            frames(&a),
            vec![Msg::LeaveAnnouncement { peer: "127.0.0.1:40002".into() }]
        );
    }

    #[test]
    fn unregistering_a_member_also_leaves_the_room() {
        let reg = ConnectionRegistry::new();
        let a = joined(&reg, 1);
        let _b = joined(&reg, 2);
        frames(&a);

        assert_eq!(reg.unregister_connection(2), Some(addr(40_002)));
        assert!(!reg.is_participant(2));
        assert_eq!(reg.connection_count(), 1);
        assert_eq!(frames(&a).len(), 1);
    }

    #[test]
    fn all_recipients_see_the_same_relative_order() {
        let reg = Arc::new(ConnectionRegistry::new());
        let _a = joined(&reg, 1);
        let _b = joined(&reg, 2);
        let c = joined(&reg, 3);
        let d = joined(&reg, 4);

        let start = Arc::new(Barrier::new(2));
        let senders: Vec<_> = [1u64, 2]
            .into_iter()
            .map(|id| {
                let reg = reg.clone();
                let start = start.clone();
                thread::spawn(move || {
                    start.wait();
                    for i in 0..200 {
                        reg.broadcast(id, &format!("{id}-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for s in senders {
            s.join().unwrap();
        }

        let seen_by_c = texts(&c);
        let seen_by_d = texts(&d);
        assert_eq!(seen_by_c.len(), 400);
        assert_eq!(seen_by_c, seen_by_d);
    }

    #[test]
    fn nothing_is_delivered_after_leave_even_under_concurrent_broadcast() {
        let reg = Arc::new(ConnectionRegistry::new());
        let _a = joined(&reg, 1);
        let b = joined(&reg, 2);

        let broadcaster = {
            let reg = reg.clone();
            thread::spawn(move || {
                for i in 0..2_000 {
                    reg.broadcast(1, &i.to_string()).unwrap();
                }
            })
        };

        thread::sleep(std::time::Duration::from_millis(1));
        let gone = reg.leave(2).expect("b was a participant");
        // whatever made it in before removal is all b will ever get
        let before = texts(&b).len();
        broadcaster.join().unwrap();
        assert!(texts(&b).is_empty());
        assert!(before <= 2_000);
        drop(gone);
    }

    #[test]
    fn participant_with_a_full_queue_is_evicted_and_announced() {
        let reg = ConnectionRegistry::new();
        let a = joined(&reg, 1);
        // Joined occupies one of the two slots
        let _slow = joined_with_capacity(&reg, 2, 2);
        frames(&a);

        assert_eq!(reg.broadcast(1, "one").unwrap(), 1);
        assert_eq!(reg.broadcast(1, "two").unwrap(), 0);
        assert!(!reg.is_participant(2));
        assert_eq!(reg.participant_count(), 1);
        assert_eq!(
            frames(&a),
            vec![Msg::LeaveAnnouncement { peer: "127.0.0.1:40002".into() }]
        );
        // no longer a member, so later traffic is not queued for it
        assert_eq!(reg.broadcast(1, "three").unwrap(), 0);
    }

    #[test]
    fn eviction_shuts_down_the_lagging_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut far_end = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (near_end, _) = listener.accept().unwrap();

        let reg = ConnectionRegistry::new();
        let _a = joined(&reg, 1);
        let (tx, _rx) = mpsc::sync_channel(1);
        reg.join(2, ChatParticipant::new(addr(40_002), tx).with_connection(near_end), "w");

        reg.broadcast(1, "overflow").unwrap();
        assert!(!reg.is_participant(2));

        far_end
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(far_end.read(&mut buf).unwrap(), 0);
    }
}
