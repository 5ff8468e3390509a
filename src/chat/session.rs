use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use crate::chat::{ChatError, ChatParticipant, ConnectionRegistry, Outbound};
use crate::log::LogSink;
use crate::protocol::{EXIT_COMMAND, FrameError, Msg};
use crate::transport::{ClientId, FramedChannel};
use crate::{sink_debug, sink_info, sink_warn};

/// How a chat phase ended for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatExit {
    /// Explicit leave: the connection goes back to the command loop.
    Left,
    /// `Exit` or a dead stream: the connection should be closed.
    Closed,
}

/// Run the chat phase for one connection until it leaves or goes away.
///
/// Frames for this connection are written only by a dedicated writer thread
/// draining the participant's queue, so broadcasts from other sessions never
/// interleave with our own replies. The queue holds at most `queue_capacity`
/// frames; a member that lets it fill up is evicted by the registry.
pub fn serve_chat(
    chan: &mut FramedChannel<TcpStream>,
    client_id: ClientId,
    peer: SocketAddr,
    registry: &ConnectionRegistry,
    welcome: &str,
    queue_capacity: usize,
    log: &Arc<dyn LogSink>,
) -> Result<ChatExit, ChatError> {
    let writer_chan = chan.try_clone()?;
    let hang_up = chan.get_ref().try_clone()?;
    let (tx, rx) = mpsc::sync_channel::<Outbound>(queue_capacity.max(1));
    let writer = spawn_writer(writer_chan, rx, client_id, log.clone())?;

    let idle_timeout = chan.read_timeout()?;
    // members may stay quiet for as long as they like
    chan.set_read_timeout(None)?;

    let member = ChatParticipant::new(peer, tx.clone()).with_connection(hang_up);
    let others = registry.join(client_id, member, welcome);
    sink_info!(log, "[chat] {peer} joined ({others} others in the room)");

    let exit = loop {
        match chan.recv() {
            Ok(Msg::ChatMessage { text }) if text.trim() == EXIT_COMMAND => break ChatExit::Left,
            Ok(Msg::ChatMessage { text }) => {
                match registry.broadcast(client_id, &text) {
                    Ok(n) => sink_debug!(log, "[chat] {peer}: message fanned out to {n}"),
                    Err(e) => sink_warn!(log, "[chat] {peer}: {e}"),
                }
            }
            Ok(Msg::Leave) => break ChatExit::Left,
            Ok(Msg::Exit) => break ChatExit::Closed,
            Ok(other) => {
                sink_warn!(log, "[chat] {peer}: ignoring {} while in chat", other.name());
            }
            Err(FrameError::Closed) => {
                sink_info!(log, "[chat] {peer} disconnected");
                break ChatExit::Closed;
            }
            Err(e) => {
                sink_warn!(log, "[chat] {peer}: {e}");
                break ChatExit::Closed;
            }
        }
    };

    let exit = match registry.leave(client_id) {
        Some(_) => {
            sink_info!(log, "[chat] {peer} left");
            exit
        }
        None => {
            sink_warn!(log, "[chat] {peer} was evicted for not keeping up");
            ChatExit::Closed
        }
    };
    let exit = finish_writer(tx, writer, exit);

    if exit == ChatExit::Left {
        chan.set_read_timeout(idle_timeout)?;
    }
    Ok(exit)
}

fn spawn_writer(
    mut chan: FramedChannel<TcpStream>,
    rx: Receiver<Outbound>,
    client_id: ClientId,
    log: Arc<dyn LogSink>,
) -> Result<JoinHandle<()>, ChatError> {
    let handle = thread::Builder::new()
        .name(format!("chat-writer-{client_id}"))
        .spawn(move || {
            while let Ok(out) = rx.recv() {
                match out {
                    Outbound::Frame(msg) => {
                        if let Err(e) = chan.send(&msg) {
                            sink_warn!(log, "[chat] writer for client {client_id}: {e}");
                            break;
                        }
                    }
                    Outbound::Stop => break,
                }
            }
        })?;
    Ok(handle)
}

/// `Left` is the last frame of an explicit leave; it queues behind anything
/// already enqueued for this connection. If it does not fit, the connection is
/// treated as closed.
fn finish_writer(tx: SyncSender<Outbound>, writer: JoinHandle<()>, exit: ChatExit) -> ChatExit {
    let exit = match exit {
        ChatExit::Left => match tx.try_send(Outbound::Frame(Msg::Left)) {
            Ok(()) => ChatExit::Left,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => ChatExit::Closed,
        },
        ChatExit::Closed => ChatExit::Closed,
    };
    let _ = tx.try_send(Outbound::Stop);
    // with every sender gone the writer stops once the queue is drained
    drop(tx);
    let _ = writer.join();
    exit
}
