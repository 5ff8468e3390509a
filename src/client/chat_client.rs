use std::io::{self, BufRead};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::chat::ChatError;
use crate::client::inbox::{ChatEvent, ChatInbox};
use crate::log::LogSink;
use crate::protocol::{EXIT_COMMAND, Msg};
use crate::transport::FramedChannel;
use crate::{sink_info, sink_warn};

/// Where chat lines come from (stdin in the CLI, a script in tests).
pub trait LineSource: Send {
    /// Next line without its terminator; `None` at end of input.
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Line source over any buffered reader.
pub struct BufLines<R> {
    reader: R,
}

impl<R: BufRead + Send> BufLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> LineSource for BufLines<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

/// Lines from the process's standard input.
///
/// Reads through the shared stdin buffer, so nothing typed ahead is lost
/// when the chat ends and the menu reads stdin again.
#[derive(Debug, Default)]
pub struct StdinLines;

impl LineSource for StdinLines {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

/// What the chat view gets to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatNotice {
    Welcome(String),
    Message { from: String, text: String },
    PeerJoined(String),
    PeerLeft(String),
}

/// Counters for one finished chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSummary {
    pub sent: usize,
    pub received: usize,
}

/// Join the room and run until the local user leaves.
///
/// The main thread only sends; a wire-reader thread and an input thread feed
/// one [`ChatInbox`]. Returns once the server confirms the leave with `Left`,
/// with `chan` back on a frame boundary for the next command.
pub fn run_chat<L, V>(
    chan: &mut FramedChannel<TcpStream>,
    input: L,
    inbox_capacity: usize,
    response_timeout: Option<Duration>,
    log: &Arc<dyn LogSink>,
    mut view: V,
) -> Result<ChatSummary, ChatError>
where
    L: LineSource + 'static,
    V: FnMut(ChatNotice),
{
    chan.send(&Msg::Chat)?;
    match chan.recv_timeout(response_timeout)? {
        Msg::Joined { text } => view(ChatNotice::Welcome(text)),
        Msg::BadRequest { reason } => return Err(ChatError::Rejected(reason)),
        other => return Err(ChatError::Rejected(format!("unexpected {}", other.name()))),
    }
    sink_info!(log, "[chat] joined the room");

    let inbox = Arc::new(ChatInbox::new(inbox_capacity));
    let wire = spawn_wire_reader(chan.try_clone()?, inbox.clone())?;
    let typing = spawn_input(input, inbox.clone())?;

    let mut summary = ChatSummary::default();
    let res = chat_loop(chan, &inbox, &mut summary, &mut view);

    if res.is_err() {
        // unblock the wire reader; the connection is unusable anyway
        chan.shutdown();
    }
    inbox.close();
    let _ = wire.join();
    if typing.is_finished() {
        let _ = typing.join();
    }

    match &res {
        Ok(()) => sink_info!(
            log,
            "[chat] left the room ({} sent, {} received)",
            summary.sent,
            summary.received
        ),
        Err(e) => sink_warn!(log, "[chat] session ended: {e}"),
    }
    res.map(|()| summary)
}

fn chat_loop<V: FnMut(ChatNotice)>(
    chan: &mut FramedChannel<TcpStream>,
    inbox: &ChatInbox,
    summary: &mut ChatSummary,
    view: &mut V,
) -> Result<(), ChatError> {
    while let Some(ev) = inbox.pop() {
        match ev {
            ChatEvent::Local(text) => {
                chan.send(&Msg::ChatMessage { text })?;
                summary.sent += 1;
            }
            ChatEvent::Leave => chan.send(&Msg::Leave)?,
            ChatEvent::Remote(msg) => {
                if let Some(notice) = notice_for(msg) {
                    summary.received += 1;
                    view(notice);
                }
            }
            ChatEvent::Left => return Ok(()),
            ChatEvent::Disconnected(e) => return Err(e.into()),
        }
    }
    Err(ChatError::NotJoined)
}

fn notice_for(msg: Msg) -> Option<ChatNotice> {
    match msg {
        Msg::ChatBroadcast { from, text } => Some(ChatNotice::Message { from, text }),
        Msg::JoinAnnouncement { peer } => Some(ChatNotice::PeerJoined(peer)),
        Msg::LeaveAnnouncement { peer } => Some(ChatNotice::PeerLeft(peer)),
        _ => None,
    }
}

fn spawn_wire_reader(
    mut wire: FramedChannel<TcpStream>,
    inbox: Arc<ChatInbox>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("chat-wire".into())
        .spawn(move || {
            loop {
                match wire.recv() {
                    Ok(Msg::Left) => {
                        inbox.push_remote(ChatEvent::Left);
                        break;
                    }
                    Ok(msg) => {
                        if !inbox.push_remote(ChatEvent::Remote(msg)) {
                            break;
                        }
                    }
                    Err(e) => {
                        inbox.push_remote(ChatEvent::Disconnected(e));
                        break;
                    }
                }
            }
        })
}

/// End of input counts as `/exit`.
fn spawn_input<L: LineSource + 'static>(
    mut input: L,
    inbox: Arc<ChatInbox>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("chat-input".into())
        .spawn(move || {
            loop {
                match input.next_line() {
                    Ok(Some(line)) if line.trim() == EXIT_COMMAND => break,
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        if !inbox.push_local(line) {
                            return;
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
            inbox.request_leave();
        })
}

/// Render a notice the way the terminal client prints it.
pub fn format_notice(notice: &ChatNotice) -> String {
    match notice {
        ChatNotice::Welcome(text) => text.clone(),
        ChatNotice::Message { from, text } => format!("[{from}] {text}"),
        ChatNotice::PeerJoined(peer) => format!("* {peer} joined the chat"),
        ChatNotice::PeerLeft(peer) => format!("* {peer} left the chat"),
    }
}
