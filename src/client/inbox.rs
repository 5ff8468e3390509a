use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::protocol::{FrameError, Msg};

/// Everything the chat loop on the main thread reacts to.
#[derive(Debug)]
pub enum ChatEvent {
    /// A line typed by the local user.
    Local(String),
    /// The local user asked to leave.
    Leave,
    /// A frame received from the server.
    Remote(Msg),
    /// The server confirmed our leave; nothing more will arrive.
    Left,
    /// The wire reader hit a transport error.
    Disconnected(FrameError),
}

#[derive(Debug, Default)]
struct InboxState {
    queue: VecDeque<ChatEvent>,
    leaving: bool,
    closed: bool,
}

/// Bounded queue shared by the input thread, the wire reader and the chat
/// loop.
///
/// Accepting a local line and recording the leave request happen under the
/// same lock, so no line typed after `/exit` is ever sent.
#[derive(Debug)]
pub struct ChatInbox {
    state: Mutex<InboxState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl ChatInbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(InboxState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_for_room<'a>(
        &self,
        mut st: MutexGuard<'a, InboxState>,
        stop: impl Fn(&InboxState) -> bool,
    ) -> MutexGuard<'a, InboxState> {
        while st.queue.len() >= self.capacity && !stop(&*st) {
            st = self
                .not_full
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
        st
    }

    fn push(&self, mut st: MutexGuard<'_, InboxState>, ev: ChatEvent) {
        st.queue.push_back(ev);
        drop(st);
        self.not_empty.notify_one();
    }

    /// Queue a typed line. False once leaving or closed; the line is dropped.
    pub fn push_local(&self, line: String) -> bool {
        let st = self.lock();
        let st = self.wait_for_room(st, |s| s.leaving || s.closed);
        if st.leaving || st.closed {
            return false;
        }
        self.push(st, ChatEvent::Local(line));
        true
    }

    /// Record the leave request. Only the first call queues `Leave`.
    ///
    /// `Leave` may exceed the capacity by one so the request is never lost.
    pub fn request_leave(&self) -> bool {
        let mut st = self.lock();
        if st.leaving || st.closed {
            return false;
        }
        st.leaving = true;
        self.push(st, ChatEvent::Leave);
        // wake any producer blocked on a full queue so it can see `leaving`
        self.not_full.notify_all();
        true
    }

    /// Queue a wire event. False once closed.
    pub fn push_remote(&self, ev: ChatEvent) -> bool {
        let st = self.lock();
        let st = self.wait_for_room(st, |s| s.closed);
        if st.closed {
            return false;
        }
        self.push(st, ev);
        true
    }

    /// Block until an event is available. `None` once closed and drained.
    pub fn pop(&self) -> Option<ChatEvent> {
        let mut st = self.lock();
        loop {
            if let Some(ev) = st.queue.pop_front() {
                drop(st);
                self.not_full.notify_one();
                return Some(ev);
            }
            if st.closed {
                return None;
            }
            st = self
                .not_empty
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stop accepting events and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_leaving(&self) -> bool {
        self.lock().leaving
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
