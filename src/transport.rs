use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::protocol::{FrameError, Msg, read_msg, write_msg};

/// Server-assigned identity of one accepted connection.
pub type ClientId = u64;

/// Thin wrapper over a blocking stream that speaks in `Msg`.
///
/// No buffering on the read side: the stream may be cloned and handed to
/// another thread, which must not lose bytes that were read ahead.
#[derive(Debug)]
pub struct FramedChannel<S> {
    stream: S,
}

impl<S> FramedChannel<S>
where
    S: Read + Write,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn send(&mut self, msg: &Msg) -> Result<(), FrameError> {
        write_msg(&mut self.stream, msg)
    }

    pub fn recv(&mut self) -> Result<Msg, FrameError> {
        read_msg(&mut self.stream)
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

impl FramedChannel<TcpStream> {
    pub fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    /// Receive one message, waiting at most `timeout` (`None` = forever).
    ///
    /// The previous read timeout is restored afterwards.
    pub fn recv_timeout(&mut self, timeout: Option<Duration>) -> Result<Msg, FrameError> {
        let previous = self.stream.read_timeout()?;
        self.stream.set_read_timeout(timeout)?;
        let res = self.recv();
        self.stream.set_read_timeout(previous)?;
        res
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    pub fn read_timeout(&self) -> io::Result<Option<Duration>> {
        self.stream.read_timeout()
    }

    /// A second channel over the same socket, for a reader or writer thread.
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self::new(self.stream.try_clone()?))
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
