use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use super::{Link, Protocol, ProtocolError, Reply};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Raw(Vec<u8>),
    Read { number: u16, pump_on: bool },
    Write { number: u16, value: u32, pump_on: bool },
    Status { pump_on: bool },
}

/// Link that records every written byte and answers reads with a single
/// acknowledge byte, or times out when told to.
#[derive(Clone, Default)]
pub struct RecordingLink {
    pub written: Arc<Mutex<Vec<u8>>>,
    pub timeout: Arc<Mutex<bool>>,
}

impl RecordingLink {
    pub fn set_timeout(&self, timeout: bool) {
        *self.timeout.lock().unwrap() = timeout;
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }
}

impl Read for RecordingLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if *self.timeout.lock().unwrap() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        buf[0] = 0x06;
        Ok(1)
    }
}

impl Write for RecordingLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Protocol double. Each exchange writes `[`, yields, writes `]` and then
/// waits for one reply byte, so interleaved exchanges show up in the link.
#[derive(Clone, Default)]
pub struct ScriptedProtocol {
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub replies: Arc<Mutex<VecDeque<Result<Reply, ProtocolError>>>>,
    pub fallback: Reply,
}

impl ScriptedProtocol {
    pub fn with_fallback(fallback: Reply) -> Self {
        Self {
            fallback,
            ..Default::default()
        }
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn push_err(&self, err: ProtocolError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn exchange(&mut self, link: &mut dyn Link, call: Call) -> Result<Reply, ProtocolError> {
        self.calls.lock().unwrap().push(call);
        link.write_all(b"[")?;
        thread::yield_now();
        link.write_all(b"]")?;
        let mut ack = [0u8; 1];
        link.read_exact(&mut ack)?;
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Ok(self.fallback.clone()),
        }
    }
}

impl Protocol for ScriptedProtocol {
    fn send_raw(&mut self, link: &mut dyn Link, telegram: &[u8]) -> Result<Reply, ProtocolError> {
        self.exchange(link, Call::Raw(telegram.to_vec()))
    }

    fn read_parameter(
        &mut self,
        link: &mut dyn Link,
        number: u16,
        _index: u8,
        pump_on: bool,
    ) -> Result<Reply, ProtocolError> {
        self.exchange(link, Call::Read { number, pump_on })
    }

    fn write_parameter(
        &mut self,
        link: &mut dyn Link,
        number: u16,
        value: u32,
        _index: u8,
        pump_on: bool,
    ) -> Result<Reply, ProtocolError> {
        self.exchange(
            link,
            Call::Write {
                number,
                value,
                pump_on,
            },
        )
    }

    fn status(&mut self, link: &mut dyn Link, pump_on: bool) -> Result<Reply, ProtocolError> {
        self.exchange(link, Call::Status { pump_on })
    }
}
