//! A blocking character pipe between one producer and one consumer thread.
//!
//! The two ends share an unbounded [`RingChars`] guarded by a single
//! monitor. Reads block while the buffer is empty and the pipe is open;
//! writes never block. Closing either end wakes any blocked reader, which
//! then drains what remains and observes end-of-stream.
//!
//! One producer and one consumer are assumed; several of either need
//! external serialization.

use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex};

use crate::ring::{CharSource, RingChars};

struct State {
    buffer: RingChars,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    available: Condvar,
}

/// Creates a connected reader/writer pair.
pub fn pipe() -> (PipeReader, PipeWriter) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            buffer: RingChars::new(),
            closed: false,
        }),
        available: Condvar::new(),
    });
    (
        PipeReader {
            shared: Arc::clone(&shared),
        },
        PipeWriter { shared },
    )
}

/// The consuming end of a [`pipe`].
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl PipeReader {
    /// Fills `out` with available characters, blocking while the pipe is
    /// open but empty. Returns `None` once the writer has closed and the
    /// buffer has drained.
    pub fn read(&mut self, out: &mut [char]) -> Option<usize> {
        if out.is_empty() {
            return Some(0);
        }
        let mut state = self.shared.state.lock().unwrap();
        loop {
            let available = state.buffer.len();
            if available > 0 {
                let n = available.min(out.len());
                state.buffer.copy_to(0, out, 0, n).unwrap();
                state.buffer.delete(0, n, false).unwrap();
                return Some(n);
            }
            if state.closed {
                return None;
            }
            state = self.shared.available.wait(state).unwrap();
        }
    }

    /// Reads a single character; `None` at end of stream.
    pub fn read_char(&mut self) -> Option<char> {
        let mut one = ['\0'];
        match self.read(&mut one) {
            Some(_) => Some(one[0]),
            None => None,
        }
    }

    /// Characters currently buffered, without blocking.
    pub fn available(&self) -> usize {
        self.shared.state.lock().unwrap().buffer.len()
    }

    pub fn close(&mut self) {
        let mut state = self.shared.state.lock().unwrap();
        state.closed = true;
        self.shared.available.notify_all();
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.close();
    }
}

impl CharSource for PipeReader {
    fn read_chars(&mut self, out: &mut [char]) -> io::Result<usize> {
        Ok(self.read(out).unwrap_or(0))
    }
}

/// The producing end of a [`pipe`].
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Appends characters; never blocks. Writes after either end has
    /// closed are discarded.
    pub fn write(&mut self, chars: &[char]) {
        let mut state = self.shared.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.buffer.append(chars);
        self.shared.available.notify_all();
    }

    pub fn write_str(&mut self, s: &str) {
        let mut state = self.shared.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.buffer.append_str(s);
        self.shared.available.notify_all();
    }

    pub fn close(&mut self) {
        let mut state = self.shared.state.lock().unwrap();
        state.closed = true;
        self.shared.available.notify_all();
    }
}

impl fmt::Write for PipeWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        PipeWriter::write_str(self, s);
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.close();
    }
}
