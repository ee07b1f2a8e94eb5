//! Activation log markers
//!
//! The host reads stdout and stderr of the container as one shared stream per
//! fd. After each activation the proxy writes a sentinel line to both so the
//! host can split the streams into per-activation logs.

use std::io::{Stderr, Stdout, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Line written to stdout and stderr after every activation
pub const ACTIVATION_SENTINEL: &str = "XXX_THE_END_OF_A_WHISK_ACTIVATION_XXX";

/// Destination for sentinel lines
pub trait LogSink: Send + Sync {
    fn write_markers(&self);
}

/// Writes the sentinel line to an "stdout" and an "stderr" writer
///
/// Production uses the process streams ([`StdStreams`]); tests can hand in
/// buffers and read back exactly what each stream received.
#[derive(Debug, Default)]
pub struct StreamSink<O, E> {
    out: Mutex<O>,
    err: Mutex<E>,
}

/// The process stdout/stderr pair
pub type StdStreams = StreamSink<Stdout, Stderr>;

impl StdStreams {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O, E> StreamSink<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }
}

impl<O: Clone, E: Clone> StreamSink<O, E> {
    /// Copy of what has been written to both writers so far
    pub fn snapshot(&self) -> (O, E) {
        let out = self.out.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let err = self.err.lock().unwrap_or_else(PoisonError::into_inner).clone();
        (out, err)
    }
}

impl<O: Write + Send, E: Write + Send> LogSink for StreamSink<O, E> {
    fn write_markers(&self) {
        write_sentinel(&mut *self.out.lock().unwrap_or_else(PoisonError::into_inner));
        write_sentinel(&mut *self.err.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

fn write_sentinel(stream: &mut impl Write) {
    let _ = writeln!(stream, "{}", ACTIVATION_SENTINEL);
    let _ = stream.flush();
}

/// Counts marker writes instead of printing them
#[derive(Debug, Default)]
pub struct CountingSink {
    count: AtomicUsize,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the sentinel pair was written
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl LogSink for CountingSink {
    fn write_markers(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Guard that writes the sentinel pair when dropped
///
/// Created at the start of an activation; fires on every exit path
/// including unwinding. [`disarm`](Self::disarm) suppresses it, which init
/// uses on success.
#[must_use = "the marker is written when the guard is dropped"]
pub struct ActivationLogMarker {
    sink: Arc<dyn LogSink>,
    armed: bool,
}

impl ActivationLogMarker {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink, armed: true }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ActivationLogMarker {
    fn drop(&mut self) {
        if self.armed {
            self.sink.write_markers();
        }
    }
}
