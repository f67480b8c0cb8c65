//! Batcher & backpressure channel
//!
//! Completed placemarks accumulate in the parser task and are delivered
//! in batches over a message channel. Each batch carries an ack handle;
//! the parser blocks until the batch is acknowledged, which bounds its
//! buffering to one batch regardless of document size. The final flush
//! at end of document is not acknowledged (the consumer may already be
//! tearing down) and is followed by `Done`.
//!
//! Every message carries the parse's [`StreamRef`]; both sides ignore
//! messages whose ref does not match, so leftovers from an earlier
//! parse cannot be confused with the current one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use tracing::debug;

use crate::error::KmlError;
use crate::kml::assembler::PlacemarkSink;
use crate::kml::geometry::Placemark;
use crate::sax::SaxEvent;

static NEXT_STREAM_REF: AtomicU64 = AtomicU64::new(1);

/// Correlation token identifying one parse run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamRef(u64);

impl StreamRef {
    /// Mint a fresh, process-unique ref.
    pub(crate) fn next() -> Self {
        StreamRef(NEXT_STREAM_REF.fetch_add(1, Ordering::Relaxed))
    }
}

/// A message from the parser task to the consumer.
#[derive(Debug)]
pub enum Message {
    /// A batch of placemarks, in document order. Must be acknowledged
    /// for parsing to resume.
    Batch(Batch),
    /// Terminal success. No further messages follow for this ref.
    Done { stream: StreamRef },
    /// Terminal failure, with the SAX event at which parsing stopped.
    Error {
        stream: StreamRef,
        error: KmlError,
        last_event: SaxEvent,
    },
}

impl Message {
    /// The parse run this message belongs to.
    pub fn stream_ref(&self) -> StreamRef {
        match self {
            Message::Batch(batch) => batch.stream,
            Message::Done { stream } => *stream,
            Message::Error { stream, .. } => *stream,
        }
    }
}

/// A delivered batch of placemarks.
#[derive(Debug)]
pub struct Batch {
    pub stream: StreamRef,
    /// Placemarks in document order.
    pub placemarks: Vec<Placemark>,
    /// Handle back to the parser task; acknowledging resumes parsing.
    pub from: AckSender,
}

/// One-shot handle for acknowledging a batch.
#[derive(Debug)]
pub struct AckSender {
    stream: StreamRef,
    tx: mpsc::Sender<StreamRef>,
}

impl AckSender {
    /// Acknowledge the batch, unblocking the parser. Dropping the
    /// sender without acking also unblocks it, but as a cancellation.
    pub fn ack(self) {
        let _ = self.tx.send(self.stream);
    }

    pub fn stream_ref(&self) -> StreamRef {
        self.stream
    }
}

/// The parser-side sink: accumulates placemarks and flushes batches
/// with a blocking ack handshake.
pub(crate) struct BatchSink {
    stream: StreamRef,
    batch_size: usize,
    pending: Vec<Placemark>,
    messages: mpsc::Sender<Message>,
}

impl BatchSink {
    pub(crate) fn new(
        stream: StreamRef,
        batch_size: usize,
        messages: mpsc::Sender<Message>,
    ) -> Self {
        BatchSink {
            stream,
            batch_size,
            pending: Vec::with_capacity(batch_size.saturating_add(1)),
            messages,
        }
    }

    /// Send the pending placemarks as one batch. When `wait_for_ack` is
    /// set, block until the consumer acknowledges this batch.
    fn flush(&mut self, wait_for_ack: bool) -> Result<(), KmlError> {
        let placemarks = std::mem::take(&mut self.pending);
        debug!(count = placemarks.len(), "flushing placemark batch");

        let (ack_tx, ack_rx) = mpsc::channel();
        let batch = Batch {
            stream: self.stream,
            placemarks,
            from: AckSender {
                stream: self.stream,
                tx: ack_tx,
            },
        };
        self.messages
            .send(Message::Batch(batch))
            .map_err(|_| KmlError::Disconnected)?;

        if wait_for_ack {
            loop {
                match ack_rx.recv() {
                    Ok(stream) if stream == self.stream => break,
                    // An ack for some other parse; ignore it.
                    Ok(_) => continue,
                    // The consumer dropped the batch without acking.
                    Err(mpsc::RecvError) => return Err(KmlError::Disconnected),
                }
            }
        }
        Ok(())
    }

    /// Report a fatal error. Terminal: the sink must not be used after.
    pub(crate) fn fail(&mut self, error: KmlError, last_event: SaxEvent) {
        let _ = self.messages.send(Message::Error {
            stream: self.stream,
            error,
            last_event,
        });
    }
}

impl PlacemarkSink for BatchSink {
    fn push(&mut self, placemark: Placemark) -> Result<(), KmlError> {
        self.pending.push(placemark);
        if self.pending.len() > self.batch_size {
            self.flush(true)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), KmlError> {
        if !self.pending.is_empty() {
            self.flush(false)?;
        }
        debug!("placemark stream done");
        self.messages
            .send(Message::Done {
                stream: self.stream,
            })
            .map_err(|_| KmlError::Disconnected)
    }
}
