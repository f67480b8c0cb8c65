//! Consumer-facing surface
//!
//! `events` spawns the parser task and hands back the message channel;
//! `stream` wraps that channel in a lazy placemark iterator that
//! acknowledges batches as it drains them. Dropping either side tears
//! the parser task down through channel closure; no supervisor is
//! needed.

use std::io::Read;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::debug;

use crate::channel::{AckSender, BatchSink, Message, StreamRef};
use crate::error::KmlError;
use crate::kml::assembler::Assembler;
use crate::kml::geometry::Placemark;
use crate::sax::{SaxDriver, SaxEvent};

/// Tuning knobs for one parse run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Read-buffer size handed to the tokenizer, in bytes.
    pub chunk_size: usize,
    /// Placemarks accumulated before a batch is flushed.
    pub batch_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            chunk_size: 4096,
            batch_size: 64,
        }
    }
}

/// Handle to a running parse: the correlation ref plus the message
/// channel. Messages whose ref does not match [`EventStream::stream_ref`]
/// belong to another run and must be ignored.
pub struct EventStream {
    stream: StreamRef,
    messages: Receiver<Message>,
}

impl EventStream {
    /// The correlation ref of this parse run.
    pub fn stream_ref(&self) -> StreamRef {
        self.stream
    }

    /// Block for the next message from the parser task.
    pub fn recv(&self) -> Result<Message, KmlError> {
        self.messages.recv().map_err(|_| KmlError::Disconnected)
    }

    /// Non-blocking poll for the next message.
    pub fn try_recv(&self) -> Result<Option<Message>, KmlError> {
        match self.messages.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(KmlError::Disconnected),
        }
    }

    /// Blocking iterator over messages, ending when the parser task is
    /// gone.
    pub fn iter(&self) -> impl Iterator<Item = Message> + '_ {
        self.messages.iter()
    }
}

/// Spawn a parser task over `input` with default options and return the
/// event channel.
pub fn events<R>(input: R) -> EventStream
where
    R: Read + Send + 'static,
{
    events_with(input, StreamOptions::default())
}

/// Spawn a parser task over `input` and return the event channel.
pub fn events_with<R>(input: R, options: StreamOptions) -> EventStream
where
    R: Read + Send + 'static,
{
    let stream = StreamRef::next();
    let (tx, rx) = mpsc::channel();

    let task_tx = tx.clone();
    let spawned = thread::Builder::new()
        .name("rustykml-parser".into())
        .spawn(move || run_parser(input, stream, options, task_tx));
    if let Err(error) = spawned {
        let _ = tx.send(Message::Error {
            stream,
            error: KmlError::Io(error),
            last_event: SaxEvent::StartDocument,
        });
    }

    EventStream {
        stream,
        messages: rx,
    }
}

/// Lazily parse `input` into placemarks with default options.
pub fn stream<R>(input: R) -> Placemarks
where
    R: Read + Send + 'static,
{
    stream_with(input, StreamOptions::default())
}

/// Lazily parse `input` into placemarks.
pub fn stream_with<R>(input: R, options: StreamOptions) -> Placemarks
where
    R: Read + Send + 'static,
{
    Placemarks {
        events: events_with(input, options),
        buffered: Vec::new().into_iter(),
        pending_ack: None,
        finished: false,
    }
}

/// The parser task body: drive the assembler over the whole document
/// and make sure exactly one terminal message goes out.
fn run_parser<R: Read>(
    input: R,
    stream: StreamRef,
    options: StreamOptions,
    messages: mpsc::Sender<Message>,
) {
    let sink = BatchSink::new(stream, options.batch_size, messages);
    let mut assembler = Assembler::new(sink);
    let mut driver = SaxDriver::new(input, options.chunk_size);

    if let Err(error) = driver.run(&mut assembler) {
        if matches!(error, KmlError::Disconnected) {
            // The consumer went away; this is cancellation, not an
            // error anyone can still observe.
            debug!("consumer gone, abandoning parse");
            return;
        }
        let last_event = driver.last_event().clone();
        assembler.sink_mut().fail(error, last_event);
    }
}

/// Lazy sequence of placemarks. Pulls a batch from the parser task,
/// yields its placemarks one by one, and acknowledges the batch when
/// more input is needed, so the parser stays exactly one batch ahead.
pub struct Placemarks {
    events: EventStream,
    buffered: std::vec::IntoIter<Placemark>,
    pending_ack: Option<AckSender>,
    finished: bool,
}

impl Placemarks {
    /// The correlation ref of the underlying parse run.
    pub fn stream_ref(&self) -> StreamRef {
        self.events.stream_ref()
    }
}

impl Iterator for Placemarks {
    type Item = Result<Placemark, KmlError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(placemark) = self.buffered.next() {
                return Some(Ok(placemark));
            }
            if self.finished {
                return None;
            }
            if let Some(ack) = self.pending_ack.take() {
                ack.ack();
            }
            match self.events.recv() {
                Ok(message) => {
                    if message.stream_ref() != self.events.stream_ref() {
                        continue;
                    }
                    match message {
                        Message::Batch(batch) => {
                            self.pending_ack = Some(batch.from);
                            self.buffered = batch.placemarks.into_iter();
                        }
                        Message::Done { .. } => {
                            self.finished = true;
                            return None;
                        }
                        Message::Error { error, .. } => {
                            self.finished = true;
                            return Some(Err(error));
                        }
                    }
                }
                Err(error) => {
                    self.finished = true;
                    return Some(Err(error));
                }
            }
        }
    }
}
