//! Error types for KML parsing.
//!
//! Two families with different fates (see the assembler):
//! - Coordinate errors (`InvalidPoint`) are recovered locally: the
//!   offending geometry is dropped and parsing continues.
//! - Everything else is fatal and terminates the stream with an `Error`
//!   message.

use crate::sax::SaxEvent;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KmlError>;

#[derive(Debug, Error)]
pub enum KmlError {
    /// A coordinate tuple did not split into 2-3 finite numbers.
    #[error("invalid coordinate tuple: {0:?}")]
    InvalidPoint(String),

    /// A geometry closed inside a parent that cannot hold it.
    #[error("{child} cannot be folded into {parent}")]
    UnexpectedGeometry {
        child: &'static str,
        parent: &'static str,
    },

    /// A `Placemark` element opened while another was still being built.
    #[error("nested Placemark element")]
    NestedPlacemark,

    /// The document ended while still inside `<kml>`.
    #[error("document ended inside <kml> (last event: {last_event:?})")]
    Truncated { last_event: SaxEvent },

    /// The XML tokenizer rejected the input.
    #[error("xml syntax: {0}")]
    Xml(String),

    /// The parser task could not be started.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The channel closed before a terminal `Done` or `Error` message.
    #[error("parser channel closed before a terminal message")]
    Disconnected,
}
