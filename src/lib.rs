//! RustyKML - Streaming KML placemark extraction
//!
//! Consumes a KML byte stream and produces a lazy, batched stream of
//! placemarks: attribute dictionaries paired with point, line, polygon
//! and multigeometry values. Built for documents that do not fit in
//! memory: parsing is incremental and the consumer's pace throttles the
//! parser through per-batch acknowledgments.
//!
//! Pipeline:
//!
//! ```text
//! bytes --> SAX events (quick-xml) --> Assembler --> Batch/Ack channel --> consumer
//! ```
//!
//! Two entry points:
//! - [`stream`]: lazy iterator of placemarks (acks handled for you)
//! - [`events`]: the raw message channel, for consumers that want to
//!   control batching and acknowledgment themselves
//!
//! ```no_run
//! use std::fs::File;
//!
//! let file = File::open("places.kml").unwrap();
//! for placemark in rustykml::stream(file) {
//!     let placemark = placemark.unwrap();
//!     println!("{:?} -> {} geometries", placemark.attr("name"), placemark.geoms.len());
//! }
//! ```

mod channel;
mod error;
mod kml;
mod sax;
mod stream;

// ============================================================================
// Public API
// ============================================================================

pub use channel::{AckSender, Batch, Message, StreamRef};
pub use error::{KmlError, Result};
pub use kml::assembler::{Assembler, DocStatus, PlacemarkSink};
pub use kml::coordinates::{parse_line, parse_point};
pub use kml::geometry::{Geometry, Line, MultiGeometry, Placemark, Point, Polygon};
pub use sax::{SaxDriver, SaxEvent};
pub use stream::{events, events_with, stream, stream_with, EventStream, Placemarks, StreamOptions};
