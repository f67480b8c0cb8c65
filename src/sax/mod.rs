//! SAX (Simple API for XML) layer
//!
//! The assembler consumes SAX-style events from any conforming
//! tokenizer; this module defines the event type and the default driver
//! built on quick-xml:
//!
//! ```text
//! bytes --> quick_xml::Reader --> SaxDriver --> Assembler
//! ```
//!
//! Tokenization itself (element/attribute lexing, entity syntax) is
//! quick-xml's job; this layer only adapts its events.

pub mod driver;
pub mod events;

pub use driver::SaxDriver;
pub use events::SaxEvent;
