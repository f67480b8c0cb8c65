//! SAX event types
//!
//! The events the assembler consumes. Owned values: they outlive the
//! tokenizer's internal buffer and travel inside error payloads, so the
//! failing event can be reported to the consumer.

/// A SAX parsing event.
#[derive(Debug, Clone, PartialEq)]
pub enum SaxEvent {
    /// Document boundary, before any element.
    StartDocument,

    /// Start of an element.
    StartElement {
        name: String,
        /// Attributes in document order.
        attributes: Vec<(String, String)>,
    },

    /// End of an element.
    EndElement { name: String },

    /// Character data. May be delivered as multiple chunks per text
    /// node; each chunk is dispatched independently.
    Characters(String),

    /// Document boundary, after the last element.
    EndDocument,
}

impl SaxEvent {
    #[inline]
    pub fn is_start_element(&self) -> bool {
        matches!(self, SaxEvent::StartElement { .. })
    }

    #[inline]
    pub fn is_end_element(&self) -> bool {
        matches!(self, SaxEvent::EndElement { .. })
    }

    #[inline]
    pub fn is_characters(&self) -> bool {
        matches!(self, SaxEvent::Characters(_))
    }

    /// The element name if this is a start or end element event.
    pub fn element_name(&self) -> Option<&str> {
        match self {
            SaxEvent::StartElement { name, .. } => Some(name),
            SaxEvent::EndElement { name } => Some(name),
            _ => None,
        }
    }
}
