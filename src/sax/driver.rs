//! SAX driver over quick-xml
//!
//! Adapts the quick-xml pull tokenizer to the event contract the
//! assembler consumes. The driver owns the read buffer, synthesizes
//! start+end for empty elements, resolves entity references into
//! character chunks, and delivers CDATA as character data. It also
//! remembers the last event so a fatal error can report where parsing
//! stopped.
//!
//! Element and attribute names are matched by local name, so documents
//! that prefix the KML namespace still parse.

use std::io::{BufReader, Read};

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::KmlError;
use crate::kml::assembler::{Assembler, PlacemarkSink};
use crate::sax::events::SaxEvent;

pub struct SaxDriver<R: Read> {
    reader: Reader<BufReader<R>>,
    last_event: SaxEvent,
}

impl<R: Read> SaxDriver<R> {
    /// Wrap a byte stream. `chunk_size` sizes the read buffer the
    /// tokenizer pulls from.
    pub fn new(input: R, chunk_size: usize) -> Self {
        let mut reader = Reader::from_reader(BufReader::with_capacity(chunk_size, input));
        reader.config_mut().trim_text(true);
        SaxDriver {
            reader,
            last_event: SaxEvent::StartDocument,
        }
    }

    /// The most recent event handed to the assembler.
    pub fn last_event(&self) -> &SaxEvent {
        &self.last_event
    }

    /// Drive the assembler with the whole document. Returns after
    /// dispatching `EndDocument`, or on the first fatal error.
    pub fn run<S: PlacemarkSink>(&mut self, assembler: &mut Assembler<S>) -> Result<(), KmlError> {
        let mut buf = Vec::new();
        self.dispatch(assembler, SaxEvent::StartDocument)?;

        loop {
            buf.clear();
            let event = self
                .reader
                .read_event_into(&mut buf)
                .map_err(|e| KmlError::Xml(e.to_string()))?;

            match event {
                Event::Start(ref e) => {
                    let (name, attributes) = self.element_parts(e)?;
                    self.dispatch(assembler, SaxEvent::StartElement { name, attributes })?;
                }
                Event::Empty(ref e) => {
                    let (name, attributes) = self.element_parts(e)?;
                    let end = name.clone();
                    self.dispatch(assembler, SaxEvent::StartElement { name, attributes })?;
                    self.dispatch(assembler, SaxEvent::EndElement { name: end })?;
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    self.dispatch(assembler, SaxEvent::EndElement { name })?;
                }
                Event::Text(e) => {
                    let text = e
                        .decode()
                        .map_err(|err| KmlError::Xml(err.to_string()))?
                        .into_owned();
                    self.dispatch(assembler, SaxEvent::Characters(text))?;
                }
                Event::CData(e) => {
                    let text = std::str::from_utf8(e.as_ref())
                        .map_err(|err| KmlError::Xml(err.to_string()))?
                        .to_string();
                    self.dispatch(assembler, SaxEvent::Characters(text))?;
                }
                Event::GeneralRef(e) => {
                    let raw = e
                        .decode()
                        .map_err(|err| KmlError::Xml(err.to_string()))?;
                    self.dispatch(assembler, SaxEvent::Characters(resolve_entity(&raw)))?;
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => {
                    return self.dispatch(assembler, SaxEvent::EndDocument);
                }
            }
        }
    }

    fn dispatch<S: PlacemarkSink>(
        &mut self,
        assembler: &mut Assembler<S>,
        event: SaxEvent,
    ) -> Result<(), KmlError> {
        self.last_event = event;
        match &self.last_event {
            SaxEvent::StartDocument => {
                assembler.on_start_document();
                Ok(())
            }
            SaxEvent::StartElement { name, attributes } => {
                assembler.on_start_element(name, attributes)
            }
            SaxEvent::EndElement { name } => assembler.on_end_element(name),
            SaxEvent::Characters(text) => assembler.on_characters(text),
            SaxEvent::EndDocument => assembler.on_end_document(),
        }
    }

    fn element_parts(&self, e: &BytesStart) -> Result<(String, Vec<(String, String)>), KmlError> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| KmlError::Xml(err.to_string()))?;
            // Namespace declarations are not element attributes.
            if attr.key.as_ref() == b"xmlns" {
                continue;
            }
            if let Some(prefix) = attr.key.prefix() {
                if prefix.as_ref() == b"xmlns" {
                    continue;
                }
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .decode_and_unescape_value(self.reader.decoder())
                .map_err(|err| KmlError::Xml(err.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok((name, attributes))
    }
}

/// Resolve a general entity reference to its replacement text. Named
/// XML entities and numeric (decimal or hex) references are expanded;
/// anything else is kept literally.
fn resolve_entity(raw: &str) -> String {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return resolved.to_string();
    }
    if let Some(rest) = raw.strip_prefix('#') {
        let code = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            rest.parse::<u32>().ok()
        };
        if let Some(ch) = code.and_then(char::from_u32) {
            return ch.to_string();
        }
    }
    format!("&{raw};")
}
