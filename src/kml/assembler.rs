//! Placemark assembler
//!
//! A push-down state machine over SAX events. Element paths are tracked
//! on a context stack, in-progress geometries on a parallel value stack;
//! closing elements fold the innermost geometry into its parent, and a
//! closing `Placemark` hands the finished record to the sink.
//!
//! Coordinate parse failures are absorbed: the fragment is dropped with
//! a warning and parsing continues. Structural mismatches (a geometry
//! closing inside a parent that cannot hold it) abort the document.

use tracing::warn;

use crate::error::KmlError;
use crate::kml::context::ContextStack;
use crate::kml::coordinates::{parse_line, parse_point};
use crate::kml::geometry::{Geometry, MultiGeometry, Placemark, Polygon};
use crate::kml::handlers::{match_text_rule, TextAction};
use crate::sax::SaxEvent;

/// Document-level gate: whether the root `<kml>` element is open.
/// A document that ends while the gate is still `Kml` is truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStatus {
    OutKml,
    Kml,
}

/// Destination for completed placemarks.
///
/// The channel-backed implementation batches and applies backpressure;
/// tests use a plain buffer.
pub trait PlacemarkSink {
    /// Accept a completed placemark. May block on downstream consumers.
    fn push(&mut self, placemark: Placemark) -> Result<(), KmlError>;

    /// The document ended cleanly: flush whatever is pending and emit
    /// the terminal success signal.
    fn finish(&mut self) -> Result<(), KmlError>;
}

/// The placemark assembler state machine.
pub struct Assembler<S> {
    status: DocStatus,
    placemark: Option<Placemark>,
    context: ContextStack,
    /// In-progress geometries, innermost last. Only polygons and
    /// multigeometries ever have children above them; points and lines
    /// are popped before a sibling can open.
    geoms: Vec<Geometry>,
    sink: S,
}

impl<S: PlacemarkSink> Assembler<S> {
    pub fn new(sink: S) -> Self {
        Assembler {
            status: DocStatus::OutKml,
            placemark: None,
            context: ContextStack::new(),
            geoms: Vec::new(),
            sink,
        }
    }

    pub fn status(&self) -> DocStatus {
        self.status
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Reset to the pristine pre-document state.
    pub fn on_start_document(&mut self) {
        self.status = DocStatus::OutKml;
        self.placemark = None;
        self.context.clear();
        self.geoms.clear();
    }

    pub fn on_start_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
    ) -> Result<(), KmlError> {
        match name {
            "Placemark" => {
                if self.placemark.is_some() {
                    return Err(KmlError::NestedPlacemark);
                }
                // The Placemark element is not part of its own inner
                // path; any sibling context open at this point is
                // discarded.
                self.context.clear();
                self.placemark = Some(Placemark::new());
            }
            "kml" => self.status = DocStatus::Kml,
            "MultiGeometry" if self.placemark.is_some() => {
                self.geoms.push(Geometry::Multi(MultiGeometry::default()));
                self.context.push(name.to_string(), attributes.to_vec());
            }
            "Polygon" if self.placemark.is_some() => {
                self.geoms.push(Geometry::Polygon(Polygon::default()));
                self.context.push(name.to_string(), attributes.to_vec());
            }
            _ if self.placemark.is_some() => {
                self.context.push(name.to_string(), attributes.to_vec());
            }
            // Outside a placemark, elements do not affect context.
            _ => {}
        }
        Ok(())
    }

    pub fn on_characters(&mut self, text: &str) -> Result<(), KmlError> {
        if self.placemark.is_none() {
            return Ok(());
        }
        let Some(action) = match_text_rule(&self.context) else {
            return Ok(());
        };

        match action {
            TextAction::Attribute(key) => self.put_attribute(key.to_string(), text),
            TextAction::NamedAttribute => {
                let key = self
                    .context
                    .current()
                    .and_then(|c| c.attribute("name"))
                    .map(str::to_string);
                if let Some(key) = key {
                    self.put_attribute(key, text);
                }
            }
            TextAction::ParentNamedAttribute => {
                let key = self
                    .context
                    .parent()
                    .and_then(|c| c.attribute("name"))
                    .map(str::to_string);
                if let Some(key) = key {
                    self.put_attribute(key, text);
                }
            }
            TextAction::PointCoordinates => match parse_point(text) {
                Ok(point) => self.geoms.push(Geometry::Point(point)),
                Err(error) => warn!(%error, "dropping malformed point"),
            },
            TextAction::LineCoordinates => match parse_line(text) {
                Ok(line) => self.geoms.push(Geometry::Line(line)),
                Err(error) => warn!(%error, "dropping malformed coordinate run"),
            },
        }
        Ok(())
    }

    pub fn on_end_element(&mut self, name: &str) -> Result<(), KmlError> {
        match name {
            "Point" | "LineString" | "Polygon" | "MultiGeometry"
                if self.context.top_is(name) =>
            {
                // The geometry is only on the stack if its content
                // actually parsed; a failed fragment left nothing to
                // pop.
                if self.top_geometry_is(name) {
                    if let Some(geom) = self.geoms.pop() {
                        self.fold_geometry(geom)?;
                    }
                }
                self.context.pop();
            }
            "LinearRing" if self.context.top_is("LinearRing") => {
                self.fold_ring()?;
                self.context.pop();
            }
            "Placemark" if self.placemark.is_some() => {
                if let Some(placemark) = self.placemark.take() {
                    self.context.clear();
                    self.geoms.clear();
                    self.sink.push(placemark)?;
                }
            }
            "kml" => self.status = DocStatus::OutKml,
            _ if self.placemark.is_some() && self.context.top_is(name) => {
                self.context.pop();
            }
            _ => {}
        }
        Ok(())
    }

    pub fn on_end_document(&mut self) -> Result<(), KmlError> {
        if self.status == DocStatus::Kml {
            return Err(KmlError::Truncated {
                last_event: SaxEvent::EndDocument,
            });
        }
        self.sink.finish()
    }

    fn put_attribute(&mut self, key: String, value: &str) {
        if let Some(placemark) = self.placemark.as_mut() {
            placemark.put_attribute(key, value.trim().to_string());
        }
    }

    fn top_geometry_is(&self, element: &str) -> bool {
        self.geoms.last().is_some_and(|g| g.kind() == element)
    }

    /// Fold a completed geometry into the enclosing multigeometry, or
    /// into the placemark when it was outermost.
    fn fold_geometry(&mut self, geom: Geometry) -> Result<(), KmlError> {
        match self.geoms.last_mut() {
            None => match self.placemark.as_mut() {
                Some(placemark) => placemark.put_geometry(geom),
                None => {
                    return Err(KmlError::UnexpectedGeometry {
                        child: geom.kind(),
                        parent: "document",
                    })
                }
            },
            Some(Geometry::Multi(multi)) => multi.geoms.push(geom),
            Some(parent) => {
                return Err(KmlError::UnexpectedGeometry {
                    child: geom.kind(),
                    parent: parent.kind(),
                })
            }
        }
        Ok(())
    }

    /// Fold a completed linear ring into the polygon below it. The
    /// boundary kind comes from the wrapper element enclosing the ring.
    fn fold_ring(&mut self) -> Result<(), KmlError> {
        let line = match self.geoms.pop() {
            Some(Geometry::Line(line)) => line,
            Some(other) => {
                // Ring coordinates were dropped or absent; nothing to
                // fold.
                self.geoms.push(other);
                return Ok(());
            }
            None => return Ok(()),
        };

        let inner = self
            .context
            .parent()
            .is_some_and(|c| c.name == "innerBoundaryIs");

        match self.geoms.last_mut() {
            Some(Geometry::Polygon(polygon)) => {
                if inner {
                    polygon.inner_boundaries.push(line);
                } else {
                    polygon.outer_boundary = Some(line);
                }
                Ok(())
            }
            Some(parent) => Err(KmlError::UnexpectedGeometry {
                child: "LinearRing",
                parent: parent.kind(),
            }),
            None => Err(KmlError::UnexpectedGeometry {
                child: "LinearRing",
                parent: "document",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kml::geometry::Point;

    #[derive(Default)]
    struct VecSink {
        placemarks: Vec<Placemark>,
        finished: bool,
    }

    impl PlacemarkSink for VecSink {
        fn push(&mut self, placemark: Placemark) -> Result<(), KmlError> {
            self.placemarks.push(placemark);
            Ok(())
        }

        fn finish(&mut self) -> Result<(), KmlError> {
            self.finished = true;
            Ok(())
        }
    }

    fn assembler() -> Assembler<VecSink> {
        let mut asm = Assembler::new(VecSink::default());
        asm.on_start_document();
        asm.on_start_element("kml", &[]).unwrap();
        asm.on_start_element("Document", &[]).unwrap();
        asm
    }

    fn finish(mut asm: Assembler<VecSink>) -> Vec<Placemark> {
        asm.on_end_element("Document").unwrap();
        asm.on_end_element("kml").unwrap();
        asm.on_end_document().unwrap();
        assert!(asm.sink.finished);
        asm.sink.placemarks
    }

    fn open(asm: &mut Assembler<VecSink>, name: &str) {
        asm.on_start_element(name, &[]).unwrap();
    }

    fn close(asm: &mut Assembler<VecSink>, name: &str) {
        asm.on_end_element(name).unwrap();
    }

    fn text(asm: &mut Assembler<VecSink>, text: &str) {
        asm.on_characters(text).unwrap();
    }

    #[test]
    fn test_single_point_placemark() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        open(&mut asm, "name");
        text(&mut asm, "A");
        close(&mut asm, "name");
        open(&mut asm, "Point");
        open(&mut asm, "coordinates");
        text(&mut asm, "1,2,3");
        close(&mut asm, "coordinates");
        close(&mut asm, "Point");
        close(&mut asm, "Placemark");

        let placemarks = finish(asm);
        assert_eq!(placemarks.len(), 1);
        assert_eq!(placemarks[0].attr("name"), Some("A"));
        assert_eq!(
            placemarks[0].geoms,
            vec![Geometry::Point(Point::with_altitude(1.0, 2.0, 3.0))]
        );
    }

    #[test]
    fn test_polygon_with_hole() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        open(&mut asm, "Polygon");
        open(&mut asm, "outerBoundaryIs");
        open(&mut asm, "LinearRing");
        open(&mut asm, "coordinates");
        text(&mut asm, "0,0 10,0 10,10 0,10 0,0");
        close(&mut asm, "coordinates");
        close(&mut asm, "LinearRing");
        close(&mut asm, "outerBoundaryIs");
        open(&mut asm, "innerBoundaryIs");
        open(&mut asm, "LinearRing");
        open(&mut asm, "coordinates");
        text(&mut asm, "2,2 3,2 3,3 2,3 2,2");
        close(&mut asm, "coordinates");
        close(&mut asm, "LinearRing");
        close(&mut asm, "innerBoundaryIs");
        close(&mut asm, "Polygon");
        close(&mut asm, "Placemark");

        let placemarks = finish(asm);
        let Geometry::Polygon(ref polygon) = placemarks[0].geoms[0] else {
            panic!("expected a polygon");
        };
        assert_eq!(polygon.outer_boundary.as_ref().unwrap().points.len(), 5);
        assert_eq!(polygon.inner_boundaries.len(), 1);
        assert_eq!(polygon.inner_boundaries[0].points.len(), 5);
    }

    #[test]
    fn test_multigeometry_preserves_document_order() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        open(&mut asm, "MultiGeometry");
        open(&mut asm, "Point");
        open(&mut asm, "coordinates");
        text(&mut asm, "1,1");
        close(&mut asm, "coordinates");
        close(&mut asm, "Point");
        open(&mut asm, "LineString");
        open(&mut asm, "coordinates");
        text(&mut asm, "0,0 1,1");
        close(&mut asm, "coordinates");
        close(&mut asm, "LineString");
        close(&mut asm, "MultiGeometry");
        close(&mut asm, "Placemark");

        let placemarks = finish(asm);
        let Geometry::Multi(ref multi) = placemarks[0].geoms[0] else {
            panic!("expected a multigeometry");
        };
        assert_eq!(multi.geoms.len(), 2);
        assert!(multi.geoms[0].is_point());
        assert!(multi.geoms[1].is_line());
    }

    #[test]
    fn test_extended_data() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        open(&mut asm, "ExtendedData");
        open(&mut asm, "SchemaData");
        asm.on_start_element("SimpleData", &[("name".into(), "kind".into())])
            .unwrap();
        text(&mut asm, "park");
        close(&mut asm, "SimpleData");
        close(&mut asm, "SchemaData");
        close(&mut asm, "ExtendedData");
        close(&mut asm, "Placemark");

        let placemarks = finish(asm);
        assert_eq!(placemarks[0].attr("kind"), Some("park"));
    }

    #[test]
    fn test_data_value_uses_parent_name() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        open(&mut asm, "ExtendedData");
        asm.on_start_element("Data", &[("name".into(), "surface".into())])
            .unwrap();
        open(&mut asm, "value");
        text(&mut asm, "gravel");
        close(&mut asm, "value");
        close(&mut asm, "Data");
        close(&mut asm, "ExtendedData");
        close(&mut asm, "Placemark");

        let placemarks = finish(asm);
        assert_eq!(placemarks[0].attr("surface"), Some("gravel"));
    }

    #[test]
    fn test_timespan_attributes() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        open(&mut asm, "TimeSpan");
        open(&mut asm, "begin");
        text(&mut asm, "2020-01-01");
        close(&mut asm, "begin");
        open(&mut asm, "end");
        text(&mut asm, "2020-12-31");
        close(&mut asm, "end");
        close(&mut asm, "TimeSpan");
        close(&mut asm, "Placemark");

        let placemarks = finish(asm);
        assert_eq!(placemarks[0].attr("timespan_begin"), Some("2020-01-01"));
        assert_eq!(placemarks[0].attr("timespan_end"), Some("2020-12-31"));
    }

    #[test]
    fn test_malformed_point_dropped() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        open(&mut asm, "Point");
        open(&mut asm, "coordinates");
        text(&mut asm, "bad");
        close(&mut asm, "coordinates");
        close(&mut asm, "Point");
        open(&mut asm, "Point");
        open(&mut asm, "coordinates");
        text(&mut asm, "1,2");
        close(&mut asm, "coordinates");
        close(&mut asm, "Point");
        close(&mut asm, "Placemark");

        let placemarks = finish(asm);
        assert_eq!(placemarks[0].geoms, vec![Geometry::Point(Point::new(1.0, 2.0))]);
    }

    #[test]
    fn test_malformed_ring_does_not_disturb_polygon() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        open(&mut asm, "Polygon");
        open(&mut asm, "outerBoundaryIs");
        open(&mut asm, "LinearRing");
        open(&mut asm, "coordinates");
        text(&mut asm, "not coordinates");
        close(&mut asm, "coordinates");
        close(&mut asm, "LinearRing");
        close(&mut asm, "outerBoundaryIs");
        close(&mut asm, "Polygon");
        close(&mut asm, "Placemark");

        let placemarks = finish(asm);
        let Geometry::Polygon(ref polygon) = placemarks[0].geoms[0] else {
            panic!("expected a polygon");
        };
        assert!(polygon.outer_boundary.is_none());
    }

    #[test]
    fn test_nested_placemark_is_an_error() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        let err = asm.on_start_element("Placemark", &[]).unwrap_err();
        assert!(matches!(err, KmlError::NestedPlacemark));
    }

    #[test]
    fn test_point_inside_polygon_is_structural_error() {
        let mut asm = assembler();
        open(&mut asm, "Placemark");
        open(&mut asm, "Polygon");
        open(&mut asm, "Point");
        open(&mut asm, "coordinates");
        text(&mut asm, "1,2");
        close(&mut asm, "coordinates");
        let err = asm.on_end_element("Point").unwrap_err();
        assert!(matches!(
            err,
            KmlError::UnexpectedGeometry { child: "Point", parent: "Polygon" }
        ));
    }

    #[test]
    fn test_truncated_document() {
        let mut asm = assembler();
        let err = asm.on_end_document().unwrap_err();
        assert!(matches!(err, KmlError::Truncated { .. }));
    }

    #[test]
    fn test_elements_outside_placemarks_are_inert() {
        let mut asm = assembler();
        open(&mut asm, "name");
        text(&mut asm, "document title");
        close(&mut asm, "name");
        open(&mut asm, "MultiGeometry");
        close(&mut asm, "MultiGeometry");

        open(&mut asm, "Placemark");
        close(&mut asm, "Placemark");

        let placemarks = finish(asm);
        assert_eq!(placemarks.len(), 1);
        assert!(placemarks[0].attrs.is_empty());
        assert!(placemarks[0].geoms.is_empty());
    }

    #[test]
    fn test_empty_document_finishes_clean() {
        let asm = assembler();
        let placemarks = finish(asm);
        assert!(placemarks.is_empty());
    }
}
