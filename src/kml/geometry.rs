//! KML geometry model
//!
//! A closed algebra of geometry values plus the placemark record that
//! carries them. Polygons and multigeometries own their children by
//! value; popping the geometry stack transfers ownership into the
//! parent's field.

use std::collections::HashMap;

/// A single coordinate tuple. `z` is present iff the source tuple had
/// three components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y, z: None }
    }

    pub fn with_altitude(x: f64, y: f64, z: f64) -> Self {
        Point { x, y, z: Some(z) }
    }
}

/// An ordered run of points (`LineString` or `LinearRing` content).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    pub points: Vec<Point>,
}

/// A polygon: one optional outer ring and any number of holes, in
/// document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub outer_boundary: Option<Line>,
    pub inner_boundaries: Vec<Line>,
}

/// A recursive collection of geometries, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiGeometry {
    pub geoms: Vec<Geometry>,
}

/// A geometry value.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    Line(Line),
    Polygon(Polygon),
    Multi(MultiGeometry),
}

impl Geometry {
    /// The KML element name this variant corresponds to.
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::Line(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::Multi(_) => "MultiGeometry",
        }
    }

    #[inline]
    pub fn is_point(&self) -> bool {
        matches!(self, Geometry::Point(_))
    }

    #[inline]
    pub fn is_line(&self) -> bool {
        matches!(self, Geometry::Line(_))
    }
}

/// A named geographic feature: free-form attributes plus the geometries
/// collected while its element was open.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Placemark {
    pub attrs: HashMap<String, String>,
    pub geoms: Vec<Geometry>,
}

impl Placemark {
    pub fn new() -> Self {
        Placemark::default()
    }

    /// Insert an attribute. On a duplicate key the later value wins.
    pub fn put_attribute(&mut self, key: String, value: String) {
        self.attrs.insert(key, value);
    }

    /// Attach a completed geometry.
    pub fn put_geometry(&mut self, geom: Geometry) {
        self.geoms.push(geom);
    }

    /// Look up an attribute by key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}
