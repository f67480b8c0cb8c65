//! Coordinate text parsing
//!
//! KML encodes a tuple as `lon,lat[,alt]` and a run of tuples as
//! whitespace-separated text inside a `<coordinates>` element. Tuples
//! are parsed strictly (2-3 finite components); separator handling is
//! lenient because real-world documents wrap and indent freely.

use memchr::memchr2_iter;

use crate::error::KmlError;
use crate::kml::geometry::{Line, Point};

/// Parse a single coordinate tuple.
///
/// Surrounding whitespace is trimmed, the rest is split on commas into
/// 2 or 3 components, each of which must parse as a finite number.
/// Whitespace around individual components is tolerated.
pub fn parse_point(s: &str) -> Result<Point, KmlError> {
    let mut components = [0f64; 3];
    let mut count = 0;

    for token in s.trim().split(',') {
        if count == components.len() {
            return Err(KmlError::InvalidPoint(s.to_string()));
        }
        components[count] = parse_component(token).ok_or_else(|| KmlError::InvalidPoint(s.to_string()))?;
        count += 1;
    }

    match count {
        2 => Ok(Point::new(components[0], components[1])),
        3 => Ok(Point::with_altitude(components[0], components[1], components[2])),
        _ => Err(KmlError::InvalidPoint(s.to_string())),
    }
}

fn parse_component(token: &str) -> Option<f64> {
    let value: f64 = token.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parse a run of coordinate tuples separated by spaces and newlines.
///
/// Separator runs produce empty tokens, which are discarded. The first
/// tuple that fails to parse aborts the whole run with its error. Empty
/// input yields a line with zero points; the caller decides whether
/// that is acceptable.
pub fn parse_line(s: &str) -> Result<Line, KmlError> {
    let mut points = Vec::new();
    let mut start = 0;

    for sep in memchr2_iter(b' ', b'\n', s.as_bytes()) {
        push_token(&s[start..sep], &mut points)?;
        start = sep + 1;
    }
    push_token(&s[start..], &mut points)?;

    Ok(Line { points })
}

fn push_token(token: &str, points: &mut Vec<Point>) -> Result<(), KmlError> {
    let token = token.trim();
    if !token.is_empty() {
        points.push(parse_point(token)?);
    }
    Ok(())
}
