//! Path-dispatched text handlers
//!
//! Character data is routed by matching the open-element path against a
//! static table of suffix patterns. The table is sorted by decreasing
//! pattern length and scanned linearly; the first hit is the longest,
//! most specific match. Patterns are distinct suffixes, so ties cannot
//! occur.
//!
//! Enter and exit rules are single-element patterns with guards and live
//! as `match` arms in the assembler; only the text rules need the
//! multi-element path machinery.

use super::context::ContextStack;

/// What to do with character data at a matched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAction {
    /// Store the text under a fixed attribute key.
    Attribute(&'static str),
    /// Store the text under the current element's `name` attribute
    /// (`SimpleData`).
    NamedAttribute,
    /// Store the text under the parent element's `name` attribute
    /// (`Data`/`value`).
    ParentNamedAttribute,
    /// Parse a single coordinate tuple and open a point.
    PointCoordinates,
    /// Parse a coordinate run and open a line (also used for linear
    /// rings; the boundary kind is decided when the ring closes).
    LineCoordinates,
}

struct TextRule {
    pattern: &'static [&'static str],
    action: TextAction,
}

const TEXT_RULES: &[TextRule] = &[
    TextRule {
        pattern: &["MultiGeometry", "Polygon", "outerBoundaryIs", "LinearRing", "coordinates"],
        action: TextAction::LineCoordinates,
    },
    TextRule {
        pattern: &["MultiGeometry", "Polygon", "innerBoundaryIs", "LinearRing", "coordinates"],
        action: TextAction::LineCoordinates,
    },
    TextRule {
        pattern: &["Polygon", "outerBoundaryIs", "LinearRing", "coordinates"],
        action: TextAction::LineCoordinates,
    },
    TextRule {
        pattern: &["Polygon", "innerBoundaryIs", "LinearRing", "coordinates"],
        action: TextAction::LineCoordinates,
    },
    TextRule {
        pattern: &["ExtendedData", "SchemaData", "SimpleData"],
        action: TextAction::NamedAttribute,
    },
    TextRule {
        pattern: &["ExtendedData", "Data", "value"],
        action: TextAction::ParentNamedAttribute,
    },
    TextRule {
        pattern: &["MultiGeometry", "Point", "coordinates"],
        action: TextAction::PointCoordinates,
    },
    TextRule {
        pattern: &["MultiGeometry", "LineString", "coordinates"],
        action: TextAction::LineCoordinates,
    },
    TextRule {
        pattern: &["Point", "coordinates"],
        action: TextAction::PointCoordinates,
    },
    TextRule {
        pattern: &["LineString", "coordinates"],
        action: TextAction::LineCoordinates,
    },
    TextRule {
        pattern: &["TimeSpan", "begin"],
        action: TextAction::Attribute("timespan_begin"),
    },
    TextRule {
        pattern: &["TimeSpan", "end"],
        action: TextAction::Attribute("timespan_end"),
    },
    TextRule {
        pattern: &["name"],
        action: TextAction::Attribute("name"),
    },
    TextRule {
        pattern: &["description"],
        action: TextAction::Attribute("description"),
    },
];

/// Find the most specific text rule matching the current path, if any.
pub fn match_text_rule(stack: &ContextStack) -> Option<TextAction> {
    TEXT_RULES
        .iter()
        .find(|rule| stack.matches_suffix(rule.pattern))
        .map(|rule| rule.action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_of(names: &[&str]) -> ContextStack {
        let mut stack = ContextStack::new();
        for name in names {
            stack.push(name.to_string(), Vec::new());
        }
        stack
    }

    #[test]
    fn test_rules_sorted_by_decreasing_length() {
        for pair in TEXT_RULES.windows(2) {
            assert!(pair[0].pattern.len() >= pair[1].pattern.len());
        }
    }

    #[test]
    fn test_point_coordinates() {
        let stack = stack_of(&["Point", "coordinates"]);
        assert_eq!(match_text_rule(&stack), Some(TextAction::PointCoordinates));
    }

    #[test]
    fn test_nested_point_still_matches() {
        let stack = stack_of(&["MultiGeometry", "Point", "coordinates"]);
        assert_eq!(match_text_rule(&stack), Some(TextAction::PointCoordinates));
    }

    #[test]
    fn test_ring_coordinates() {
        let stack = stack_of(&["Polygon", "outerBoundaryIs", "LinearRing", "coordinates"]);
        assert_eq!(match_text_rule(&stack), Some(TextAction::LineCoordinates));
    }

    #[test]
    fn test_simple_data_beats_shorter_rules() {
        let stack = stack_of(&["ExtendedData", "SchemaData", "SimpleData"]);
        assert_eq!(match_text_rule(&stack), Some(TextAction::NamedAttribute));
    }

    #[test]
    fn test_name_only_at_placemark_level() {
        assert_eq!(
            match_text_rule(&stack_of(&["name"])),
            Some(TextAction::Attribute("name"))
        );
        // `name` anchors at the current element, so any parent is fine
        assert_eq!(
            match_text_rule(&stack_of(&["TimeSpan", "name"])),
            Some(TextAction::Attribute("name"))
        );
    }

    #[test]
    fn test_unrecognized_paths_do_not_match() {
        assert_eq!(match_text_rule(&stack_of(&["Style", "color"])), None);
        assert_eq!(match_text_rule(&stack_of(&["LinearRing", "coordinates"])), None);
        assert_eq!(match_text_rule(&stack_of(&[])), None);
    }
}
