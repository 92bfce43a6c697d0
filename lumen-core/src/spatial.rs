//! Spatial utterance synthesis: turns a normalized box into spoken position
//! phrases ("on the left at the top").

use crate::events::BoundingBox;

/// Centers left of this are "on the left".
const LEFT_THIRD: f32 = 0.33;
/// Centers right of this are "on the right".
const RIGHT_THIRD: f32 = 0.66;
/// Centers above this are "at the top".
const TOP_THIRD: f32 = 0.33;
/// Centers below this are "at the bottom".
const BOTTOM_THIRD: f32 = 0.66;

/// Horizontal phrase for a normalized center x. Boundaries are exclusive:
/// exactly 0.33 or 0.66 reads as "in the center".
pub fn horizontal_phrase(cx: f32) -> &'static str {
    if cx < LEFT_THIRD {
        "on the left"
    } else if cx > RIGHT_THIRD {
        "on the right"
    } else {
        "in the center"
    }
}

/// Vertical phrase for a normalized center y. Boundaries are exclusive:
/// exactly 0.33 or 0.66 reads as "in the middle".
pub fn vertical_phrase(cy: f32) -> &'static str {
    if cy < TOP_THIRD {
        "at the top"
    } else if cy > BOTTOM_THIRD {
        "at the bottom"
    } else {
        "in the middle"
    }
}

/// Combined position phrase for a normalized center point.
pub fn position_phrase(cx: f32, cy: f32) -> String {
    format!("{} {}", horizontal_phrase(cx), vertical_phrase(cy))
}

/// Position phrase for a bounding box, from its center point.
pub fn describe(bounding_box: &BoundingBox) -> String {
    let (cx, cy) = bounding_box.center();
    position_phrase(cx, cy)
}

/// Full spoken announcement for a detected object.
pub fn announcement(label: &str, bounding_box: &BoundingBox) -> String {
    format!("Detected {} {}", label, describe(bounding_box))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn corners_map_to_edge_phrases() {
        assert_eq!(position_phrase(0.1, 0.1), "on the left at the top");
        assert_eq!(position_phrase(0.9, 0.9), "on the right at the bottom");
        assert_eq!(position_phrase(0.9, 0.1), "on the right at the top");
        assert_eq!(position_phrase(0.1, 0.9), "on the left at the bottom");
    }

    #[test]
    fn midpoint_maps_to_center_middle() {
        assert_eq!(position_phrase(0.5, 0.5), "in the center in the middle");
    }

    #[test]
    fn third_boundaries_are_exclusive() {
        // Exactly on the lower boundary is already the center band.
        assert_eq!(position_phrase(0.33, 0.33), "in the center in the middle");
        assert_eq!(position_phrase(0.66, 0.66), "in the center in the middle");
        // Just past the boundaries tips into the edge bands.
        assert_eq!(horizontal_phrase(0.329), "on the left");
        assert_eq!(horizontal_phrase(0.661), "on the right");
        assert_eq!(vertical_phrase(0.329), "at the top");
        assert_eq!(vertical_phrase(0.661), "at the bottom");
    }

    #[test]
    fn central_placeholder_box_reads_center_middle() {
        let bbox = BoundingBox::centered(0.5, 0.5);
        let (cx, cy) = bbox.center();
        assert_abs_diff_eq!(cx, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(cy, 0.5, epsilon = 1e-6);
        assert_eq!(describe(&bbox), "in the center in the middle");
    }

    #[test]
    fn announcement_formats_label_and_position() {
        let bbox = BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 0.2,
            height: 0.2,
        };
        assert_eq!(announcement("chair", &bbox), "Detected chair on the left at the top");
    }
}
