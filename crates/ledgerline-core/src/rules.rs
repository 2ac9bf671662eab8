use crate::geometry::{BBox, Orientation};

/// A rule-line segment reported by the PDF extractor.
///
/// Vertical rules constrain column boundaries; horizontal rules constrain
/// row merging.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleLine {
    /// Bounding box of the segment.
    pub bbox: BBox,
    /// Whether the segment runs horizontally or vertically.
    pub orientation: Orientation,
}

impl RuleLine {
    /// A horizontal segment at `y` spanning `x0..x1`.
    pub fn horizontal(x0: f64, x1: f64, y: f64) -> Self {
        Self {
            bbox: BBox::new(x0, y, x1, y),
            orientation: Orientation::Horizontal,
        }
    }

    /// A vertical segment at `x` spanning `top..bottom`.
    pub fn vertical(x: f64, top: f64, bottom: f64) -> Self {
        Self {
            bbox: BBox::new(x, top, x, bottom),
            orientation: Orientation::Vertical,
        }
    }

    /// The x-position of a vertical rule (its left edge for thick rules).
    pub fn x(&self) -> f64 {
        self.bbox.x0
    }

    /// The y-position of a horizontal rule.
    pub fn y(&self) -> f64 {
        self.bbox.top
    }
}

/// Keep only rules that extend below `y_threshold`.
///
/// Used to discard decorative rules above the table header.
pub fn filter_below(rules: &[RuleLine], y_threshold: f64) -> Vec<RuleLine> {
    rules
        .iter()
        .filter(|r| r.bbox.bottom > y_threshold)
        .cloned()
        .collect()
}

/// True if any horizontal rule's y sits strictly between `upper_y` and `lower_y`.
pub fn crosses_horizontal(rules: &[RuleLine], upper_y: f64, lower_y: f64) -> bool {
    rules
        .iter()
        .filter(|r| r.orientation == Orientation::Horizontal)
        .any(|r| upper_y < r.y() && r.y() < lower_y)
}
