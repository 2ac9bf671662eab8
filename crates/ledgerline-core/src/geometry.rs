/// Bounding box with top-left origin coordinate system.
///
/// Coordinates follow the PDF-extractor convention:
/// - `x0`: left edge
/// - `top`: top edge (distance from top of page)
/// - `x1`: right edge
/// - `bottom`: bottom edge (distance from top of page)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BBox {
    /// Left edge.
    pub x0: f64,
    /// Top edge.
    pub top: f64,
    /// Right edge.
    pub x1: f64,
    /// Bottom edge.
    pub bottom: f64,
}

impl BBox {
    /// Create a bounding box from its four edges.
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    /// Width of the bounding box.
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    /// Height of the bounding box.
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Horizontal center of the bounding box.
    pub fn x_center(&self) -> f64 {
        (self.x0 + self.x1) / 2.0
    }

    /// Compute the union of two bounding boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Width of the horizontal overlap with `other`, or 0.0 when disjoint.
    pub fn x_overlap(&self, other: &BBox) -> f64 {
        (self.x1.min(other.x1) - self.x0.max(other.x0)).max(0.0)
    }

    /// True if the two boxes share any horizontal extent.
    pub fn intersects_x(&self, other: &BBox) -> bool {
        !(self.x1 <= other.x0 || other.x1 <= self.x0)
    }
}

/// Orientation of a rule-line segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    /// Running left-to-right.
    Horizontal,
    /// Running top-to-bottom.
    Vertical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_new() {
        let bbox = BBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(bbox.x0, 10.0);
        assert_eq!(bbox.top, 20.0);
        assert_eq!(bbox.x1, 30.0);
        assert_eq!(bbox.bottom, 40.0);
    }

    #[test]
    fn test_bbox_dimensions() {
        let bbox = BBox::new(10.0, 20.0, 50.0, 60.0);
        assert_eq!(bbox.width(), 40.0);
        assert_eq!(bbox.height(), 40.0);
        assert_eq!(bbox.x_center(), 30.0);
    }

    #[test]
    fn test_bbox_union() {
        let a = BBox::new(10.0, 20.0, 30.0, 40.0);
        let b = BBox::new(5.0, 25.0, 35.0, 45.0);
        let u = a.union(&b);
        assert_eq!(u.x0, 5.0);
        assert_eq!(u.top, 20.0);
        assert_eq!(u.x1, 35.0);
        assert_eq!(u.bottom, 45.0);
    }

    #[test]
    fn test_x_overlap_partial() {
        let a = BBox::new(0.0, 0.0, 20.0, 10.0);
        let b = BBox::new(10.0, 0.0, 30.0, 10.0);
        assert_eq!(a.x_overlap(&b), 10.0);
        assert_eq!(b.x_overlap(&a), 10.0);
    }

    #[test]
    fn test_x_overlap_disjoint() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, 0.0, 30.0, 10.0);
        assert_eq!(a.x_overlap(&b), 0.0);
        assert!(!a.intersects_x(&b));
    }

    #[test]
    fn test_intersects_x_touching_edges_do_not_count() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects_x(&b));
    }

    #[test]
    fn test_intersects_x_contained() {
        let outer = BBox::new(0.0, 0.0, 100.0, 10.0);
        let inner = BBox::new(40.0, 0.0, 60.0, 10.0);
        assert!(outer.intersects_x(&inner));
        assert_eq!(outer.x_overlap(&inner), 20.0);
    }
}
