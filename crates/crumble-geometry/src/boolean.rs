//! Polygon boolean adapter
//!
//! Thin layer over `geo`'s boolean operations. Terrain geometry is `f32`
//! glam points; the boolean engine runs in `f64` and results are converted
//! back, re-wound to terrain orientation (clockwise outer, counter-clockwise
//! holes), and stripped of slivers.

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use glam::{Affine2, Vec2};

use crate::{Contour, Winding};

/// Result polygons with less area than this are discarded.
pub const SLIVER_AREA: f32 = 1e-3;

/// A simply connected polygon with holes.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonWithHoles {
    pub outer: Contour,
    pub holes: Vec<Contour>,
}

impl PolygonWithHoles {
    pub fn new(outer: Contour, holes: Vec<Contour>) -> Self {
        Self { outer, holes }
    }

    /// Outer area minus hole areas.
    pub fn area(&self) -> f32 {
        self.outer.area() - self.holes.iter().map(Contour::area).sum::<f32>()
    }

    pub fn transformed(&self, transform: &Affine2) -> Self {
        Self {
            outer: self.outer.transformed(transform),
            holes: self.holes.iter().map(|h| h.transformed(transform)).collect(),
        }
    }

    /// Re-wind to terrain orientation.
    pub fn normalized(mut self) -> Self {
        self.outer.set_winding(Winding::Clockwise);
        for hole in &mut self.holes {
            hole.set_winding(Winding::CounterClockwise);
        }
        self
    }
}

impl From<Contour> for PolygonWithHoles {
    fn from(outer: Contour) -> Self {
        Self::new(outer, Vec::new())
    }
}

/// `subject - cutter`. An empty result means either full removal or a
/// degenerate operation; callers decide which.
pub fn subtract(subject: &PolygonWithHoles, cutter: &Contour) -> Vec<PolygonWithHoles> {
    difference(subject, &PolygonWithHoles::from(cutter.clone()))
}

/// `subject - cutter` for a cutter with holes. Subject material inside the
/// cutter's holes survives as separate polygons.
pub fn difference(
    subject: &PolygonWithHoles,
    cutter: &PolygonWithHoles,
) -> Vec<PolygonWithHoles> {
    if !subject.outer.is_valid() || !cutter.outer.is_valid() {
        return Vec::new();
    }
    let result = to_geo(subject).difference(&to_geo(cutter));
    from_geo_multi(&result)
}

/// `subject ∩ cutter`
pub fn intersection(
    subject: &PolygonWithHoles,
    cutter: &PolygonWithHoles,
) -> Vec<PolygonWithHoles> {
    if !subject.outer.is_valid() || !cutter.outer.is_valid() {
        return Vec::new();
    }
    let result = to_geo(subject).intersection(&to_geo(cutter));
    from_geo_multi(&result)
}

/// Union of all input contours.
pub fn union_all(contours: &[Contour]) -> Vec<PolygonWithHoles> {
    let mut acc: MultiPolygon<f64> = MultiPolygon::new(Vec::new());
    for contour in contours.iter().filter(|c| c.is_valid()) {
        let next = MultiPolygon::new(vec![contour_to_geo(contour)]);
        acc = if acc.0.is_empty() { next } else { acc.union(&next) };
    }
    from_geo_multi(&acc)
}

fn to_line_string(contour: &Contour) -> LineString<f64> {
    LineString::new(
        contour
            .points()
            .iter()
            .map(|p| Coord {
                x: p.x as f64,
                y: p.y as f64,
            })
            .collect(),
    )
}

fn contour_to_geo(contour: &Contour) -> Polygon<f64> {
    Polygon::new(to_line_string(contour), Vec::new())
}

fn to_geo(polygon: &PolygonWithHoles) -> Polygon<f64> {
    Polygon::new(
        to_line_string(&polygon.outer),
        polygon.holes.iter().map(to_line_string).collect(),
    )
}

fn from_line_string(ring: &LineString<f64>) -> Contour {
    Contour::new(
        ring.coords()
            .map(|c| Vec2::new(c.x as f32, c.y as f32))
            .collect(),
    )
}

fn from_geo_multi(multi: &MultiPolygon<f64>) -> Vec<PolygonWithHoles> {
    multi
        .0
        .iter()
        .filter_map(|poly| {
            let outer = from_line_string(poly.exterior());
            if !outer.is_valid() {
                return None;
            }
            let holes = poly
                .interiors()
                .iter()
                .map(from_line_string)
                .filter(|h| h.is_valid() && h.area() > SLIVER_AREA)
                .collect();
            let polygon = PolygonWithHoles::new(outer, holes).normalized();
            (polygon.area() > SLIVER_AREA).then_some(polygon)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Contour {
        Contour::rect(Vec2::new(x0, y0), Vec2::new(x1, y1))
    }

    #[test]
    fn test_subtract_half() {
        let subject = PolygonWithHoles::new(rect(0.0, 0.0, 10.0, 10.0), Vec::new());
        let result = subtract(&subject, &rect(5.0, -1.0, 11.0, 11.0));
        assert_eq!(result.len(), 1);
        assert!((result[0].area() - 50.0).abs() < 1e-2);
        assert_eq!(result[0].outer.winding(), Winding::Clockwise);
    }

    #[test]
    fn test_subtract_splits_in_two() {
        let subject = PolygonWithHoles::new(rect(0.0, 0.0, 30.0, 10.0), Vec::new());
        let result = subtract(&subject, &rect(10.0, -1.0, 20.0, 11.0));
        assert_eq!(result.len(), 2);
        let total: f32 = result.iter().map(PolygonWithHoles::area).sum();
        assert!((total - 200.0).abs() < 1e-2);
    }

    #[test]
    fn test_subtract_interior_creates_hole() {
        let subject = PolygonWithHoles::new(rect(0.0, 0.0, 10.0, 10.0), Vec::new());
        let result = subtract(&subject, &rect(4.0, 4.0, 6.0, 6.0));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].holes.len(), 1);
        assert_eq!(result[0].holes[0].winding(), Winding::CounterClockwise);
        assert!((result[0].area() - 96.0).abs() < 1e-2);
    }

    #[test]
    fn test_subtract_everything_is_empty() {
        let subject = PolygonWithHoles::new(rect(0.0, 0.0, 1.0, 1.0), Vec::new());
        let result = subtract(&subject, &rect(-5.0, -5.0, 5.0, 5.0));
        assert!(result.is_empty());
    }

    #[test]
    fn test_subtract_disjoint_keeps_subject() {
        let subject = PolygonWithHoles::new(rect(0.0, 0.0, 1.0, 1.0), Vec::new());
        let result = subtract(&subject, &rect(5.0, 5.0, 6.0, 6.0));
        assert_eq!(result.len(), 1);
        assert!((result[0].area() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_difference_keeps_material_inside_cutter_holes() {
        let subject = PolygonWithHoles::new(rect(0.0, 0.0, 20.0, 20.0), Vec::new());
        let ring = PolygonWithHoles::new(rect(4.0, 4.0, 16.0, 16.0), vec![rect(6.0, 6.0, 14.0, 14.0)]);
        let result = difference(&subject, &ring);
        assert_eq!(result.len(), 2);
        let total: f32 = result.iter().map(PolygonWithHoles::area).sum();
        assert!((total - (400.0 - 144.0 + 64.0)).abs() < 1e-2);
        assert!(result.iter().any(|p| (p.area() - 64.0).abs() < 1e-2 && p.holes.is_empty()));
    }

    #[test]
    fn test_intersection_of_flush_rects() {
        let subject = PolygonWithHoles::new(rect(0.0, 0.0, 4.0, 4.0), Vec::new());
        let cutter = PolygonWithHoles::from(rect(0.0, -1.0, 4.0, 5.0));
        let result = intersection(&subject, &cutter);
        let area: f32 = result.iter().map(PolygonWithHoles::area).sum();
        assert!((area - 16.0).abs() < 1e-3);
    }

    #[test]
    fn test_union_overlapping() {
        let result = union_all(&[rect(0.0, 0.0, 2.0, 1.0), rect(1.0, 0.0, 3.0, 1.0)]);
        assert_eq!(result.len(), 1);
        assert!((result[0].area() - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_union_disjoint() {
        let result = union_all(&[rect(0.0, 0.0, 1.0, 1.0), rect(5.0, 0.0, 6.0, 1.0)]);
        assert_eq!(result.len(), 2);
    }
}
