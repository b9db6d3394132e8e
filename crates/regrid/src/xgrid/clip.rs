//! Polygon clipping in (lon, lat) space.

use mosaic_grid::LonLat;

/// Points within this distance of a clip edge count as inside.
const INSIDE_TOLERANCE: f64 = 1.0e-12;

/// Below this determinant two segments are treated as parallel.
const PARALLEL_EPSILON: f64 = 1.0e-30;

/// Whether `p` lies to the left of (or on) the directed edge `a -> b`.
#[inline]
fn inside_edge(a: LonLat, b: LonLat, p: LonLat) -> bool {
    let product = (p.lon - a.lon) * (b.lat - a.lat) + (a.lon - b.lon) * (p.lat - a.lat);
    product <= INSIDE_TOLERANCE
}

/// Intersection of the line through `p0, p1` with the line through `a, b`.
#[inline]
fn intersect(p0: LonLat, p1: LonLat, a: LonLat, b: LonLat) -> LonLat {
    let dy1 = p1.lat - p0.lat;
    let dy2 = b.lat - a.lat;
    let dx1 = p1.lon - p0.lon;
    let dx2 = b.lon - a.lon;
    let ds1 = p0.lat * p1.lon - p1.lat * p0.lon;
    let ds2 = a.lat * b.lon - b.lat * a.lon;
    let determ = dy2 * dx1 - dy1 * dx2;
    if determ.abs() < PARALLEL_EPSILON {
        // The segment runs along the clip edge within tolerance.
        return p1;
    }
    LonLat::new((dx2 * ds1 - dx1 * ds2) / determ, (dy2 * ds1 - dy1 * ds2) / determ)
}

/// Clip `subject` against the convex, counter-clockwise polygon `clip`
/// (Sutherland–Hodgman).
///
/// Returns an empty polygon when they do not overlap.
pub fn clip_polygon(subject: &[LonLat], clip: &[LonLat]) -> Vec<LonLat> {
    let mut current: Vec<LonLat> = subject.to_vec();
    let mut next: Vec<LonLat> = Vec::with_capacity(subject.len() + clip.len());

    let Some(&last_clip) = clip.last() else {
        return Vec::new();
    };
    let mut a = last_clip;
    for &b in clip {
        let Some(&last) = current.last() else {
            return Vec::new();
        };
        next.clear();
        let mut p0 = last;
        let mut inside_last = inside_edge(a, b, p0);
        for &p1 in &current {
            let inside = inside_edge(a, b, p1);
            if inside != inside_last {
                next.push(intersect(p0, p1, a, b));
            }
            if inside {
                next.push(p1);
            }
            inside_last = inside;
            p0 = p1;
        }
        if next.is_empty() {
            return Vec::new();
        }
        std::mem::swap(&mut current, &mut next);
        a = b;
    }
    current
}
