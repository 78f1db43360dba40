use serde::{Deserialize, Serialize};

/// Grid and query coordinates. Z is carried along but never used for location.
pub type Point = [f64; 3];

///
/// Twice the signed area of the triangle (o, a, b). Positive when `b` lies to
/// the left of the directed line o->a.
///
#[inline]
pub fn cross(o: &Point, a: &Point, b: &Point) -> f64
{
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

#[inline]
pub fn distance_squared_2d(a: &Point, b: &Point) -> f64
{
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    dx * dx + dy * dy
}

#[inline]
pub fn distance_2d(a: &Point, b: &Point) -> f64
{
    distance_squared_2d(a, b).sqrt()
}

/// Point at parameter `t` on the segment a->b, Z included.
#[inline]
pub fn lerp(a: &Point, b: &Point, t: f64) -> Point
{
    if t == 0.0
    {
        return *a;
    }
    if t == 1.0
    {
        return *b;
    }
    [a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1]), a[2] + t * (b[2] - a[2])]
}

///
/// Signed area of a closed polygon (shoelace). Counter-clockwise loops are positive.
///
pub fn signed_area(points: &[Point]) -> f64
{
    let n = points.len();
    if n < 3
    {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n
    {
        let p = &points[i];
        let q = &points[(i + 1) % n];
        area += p[0] * q[1] - q[0] * p[1];
    }
    0.5 * area
}

/// Vertex average of a point loop.
pub fn centroid(points: &[Point]) -> Point
{
    let mut c = [0.0; 3];
    if points.is_empty()
    {
        return c;
    }
    for p in points
    {
        c[0] += p[0];
        c[1] += p[1];
        c[2] += p[2];
    }
    let n = points.len() as f64;
    [c[0] / n, c[1] / n, c[2] / n]
}

///
/// Axis aligned box in the XY plane.
///
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox
{
    pub lower: [f64; 2],
    pub upper: [f64; 2],
}

impl Default for BoundingBox
{
    #[inline]
    fn default() -> Self {
        Self { lower: [f64::INFINITY; 2], upper: [f64::NEG_INFINITY; 2] }
    }
}

impl BoundingBox
{
    #[inline]
    pub fn new(lower: [f64; 2], upper: [f64; 2]) -> Self
    {
        Self { lower, upper }
    }

    pub fn from_points<'a, I: IntoIterator<Item = &'a Point>>(points: I) -> Self
    {
        let mut bbox = Self::default();
        for p in points
        {
            bbox.expand(p);
        }
        bbox
    }

    #[inline]
    pub fn expand(&mut self, point: &Point)
    {
        for d in 0..2
        {
            self.lower[d] = self.lower[d].min(point[d]);
            self.upper[d] = self.upper[d].max(point[d]);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool
    {
        self.lower[0] > self.upper[0] || self.lower[1] > self.upper[1]
    }

    #[inline]
    pub fn width(&self, dim: usize) -> f64
    {
        self.upper[dim] - self.lower[dim]
    }

    #[inline]
    pub fn center(&self) -> [f64; 2]
    {
        [0.5 * (self.lower[0] + self.upper[0]), 0.5 * (self.lower[1] + self.upper[1])]
    }

    ///
    /// Largest distance from `point` to any corner of the box.
    ///
    pub fn max_distance_from(&self, point: &[f64; 2]) -> f64
    {
        let dx = (point[0] - self.lower[0]).abs().max((self.upper[0] - point[0]).abs());
        let dy = (point[1] - self.lower[1]).abs().max((self.upper[1] - point[1]).abs());
        (dx * dx + dy * dy).sqrt()
    }

    #[inline]
    pub fn contains(&self, point: &Point, tol: f64) -> bool
    {
        #[allow(clippy::needless_range_loop)]
        for d in 0..2
        {
            if self.lower[d] - tol > point[d] || self.upper[d] + tol < point[d]
            {
                return false;
            }
        }
        true
    }

    #[inline]
    pub fn intersects(&self, other: &BoundingBox, tol: f64) -> bool
    {
        for d in 0..2
        {
            if self.lower[d] - tol > other.upper[d] || other.lower[d] - tol > self.upper[d]
            {
                return false;
            }
        }
        true
    }

    ///
    /// Parameter range of the segment `start`-`end` inside the box grown by
    /// `tol`, or `None` when the segment misses it.
    ///
    pub fn clip_segment(&self, start: &Point, end: &Point, tol: f64) -> Option<(f64, f64)>
    {
        if self.is_empty()
        {
            return None;
        }
        let mut t0: f64 = 0.0;
        let mut t1: f64 = 1.0;
        for d in 0..2
        {
            let delta = end[d] - start[d];
            let lower = self.lower[d] - tol;
            let upper = self.upper[d] + tol;
            if delta == 0.0
            {
                if start[d] < lower || start[d] > upper
                {
                    return None;
                }
                continue;
            }
            let a = (lower - start[d]) / delta;
            let b = (upper - start[d]) / delta;
            t0 = t0.max(a.min(b));
            t1 = t1.min(a.max(b));
        }
        (t0 <= t1).then_some((t0, t1))
    }
}

///
/// Geometric tolerance used for point location and polyline breakpoints,
/// scaled to the extent of the grid so that large projected coordinates
/// behave the same as unit-sized test meshes.
///
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tolerance
{
    pub xy: f64,
}

impl Default for Tolerance
{
    fn default() -> Self {
        Self { xy: Self::RELATIVE }
    }
}

impl Tolerance
{
    pub const RELATIVE: f64 = 1e-9;

    pub fn from_extent(bbox: &BoundingBox) -> Self
    {
        if bbox.is_empty()
        {
            return Self::default();
        }
        let extent = bbox.width(0).max(bbox.width(1));
        if extent.is_finite() && extent > 0.0
        {
            Self { xy: Self::RELATIVE * extent }
        }
        else
        {
            Self::default()
        }
    }
}

#[test]
fn check_signed_area_orientation()
{
    let ccw = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    assert!((signed_area(&ccw) - 1.0).abs() < 1e-14);
    let mut cw = ccw;
    cw.reverse();
    assert!((signed_area(&cw) + 1.0).abs() < 1e-14);
    assert!(cross(&ccw[0], &ccw[1], &ccw[2]) > 0.0);
}

#[test]
fn check_bounding_box()
{
    let points = [[0.0, 0.0, 5.0], [2.0, 1.0, 0.0], [1.0, -1.0, 0.0]];
    let bbox = BoundingBox::from_points(points.iter());
    assert_eq!(bbox.lower, [0.0, -1.0]);
    assert_eq!(bbox.upper, [2.0, 1.0]);
    assert!(bbox.contains(&[2.0, 1.0, 0.0], 0.0));
    assert!(!bbox.contains(&[2.1, 1.0, 0.0], 0.0));
    assert!(bbox.contains(&[2.0 + 1e-10, 1.0, 0.0], 1e-9));
    let other = BoundingBox::new([2.0, 1.0], [3.0, 3.0]);
    assert!(bbox.intersects(&other, 0.0));
    assert!(!bbox.intersects(&BoundingBox::new([2.5, 0.0], [3.0, 1.0]), 0.0));
    assert!((bbox.max_distance_from(&[0.0, 0.0]) - 5.0f64.sqrt()).abs() < 1e-14);
    assert!(BoundingBox::default().is_empty());
}

#[test]
fn check_segment_clipped_to_box()
{
    let bbox = BoundingBox::new([0.0, 0.0], [2.0, 1.0]);
    let (t0, t1) = bbox.clip_segment(&[-2.0, 0.5, 0.0], &[4.0, 0.5, 0.0], 0.0).unwrap();
    assert!((t0 - 1.0 / 3.0).abs() < 1e-14);
    assert!((t1 - 2.0 / 3.0).abs() < 1e-14);
    assert_eq!(bbox.clip_segment(&[0.5, 0.5, 0.0], &[1.0, 0.5, 0.0], 0.0), Some((0.0, 1.0)));
    assert_eq!(bbox.clip_segment(&[-1.0, 2.0, 0.0], &[3.0, 2.0, 0.0], 0.0), None);
    assert_eq!(bbox.clip_segment(&[-1.0, -1.0, 0.0], &[-0.5, 3.0, 0.0], 0.0), None);
    // running along an edge
    assert_eq!(bbox.clip_segment(&[0.0, 1.0, 0.0], &[2.0, 1.0, 0.0], 1e-9), Some((0.0, 1.0)));
    assert_eq!(BoundingBox::default().clip_segment(&[0.0, 0.0, 0.0], &[1.0, 1.0, 0.0], 0.0), None);
}

#[test]
fn check_tolerance_scales_with_extent()
{
    let bbox = BoundingBox::new([3.9e6, 4.0e5], [3.9e6 + 18000.0, 4.0e5 + 9000.0]);
    let tol = Tolerance::from_extent(&bbox);
    assert!((tol.xy - 1.8e-5).abs() < 1e-12);
    assert_eq!(Tolerance::from_extent(&BoundingBox::default()).xy, Tolerance::RELATIVE);
}

#[test]
fn check_lerp_carries_z()
{
    let a = [0.0, 0.0, 1.0];
    let b = [2.0, 4.0, 3.0];
    let p = lerp(&a, &b, 0.5);
    assert_eq!(p, [1.0, 2.0, 2.0]);
    assert_eq!(lerp(&a, &b, 1.0), b);
}
