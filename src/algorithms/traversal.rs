use indexmap::IndexSet;
use tracing::warn;

use crate::algorithms::point_locator::PointLocator;
use crate::utilities::geometry::{distance_2d, lerp, Point};

/// Part of a segment, as parameters in [0, 1], lying inside one triangle.
#[derive(Copy, Clone, Debug, PartialEq)]
struct SegmentInterval
{
    triangle: usize,
    t_in: f64,
    t_out: f64,
}

///
/// Walks a polyline across the triangles of a [`PointLocator`] and produces
/// the locations at which data should be sampled: the polyline vertices plus
/// every point where a segment enters or leaves a triangle.
///
pub struct PolylineTraversal<'a>
{
    locator: &'a PointLocator,
}

impl<'a> PolylineTraversal<'a>
{
    pub fn new(locator: &'a PointLocator) -> Self
    {
        Self { locator }
    }

    ///
    /// Ordered sample locations along `polyline`. Locations closer than the
    /// grid tolerance are merged, so a vertex on a cell edge or two segments
    /// meeting on a boundary produce a single location.
    ///
    pub fn traverse(&self, polyline: &[Point]) -> Vec<Point>
    {
        let Some(first) = polyline.first() else
        {
            warn!("No points in polyline.");
            return Vec::new();
        };
        let tol = self.locator.tolerance().xy;
        let mut locations = vec![*first];
        for segment in polyline.windows(2)
        {
            for point in self.segment_breakpoints(&segment[0], &segment[1])
            {
                let is_new = locations.last().map_or(true, |last| !(distance_2d(last, &point) <= tol));
                if is_new
                {
                    locations.push(point);
                }
            }
        }
        locations
    }

    /// Cells the segment passes through, in the order they are entered.
    pub fn crossed_cells(&self, start: &Point, end: &Point) -> Vec<usize>
    {
        let length = distance_2d(start, end);
        if !(length > self.locator.tolerance().xy)
        {
            return Vec::new();
        }
        let eps = self.locator.tolerance().xy / length;
        let mut intervals: Vec<SegmentInterval> = self.segment_intervals(start, end, length)
            .into_iter()
            .filter(|iv| iv.t_out - iv.t_in > eps)
            .collect();
        intervals.sort_by(|a, b| a.t_in.total_cmp(&b.t_in).then(a.triangle.cmp(&b.triangle)));
        let triangles = self.locator.triangles();
        let cells: IndexSet<usize> = intervals.iter().map(|iv| triangles.triangle_cell(iv.triangle)).collect();
        cells.into_iter().collect()
    }

    fn segment_intervals(&self, start: &Point, end: &Point, length: f64) -> Vec<SegmentInterval>
    {
        self.locator.triangles_along_segment(start, end)
            .into_iter()
            .filter_map(|triangle| self.clip(triangle, start, end, length)
                .map(|(t_in, t_out)| SegmentInterval { triangle, t_in, t_out }))
            .collect()
    }

    ///
    /// Clip the segment against the three edges of a counter-clockwise
    /// triangle. A segment passing within the tolerance of the triangle
    /// touches it in a single parameter.
    ///
    fn clip(&self, triangle: usize, start: &Point, end: &Point, length: f64) -> Option<(f64, f64)>
    {
        let tol = self.locator.tolerance().xy;
        let corners = self.locator.triangles().triangle_points(triangle);
        let d = [end[0] - start[0], end[1] - start[1]];
        let mut t_lo: f64 = 0.0;
        let mut t_hi: f64 = 1.0;
        for i in 0..3
        {
            let a = &corners[i];
            let b = &corners[(i + 1) % 3];
            let e = [b[0] - a[0], b[1] - a[1]];
            let edge_length = e[0].hypot(e[1]);
            if edge_length == 0.0
            {
                return None;
            }
            // signed distance from the edge at the start, and its change over the segment
            let s0 = (e[0] * (start[1] - a[1]) - e[1] * (start[0] - a[0])) / edge_length;
            let ds = (e[0] * d[1] - e[1] * d[0]) / edge_length;
            if ds.abs() <= tol
            {
                if s0 < -tol
                {
                    return None;
                }
                continue;
            }
            let t = -s0 / ds;
            if ds > 0.0
            {
                t_lo = t_lo.max(t);
            }
            else
            {
                t_hi = t_hi.min(t);
            }
        }
        if (t_lo - t_hi) * length > tol
        {
            return None;
        }
        if t_lo > t_hi
        {
            let t = 0.5 * (t_lo + t_hi);
            return Some((t, t));
        }
        Some((t_lo, t_hi))
    }

    ///
    /// Start, end and every triangle entry/exit of one segment, sorted along
    /// the segment. A stretch off the grid between two points on the grid is
    /// represented by its midpoint.
    ///
    fn segment_breakpoints(&self, start: &Point, end: &Point) -> Vec<Point>
    {
        let tol = self.locator.tolerance().xy;
        let length = distance_2d(start, end);
        if !(length > tol)
        {
            return vec![*start, *end];
        }
        let eps = tol / length;
        let intervals = self.segment_intervals(start, end, length);
        let snap = |t: f64| if t <= eps { 0.0 } else if t >= 1.0 - eps { 1.0 } else { t };
        let mut params = vec![0.0, 1.0];
        for iv in &intervals
        {
            params.push(snap(iv.t_in));
            params.push(snap(iv.t_out));
        }
        params.sort_by(f64::total_cmp);

        let mut merged: Vec<f64> = Vec::with_capacity(params.len());
        for t in params
        {
            match merged.last()
            {
                Some(&last) if t - last <= eps => {},
                _ => merged.push(t),
            }
        }

        let on_grid = |t: f64| intervals.iter().any(|iv| iv.t_in - eps <= t && t <= iv.t_out + eps);
        let mut breakpoints = Vec::with_capacity(merged.len() + 1);
        for (i, &t) in merged.iter().enumerate()
        {
            if i > 0
            {
                let previous = merged[i - 1];
                let middle = 0.5 * (previous + t);
                if on_grid(previous) && on_grid(t) && !on_grid(middle)
                {
                    breakpoints.push(lerp(start, end, middle));
                }
            }
            breakpoints.push(lerp(start, end, t));
        }
        breakpoints
    }
}

#[cfg(test)]
fn unit_quad_locator() -> PointLocator
{
    use crate::algorithms::triangulation::triangulate;
    use crate::grids::grid::Grid;
    use crate::grids::ugrid::UGrid;
    use crate::utilities::geometry::Tolerance;
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let grid = UGrid::new(points, &[9, 4, 0, 1, 2, 3]).unwrap();
    PointLocator::new(triangulate(&grid, false), Tolerance::from_extent(&grid.bounding_box())).unwrap()
}

#[cfg(test)]
fn assert_locations(actual: &[Point], expected: &[[f64; 2]])
{
    assert_eq!(actual.len(), expected.len(), "{:?}", actual);
    for (a, e) in actual.iter().zip(expected)
    {
        assert!((a[0] - e[0]).abs() < 1e-9 && (a[1] - e[1]).abs() < 1e-9, "{:?} != {:?}", a, e);
    }
}

#[test]
fn check_segment_across_cell()
{
    let locator = unit_quad_locator();
    let traversal = PolylineTraversal::new(&locator);
    let locations = traversal.traverse(&[[-1.0, 0.5, 0.0], [2.0, 0.5, 0.0]]);
    assert_locations(&locations, &[[-1.0, 0.5], [0.0, 0.5], [0.5, 0.5], [1.0, 0.5], [2.0, 0.5]]);
}

#[test]
fn check_segment_inside_cell_crosses_diagonal()
{
    let locator = unit_quad_locator();
    let traversal = PolylineTraversal::new(&locator);
    let locations = traversal.traverse(&[[0.25, 0.5, 0.0], [0.75, 0.5, 0.0]]);
    assert_locations(&locations, &[[0.25, 0.5], [0.5, 0.5], [0.75, 0.5]]);
    // inside a single triangle only the endpoints remain
    let locations = traversal.traverse(&[[0.6, 0.2, 0.0], [0.9, 0.3, 0.0]]);
    assert_locations(&locations, &[[0.6, 0.2], [0.9, 0.3]]);
}

#[test]
fn check_segment_outside_and_touching()
{
    let locator = unit_quad_locator();
    let traversal = PolylineTraversal::new(&locator);
    let outside = traversal.traverse(&[[-0.5, 0.5, 0.0], [-0.25, 0.5, 0.0]]);
    assert_locations(&outside, &[[-0.5, 0.5], [-0.25, 0.5]]);
    let along_edge = traversal.traverse(&[[-0.5, 1.0, 0.0], [1.55, 1.0, 0.0]]);
    assert_locations(&along_edge, &[[-0.5, 1.0], [0.0, 1.0], [1.0, 1.0], [1.55, 1.0]]);
    let through_vertex = traversal.traverse(&[[-0.5, 0.5, 0.0], [0.0, 1.0, 0.0], [0.5, 1.5, 0.0]]);
    assert_locations(&through_vertex, &[[-0.5, 0.5], [0.0, 1.0], [0.5, 1.5]]);
}

#[test]
fn check_segments_sharing_vertex_and_z()
{
    let locator = unit_quad_locator();
    let traversal = PolylineTraversal::new(&locator);
    let locations = traversal.traverse(&[[-1.0, 0.5, 0.0], [0.5, 0.5, 3.0], [2.0, 0.5, 0.0]]);
    assert_locations(&locations, &[[-1.0, 0.5], [0.0, 0.5], [0.5, 0.5], [1.0, 0.5], [2.0, 0.5]]);
    assert!((locations[1][2] - 2.0).abs() < 1e-12);
    assert_eq!(locations[2][2], 3.0);
    assert!((locations[3][2] - 2.0).abs() < 1e-12);
}

#[test]
fn check_gap_between_regions_gets_midpoint()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::grids::grid::Grid;
    use crate::grids::ugrid::UGrid;
    use crate::utilities::geometry::Tolerance;
    let points = vec![
        [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
        [2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [3.0, 1.0, 0.0], [2.0, 1.0, 0.0],
    ];
    let grid = UGrid::new(points, &[9, 4, 0, 1, 2, 3, 9, 4, 4, 5, 6, 7]).unwrap();
    let locator = PointLocator::new(triangulate(&grid, false), Tolerance::from_extent(&grid.bounding_box())).unwrap();
    let traversal = PolylineTraversal::new(&locator);
    let locations = traversal.traverse(&[[-1.0, 0.5, 0.0], [2.5, 0.5, 0.0]]);
    assert_locations(&locations, &[[-1.0, 0.5], [0.0, 0.5], [0.5, 0.5], [1.0, 0.5], [1.5, 0.5], [2.0, 0.5], [2.5, 0.5]]);
    assert_eq!(traversal.crossed_cells(&[-1.0, 0.5, 0.0], &[2.5, 0.5, 0.0]), vec![0, 1]);
    assert_eq!(traversal.crossed_cells(&[2.5, 0.5, 0.0], &[-1.0, 0.5, 0.0]), vec![1, 0]);
}

#[test]
fn check_degenerate_polylines()
{
    let locator = unit_quad_locator();
    let traversal = PolylineTraversal::new(&locator);
    assert!(traversal.traverse(&[]).is_empty());
    assert_locations(&traversal.traverse(&[[0.5, 0.25, 0.0]]), &[[0.5, 0.25]]);
    assert_locations(&traversal.traverse(&[[0.5, 0.25, 0.0], [0.5, 0.25, 0.0]]), &[[0.5, 0.25]]);
}

#[test]
fn check_long_segment_over_many_cells()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::grids::grid::Grid;
    use crate::grids::ugrid::UGrid;
    use crate::utilities::geometry::Tolerance;
    let n = 40;
    let points: Vec<Point> = (0..=n).flat_map(|j| (0..=n).map(move |i| [i as f64, j as f64, 0.0])).collect();
    let mut cells = Vec::new();
    for j in 0..n
    {
        for i in 0..n
        {
            let p = (j * (n + 1) + i) as i64;
            cells.extend_from_slice(&[9, 4, p, p + 1, p + n as i64 + 2, p + n as i64 + 1]);
        }
    }
    let grid = UGrid::new(points, &cells).unwrap();
    let locator = PointLocator::new(triangulate(&grid, false), Tolerance::from_extent(&grid.bounding_box())).unwrap();
    let traversal = PolylineTraversal::new(&locator);
    let locations = traversal.traverse(&[[-5.0, 0.5, 0.0], [45.0, 0.5, 0.0]]);
    let mut expected = vec![[-5.0, 0.5]];
    expected.extend((0..=2 * n).map(|k| [0.5 * k as f64, 0.5]));
    expected.push([45.0, 0.5]);
    assert_locations(&locations, &expected);
    assert_eq!(traversal.crossed_cells(&[-5.0, 0.5, 0.0], &[45.0, 0.5, 0.0]), (0..n as usize).collect::<Vec<_>>());
}
