use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use rustc_hash::FxHashSet;

use crate::errors::GTError;
use crate::storage::triangles::UGridTriangles;
use crate::utilities::geometry::{cross, distance_2d, lerp, BoundingBox, Point, Tolerance};

///
/// A cell containing a query point together with the triangle of the cell
/// that matched and the barycentric weights of its three nodes.
///
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CellLocation
{
    pub cell: usize,
    pub triangle: usize,
    pub nodes: [usize; 3],
    pub weights: [f64; 3],
}

///
/// Finds the cells (through their triangles) that contain a point. Triangles
/// are indexed in a kd-tree by their centroids; a query collects every
/// triangle whose bounding box could reach the query box and then filters them
/// exactly.
///
pub struct PointLocator
{
    triangles: UGridTriangles,
    tree: KdTree<f64, usize, [f64; 2]>,
    boxes: Vec<BoundingBox>,
    bounds: BoundingBox,
    reach: f64,
    tolerance: Tolerance,
}

impl PointLocator
{
    pub fn new(triangles: UGridTriangles, tolerance: Tolerance) -> Result<Self, GTError>
    {
        let (tree, boxes, reach) = Self::build_kdtree(&triangles, tolerance).map_err(|_|GTError::KdTreeError)?;
        let mut bounds = BoundingBox::default();
        for (t, bbox) in boxes.iter().enumerate()
        {
            if !is_degenerate(&triangles.triangle_points(t), tolerance)
            {
                bounds.expand(&[bbox.lower[0], bbox.lower[1], 0.0]);
                bounds.expand(&[bbox.upper[0], bbox.upper[1], 0.0]);
            }
        }
        Ok(Self { triangles, tree, boxes, bounds, reach, tolerance })
    }

    ///
    /// Builds the kd-tree over the centroids of all non-degenerate triangles.
    /// Also returns each triangle's bounding box and the largest distance from
    /// a centroid to a corner of its box.
    ///
    fn build_kdtree(triangles: &UGridTriangles, tolerance: Tolerance) -> Result<(KdTree<f64, usize, [f64; 2]>, Vec<BoundingBox>, f64), kdtree::ErrorKind>
    {
        let mut tree = KdTree::new(2);
        let mut boxes = Vec::with_capacity(triangles.len());
        let mut reach: f64 = 0.0;
        for t in 0..triangles.len()
        {
            let corners = triangles.triangle_points(t);
            let bbox = BoundingBox::from_points(corners.iter());
            boxes.push(bbox);
            if is_degenerate(&corners, tolerance)
            {
                continue;
            }
            let center = [(corners[0][0] + corners[1][0] + corners[2][0]) / 3.0, (corners[0][1] + corners[1][1] + corners[2][1]) / 3.0];
            reach = reach.max(bbox.max_distance_from(&center));
            tree.add(center, t)?;
        }
        Ok((tree, boxes, reach))
    }

    #[inline]
    pub fn triangles(&self) -> &UGridTriangles
    {
        &self.triangles
    }

    #[inline]
    pub fn tolerance(&self) -> Tolerance
    {
        self.tolerance
    }

    /// Extent of the triangles that can be located.
    #[inline]
    pub fn bounds(&self) -> &BoundingBox
    {
        &self.bounds
    }

    ///
    /// Non-degenerate triangles whose bounding box touches `bbox`, in
    /// ascending order.
    ///
    pub fn triangles_in_box(&self, bbox: &BoundingBox) -> Vec<usize>
    {
        if self.tree.size() == 0 || bbox.is_empty()
        {
            return Vec::new();
        }
        let center = bbox.center();
        let radius = self.reach + bbox.max_distance_from(&center) + self.tolerance.xy;
        let found = match self.tree.within(&center, radius * radius, &squared_euclidean)
        {
            Ok(found) => found,
            Err(_) => return Vec::new(),
        };
        let mut hits: Vec<usize> = found.into_iter()
            .map(|(_, &t)| t)
            .filter(|&t| self.boxes[t].intersects(bbox, self.tolerance.xy))
            .collect();
        hits.sort_unstable();
        hits
    }

    ///
    /// Non-degenerate triangles whose bounding box touches the segment
    /// `start`-`end`, in ascending order. The part of the segment over the
    /// grid is split into pieces about the size of a triangle so each kd-tree
    /// query stays local.
    ///
    pub fn triangles_along_segment(&self, start: &Point, end: &Point) -> Vec<usize>
    {
        let tol = self.tolerance.xy;
        let Some((t0, t1)) = self.bounds.clip_segment(start, end, tol) else
        {
            return Vec::new();
        };
        let length = distance_2d(start, end) * (t1 - t0);
        let step = 2.0 * self.reach;
        let pieces = if step > 0.0 && length.is_finite()
        {
            ((length / step).ceil() as usize).clamp(1, self.boxes.len().max(1))
        }
        else
        {
            1
        };
        let mut found = FxHashSet::default();
        for k in 0..pieces
        {
            let a = t0 + (t1 - t0) * k as f64 / pieces as f64;
            let b = t0 + (t1 - t0) * (k + 1) as f64 / pieces as f64;
            let piece = BoundingBox::from_points([&lerp(start, end, a), &lerp(start, end, b)]);
            found.extend(self.triangles_in_box(&piece));
        }
        let mut hits: Vec<usize> = found.into_iter().collect();
        hits.sort_unstable();
        hits
    }

    ///
    /// Barycentric weights of `point` in `triangle`, or `None` when the point
    /// is further than the tolerance outside it. Weights are non-negative and
    /// sum to one; at a vertex they are exactly that vertex's unit vector.
    ///
    pub fn triangle_weights(&self, triangle: usize, point: &Point) -> Option<[f64; 3]>
    {
        let corners = self.triangles.triangle_points(triangle);
        if is_degenerate(&corners, self.tolerance)
        {
            return None;
        }
        let [a, b, c] = &corners;
        let raw = [cross(point, b, c), cross(point, c, a), cross(point, a, b)];
        let edges = [distance_2d(b, c), distance_2d(c, a), distance_2d(a, b)];
        for i in 0..3
        {
            if raw[i] < -self.tolerance.xy * edges[i]
            {
                return None;
            }
        }
        let clamped = [raw[0].max(0.0), raw[1].max(0.0), raw[2].max(0.0)];
        let sum = clamped[0] + clamped[1] + clamped[2];
        if !(sum > 0.0)
        {
            return None;
        }
        Some([clamped[0] / sum, clamped[1] / sum, clamped[2] / sum])
    }

    ///
    /// Every cell containing `point`, one entry per cell, ordered by the
    /// index of the matching triangle. Points outside the grid, or with
    /// non-finite coordinates, give an empty list.
    ///
    pub fn locate(&self, point: &Point) -> Vec<CellLocation>
    {
        if !point[0].is_finite() || !point[1].is_finite()
        {
            return Vec::new();
        }
        let bbox = BoundingBox::new([point[0], point[1]], [point[0], point[1]]);
        let mut seen = FxHashSet::default();
        let mut locations = Vec::new();
        for triangle in self.triangles_in_box(&bbox)
        {
            let cell = self.triangles.triangle_cell(triangle);
            if seen.contains(&cell)
            {
                continue;
            }
            if let Some(weights) = self.triangle_weights(triangle, point)
            {
                seen.insert(cell);
                locations.push(CellLocation { cell, triangle, nodes: self.triangles.triangles()[triangle], weights });
            }
        }
        locations
    }

    /// First cell containing `point`.
    pub fn locate_first(&self, point: &Point) -> Option<CellLocation>
    {
        self.locate(point).into_iter().next()
    }

    /// Locate a batch of points in parallel.
    pub fn locate_batch(&self, points: &[Point]) -> Vec<Vec<CellLocation>>
    {
        points.par_iter().map(|p| self.locate(p)).collect()
    }
}

/// A triangle whose height over its longest edge is within the tolerance.
#[inline]
fn is_degenerate(corners: &[Point; 3], tolerance: Tolerance) -> bool
{
    let [a, b, c] = corners;
    let area2 = cross(a, b, c);
    let longest = distance_2d(a, b).max(distance_2d(b, c)).max(distance_2d(c, a));
    !(area2 > tolerance.xy * longest)
}

#[cfg(test)]
fn two_triangle_locator() -> PointLocator
{
    use crate::algorithms::triangulation::triangulate;
    use crate::grids::grid::Grid;
    use crate::grids::ugrid::UGrid;
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let grid = UGrid::new(points, &[5, 3, 0, 1, 2, 5, 3, 2, 3, 0]).unwrap();
    PointLocator::new(triangulate(&grid, false), Tolerance::from_extent(&grid.bounding_box())).unwrap()
}

#[test]
fn check_locate_inside_and_outside()
{
    let locator = two_triangle_locator();
    let found = locator.locate(&[0.75, 0.25, 0.0]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].cell, 0);
    let sum: f64 = found[0].weights.iter().sum();
    assert!((sum - 1.0).abs() < 1e-14);
    assert!(found[0].weights.iter().all(|&w| w >= 0.0));
    assert!(locator.locate(&[-1.0, -1.0, 0.0]).is_empty());
    assert!(locator.locate(&[1.5, 0.5, 0.0]).is_empty());
    assert!(locator.locate(&[f64::NAN, 0.5, 0.0]).is_empty());
}

#[test]
fn check_locate_shared_edge_and_vertex()
{
    let locator = two_triangle_locator();
    // on the shared diagonal both cells match
    let found = locator.locate(&[0.5, 0.5, 0.0]);
    assert_eq!(found.iter().map(|l| l.cell).collect::<Vec<_>>(), vec![0, 1]);
    // at a vertex the weight vector is exact
    let found = locator.locate(&[1.0, 1.0, 0.0]);
    assert_eq!(found.len(), 2);
    for location in found
    {
        let vertex = location.nodes.iter().position(|&n| n == 2).unwrap();
        assert_eq!(location.weights[vertex], 1.0);
    }
    assert!(locator.locate_first(&[0.0, 1.0, 0.0]).is_some());
}

#[test]
fn check_boundary_tolerance()
{
    let locator = two_triangle_locator();
    assert_eq!(locator.locate(&[1.0 + 1e-12, 0.5, 0.0]).len(), 1);
    assert!(locator.locate(&[1.0 + 1e-6, 0.5, 0.0]).is_empty());
}

#[test]
fn check_degenerate_triangles_never_match()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::grids::ugrid::UGrid;
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
    let grid = UGrid::from_cells(points, vec![
        (crate::grids::grid::CellType::Triangle, vec![0, 1, 2]),
        (crate::grids::grid::CellType::Triangle, vec![0, 2, 3]),
    ]).unwrap();
    let locator = PointLocator::new(triangulate(&grid, false), Tolerance::default()).unwrap();
    let found = locator.locate(&[1.0, 0.0, 0.0]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].cell, 1);
}

#[test]
fn check_locate_batch_matches_sequential()
{
    let locator = two_triangle_locator();
    let points = vec![[0.1, 0.2, 0.0], [0.9, 0.3, 0.0], [3.0, 3.0, 0.0]];
    let batch = locator.locate_batch(&points);
    for (p, found) in points.iter().zip(&batch)
    {
        assert_eq!(&locator.locate(p), found);
    }
}

#[test]
fn check_segment_query_stays_local()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::grids::grid::Grid;
    use crate::grids::ugrid::UGrid;
    let n = 40;
    let mut points = Vec::new();
    for j in 0..=n
    {
        for i in 0..=n
        {
            points.push([i as f64, j as f64, 0.0]);
        }
    }
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
    let start = [-5.0, -5.0, 0.0];
    let end = [45.0, 45.0, 0.0];
    let hits = locator.triangles_along_segment(&start, &end);
    assert!(hits.len() < locator.triangles().len() / 4, "{} of {}", hits.len(), locator.triangles().len());
    assert!(hits.windows(2).all(|w| w[0] < w[1]));
    for k in 0..=500
    {
        let p = lerp(&start, &end, k as f64 / 500.0);
        for location in locator.locate(&p)
        {
            assert!(hits.binary_search(&location.triangle).is_ok(), "{:?}", p);
        }
    }
    assert!(locator.triangles_along_segment(&[-5.0, 50.0, 0.0], &[45.0, 50.0, 0.0]).is_empty());
}
