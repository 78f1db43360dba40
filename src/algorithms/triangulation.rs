use tracing::error;

use crate::grids::grid::Grid;
use crate::storage::triangles::UGridTriangles;
use crate::utilities::geometry::{centroid, cross, distance_2d, Point};

///
/// Triangulate every 2D cell of `grid`. With `add_cell_centroids` each convex
/// cell is fanned around a node at its centroid; concave cells, and every cell
/// when `add_cell_centroids` is false, are ear-cut using only their own points.
///
pub fn triangulate<G: Grid>(grid: &G, add_cell_centroids: bool) -> UGridTriangles
{
    let points: Vec<Point> = (0..grid.number_of_points()).map(|i| grid.point(i)).collect();
    let mut triangles = UGridTriangles::new(points, grid.number_of_cells());
    for cell in 0..grid.number_of_cells()
    {
        triangles.begin_cell();
        let Some(polygon) = grid.cell_polygon(cell) else { continue };
        if add_cell_centroids && fan_around_centroid(&mut triangles, cell, &polygon)
        {
            continue;
        }
        if !ear_cut(&mut triangles, cell, &polygon)
        {
            error!("Unable to split cell {} into triangles.", cell);
        }
    }
    triangles.finish();
    triangles
}

///
/// Quality of the ear (a, b, c): perimeter squared over twice the area, lower
/// is better. `None` when the ear is inverted or has no area.
///
fn ear_ratio(points: &[Point], a: usize, b: usize, c: usize) -> Option<f64>
{
    let (pa, pb, pc) = (&points[a], &points[b], &points[c]);
    let area2 = cross(pa, pb, pc);
    if area2 <= 0.0
    {
        return None;
    }
    let perimeter = distance_2d(pa, pb) + distance_2d(pb, pc) + distance_2d(pa, pc);
    Some(perimeter * perimeter / area2)
}

/// True when no other point of the polygon lies strictly inside the ear.
fn is_empty_ear(points: &[Point], polygon: &[usize], a: usize, b: usize, c: usize) -> bool
{
    let (pa, pb, pc) = (&points[a], &points[b], &points[c]);
    polygon.iter().filter(|&&idx| idx != a && idx != b && idx != c).all(|&idx|
    {
        let p = &points[idx];
        !(cross(pa, pb, p) > 0.0 && cross(pb, pc, p) > 0.0 && cross(pc, pa, p) > 0.0)
    })
}

///
/// Repeatedly cut off the best ear of the polygon. When four points remain
/// the second best ear is used, which picks the better of the two diagonals.
/// Returns false if the polygon could not be split completely.
///
fn ear_cut(triangles: &mut UGridTriangles, cell: usize, polygon: &[usize]) -> bool
{
    let mut remaining = polygon.to_vec();
    while remaining.len() >= 4
    {
        let n = remaining.len();
        let mut best: Option<(usize, f64)> = None;
        let mut second: Option<(usize, f64)> = None;
        for i in 0..n
        {
            let a = remaining[(i + n - 1) % n];
            let b = remaining[i];
            let c = remaining[(i + 1) % n];
            let Some(ratio) = ear_ratio(triangles.points(), a, b, c) else { continue };
            if !is_empty_ear(triangles.points(), &remaining, a, b, c)
            {
                continue;
            }
            if best.map_or(true, |(_, r)| ratio < r)
            {
                second = best;
                best = Some((i, ratio));
            }
            else if second.map_or(true, |(_, r)| ratio < r)
            {
                second = Some((i, ratio));
            }
        }
        let Some((mut ear, _)) = best else { return false };
        if n == 4
        {
            if let Some((i, _)) = second
            {
                ear = i;
            }
        }
        let triangle = [remaining[(ear + n - 1) % n], remaining[ear], remaining[(ear + 1) % n]];
        triangles.add_cell_triangle(cell, triangle);
        remaining.remove(ear);
    }
    if remaining.len() == 3
    {
        triangles.add_cell_triangle(cell, [remaining[0], remaining[1], remaining[2]]);
    }
    true
}

///
/// Fan the polygon around its centroid. Fails, leaving `triangles` untouched,
/// unless the centroid lies strictly left of every edge.
///
fn fan_around_centroid(triangles: &mut UGridTriangles, cell: usize, polygon: &[usize]) -> bool
{
    let corners: Vec<Point> = polygon.iter().map(|&i| triangles.points()[i]).collect();
    let center = centroid(&corners);
    let n = corners.len();
    for i in 0..n
    {
        if cross(&corners[i], &corners[(i + 1) % n], &center) <= 0.0
        {
            return false;
        }
    }
    let node = triangles.add_cell_centroid(cell, center);
    for i in 0..n
    {
        triangles.add_cell_triangle(cell, [polygon[i], polygon[(i + 1) % n], node]);
    }
    true
}

#[test]
fn check_ear_cut_unit_square()
{
    use crate::grids::ugrid::UGrid;
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let grid = UGrid::new(points, &[9, 4, 0, 1, 2, 3]).unwrap();
    let triangles = triangulate(&grid, false);
    assert_eq!(triangles.triangles(), &[[0, 1, 2], [0, 2, 3]]);
    assert_eq!(triangles.points().len(), 4);
    assert_eq!(triangles.cell_triangles(0), 0..2);
    assert_eq!(triangles.cell_centroid(0), None);
}

#[test]
fn check_centroid_fan()
{
    use crate::grids::ugrid::UGrid;
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let grid = UGrid::new(points, &[9, 4, 0, 1, 2, 3, 5, 3, 1, 2, 3]).unwrap();
    let triangles = triangulate(&grid, true);
    assert_eq!(triangles.len(), 7);
    assert_eq!(triangles.cell_centroid(0), Some(4));
    assert_eq!(triangles.cell_centroid(1), Some(5));
    assert_eq!(triangles.centroid_cell(5), Some(1));
    assert_eq!(triangles.centroid_cell(2), None);
    assert_eq!(triangles.points()[4], [0.5, 0.5, 0.0]);
    assert_eq!(triangles.triangles()[0], [0, 1, 4]);
    assert_eq!(triangles.cell_triangles(1), 4..7);
    assert_eq!(triangles.triangle_cell(5), 1);
}

#[test]
fn check_concave_cell_falls_back_to_ear_cut()
{
    use crate::grids::ugrid::UGrid;
    // arrowhead whose centroid sits outside the notch
    let points = vec![[0.0, 0.0, 0.0], [4.0, 2.0, 0.0], [0.0, 4.0, 0.0], [3.5, 2.0, 0.0]];
    let grid = UGrid::new(points, &[7, 4, 0, 1, 2, 3]).unwrap();
    let triangles = triangulate(&grid, true);
    assert_eq!(triangles.cell_centroid(0), None);
    assert_eq!(triangles.len(), 2);
    for t in 0..triangles.len()
    {
        let [a, b, c] = triangles.triangle_points(t);
        assert!(cross(&a, &b, &c) > 0.0);
    }
}

#[test]
fn check_line_cells_are_skipped()
{
    use crate::grids::ugrid::UGrid;
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let grid = UGrid::new(points, &[3, 2, 0, 1, 5, 3, 0, 1, 2]).unwrap();
    let triangles = triangulate(&grid, false);
    assert_eq!(triangles.len(), 1);
    assert_eq!(triangles.cell_triangles(0), 0..0);
    assert_eq!(triangles.cell_triangles(1), 0..1);
    assert_eq!(triangles.triangle_cell(0), 1);
}
