use tracing::debug;

use crate::algorithms::point_locator::CellLocation;
use crate::grids::grid::Grid;
use crate::storage::scalar_field::{DataLocation, ScalarField};
use crate::storage::triangles::UGridTriangles;
use crate::utilities::geometry::{centroid, distance_squared_2d, Point};

///
/// Values of one [`ScalarField`] resolved onto the nodes of a triangulation.
/// Built once per field; interpolation is then a weighted sum over the three
/// nodes of the matched triangle, gated by the activity of its cell.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellInterpolator
{
    cell_active: Vec<bool>,
    node_values: Vec<Option<f64>>,
}

impl CellInterpolator
{
    pub fn new<G: Grid>(grid: &G, point_cells: &[Vec<usize>], triangles: &UGridTriangles, field: &ScalarField, use_idw: bool) -> Self
    {
        let cell_active = cell_activity(grid, point_cells, field);
        let node_values = match field.location()
        {
            DataLocation::Points => nodes_from_points(triangles, field),
            DataLocation::Cells => nodes_from_cells(grid, point_cells, triangles, field, &cell_active, use_idw),
        };
        Self { cell_active, node_values }
    }

    #[inline]
    pub fn is_cell_active(&self, cell: usize) -> bool
    {
        self.cell_active.get(cell).copied().unwrap_or(false)
    }

    #[inline]
    pub fn node_value(&self, node: usize) -> Option<f64>
    {
        self.node_values.get(node).copied().flatten()
    }

    /// Value at a located point, `None` when the cell or one of its nodes has no data.
    pub fn interpolate(&self, location: &CellLocation) -> Option<f64>
    {
        if !self.is_cell_active(location.cell)
        {
            return None;
        }
        let mut value = 0.0;
        for (node, weight) in location.nodes.iter().zip(location.weights)
        {
            value += weight * self.node_value(*node)?;
        }
        Some(value)
    }
}

///
/// A cell is active when its activity flag allows it (directly, or through
/// all of its points) and it has data: every point value for point data, its
/// own value for cell data.
///
fn cell_activity<G: Grid>(grid: &G, point_cells: &[Vec<usize>], field: &ScalarField) -> Vec<bool>
{
    let number_of_cells = grid.number_of_cells();
    let mut active = vec![true; number_of_cells];
    let mask = field.activity();
    if !mask.is_empty()
    {
        let expected = match mask.location()
        {
            DataLocation::Points => grid.number_of_points(),
            DataLocation::Cells => number_of_cells,
        };
        if mask.len() != expected
        {
            debug!("Activity array has {} entries, grid has {}; missing entries are inactive.", mask.len(), expected);
        }
        match mask.location()
        {
            DataLocation::Points =>
            {
                for (point, cells) in point_cells.iter().enumerate()
                {
                    if !mask.is_active(point)
                    {
                        cells.iter().for_each(|&c| active[c] = false);
                    }
                }
            }
            DataLocation::Cells =>
            {
                for (cell, flag) in active.iter_mut().enumerate()
                {
                    *flag = mask.is_active(cell);
                }
            }
        }
    }
    match field.location()
    {
        DataLocation::Points =>
        {
            if field.values().len() != grid.number_of_points()
            {
                debug!("Point scalars have {} values, grid has {} points.", field.values().len(), grid.number_of_points());
            }
            for (point, cells) in point_cells.iter().enumerate()
            {
                if field.value(point).is_none()
                {
                    cells.iter().for_each(|&c| active[c] = false);
                }
            }
        }
        DataLocation::Cells =>
        {
            if field.values().len() != number_of_cells
            {
                debug!("Cell scalars have {} values, grid has {} cells.", field.values().len(), number_of_cells);
            }
            for (cell, flag) in active.iter_mut().enumerate()
            {
                if field.value(cell).is_none()
                {
                    *flag = false;
                }
            }
        }
    }
    active
}

///
/// Point data is located on the ear-cut triangulation, whose nodes are the
/// grid points. Centroid nodes carry no value.
///
fn nodes_from_points(triangles: &UGridTriangles, field: &ScalarField) -> Vec<Option<f64>>
{
    (0..triangles.number_of_grid_points()).map(|p| field.value(p)).collect()
}

fn nodes_from_cells<G: Grid>(grid: &G, point_cells: &[Vec<usize>], triangles: &UGridTriangles, field: &ScalarField,
    cell_active: &[bool], use_idw: bool) -> Vec<Option<f64>>
{
    let centroids: Vec<Point> = if use_idw
    {
        (0..grid.number_of_cells()).map(|cell|
        {
            let corners: Vec<Point> = grid.cell_points(cell).iter().map(|&p| grid.point(p)).collect();
            centroid(&corners)
        }).collect()
    }
    else
    {
        Vec::new()
    };
    let mut values = Vec::with_capacity(triangles.points().len());
    for (point, cells) in point_cells.iter().enumerate()
    {
        let contributing = cells.iter().copied().filter(|&c| cell_active[c]);
        let value = if use_idw
        {
            inverse_distance_value(&grid.point(point), contributing, &centroids, field)
        }
        else
        {
            average_value(contributing, field)
        };
        values.push(value);
    }
    for node in triangles.number_of_grid_points()..triangles.points().len()
    {
        values.push(triangles.centroid_cell(node).and_then(|cell| field.value(cell)));
    }
    values
}

fn average_value<I: Iterator<Item = usize>>(cells: I, field: &ScalarField) -> Option<f64>
{
    let mut sum = 0.0;
    let mut count = 0;
    for cell in cells
    {
        if let Some(value) = field.value(cell)
        {
            sum += value;
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

///
/// Inverse squared distance weighting of cell values by the distance from
/// `point` to each cell centroid. A centroid coinciding with the point
/// supplies its value directly.
///
fn inverse_distance_value<I: Iterator<Item = usize>>(point: &Point, cells: I, centroids: &[Point], field: &ScalarField) -> Option<f64>
{
    let mut weighted = 0.0;
    let mut total = 0.0;
    for cell in cells
    {
        let Some(value) = field.value(cell) else { continue };
        let d2 = distance_squared_2d(point, &centroids[cell]);
        if d2 == 0.0
        {
            return Some(value);
        }
        weighted += value / d2;
        total += 1.0 / d2;
    }
    (total > 0.0).then(|| weighted / total)
}

#[cfg(test)]
fn unit_square_grid() -> crate::grids::ugrid::UGrid
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    crate::grids::ugrid::UGrid::new(points, &[5, 3, 0, 1, 2, 5, 3, 2, 3, 0]).unwrap()
}

#[test]
fn check_point_data_interpolation()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::storage::scalar_field::ActivityMask;
    let grid = unit_square_grid();
    let triangles = triangulate(&grid, false);
    let field = ScalarField::new(DataLocation::Points, &[1.0, 2.0, 3.0, 2.0], ActivityMask::all_active());
    let interpolator = CellInterpolator::new(&grid, &grid.point_cells(), &triangles, &field, false);
    let location = CellLocation { cell: 0, triangle: 0, nodes: [0, 1, 2], weights: [0.25, 0.25, 0.5] };
    assert!((interpolator.interpolate(&location).unwrap() - 2.25).abs() < 1e-12);
    let vertex = CellLocation { cell: 1, triangle: 1, nodes: [2, 3, 0], weights: [0.0, 1.0, 0.0] };
    assert_eq!(interpolator.interpolate(&vertex), Some(2.0));
}

#[test]
fn check_point_activity_invalidates_touching_cells()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::storage::scalar_field::ActivityMask;
    let grid = unit_square_grid();
    let triangles = triangulate(&grid, false);
    let activity = ActivityMask::new(vec![true, false, true, true], DataLocation::Points);
    let field = ScalarField::new(DataLocation::Points, &[1.0, 2.0, 3.0, 2.0], activity);
    let interpolator = CellInterpolator::new(&grid, &grid.point_cells(), &triangles, &field, false);
    assert!(!interpolator.is_cell_active(0));
    assert!(interpolator.is_cell_active(1));
}

#[test]
fn check_point_data_has_no_centroid_values()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::storage::scalar_field::ActivityMask;
    let grid = unit_square_grid();
    let triangles = triangulate(&grid, true);
    let field = ScalarField::new(DataLocation::Points, &[1.0, 2.0, 3.0, 2.0], ActivityMask::all_active());
    let interpolator = CellInterpolator::new(&grid, &grid.point_cells(), &triangles, &field, false);
    assert_eq!(interpolator.node_value(2), Some(3.0));
    let centroid = triangles.cell_centroid(0).unwrap();
    assert_eq!(interpolator.node_value(centroid), None);
    let location = CellLocation { cell: 0, triangle: 0, nodes: [centroid, 0, 1], weights: [0.2, 0.4, 0.4] };
    assert_eq!(interpolator.interpolate(&location), None);
}

#[test]
fn check_short_arrays_are_inactive()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::storage::scalar_field::ActivityMask;
    let grid = unit_square_grid();
    let triangles = triangulate(&grid, true);
    // second cell has no value
    let field = ScalarField::new(DataLocation::Cells, &[1.0], ActivityMask::all_active());
    let interpolator = CellInterpolator::new(&grid, &grid.point_cells(), &triangles, &field, false);
    assert!(interpolator.is_cell_active(0));
    assert!(!interpolator.is_cell_active(1));
    assert_eq!(interpolator.node_value(3), None);
    assert_eq!(interpolator.node_value(0), Some(1.0));
    // short activity array
    let field = ScalarField::new(DataLocation::Cells, &[1.0, 2.0], ActivityMask::new(vec![true], DataLocation::Cells));
    let interpolator = CellInterpolator::new(&grid, &grid.point_cells(), &triangles, &field, false);
    assert!(!interpolator.is_cell_active(1));
}

#[test]
fn check_cell_data_node_values()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::storage::scalar_field::ActivityMask;
    let grid = unit_square_grid();
    let triangles = triangulate(&grid, true);
    let field = ScalarField::new(DataLocation::Cells, &[1.0, 2.0], ActivityMask::all_active());
    let interpolator = CellInterpolator::new(&grid, &grid.point_cells(), &triangles, &field, false);
    assert_eq!(interpolator.node_value(0), Some(1.5));
    assert_eq!(interpolator.node_value(1), Some(1.0));
    assert_eq!(interpolator.node_value(3), Some(2.0));
    let centroid = triangles.cell_centroid(1).unwrap();
    assert_eq!(interpolator.node_value(centroid), Some(2.0));
}

#[test]
fn check_idw_weights_by_centroid_distance()
{
    use crate::algorithms::triangulation::triangulate;
    use crate::grids::ugrid::UGrid;
    use crate::storage::scalar_field::ActivityMask;
    // narrow cell on the left, wide cell on the right
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [3.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [3.0, 1.0, 0.0]];
    let grid = UGrid::new(points, &[9, 4, 0, 1, 4, 3, 9, 4, 1, 2, 5, 4]).unwrap();
    let triangles = triangulate(&grid, true);
    let field = ScalarField::new(DataLocation::Cells, &[1.0, 2.0], ActivityMask::all_active());
    let average = CellInterpolator::new(&grid, &grid.point_cells(), &triangles, &field, false);
    let idw = CellInterpolator::new(&grid, &grid.point_cells(), &triangles, &field, true);
    assert_eq!(average.node_value(1), Some(1.5));
    // weights 1/0.5 and 1/1.25
    let expected = (2.0 * 1.0 + 0.8 * 2.0) / 2.8;
    assert!((idw.node_value(1).unwrap() - expected).abs() < 1e-12);
    // an inactive neighbor is left out
    let field = ScalarField::new(DataLocation::Cells, &[1.0, 2.0], ActivityMask::new(vec![true, false], DataLocation::Cells));
    let idw = CellInterpolator::new(&grid, &grid.point_cells(), &triangles, &field, true);
    assert_eq!(idw.node_value(1), Some(1.0));
    assert_eq!(idw.node_value(2), None);
}
