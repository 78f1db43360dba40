use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::utilities::geometry::Point;

///
/// Triangles covering the 2D cells of a grid. Nodes `0..number_of_grid_points()`
/// are the grid points; any further nodes are cell centroids. The triangles of
/// one cell are stored contiguously and always wind counter-clockwise.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UGridTriangles
{
    points: Vec<Point>,
    triangles: Vec<[usize; 3]>,
    triangle_cells: Vec<usize>,
    cell_offsets: Vec<usize>,
    cell_centroids: Vec<Option<usize>>,
    centroid_cells: Vec<usize>,
    grid_point_count: usize,
}

impl UGridTriangles
{
    pub(crate) fn new(points: Vec<Point>, number_of_cells: usize) -> Self
    {
        let grid_point_count = points.len();
        Self
        {
            points,
            triangles: Vec::new(),
            triangle_cells: Vec::new(),
            cell_offsets: Vec::with_capacity(number_of_cells + 1),
            cell_centroids: vec![None; number_of_cells],
            centroid_cells: Vec::new(),
            grid_point_count,
        }
    }

    pub(crate) fn add_cell_centroid(&mut self, cell: usize, centroid: Point) -> usize
    {
        let node = self.points.len();
        self.points.push(centroid);
        self.cell_centroids[cell] = Some(node);
        self.centroid_cells.push(cell);
        node
    }

    pub(crate) fn add_cell_triangle(&mut self, cell: usize, triangle: [usize; 3])
    {
        self.triangles.push(triangle);
        self.triangle_cells.push(cell);
    }

    /// Marks where the triangles of the next cell begin.
    pub(crate) fn begin_cell(&mut self)
    {
        self.cell_offsets.push(self.triangles.len());
    }

    pub(crate) fn finish(&mut self)
    {
        self.cell_offsets.push(self.triangles.len());
    }

    #[inline]
    pub fn points(&self) -> &[Point]
    {
        &self.points
    }

    #[inline]
    pub fn triangles(&self) -> &[[usize; 3]]
    {
        &self.triangles
    }

    #[inline]
    pub fn len(&self) -> usize
    {
        self.triangles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool
    {
        self.triangles.is_empty()
    }

    #[inline]
    pub fn number_of_grid_points(&self) -> usize
    {
        self.grid_point_count
    }

    #[inline]
    pub fn number_of_cells(&self) -> usize
    {
        self.cell_centroids.len()
    }

    /// Cell the triangle was cut from.
    #[inline]
    pub fn triangle_cell(&self, triangle: usize) -> usize
    {
        self.triangle_cells[triangle]
    }

    /// Triangle indices belonging to `cell`.
    pub fn cell_triangles(&self, cell: usize) -> Range<usize>
    {
        match (self.cell_offsets.get(cell), self.cell_offsets.get(cell + 1))
        {
            (Some(&start), Some(&end)) => start..end,
            _ => 0..0,
        }
    }

    /// Node index of the centroid added for `cell`, if the cell was fanned.
    #[inline]
    pub fn cell_centroid(&self, cell: usize) -> Option<usize>
    {
        self.cell_centroids.get(cell).copied().flatten()
    }

    /// Cell owning a centroid node. `None` for grid point nodes.
    #[inline]
    pub fn centroid_cell(&self, node: usize) -> Option<usize>
    {
        node.checked_sub(self.grid_point_count).and_then(|i| self.centroid_cells.get(i).copied())
    }

    #[inline]
    pub fn triangle_points(&self, triangle: usize) -> [Point; 3]
    {
        let [a, b, c] = self.triangles[triangle];
        [self.points[a], self.points[b], self.points[c]]
    }
}
