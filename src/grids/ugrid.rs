use serde::{Deserialize, Serialize};

use crate::errors::GTError;
use crate::grids::grid::{CellType, Grid};
use crate::serialization::{from_compressed_bytes, to_compressed_bytes};
use crate::utilities::geometry::Point;

///
/// Unstructured grid of points and cells. Cells are stored back to back in
/// `cell_indices` with `cell_offsets` marking where each one starts.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UGrid
{
    points: Vec<Point>,
    cell_types: Vec<CellType>,
    cell_offsets: Vec<usize>,
    cell_indices: Vec<usize>,
}

impl UGrid
{
    ///
    /// Build a grid from a flat cell stream of `[type, count, i0, i1, ...]`
    /// entries, where `type` is a VTK cell code (triangle 5, quad 9, pixel 8,
    /// polygon 7, line 3, polyline 4).
    ///
    pub fn new(points: Vec<Point>, cell_stream: &[i64]) -> Result<Self, GTError>
    {
        let mut grid = Self::with_points(points)?;
        let mut pos = 0;
        while pos < cell_stream.len()
        {
            let cell_type = CellType::from_code(cell_stream[pos]).ok_or(GTError::UnknownCellType)?;
            let count = *cell_stream.get(pos + 1).ok_or(GTError::InvalidCellStream)?;
            if count < 0
            {
                return Err(GTError::InvalidCellStream);
            }
            let start = pos + 2;
            let end = start.checked_add(count as usize).ok_or(GTError::InvalidCellStream)?;
            let ids = cell_stream.get(start..end).ok_or(GTError::InvalidCellStream)?;
            let mut cell = Vec::with_capacity(ids.len());
            for &id in ids
            {
                if id < 0
                {
                    return Err(GTError::PointIndexOutOfRange);
                }
                cell.push(id as usize);
            }
            grid.push_cell(cell_type, &cell)?;
            pos = end;
        }
        Ok(grid)
    }

    /// Build a grid from explicit (shape, point indices) pairs.
    pub fn from_cells<I>(points: Vec<Point>, cells: I) -> Result<Self, GTError>
    where I: IntoIterator<Item = (CellType, Vec<usize>)>
    {
        let mut grid = Self::with_points(points)?;
        for (cell_type, ids) in cells
        {
            grid.push_cell(cell_type, &ids)?;
        }
        Ok(grid)
    }

    fn with_points(points: Vec<Point>) -> Result<Self, GTError>
    {
        if points.iter().any(|p| !p[0].is_finite() || !p[1].is_finite())
        {
            return Err(GTError::NonFiniteCoordinate);
        }
        Ok(Self { points, cell_types: Vec::new(), cell_offsets: vec![0], cell_indices: Vec::new() })
    }

    fn push_cell(&mut self, cell_type: CellType, ids: &[usize]) -> Result<(), GTError>
    {
        if !cell_type.is_valid_point_count(ids.len())
        {
            return Err(GTError::InvalidCellDefinition);
        }
        if ids.iter().any(|&id| id >= self.points.len())
        {
            return Err(GTError::PointIndexOutOfRange);
        }
        self.cell_types.push(cell_type);
        self.cell_indices.extend_from_slice(ids);
        self.cell_offsets.push(self.cell_indices.len());
        Ok(())
    }

    ///
    /// Checks the invariants the constructors enforce. Used after loading a
    /// grid that did not pass through [`UGrid::new`].
    ///
    pub fn validate(&self) -> Result<(), GTError>
    {
        if self.points.iter().any(|p| !p[0].is_finite() || !p[1].is_finite())
        {
            return Err(GTError::NonFiniteCoordinate);
        }
        if self.cell_offsets.len() != self.cell_types.len() + 1
            || self.cell_offsets.first() != Some(&0)
            || self.cell_offsets.last() != Some(&self.cell_indices.len())
            || self.cell_offsets.windows(2).any(|w| w[0] > w[1])
        {
            return Err(GTError::InvalidCellStream);
        }
        for cell in 0..self.cell_types.len()
        {
            let ids = self.cell_points(cell);
            if !self.cell_types[cell].is_valid_point_count(ids.len())
            {
                return Err(GTError::InvalidCellDefinition);
            }
            if ids.iter().any(|&id| id >= self.points.len())
            {
                return Err(GTError::PointIndexOutOfRange);
            }
        }
        Ok(())
    }

    #[inline]
    pub fn points(&self) -> &[Point]
    {
        &self.points
    }

    ///
    /// Compressed binary snapshot of the grid, for handing one grid to
    /// several worker processes.
    ///
    pub fn to_bytes(&self) -> Result<Vec<u8>, GTError>
    {
        to_compressed_bytes(self)
    }

    /// Restore a grid written by [`UGrid::to_bytes`], checking its invariants.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GTError>
    {
        let grid: UGrid = from_compressed_bytes(bytes)?;
        grid.validate()?;
        Ok(grid)
    }

    /// The cells as a flat `[type, count, i0, i1, ...]` stream.
    pub fn cell_stream(&self) -> Vec<i64>
    {
        let mut stream = Vec::with_capacity(2 * self.cell_types.len() + self.cell_indices.len());
        for (cell, cell_type) in self.cell_types.iter().enumerate()
        {
            let ids = self.cell_points(cell);
            stream.push(cell_type.code());
            stream.push(ids.len() as i64);
            stream.extend(ids.iter().map(|&id| id as i64));
        }
        stream
    }
}

impl Grid for UGrid
{
    #[inline]
    fn number_of_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    fn point(&self, index: usize) -> Point {
        self.points[index]
    }

    #[inline]
    fn number_of_cells(&self) -> usize {
        self.cell_types.len()
    }

    #[inline]
    fn cell_type(&self, cell: usize) -> CellType {
        self.cell_types[cell]
    }

    #[inline]
    fn cell_points(&self, cell: usize) -> &[usize] {
        &self.cell_indices[self.cell_offsets[cell]..self.cell_offsets[cell + 1]]
    }
}

#[test]
fn check_cell_stream_parsing()
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0], [2.0, 0.0, 0.0]];
    let stream = vec![9, 4, 0, 1, 2, 3, 5, 3, 1, 4, 2, 3, 2, 0, 4];
    let grid = UGrid::new(points, &stream).unwrap();
    assert_eq!(grid.number_of_cells(), 3);
    assert_eq!(grid.cell_type(0), CellType::Quad);
    assert_eq!(grid.cell_points(1), &[1, 4, 2]);
    assert_eq!(grid.cell_type(2), CellType::Line);
    assert_eq!(grid.cell_stream(), stream);
    assert!(grid.validate().is_ok());
}

#[test]
fn check_cell_stream_errors()
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
    assert_eq!(UGrid::new(points.clone(), &[6, 3, 0, 1, 2]), Err(GTError::UnknownCellType));
    assert_eq!(UGrid::new(points.clone(), &[5, 3, 0, 1]), Err(GTError::InvalidCellStream));
    assert_eq!(UGrid::new(points.clone(), &[5]), Err(GTError::InvalidCellStream));
    assert_eq!(UGrid::new(points.clone(), &[5, 3, 0, 1, 3]), Err(GTError::PointIndexOutOfRange));
    assert_eq!(UGrid::new(points.clone(), &[5, 3, 0, 1, -1]), Err(GTError::PointIndexOutOfRange));
    assert_eq!(UGrid::new(points.clone(), &[9, 3, 0, 1, 2]), Err(GTError::InvalidCellDefinition));
    let bad = vec![[0.0, f64::NAN, 0.0]];
    assert_eq!(UGrid::new(bad, &[]), Err(GTError::NonFiniteCoordinate));
}

#[test]
fn check_point_cells_and_polygon()
{
    // two quads, the second one stored clockwise, plus a line cell
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0]];
    let grid = UGrid::from_cells(points, vec![
        (CellType::Quad, vec![0, 1, 2, 3]),
        (CellType::Quad, vec![1, 2, 5, 4]),
        (CellType::Line, vec![0, 4]),
    ]).unwrap();
    let adjacency = grid.point_cells();
    assert_eq!(adjacency[0], vec![0]);
    assert_eq!(adjacency[1], vec![0, 1]);
    assert_eq!(adjacency[4], vec![1]);
    assert_eq!(grid.cell_polygon(0), Some(vec![0, 1, 2, 3]));
    assert_eq!(grid.cell_polygon(1), Some(vec![4, 5, 2, 1]));
    assert_eq!(grid.cell_polygon(2), None);
    let bbox = grid.bounding_box();
    assert_eq!(bbox.upper, [2.0, 1.0]);
}
