use serde::{Deserialize, Serialize};

use crate::utilities::geometry::{signed_area, BoundingBox, Point};

///
/// Cell shapes understood by the extractors. The discriminants follow the
/// VTK cell type codes used in flat cell streams.
///
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType
{
    Line,
    PolyLine,
    Triangle,
    Polygon,
    Pixel,
    Quad,
}

impl CellType
{
    pub fn from_code(code: i64) -> Option<Self>
    {
        match code
        {
            3 => Some(CellType::Line),
            4 => Some(CellType::PolyLine),
            5 => Some(CellType::Triangle),
            7 => Some(CellType::Polygon),
            8 => Some(CellType::Pixel),
            9 => Some(CellType::Quad),
            _ => None,
        }
    }

    pub fn code(&self) -> i64
    {
        match self
        {
            CellType::Line => 3,
            CellType::PolyLine => 4,
            CellType::Triangle => 5,
            CellType::Polygon => 7,
            CellType::Pixel => 8,
            CellType::Quad => 9,
        }
    }

    #[inline]
    pub fn is_two_dimensional(&self) -> bool
    {
        !matches!(self, CellType::Line | CellType::PolyLine)
    }

    pub fn is_valid_point_count(&self, count: usize) -> bool
    {
        match self
        {
            CellType::Line => count == 2,
            CellType::PolyLine => count >= 2,
            CellType::Triangle => count == 3,
            CellType::Quad | CellType::Pixel => count == 4,
            CellType::Polygon => count >= 3,
        }
    }

    ///
    /// Point indices of the cell as a closed boundary loop, or `None` for
    /// shapes without area. Pixels are stored in raster order, so their last
    /// two points swap places.
    ///
    pub fn polygon_loop(&self, points: &[usize]) -> Option<Vec<usize>>
    {
        match self
        {
            CellType::Line | CellType::PolyLine => None,
            CellType::Pixel =>
            {
                let mut ids = points.to_vec();
                if ids.len() == 4
                {
                    ids.swap(2, 3);
                }
                Some(ids)
            }
            CellType::Triangle | CellType::Quad | CellType::Polygon => Some(points.to_vec()),
        }
    }
}

///
/// Read-only view of a 2D unstructured grid. Implemented by [`crate::grids::ugrid::UGrid`]
/// and by any mesh type a caller already owns.
///
pub trait Grid
{
    fn number_of_points(&self) -> usize;

    fn point(&self, index: usize) -> Point;

    fn number_of_cells(&self) -> usize;

    fn cell_type(&self, cell: usize) -> CellType;

    /// Point indices of `cell` in storage order.
    fn cell_points(&self, cell: usize) -> &[usize];

    ///
    /// Counter-clockwise point loop of a 2D cell. Returns `None` for line
    /// cells and for loops with fewer than three points.
    ///
    fn cell_polygon(&self, cell: usize) -> Option<Vec<usize>>
    {
        let mut ids = self.cell_type(cell).polygon_loop(self.cell_points(cell))?;
        if ids.len() < 3
        {
            return None;
        }
        let points: Vec<Point> = ids.iter().map(|&i| self.point(i)).collect();
        if signed_area(&points) < 0.0
        {
            ids.reverse();
        }
        Some(ids)
    }

    fn bounding_box(&self) -> BoundingBox
    {
        let mut bbox = BoundingBox::default();
        for i in 0..self.number_of_points()
        {
            bbox.expand(&self.point(i));
        }
        bbox
    }

    ///
    /// For each point, the 2D cells that reference it in ascending order.
    /// Line cells are left out since they carry no area.
    ///
    fn point_cells(&self) -> Vec<Vec<usize>>
    {
        let mut adjacency = vec![Vec::new(); self.number_of_points()];
        for cell in 0..self.number_of_cells()
        {
            if !self.cell_type(cell).is_two_dimensional()
            {
                continue;
            }
            for &p in self.cell_points(cell)
            {
                if let Some(cells) = adjacency.get_mut(p)
                {
                    if cells.last() != Some(&cell)
                    {
                        cells.push(cell);
                    }
                }
            }
        }
        adjacency
    }
}

#[test]
fn check_cell_type_codes()
{
    for code in [3, 4, 5, 7, 8, 9]
    {
        let cell_type = CellType::from_code(code).unwrap();
        assert_eq!(cell_type.code(), code);
    }
    assert_eq!(CellType::from_code(6), None);
    assert!(!CellType::Line.is_two_dimensional());
    assert!(CellType::Pixel.is_two_dimensional());
    assert!(!CellType::Quad.is_valid_point_count(3));
    assert!(CellType::Polygon.is_valid_point_count(6));
}

#[test]
fn check_pixel_loop_order()
{
    assert_eq!(CellType::Pixel.polygon_loop(&[0, 1, 2, 3]), Some(vec![0, 1, 3, 2]));
    assert_eq!(CellType::Quad.polygon_loop(&[0, 1, 2, 3]), Some(vec![0, 1, 2, 3]));
    assert_eq!(CellType::PolyLine.polygon_loop(&[0, 1, 2]), None);
}
