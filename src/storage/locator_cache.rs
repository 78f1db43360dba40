use std::sync::{Arc, OnceLock};

use crate::algorithms::point_locator::PointLocator;
use crate::algorithms::triangulation::triangulate;
use crate::errors::GTError;
use crate::grids::grid::Grid;
use crate::storage::scalar_field::DataLocation;
use crate::utilities::geometry::Tolerance;

///
/// Structures derived from an immutable grid, built on first use and shared
/// by every extractor created from the same grid. Point data uses an ear-cut
/// triangulation, cell data one with a node at each cell centroid.
///
pub struct LocatorCache<G: Grid>
{
    grid: Arc<G>,
    tolerance: Tolerance,
    point_cells: Vec<Vec<usize>>,
    point_locator: OnceLock<Arc<PointLocator>>,
    cell_locator: OnceLock<Arc<PointLocator>>,
}

impl<G: Grid> LocatorCache<G>
{
    pub fn new(grid: Arc<G>) -> Self
    {
        let tolerance = Tolerance::from_extent(&grid.bounding_box());
        let point_cells = grid.point_cells();
        Self { grid, tolerance, point_cells, point_locator: OnceLock::new(), cell_locator: OnceLock::new() }
    }

    #[inline]
    pub fn grid(&self) -> &Arc<G>
    {
        &self.grid
    }

    #[inline]
    pub fn tolerance(&self) -> Tolerance
    {
        self.tolerance
    }

    /// 2D cells adjacent to each grid point.
    #[inline]
    pub fn point_cells(&self) -> &[Vec<usize>]
    {
        &self.point_cells
    }

    /// Locator for data at `location`, triangulating the grid the first time.
    pub fn locator(&self, location: DataLocation) -> Result<&Arc<PointLocator>, GTError>
    {
        let cell = match location
        {
            DataLocation::Points => &self.point_locator,
            DataLocation::Cells => &self.cell_locator,
        };
        if let Some(locator) = cell.get()
        {
            return Ok(locator);
        }
        let triangles = triangulate(self.grid.as_ref(), location == DataLocation::Cells);
        let locator = Arc::new(PointLocator::new(triangles, self.tolerance)?);
        Ok(cell.get_or_init(|| locator))
    }
}

#[test]
fn check_locators_are_memoized()
{
    use crate::grids::ugrid::UGrid;
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let cache = LocatorCache::new(Arc::new(UGrid::new(points, &[9, 4, 0, 1, 2, 3]).unwrap()));
    let first = cache.locator(DataLocation::Points).unwrap();
    let second = cache.locator(DataLocation::Points).unwrap();
    assert!(Arc::ptr_eq(first, second));
    assert_eq!(first.triangles().len(), 2);
    let cells = cache.locator(DataLocation::Cells).unwrap();
    assert_eq!(cells.triangles().len(), 4);
    assert_eq!(cache.point_cells()[2], vec![0]);
}
