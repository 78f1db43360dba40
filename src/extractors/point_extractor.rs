use std::sync::Arc;

use num_traits::Float;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::algorithms::interpolation::CellInterpolator;
use crate::algorithms::point_locator::PointLocator;
use crate::errors::GTError;
use crate::grids::grid::Grid;
use crate::storage::locator_cache::LocatorCache;
use crate::storage::scalar_field::{ActivityMask, DataLocation, ScalarField};
use crate::storage::triangles::UGridTriangles;
use crate::utilities::geometry::Point;

/// Value reported where no active data covers a location.
pub const DEFAULT_NO_DATA: f64 = -9999999.0;

///
/// Extracts scalar values at a set of locations. The grid-derived locators
/// are built once and shared, so new scalars (one timestep after another) or
/// new locations can be set and extracted repeatedly.
///
pub struct PointExtractor<G: Grid>
{
    cache: Arc<LocatorCache<G>>,
    field: Option<ScalarField>,
    locator: Option<Arc<PointLocator>>,
    interpolator: Option<CellInterpolator>,
    locations: Vec<Point>,
    use_idw: bool,
    no_data_value: f64,
}

impl<G: Grid> PointExtractor<G>
{
    pub fn new(grid: Arc<G>) -> Self
    {
        Self::with_cache(Arc::new(LocatorCache::new(grid)))
    }

    fn with_cache(cache: Arc<LocatorCache<G>>) -> Self
    {
        Self
        {
            cache,
            field: None,
            locator: None,
            interpolator: None,
            locations: Vec::new(),
            use_idw: false,
            no_data_value: DEFAULT_NO_DATA,
        }
    }

    ///
    /// New extractor over the same grid and cached locators as `other`. The
    /// IDW flag and no-data value are copied; scalars and locations are not.
    ///
    pub fn from_extractor(other: &Self) -> Self
    {
        let mut extractor = Self::with_cache(other.cache.clone());
        extractor.use_idw = other.use_idw;
        extractor.no_data_value = other.no_data_value;
        extractor
    }

    #[inline]
    pub fn grid(&self) -> &Arc<G>
    {
        self.cache.grid()
    }

    /// Set scalars defined at the grid points.
    pub fn set_grid_point_scalars<T: Float>(&mut self, scalars: &[T], activity: &[bool], activity_location: DataLocation) -> Result<(), GTError>
    {
        let mask = ActivityMask::new(activity.to_vec(), activity_location);
        self.set_scalar_field(ScalarField::new(DataLocation::Points, scalars, mask))
    }

    /// Set scalars defined at the grid cells.
    pub fn set_grid_cell_scalars<T: Float>(&mut self, scalars: &[T], activity: &[bool], activity_location: DataLocation) -> Result<(), GTError>
    {
        let mask = ActivityMask::new(activity.to_vec(), activity_location);
        self.set_scalar_field(ScalarField::new(DataLocation::Cells, scalars, mask))
    }

    /// Replace the current scalars. Fails only if the spatial index cannot be built.
    pub fn set_scalar_field(&mut self, field: ScalarField) -> Result<(), GTError>
    {
        let locator = self.cache.locator(field.location())?.clone();
        self.interpolator = Some(self.build_interpolator(&locator, &field));
        self.locator = Some(locator);
        self.field = Some(field);
        Ok(())
    }

    fn build_interpolator(&self, locator: &PointLocator, field: &ScalarField) -> CellInterpolator
    {
        CellInterpolator::new(self.cache.grid().as_ref(), self.cache.point_cells(), locator.triangles(), field, self.use_idw)
    }

    #[inline]
    pub fn scalar_field(&self) -> Option<&ScalarField>
    {
        self.field.as_ref()
    }

    pub fn set_extract_locations(&mut self, locations: Vec<Point>)
    {
        self.locations = locations;
    }

    #[inline]
    pub fn extract_locations(&self) -> &[Point]
    {
        &self.locations
    }

    ///
    /// Derive point values of cell data by inverse distance weighting from
    /// the cell centroids instead of a plain average. Re-derives the current
    /// scalars.
    ///
    pub fn set_use_idw_for_point_data(&mut self, use_idw: bool)
    {
        if self.use_idw == use_idw
        {
            return;
        }
        self.use_idw = use_idw;
        let rebuilt = match (&self.locator, &self.field)
        {
            (Some(locator), Some(field)) => Some(self.build_interpolator(locator, field)),
            _ => None,
        };
        if rebuilt.is_some()
        {
            self.interpolator = rebuilt;
        }
    }

    #[inline]
    pub fn use_idw_for_point_data(&self) -> bool
    {
        self.use_idw
    }

    pub fn set_no_data_value(&mut self, value: f64)
    {
        self.no_data_value = value;
    }

    #[inline]
    pub fn no_data_value(&self) -> f64
    {
        self.no_data_value
    }

    /// Locator used for data at `location`.
    pub fn locator(&self, location: DataLocation) -> Result<Arc<PointLocator>, GTError>
    {
        self.cache.locator(location).cloned()
    }

    /// Triangles used to interpolate data at `location`, borrowed from the shared locator.
    pub fn triangles(&self, location: DataLocation) -> Result<&UGridTriangles, GTError>
    {
        Ok(self.cache.locator(location)?.triangles())
    }

    ///
    /// Value at one location. The first active cell containing the point
    /// supplies it; otherwise the no-data value is returned.
    ///
    pub fn extract_at_location(&self, location: &Point) -> f64
    {
        self.value_at(location).unwrap_or(self.no_data_value)
    }

    /// Same as [`PointExtractor::extract_at_location`] with `None` in place of the no-data value.
    pub fn value_at(&self, location: &Point) -> Option<f64>
    {
        let (Some(locator), Some(interpolator)) = (&self.locator, &self.interpolator) else
        {
            return None;
        };
        locator.locate(location).iter().find_map(|cell| interpolator.interpolate(cell))
    }

    /// Values at every stored location, in order.
    pub fn extract_data(&self) -> Vec<f64>
    {
        self.locations.iter().map(|p| self.extract_at_location(p)).collect()
    }
}

impl<G: Grid + Send + Sync> PointExtractor<G>
{
    /// Same as [`PointExtractor::extract_data`], spread over the rayon pool.
    pub fn extract_data_parallel(&self) -> Vec<f64>
    {
        self.locations.par_iter().map(|p| self.extract_at_location(p)).collect()
    }
}

#[cfg(test)]
fn assert_values(actual: &[f64], expected: &[f64])
{
    assert_eq!(actual.len(), expected.len(), "{:?}", actual);
    for (a, e) in actual.iter().zip(expected)
    {
        assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
    }
}

#[cfg(test)]
fn two_triangle_grid() -> Arc<crate::grids::ugrid::UGrid>
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    Arc::new(crate::grids::ugrid::UGrid::new(points, &[5, 3, 0, 1, 2, 5, 3, 2, 3, 0]).unwrap())
}

#[cfg(test)]
fn eight_triangle_grid() -> Arc<crate::grids::ugrid::UGrid>
{
    let points = vec![
        [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [3.0, 0.0, 0.0],
        [0.0, 1.0, 0.0], [2.0, 1.0, 0.0], [3.0, 1.0, 0.0],
        [0.0, 2.0, 0.0], [1.0, 2.0, 0.0], [3.0, 2.0, 0.0],
    ];
    let cells = vec![
        5, 3, 0, 1, 3, 5, 3, 1, 4, 3, 5, 3, 1, 2, 4, 5, 3, 2, 5, 4,
        5, 3, 3, 7, 6, 5, 3, 3, 4, 7, 5, 3, 4, 8, 7, 5, 3, 4, 5, 8,
    ];
    Arc::new(crate::grids::ugrid::UGrid::new(points, &cells).unwrap())
}

#[cfg(test)]
const ND: f64 = DEFAULT_NO_DATA;

#[test]
fn check_point_scalars_on_triangles()
{
    let mut extractor = PointExtractor::new(two_triangle_grid());
    extractor.set_grid_point_scalars(&[1.0, 2.0, 3.0, 2.0], &[], DataLocation::Points).unwrap();
    extractor.set_extract_locations(vec![[0.0, 0.0, 0.0], [0.25, 0.75, 100.0], [0.5, 0.5, 0.0], [0.75, 0.25, -150.0], [-1.0, -1.0, 0.0]]);
    assert_values(&extractor.extract_data(), &[1.0, 2.0, 2.0, 2.0, ND]);
    assert_eq!(extractor.extract_locations().len(), 5);

    extractor.set_grid_point_scalars(&[1.0f32, 2.0, 3.0, 2.0], &[true, false], DataLocation::Cells).unwrap();
    assert_values(&extractor.extract_data(), &[1.0, ND, 2.0, 2.0, ND]);
}

#[test]
fn check_cell_scalars_on_triangles()
{
    let mut extractor = PointExtractor::new(two_triangle_grid());
    extractor.set_grid_cell_scalars(&[1.0, 2.0], &[], DataLocation::Cells).unwrap();
    extractor.set_extract_locations(vec![[0.0, 0.0, 0.0], [0.25, 0.75, 100.0], [0.5, 0.5, 0.0], [0.75, 0.25, -150.0], [-0.1, -0.1, 0.0]]);
    assert_values(&extractor.extract_data(), &[1.5, 2.0, 1.5, 1.0, ND]);

    extractor.set_grid_cell_scalars(&[1.0, 2.0], &[true, false, true, true], DataLocation::Points).unwrap();
    assert_values(&extractor.extract_data(), &[2.0, 2.0, 2.0, ND, ND]);
}

#[test]
fn check_point_activity_on_point_scalars()
{
    let mut extractor = PointExtractor::new(eight_triangle_grid());
    let mut activity = vec![true; 9];
    activity[4] = false;
    extractor.set_grid_point_scalars(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0], &activity, DataLocation::Points).unwrap();
    extractor.set_extract_locations(vec![
        [0.25, 0.25, 0.0], [1.0, 0.25, 0.0], [2.0, 0.5, 0.0], [2.75, 0.75, 0.0],
        [0.25, 1.75, 0.0], [1.0, 1.25, 0.0], [1.5, 1.75, 0.0], [2.75, 1.25, 0.0],
    ]);
    assert_values(&extractor.extract_data(), &[0.25, ND, ND, ND, 1.75, ND, ND, ND]);
}

#[test]
fn check_cell_activity_on_cell_scalars()
{
    let mut extractor = PointExtractor::new(eight_triangle_grid());
    let activity = [false, true, false, true, false, true, false, true];
    extractor.set_grid_cell_scalars(&[2.0, 4.0, 6.0, 8.0, 4.0, 6.0, 8.0, 10.0], &activity, DataLocation::Cells).unwrap();
    extractor.set_extract_locations(vec![
        [0.25, 0.25, 0.0], [1.0, 0.25, 0.0], [2.0, 0.5, 0.0], [2.75, 0.75, 0.0],
        [0.25, 1.75, 0.0], [1.0, 1.25, 0.0], [1.5, 1.75, 0.0], [2.75, 1.25, 0.0],
    ]);
    assert_values(&extractor.extract_data(), &[ND, 4.0, ND, 8.25, ND, 6.0, ND, 9.75]);
}

#[test]
fn check_changing_timesteps()
{
    let points = vec![
        [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [2.0, 1.0, 0.0], [3.0, 1.0, 0.0],
        [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0],
    ];
    let cells = [9, 4, 0, 4, 5, 1, 9, 4, 1, 5, 6, 2, 9, 4, 2, 6, 7, 3];
    let grid = Arc::new(crate::grids::ugrid::UGrid::new(points, &cells).unwrap());
    let mut extractor = PointExtractor::new(grid);
    extractor.set_extract_locations(vec![[0.75, 0.25, 0.0], [1.5, 0.5, 0.0], [2.25, 0.75, 0.0]]);

    extractor.set_grid_cell_scalars(&[1.0, 2.0, 3.0], &[], DataLocation::Cells).unwrap();
    assert_values(&extractor.extract_data(), &[1.25, 2.0, 2.75]);
    extractor.set_grid_cell_scalars(&[2.0, 3.0, 4.0], &[true, false, true], DataLocation::Cells).unwrap();
    assert_values(&extractor.extract_data(), &[2.0, ND, 4.0]);
    extractor.set_grid_cell_scalars(&[3.0, 4.0, 5.0], &[], DataLocation::Cells).unwrap();
    assert_values(&extractor.extract_data(), &[3.25, 4.0, 4.75]);

    let mut activity = vec![true; 8];
    extractor.set_grid_point_scalars(&[1.0, 2.0, 3.0, 4.0, 2.0, 3.0, 4.0, 5.0], &activity, DataLocation::Points).unwrap();
    assert_values(&extractor.extract_data(), &[2.5, 3.0, 3.5]);
    activity[0] = false;
    extractor.set_grid_point_scalars(&[2.0, 3.0, 4.0, 5.0, 3.0, 4.0, 5.0, 6.0], &activity, DataLocation::Points).unwrap();
    assert_values(&extractor.extract_data(), &[ND, 4.0, 4.5]);
    activity[0] = true;
    activity[1] = false;
    extractor.set_grid_point_scalars(&[3.0, 4.0, 5.0, 6.0, 4.0, 5.0, 6.0, 7.0], &activity, DataLocation::Points).unwrap();
    assert_values(&extractor.extract_data(), &[ND, ND, 5.5]);
    extractor.set_grid_point_scalars(&[4.0, 5.0, 6.0, 7.0, 5.0, 6.0, 7.0, 8.0], &[], DataLocation::Points).unwrap();
    assert_values(&extractor.extract_data(), &[5.5, 6.0, 6.5]);
}

#[test]
fn check_copied_extractor_shares_grid()
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let grid = Arc::new(crate::grids::ugrid::UGrid::new(points, &[9, 4, 0, 1, 2, 3]).unwrap());
    let mut source = PointExtractor::new(grid);
    source.set_no_data_value(-1.0);
    source.set_grid_point_scalars(&[1.0, 2.0, 3.0, 4.0], &[], DataLocation::Points).unwrap();

    let mut copy = PointExtractor::from_extractor(&source);
    assert!(Arc::ptr_eq(copy.grid(), source.grid()));
    assert!(copy.scalar_field().is_none());
    assert!(copy.extract_locations().is_empty());
    assert_eq!(copy.no_data_value(), -1.0);
    assert_eq!(copy.extract_at_location(&[0.5, 0.5, 0.0]), -1.0);
    assert!(Arc::ptr_eq(&copy.locator(DataLocation::Points).unwrap(), &source.locator(DataLocation::Points).unwrap()));

    copy.set_grid_point_scalars(&[1.0, 2.0, 3.0, 4.0], &[], DataLocation::Points).unwrap();
    assert_values(&[copy.extract_at_location(&[0.5, 0.5, 0.0])], &[2.0]);
    assert_eq!(copy.triangles(DataLocation::Points).unwrap().triangles(), &[[0, 1, 2], [0, 2, 3]]);
    // both extractors see the one triangulation held by the shared locator
    assert!(std::ptr::eq(copy.triangles(DataLocation::Points).unwrap(), source.triangles(DataLocation::Points).unwrap()));
    assert!(std::ptr::eq(copy.triangles(DataLocation::Points).unwrap(), source.locator(DataLocation::Points).unwrap().triangles()));
}

#[test]
fn check_vertex_values_and_shared_edges()
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0]];
    let grid = Arc::new(crate::grids::ugrid::UGrid::new(points.clone(), &[9, 4, 0, 1, 2, 3, 9, 4, 1, 4, 5, 2]).unwrap());
    let scalars = [0.0, 2.0, 3.0, 1.0, 4.0, 5.0];
    let mut extractor = PointExtractor::new(grid.clone());
    extractor.set_grid_point_scalars(&scalars, &[], DataLocation::Points).unwrap();
    for (point, value) in points.iter().zip(scalars)
    {
        assert_eq!(extractor.extract_at_location(point), value);
    }
    // the shared edge x = 1 is matched by both cells and only depends on its endpoints
    let locator = extractor.locator(DataLocation::Points).unwrap();
    let on_edge = [1.0, 0.3, 0.0];
    let found = locator.locate(&on_edge);
    assert_eq!(found.len(), 2);
    let first = extractor.extract_at_location(&on_edge);
    assert!((first - 2.3).abs() < 1e-12);

    // with the left cell switched off the right one supplies the same value
    extractor.set_grid_point_scalars(&scalars, &[false, true], DataLocation::Cells).unwrap();
    assert!((extractor.extract_at_location(&on_edge) - first).abs() < 1e-12);
}

#[test]
fn check_extraction_is_repeatable()
{
    let mut extractor = PointExtractor::new(eight_triangle_grid());
    extractor.set_grid_cell_scalars(&[2.0, 4.0, 6.0, 8.0, 4.0, 6.0, 8.0, 10.0], &[], DataLocation::Cells).unwrap();
    let locations: Vec<Point> = (0..50).map(|i| [0.06 * i as f64, 0.04 * i as f64, 0.0]).collect();
    extractor.set_extract_locations(locations);
    let first = extractor.extract_data();
    assert_eq!(first, extractor.extract_data());
    assert_eq!(first, extractor.extract_data_parallel());
}

#[test]
fn check_activity_change_is_local()
{
    let mut extractor = PointExtractor::new(eight_triangle_grid());
    let scalars = [2.0, 4.0, 6.0, 8.0, 4.0, 6.0, 8.0, 10.0];
    extractor.set_extract_locations(vec![[0.25, 0.25, 0.0], [1.0, 0.25, 0.0], [2.75, 1.25, 0.0]]);
    extractor.set_grid_point_scalars(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0], &[], DataLocation::Points).unwrap();
    let before = extractor.extract_data();
    let mut activity = vec![true; 8];
    activity[1] = false;
    extractor.set_grid_point_scalars(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0], &activity, DataLocation::Cells).unwrap();
    let after = extractor.extract_data();
    assert_eq!(before[0], after[0]);
    assert_eq!(after[1], ND);
    assert_eq!(before[2], after[2]);
    extractor.set_grid_cell_scalars(&scalars, &[], DataLocation::Cells).unwrap();
    assert!(extractor.extract_data().iter().all(|&v| v != ND));
}

#[test]
fn check_no_data_and_idw_configuration()
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [3.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [3.0, 1.0, 0.0]];
    let grid = Arc::new(crate::grids::ugrid::UGrid::new(points, &[9, 4, 0, 1, 4, 3, 9, 4, 1, 2, 5, 4]).unwrap());
    let mut extractor = PointExtractor::new(grid);
    assert_eq!(extractor.extract_at_location(&[0.5, 0.5, 0.0]), ND);
    extractor.set_no_data_value(f64::MIN);
    assert_eq!(extractor.extract_at_location(&[5.0, 5.0, 0.0]), f64::MIN);

    extractor.set_grid_cell_scalars(&[1.0, 2.0], &[], DataLocation::Cells).unwrap();
    assert!((extractor.extract_at_location(&[1.0, 0.5, 0.0]) - 1.5).abs() < 1e-12);
    extractor.set_use_idw_for_point_data(true);
    assert!(extractor.use_idw_for_point_data());
    let idw = (2.0 * 1.0 + 0.8 * 2.0) / 2.8;
    assert!((extractor.extract_at_location(&[1.0, 0.0, 0.0]) - idw).abs() < 1e-12);
    assert!((extractor.extract_at_location(&[1.0, 0.5, 0.0]) - idw).abs() < 1e-12);
    // centroids are untouched by the weighting
    assert!((extractor.extract_at_location(&[2.0, 0.5, 0.0]) - 2.0).abs() < 1e-12);
}

#[cfg(test)]
pub(crate) fn projected_grid() -> Arc<crate::grids::ugrid::UGrid>
{
    let points = vec![
        [288050.0, 3907770.0, 0.0], [294050.0, 3907770.0, 0.0], [300050.0, 3907770.0, 0.0], [306050.0, 3907770.0, 0.0],
        [288050.0, 3901770.0, 0.0], [294050.0, 3901770.0, 0.0], [300050.0, 3901770.0, 0.0], [306050.0, 3901770.0, 0.0],
        [288050.0, 3895770.0, 0.0], [294050.0, 3895770.0, 0.0], [300050.0, 3895770.0, 0.0], [306050.0, 3895770.0, 0.0],
    ];
    let cells = [
        9, 4, 0, 4, 5, 1, 9, 4, 1, 5, 6, 2, 9, 4, 2, 6, 7, 3,
        9, 4, 4, 8, 9, 5, 9, 4, 5, 9, 10, 6, 9, 4, 6, 10, 11, 7,
    ];
    Arc::new(crate::grids::ugrid::UGrid::new(points, &cells).unwrap())
}

#[test]
fn check_projected_coordinates_over_timesteps()
{
    let mut extractor = PointExtractor::new(projected_grid());
    let locations = vec![
        [289780.0, 3906220.0, 0.0], [293780.0, 3899460.0, 0.0], [298900.0, 3900780.0, 0.0],
        [301170.0, 3904960.0, 0.0], [296330.0, 3906180.0, 0.0], [307395.0, 3901463.0, 0.0],
    ];
    extractor.set_extract_locations(locations.clone());
    assert_eq!(extractor.extract_locations(), &locations[..]);
    extractor.set_no_data_value(-999.0);

    let scalars = [730.787f32, 1214.54, 1057.145, 629.2069, 351.1153, 631.6649, 1244.366, 449.9133, 64.04247, 240.9716, 680.0491, 294.9547];
    extractor.set_grid_point_scalars(&scalars, &[], DataLocation::Cells).unwrap();
    let expected = [719.6, 468.6, 1033.8, 996.5, 1204.3, -999.0];
    for (a, e) in extractor.extract_data().iter().zip(expected)
    {
        assert!((a - e).abs() < 0.2, "{} != {}", a, e);
    }

    let scalars = [-999.0f32, 1220.5, 1057.1, 613.2, 380.1, 625.6, 722.2, 449.9, 51.0, 240.9, 609.0, 294.9];
    let mut activity = vec![true; 6];
    activity[0] = false;
    extractor.set_grid_point_scalars(&scalars, &activity, DataLocation::Cells).unwrap();
    let expected = [-999.0, 466.4, 685.0, 849.4, 1069.6, -999.0];
    let values = extractor.extract_data();
    assert_eq!(values.len(), expected.len());
    for (a, e) in values.iter().zip(expected)
    {
        assert!((a - e).abs() < 0.2, "{} != {}", a, e);
    }
}
