use std::sync::Arc;

use num_traits::Float;

use crate::algorithms::traversal::PolylineTraversal;
use crate::errors::GTError;
use crate::extractors::point_extractor::PointExtractor;
use crate::grids::grid::Grid;
use crate::storage::scalar_field::DataLocation;
use crate::utilities::geometry::Point;

///
/// Extracts scalar values along a polyline. The polyline is broken into
/// sample locations wherever it crosses into another interpolation triangle,
/// and every location is then evaluated with a [`PointExtractor`].
///
pub struct PolylineExtractor<G: Grid>
{
    location: DataLocation,
    extractor: PointExtractor<G>,
}

impl<G: Grid> PolylineExtractor<G>
{
    /// Extractor for scalars located at `location`.
    pub fn new(grid: Arc<G>, location: DataLocation) -> Self
    {
        Self { location, extractor: PointExtractor::new(grid) }
    }

    #[inline]
    pub fn scalar_location(&self) -> DataLocation
    {
        self.location
    }

    #[inline]
    pub fn point_extractor(&self) -> &PointExtractor<G>
    {
        &self.extractor
    }

    /// Replace the scalars, located where this extractor was created for.
    pub fn set_grid_scalars<T: Float>(&mut self, scalars: &[T], activity: &[bool], activity_location: DataLocation) -> Result<(), GTError>
    {
        match self.location
        {
            DataLocation::Points => self.extractor.set_grid_point_scalars(scalars, activity, activity_location),
            DataLocation::Cells => self.extractor.set_grid_cell_scalars(scalars, activity, activity_location),
        }
    }

    ///
    /// Compute the sample locations along `polyline`. May be called before
    /// any scalars are set.
    ///
    pub fn set_polyline(&mut self, polyline: &[Point]) -> Result<(), GTError>
    {
        let locator = self.extractor.locator(self.location)?;
        let locations = PolylineTraversal::new(&locator).traverse(polyline);
        self.extractor.set_extract_locations(locations);
        Ok(())
    }

    #[inline]
    pub fn extract_locations(&self) -> &[Point]
    {
        self.extractor.extract_locations()
    }

    /// Values at the current sample locations.
    pub fn extract_data(&self) -> Vec<f64>
    {
        self.extractor.extract_data()
    }

    /// Set `polyline` and return the extracted values together with their locations.
    pub fn compute_locations_and_extract_data(&mut self, polyline: &[Point]) -> Result<(Vec<f64>, Vec<Point>), GTError>
    {
        self.set_polyline(polyline)?;
        Ok((self.extract_data(), self.extract_locations().to_vec()))
    }

    /// Cells crossed by each segment of `polyline`, in traversal order.
    pub fn crossed_cells(&self, polyline: &[Point]) -> Result<Vec<Vec<usize>>, GTError>
    {
        let locator = self.extractor.locator(self.location)?;
        let traversal = PolylineTraversal::new(&locator);
        Ok(polyline.windows(2).map(|segment| traversal.crossed_cells(&segment[0], &segment[1])).collect())
    }

    pub fn set_use_idw_for_point_data(&mut self, use_idw: bool)
    {
        self.extractor.set_use_idw_for_point_data(use_idw);
    }

    pub fn set_no_data_value(&mut self, value: f64)
    {
        self.extractor.set_no_data_value(value);
    }

    #[inline]
    pub fn no_data_value(&self) -> f64
    {
        self.extractor.no_data_value()
    }
}

#[cfg(test)]
const ND: f64 = crate::extractors::point_extractor::DEFAULT_NO_DATA;

#[cfg(test)]
fn check(extractor: &PolylineExtractor<crate::grids::ugrid::UGrid>, values: &[f64], locations: &[[f64; 2]])
{
    let actual_values = extractor.extract_data();
    let actual_locations = extractor.extract_locations();
    assert_eq!(actual_values.len(), values.len(), "{:?}", actual_values);
    assert_eq!(actual_locations.len(), locations.len(), "{:?}", actual_locations);
    for (a, e) in actual_values.iter().zip(values)
    {
        assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual_values, values);
    }
    for (a, e) in actual_locations.iter().zip(locations)
    {
        assert!((a[0] - e[0]).abs() < 1e-9 && (a[1] - e[1]).abs() < 1e-9, "{:?} != {:?}", actual_locations, locations);
    }
}

#[cfg(test)]
fn one_cell_extractor() -> PolylineExtractor<crate::grids::ugrid::UGrid>
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let grid = crate::grids::ugrid::UGrid::new(points, &[9, 4, 0, 1, 2, 3]).unwrap();
    let mut extractor = PolylineExtractor::new(Arc::new(grid), DataLocation::Points);
    extractor.set_grid_scalars(&[0.0, 2.0, 3.0, 1.0], &[], DataLocation::Cells).unwrap();
    extractor
}

#[cfg(test)]
fn two_cell_extractor() -> PolylineExtractor<crate::grids::ugrid::UGrid>
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0]];
    let grid = crate::grids::ugrid::UGrid::new(points, &[9, 4, 0, 1, 2, 3, 9, 4, 1, 4, 5, 2]).unwrap();
    let mut extractor = PolylineExtractor::new(Arc::new(grid), DataLocation::Points);
    extractor.set_grid_scalars(&[0.0, 2.0, 3.0, 1.0, 4.0, 5.0], &[], DataLocation::Cells).unwrap();
    extractor
}

#[test]
fn check_one_cell_one_segment()
{
    let mut extractor = one_cell_extractor();
    extractor.set_polyline(&[[-1.0, 0.5, 0.0], [2.0, 0.5, 0.0]]).unwrap();
    check(&extractor, &[ND, 0.5, 1.5, 2.5, ND], &[[-1.0, 0.5], [0.0, 0.5], [0.5, 0.5], [1.0, 0.5], [2.0, 0.5]]);
}

#[test]
fn check_segment_edge_cases()
{
    let mut extractor = one_cell_extractor();
    extractor.set_polyline(&[[0.25, 0.5, 0.0], [0.75, 0.5, 0.0]]).unwrap();
    check(&extractor, &[1.0, 1.5, 2.0], &[[0.25, 0.5], [0.5, 0.5], [0.75, 0.5]]);

    extractor.set_polyline(&[[-0.5, 1.0, 0.0], [1.55, 1.0, 0.0]]).unwrap();
    check(&extractor, &[ND, 1.0, 3.0, ND], &[[-0.5, 1.0], [0.0, 1.0], [1.0, 1.0], [1.55, 1.0]]);

    extractor.set_polyline(&[[-0.5, 0.5, 0.0], [-0.25, 0.5, 0.0]]).unwrap();
    check(&extractor, &[ND, ND], &[[-0.5, 0.5], [-0.25, 0.5]]);

    extractor.set_polyline(&[[-0.5, 0.5, 0.0], [0.0, 0.5, 0.0]]).unwrap();
    check(&extractor, &[ND, 0.5], &[[-0.5, 0.5], [0.0, 0.5]]);

    extractor.set_polyline(&[[1.0, 0.5, 0.0], [1.5, 0.5, 0.0]]).unwrap();
    check(&extractor, &[2.5, ND], &[[1.0, 0.5], [1.5, 0.5]]);

    extractor.set_polyline(&[[-0.5, 0.5, 0.0], [0.0, 1.0, 0.0], [0.5, 1.5, 0.0]]).unwrap();
    check(&extractor, &[ND, 1.0, ND], &[[-0.5, 0.5], [0.0, 1.0], [0.5, 1.5]]);
}

#[test]
fn check_multiple_segments()
{
    let mut extractor = one_cell_extractor();
    extractor.set_polyline(&[[-1.0, 0.5, 0.0], [0.5, 0.5, 0.0], [2.0, 0.5, 0.0]]).unwrap();
    check(&extractor, &[ND, 0.5, 1.5, 2.5, ND], &[[-1.0, 0.5], [0.0, 0.5], [0.5, 0.5], [1.0, 0.5], [2.0, 0.5]]);

    extractor.set_polyline(&[[2.0, 0.5, 0.0], [3.0, 0.5, 0.0], [4.0, 0.5, 0.0]]).unwrap();
    check(&extractor, &[ND, ND, ND], &[[2.0, 0.5], [3.0, 0.5], [4.0, 0.5]]);

    extractor.set_polyline(&[[0.5, 0.5, 0.0], [3.0, 0.5, 0.0], [4.0, 0.5, 0.0]]).unwrap();
    check(&extractor, &[1.5, 2.5, ND, ND], &[[0.5, 0.5], [1.0, 0.5], [3.0, 0.5], [4.0, 0.5]]);

    extractor.set_polyline(&[[0.5, 0.5, 0.0], [1.5, 0.5, 0.0], [1.5, 0.0, 0.0], [0.5, 1.0, 0.0]]).unwrap();
    check(&extractor, &[1.5, 2.5, ND, ND, 2.5, 2.25, 2.0],
        &[[0.5, 0.5], [1.0, 0.5], [1.5, 0.5], [1.5, 0.0], [1.0, 0.5], [0.75, 0.75], [0.5, 1.0]]);
}

#[test]
fn check_two_cells()
{
    let mut extractor = two_cell_extractor();
    extractor.set_polyline(&[[-0.5, 0.5, 0.0], [1.5, 0.5, 0.0]]).unwrap();
    check(&extractor, &[ND, 0.5, 1.5, 2.5, 3.5], &[[-0.5, 0.5], [0.0, 0.5], [0.5, 0.5], [1.0, 0.5], [1.5, 0.5]]);

    extractor.set_polyline(&[[0.5, 0.5, 0.0], [1.5, 0.5, 0.0], [2.5, 0.5, 0.0]]).unwrap();
    check(&extractor, &[1.5, 2.5, 3.5, 4.5, ND], &[[0.5, 0.5], [1.0, 0.5], [1.5, 0.5], [2.0, 0.5], [2.5, 0.5]]);

    extractor.set_polyline(&[[0.5, 0.5, 0.0], [1.0, 0.5, 0.0], [2.5, 0.5, 0.0]]).unwrap();
    check(&extractor, &[1.5, 2.5, 3.5, 4.5, ND], &[[0.5, 0.5], [1.0, 0.5], [1.5, 0.5], [2.0, 0.5], [2.5, 0.5]]);
    assert_eq!(extractor.crossed_cells(&[[0.5, 0.5, 0.0], [1.0, 0.5, 0.0], [2.5, 0.5, 0.0]]).unwrap(), vec![vec![0], vec![1]]);
}

#[test]
fn check_split_cells()
{
    let points = vec![
        [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
        [2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [3.0, 1.0, 0.0], [2.0, 1.0, 0.0],
    ];
    let grid = crate::grids::ugrid::UGrid::new(points, &[9, 4, 0, 1, 2, 3, 9, 4, 4, 5, 6, 7]).unwrap();
    let mut extractor = PolylineExtractor::new(Arc::new(grid), DataLocation::Points);
    extractor.set_polyline(&[[-1.0, 0.5, 0.0], [2.5, 0.5, 0.0]]).unwrap();
    extractor.set_grid_scalars(&[0.0, 2.0, 3.0, 1.0, 4.0, 6.0, 7.0, 5.0], &[], DataLocation::Cells).unwrap();
    check(&extractor, &[ND, 0.5, 1.5, 2.5, ND, 4.5, 5.5],
        &[[-1.0, 0.5], [0.0, 0.5], [0.5, 0.5], [1.0, 0.5], [1.5, 0.5], [2.0, 0.5], [2.5, 0.5]]);
}

#[test]
fn check_cell_scalars_interpolate_monotonically()
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0]];
    let grid = crate::grids::ugrid::UGrid::new(points, &[9, 4, 0, 1, 2, 3, 9, 4, 1, 4, 5, 2]).unwrap();
    let mut extractor = PolylineExtractor::new(Arc::new(grid), DataLocation::Cells);
    extractor.set_grid_scalars(&[1.0, 2.0], &[], DataLocation::Cells).unwrap();
    let (values, locations) = extractor.compute_locations_and_extract_data(&[[-0.5, 0.75, 0.0], [1.5, 0.75, 0.0]]).unwrap();
    assert_eq!(locations.len(), 7);
    check(&extractor, &[ND, 1.0, 1.0, 1.25, 1.5, 1.75, 1.875],
        &[[-0.5, 0.75], [0.0, 0.75], [0.25, 0.75], [0.75, 0.75], [1.0, 0.75], [1.25, 0.75], [1.5, 0.75]]);
    assert!(values[1..].windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn check_empty_polyline()
{
    let mut extractor = one_cell_extractor();
    let (values, locations) = extractor.compute_locations_and_extract_data(&[]).unwrap();
    assert!(values.is_empty() && locations.is_empty());
    extractor.set_no_data_value(-1.0);
    extractor.set_polyline(&[[5.0, 5.0, 0.0], [6.0, 5.0, 0.0]]).unwrap();
    assert_eq!(extractor.extract_data(), vec![-1.0, -1.0]);
}

#[test]
fn check_projected_polyline_over_timesteps()
{
    let mut extractor = PolylineExtractor::new(crate::extractors::point_extractor::projected_grid(), DataLocation::Points);
    extractor.set_no_data_value(-999.0);
    extractor.set_polyline(&[
        [290764.0, 3895106.0, 0.0], [291122.0, 3909108.0, 0.0],
        [302772.0, 3909130.0, 0.0], [302794.0, 3895775.0, 0.0],
    ]).unwrap();
    let expected_locations = [
        [290764.0, 3895106.0], [290780.9, 3895770.0], [290862.4, 3898957.5], [290934.3, 3901770.0],
        [291012.0, 3904807.9], [291087.7, 3907770.0], [291122.0, 3909108.0], [302772.0, 3909130.0],
        [302774.2, 3907770.0], [302778.7, 3905041.2], [302784.1, 3901770.0], [302788.6, 3899031.3],
        [302794.0, 3895775.0],
    ];
    let locations = extractor.extract_locations();
    assert_eq!(locations.len(), expected_locations.len(), "{:?}", locations);
    for (a, e) in locations.iter().zip(expected_locations)
    {
        assert!((a[0] - e[0]).abs() < 0.15 && (a[1] - e[1]).abs() < 0.15, "{:?} != {:?}", a, e);
    }

    let scalars = [730.787f32, 1214.54, 1057.145, 629.2069, 351.1153, 631.6649, 1244.366, 449.9133, 64.04247, 240.9716, 680.0491, 294.9547];
    extractor.set_grid_scalars(&scalars, &[], DataLocation::Cells).unwrap();
    let expected = [-999.0, 144.5, 299.4, 485.9, 681.8, 975.7, -999.0, -999.0, 862.8, 780.9, 882.3, 811.0, 504.4];
    let values = extractor.extract_data();
    assert_eq!(values.len(), expected.len());
    for (a, e) in values.iter().zip(expected)
    {
        assert!((a - e).abs() < 0.2, "{} != {}", a, e);
    }

    let scalars = [-999.0f32, 1220.5, 1057.1, 613.2, 380.1, 625.6, 722.2, 449.9, 51.0, 240.9, 609.0, 294.9];
    extractor.set_grid_scalars(&scalars, &[], DataLocation::Cells).unwrap();
    let expected = [-999.0, 137.4, 314.8, 498.1, -196.9, 124.7, -999.0, -999.0, 855.5, 780.9, 598.1, 527.1, 465.4];
    for (a, e) in extractor.extract_data().iter().zip(expected)
    {
        assert!((a - e).abs() < 0.2, "{} != {}", a, e);
    }
}
