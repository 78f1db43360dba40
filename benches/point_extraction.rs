use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use gridtrace::{errors::GTError, DataLocation, PointExtractor, UGrid};

fn build_quad_grid(n: usize) -> Result<UGrid, GTError>
{
    // n x n quads on the unit square
    let mut points = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n
    {
        for i in 0..=n
        {
            points.push([i as f64 / n as f64, j as f64 / n as f64, 0.0]);
        }
    }
    let mut cells = Vec::with_capacity(6 * n * n);
    for j in 0..n
    {
        for i in 0..n
        {
            let p = (j * (n + 1) + i) as i64;
            let row = (n + 1) as i64;
            cells.extend([9, 4, p, p + 1, p + row + 1, p + row]);
        }
    }
    UGrid::new(points, &cells)
}

fn build_extractor(location: DataLocation) -> Result<PointExtractor<UGrid>, GTError>
{
    let grid = Arc::new(build_quad_grid(200)?);
    let mut extractor = PointExtractor::new(grid.clone());
    match location
    {
        DataLocation::Points =>
        {
            let values: Vec<f64> = grid.points().iter().map(|p| p[0] * p[0] + p[1]).collect();
            extractor.set_grid_point_scalars(&values, &[], DataLocation::Points)?;
        }
        DataLocation::Cells =>
        {
            let values: Vec<f64> = (0..200 * 200).map(|i| i as f64).collect();
            extractor.set_grid_cell_scalars(&values, &[], DataLocation::Cells)?;
        }
    }
    let locations = (0..10000).map(|i| [(i % 100) as f64 / 99.0, (i / 100) as f64 / 99.0, 0.0]).collect();
    extractor.set_extract_locations(locations);
    Ok(extractor)
}

fn run_point_data(c: &mut Criterion)
{
    let extractor = build_extractor(DataLocation::Points).unwrap();
    c.bench_function("point data", |b|b.iter(||extractor.extract_data()));
    c.bench_function("point data parallel", |b|b.iter(||extractor.extract_data_parallel()));
}

fn run_cell_data(c: &mut Criterion)
{
    let extractor = build_extractor(DataLocation::Cells).unwrap();
    c.bench_function("cell data", |b|b.iter(||extractor.extract_data()));
}

criterion_group!(benches, run_point_data, run_cell_data);
criterion_main!(benches);
