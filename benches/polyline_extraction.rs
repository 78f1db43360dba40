use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use gridtrace::{errors::GTError, DataLocation, PolylineExtractor, UGrid};

fn build_triangle_grid(n: usize) -> Result<UGrid, GTError>
{
    // n x n squares, each split into two triangles
    let mut points = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n
    {
        for i in 0..=n
        {
            points.push([i as f64, j as f64, 0.0]);
        }
    }
    let mut cells = Vec::with_capacity(10 * n * n);
    let row = (n + 1) as i64;
    for j in 0..n
    {
        for i in 0..n
        {
            let p = (j * (n + 1) + i) as i64;
            cells.extend([5, 3, p, p + 1, p + row + 1]);
            cells.extend([5, 3, p, p + row + 1, p + row]);
        }
    }
    UGrid::new(points, &cells)
}

fn run_polyline(c: &mut Criterion)
{
    let grid = Arc::new(build_triangle_grid(100).unwrap());
    let mut extractor = PolylineExtractor::new(grid.clone(), DataLocation::Points);
    let values: Vec<f64> = grid.points().iter().map(|p| (p[0] * 0.1).sin() + p[1]).collect();
    extractor.set_grid_scalars(&values, &[], DataLocation::Points).unwrap();
    let polyline = [[-5.0, 3.3, 0.0], [50.2, 97.1, 0.0], [105.0, 10.0, 0.0]];
    c.bench_function("polyline", |b|b.iter(||extractor.compute_locations_and_extract_data(&polyline).unwrap()));
}

criterion_group!(benches, run_polyline);
criterion_main!(benches);
