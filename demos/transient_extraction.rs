use std::sync::Arc;

use gridtrace::{errors::GTError, DataLocation, GridTrace, PointExtractor, PolylineExtractor, UGrid};

///
/// A row of three quads with cell values changing from one timestep to the
/// next, sampled at fixed locations.
///
fn point_timesteps() -> Result<(), GTError>
{
    println!("\nRunning \"point_timesteps\" example\n");
    let points = vec![
        [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [2.0, 1.0, 0.0], [3.0, 1.0, 0.0],
        [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0],
    ];
    let grid = Arc::new(UGrid::new(points, &[9, 4, 0, 4, 5, 1, 9, 4, 1, 5, 6, 2, 9, 4, 2, 6, 7, 3])?);
    let mut extractor = PointExtractor::new(grid);
    extractor.set_extract_locations(vec![[0.75, 0.25, 0.0], [1.5, 0.5, 0.0], [2.25, 0.75, 0.0]]);

    let timesteps = [([1.0, 2.0, 3.0], [true, true, true]), ([2.0, 3.0, 4.0], [true, false, true]), ([3.0, 4.0, 5.0], [true, true, true])];
    for (step, (values, activity)) in timesteps.iter().enumerate()
    {
        extractor.set_grid_cell_scalars(values, activity, DataLocation::Cells)?;
        println!("timestep {step}: {:?}", extractor.extract_data());
    }
    Ok(())
}

///
/// Two quads separated by a gap, sampled along a line crossing both.
///
fn polyline_across_gap() -> Result<(), GTError>
{
    println!("\nRunning \"polyline_across_gap\" example\n");
    let points = vec![
        [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
        [2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [3.0, 1.0, 0.0], [2.0, 1.0, 0.0],
    ];
    let grid = Arc::new(UGrid::new(points, &[9, 4, 0, 1, 2, 3, 9, 4, 4, 5, 6, 7])?);
    let mut extractor = PolylineExtractor::new(grid, DataLocation::Points);
    extractor.set_grid_scalars(&[0.0, 2.0, 3.0, 1.0, 4.0, 6.0, 7.0, 5.0], &[], DataLocation::Cells)?;
    let (values, locations) = extractor.compute_locations_and_extract_data(&[[-1.0, 0.5, 0.0], [2.5, 0.5, 0.0]])?;
    for (location, value) in locations.iter().zip(values)
    {
        if value == extractor.no_data_value()
        {
            println!("({}, {}): no data", location[0], location[1]);
        }
        else
        {
            println!("({}, {}): {value}", location[0], location[1]);
        }
    }
    Ok(())
}

///
/// A particle carried through two quads by a flow that speeds up downstream.
///
fn trace_through_cells() -> Result<(), GTError>
{
    println!("\nRunning \"trace_through_cells\" example\n");
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0]];
    let grid = Arc::new(UGrid::new(points, &[9, 4, 0, 1, 2, 3, 9, 4, 1, 4, 5, 2])?);
    let mut tracer = GridTrace::new(grid);
    tracer.set_max_change_velocity(0.015);
    tracer.set_min_delta_time(0.001);
    tracer.add_grid_cell_scalars_at_time(&[[0.1, 0.0], [0.2, 0.0]], &[], 0.0)?;
    tracer.add_grid_cell_scalars_at_time(&[[0.1, 0.0], [0.2, 0.0]], &[], 10.0)?;
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 0.0);
    for (point, time) in trace.points.iter().zip(&trace.times)
    {
        println!("t = {time:.3}: ({:.4}, {:.4})", point[0], point[1]);
    }
    println!("traveled {:.4}, stopped: {}", trace.distance, trace.exit);
    Ok(())
}

fn main() -> Result<(), GTError>
{
    point_timesteps()?;
    polyline_across_gap()?;
    trace_through_cells()?;
    Ok(())
}
