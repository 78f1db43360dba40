use std::fmt::Display;
use std::sync::Arc;

use num_traits::Float;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::GTError;
use crate::extractors::point_extractor::PointExtractor;
use crate::grids::grid::Grid;
use crate::storage::scalar_field::{ActivityMask, DataLocation, ScalarField};
use crate::utilities::geometry::{distance_2d, lerp, Point};

/// Smallest time step allowed, and the slack in the change-distance bound.
pub const ZERO_TOLERANCE: f64 = 1e-7;
const ZERO_VELOCITY: f64 = 1e-4;
const STEP_GROWTH: f64 = 1.2;

///
/// Scaling and limits applied while tracing. A limit that is zero or
/// negative is switched off.
///
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceLimits
{
    /// Factor applied to every vector before it is used as a velocity.
    pub vector_multiplier: f64,
    /// Longest time a point is traced for.
    pub max_tracing_time: f64,
    /// Longest path a point is traced along.
    pub max_tracing_distance: f64,
    /// Steps shorter than this end the trace.
    pub min_delta_time: f64,
    /// Longest distance covered by one step.
    pub max_change_distance: f64,
    /// Largest change of speed accepted between two steps.
    pub max_change_velocity: f64,
    /// Largest change of direction, in radians, accepted between two steps.
    pub max_change_direction: f64,
}

impl Default for TraceLimits
{
    fn default() -> Self {
        Self
        {
            vector_multiplier: 1.0,
            max_tracing_time: -1.0,
            max_tracing_distance: -1.0,
            min_delta_time: ZERO_TOLERANCE,
            max_change_distance: -1.0,
            max_change_velocity: -1.0,
            max_change_direction: -1.0,
        }
    }
}

/// Why a trace stopped. Reflects the last condition met while stepping.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceExit
{
    #[default]
    NotTraced,
    NoVectorData,
    StartAfterLastTimestep,
    StartWithoutData,
    MaxChangeDistance,
    ReachedLastTimestep,
    MaxTracingTime,
    OutOfDomain,
    ZeroVelocity,
    MaxChangeVelocity { below_min_delta_time: bool },
    MaxChangeDirection { below_min_delta_time: bool },
    MaxTracingDistance,
}

impl Display for TraceExit
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self
        {
            TraceExit::NotTraced => "Point was not traced.",
            TraceExit::NoVectorData => "No vectors have been added.",
            TraceExit::StartAfterLastTimestep => "Start time is after the last timestep.",
            TraceExit::StartWithoutData => "No vector data at the start point.",
            TraceExit::MaxChangeDistance => "Step was limited by the max change distance.",
            TraceExit::ReachedLastTimestep => "Point reached the last timestep.",
            TraceExit::MaxTracingTime => "Point reached the max tracing time.",
            TraceExit::OutOfDomain => "Point left the active part of the grid.",
            TraceExit::ZeroVelocity => "Velocity dropped to zero.",
            TraceExit::MaxChangeVelocity { below_min_delta_time: false } => "Step exceeded the max change in velocity.",
            TraceExit::MaxChangeVelocity { below_min_delta_time: true } => "Step exceeded the max change in velocity; time step fell below the minimum.",
            TraceExit::MaxChangeDirection { below_min_delta_time: false } => "Step exceeded the max change in direction.",
            TraceExit::MaxChangeDirection { below_min_delta_time: true } => "Step exceeded the max change in direction; time step fell below the minimum.",
            TraceExit::MaxTracingDistance => "Point reached the max tracing distance.",
        };
        write!(f, "{}", message)
    }
}

///
/// Path of one traced point: the position after every accepted step, the
/// time at each position, the length of the path and why tracing stopped.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trace
{
    pub points: Vec<Point>,
    pub times: Vec<f64>,
    pub distance: f64,
    pub exit: TraceExit,
}

/// Vector components at one time, each held by its own extractor.
struct VectorStep<G: Grid>
{
    time: f64,
    x: PointExtractor<G>,
    y: PointExtractor<G>,
}

impl<G: Grid> VectorStep<G>
{
    #[inline]
    fn velocity(&self, location: &Point) -> Option<[f64; 2]>
    {
        Some([self.x.value_at(location)?, self.y.value_at(location)?])
    }
}

///
/// Traces points through a vector field known at two timesteps. The start
/// velocity comes from the earlier timestep, every later one from the most
/// recent. Steps are explicit: the time step grows by a fifth after every
/// accepted step and is halved whenever a step leaves the data or changes
/// the velocity too much.
///
pub struct GridTrace<G: Grid>
{
    extractor: PointExtractor<G>,
    limits: TraceLimits,
    previous: Option<VectorStep<G>>,
    current: Option<VectorStep<G>>,
}

impl<G: Grid> GridTrace<G>
{
    pub fn new(grid: Arc<G>) -> Self
    {
        Self { extractor: PointExtractor::new(grid), limits: TraceLimits::default(), previous: None, current: None }
    }

    ///
    /// New tracer over the same grid and cached locators as `other`, with
    /// the same limits and no vectors.
    ///
    pub fn from_trace(other: &Self) -> Self
    {
        Self { extractor: PointExtractor::from_extractor(&other.extractor), limits: other.limits, previous: None, current: None }
    }

    #[inline]
    pub fn grid(&self) -> &Arc<G>
    {
        self.extractor.grid()
    }

    #[inline]
    pub fn limits(&self) -> &TraceLimits
    {
        &self.limits
    }

    pub fn set_limits(&mut self, limits: TraceLimits)
    {
        self.limits = limits;
        self.set_min_delta_time(limits.min_delta_time);
    }

    pub fn set_vector_multiplier(&mut self, multiplier: f64)
    {
        self.limits.vector_multiplier = multiplier;
    }

    #[inline]
    pub fn vector_multiplier(&self) -> f64
    {
        self.limits.vector_multiplier
    }

    pub fn set_max_tracing_time(&mut self, time: f64)
    {
        self.limits.max_tracing_time = time;
    }

    #[inline]
    pub fn max_tracing_time(&self) -> f64
    {
        self.limits.max_tracing_time
    }

    pub fn set_max_tracing_distance(&mut self, distance: f64)
    {
        self.limits.max_tracing_distance = distance;
    }

    #[inline]
    pub fn max_tracing_distance(&self) -> f64
    {
        self.limits.max_tracing_distance
    }

    /// A non-positive value is replaced by [`ZERO_TOLERANCE`] so that halving always ends.
    pub fn set_min_delta_time(&mut self, time: f64)
    {
        self.limits.min_delta_time = if time > 0.0 { time } else { ZERO_TOLERANCE };
    }

    #[inline]
    pub fn min_delta_time(&self) -> f64
    {
        self.limits.min_delta_time
    }

    pub fn set_max_change_distance(&mut self, distance: f64)
    {
        self.limits.max_change_distance = distance;
    }

    #[inline]
    pub fn max_change_distance(&self) -> f64
    {
        self.limits.max_change_distance
    }

    pub fn set_max_change_velocity(&mut self, velocity: f64)
    {
        self.limits.max_change_velocity = velocity;
    }

    #[inline]
    pub fn max_change_velocity(&self) -> f64
    {
        self.limits.max_change_velocity
    }

    pub fn set_max_change_direction(&mut self, radians: f64)
    {
        self.limits.max_change_direction = radians;
    }

    #[inline]
    pub fn max_change_direction(&self) -> f64
    {
        self.limits.max_change_direction
    }

    ///
    /// Add the vectors of the next timestep. The previous latest timestep
    /// becomes the earlier one and the one before it is dropped.
    ///
    pub fn add_grid_scalars_at_time<T: Float>(&mut self, vectors: &[[T; 2]], vector_location: DataLocation, activity: &[bool],
        activity_location: DataLocation, time: f64) -> Result<(), GTError>
    {
        let mask = ActivityMask::new(activity.to_vec(), activity_location);
        let xs: Vec<T> = vectors.iter().map(|v| v[0]).collect();
        let ys: Vec<T> = vectors.iter().map(|v| v[1]).collect();
        let mut x = PointExtractor::from_extractor(&self.extractor);
        x.set_scalar_field(ScalarField::new(vector_location, &xs, mask.clone()))?;
        let mut y = PointExtractor::from_extractor(&self.extractor);
        y.set_scalar_field(ScalarField::new(vector_location, &ys, mask))?;
        if let Some(current) = self.current.take()
        {
            if time <= current.time
            {
                warn!("Timestep {} does not follow timestep {}.", time, current.time);
            }
            self.previous = Some(current);
        }
        self.current = Some(VectorStep { time, x, y });
        Ok(())
    }

    /// Vectors at the grid points, with activity flags at the points.
    pub fn add_grid_point_scalars_at_time<T: Float>(&mut self, vectors: &[[T; 2]], activity: &[bool], time: f64) -> Result<(), GTError>
    {
        self.add_grid_scalars_at_time(vectors, DataLocation::Points, activity, DataLocation::Points, time)
    }

    /// Vectors at the grid cells, with activity flags at the cells.
    pub fn add_grid_cell_scalars_at_time<T: Float>(&mut self, vectors: &[[T; 2]], activity: &[bool], time: f64) -> Result<(), GTError>
    {
        self.add_grid_scalars_at_time(vectors, DataLocation::Cells, activity, DataLocation::Cells, time)
    }

    /// Earlier and latest timestep. A single timestep is used for both.
    pub fn time_range(&self) -> Option<(f64, f64)>
    {
        let last = self.current.as_ref()?;
        let first = self.previous.as_ref().unwrap_or(last);
        Some((first.time, last.time))
    }

    ///
    /// Trace `start` from `start_time` until the latest timestep or one of
    /// the limits is reached. The start point itself is not part of the
    /// returned path.
    ///
    pub fn trace_point(&self, start: &Point, start_time: f64) -> Trace
    {
        let mut trace = Trace::default();
        let Some(last) = &self.current else
        {
            trace.exit = TraceExit::NoVectorData;
            return trace;
        };
        let first = self.previous.as_ref().unwrap_or(last);
        if start_time > last.time
        {
            trace.exit = TraceExit::StartAfterLastTimestep;
            return trace;
        }
        let Some(initial) = first.velocity(start) else
        {
            trace.exit = TraceExit::StartWithoutData;
            return trace;
        };

        let limits = &self.limits;
        let multiplier = limits.vector_multiplier;
        let min_delta_time = if limits.min_delta_time > 0.0 { limits.min_delta_time } else { ZERO_TOLERANCE };
        let direction_limit = limits.max_change_direction.cos();
        let mut velocity = [initial[0] * multiplier, initial[1] * multiplier];
        let mut speed = velocity[0].hypot(velocity[1]);
        let mut position = *start;
        let mut delta_t = 1.0;
        let mut elapsed = 0.0;
        let mut keep_going = true;
        while keep_going
        {
            if limits.max_change_distance > 0.0
            {
                let d = limits.max_change_distance;
                let bound = (d * d / (velocity[0] * velocity[0] + velocity[1] * velocity[1] + d * ZERO_TOLERANCE)).sqrt();
                if delta_t > bound
                {
                    delta_t = bound;
                    trace.exit = TraceExit::MaxChangeDistance;
                }
            }
            if start_time + elapsed + delta_t > last.time
            {
                delta_t = last.time - elapsed - start_time;
                keep_going = false;
                trace.exit = TraceExit::ReachedLastTimestep;
            }
            if limits.max_tracing_time > 0.0 && elapsed + delta_t > limits.max_tracing_time
            {
                delta_t = limits.max_tracing_time - elapsed;
                keep_going = false;
                trace.exit = TraceExit::MaxTracingTime;
            }

            let candidate = [position[0] + delta_t * velocity[0], position[1] + delta_t * velocity[1], position[2]];
            let Some(next) = last.velocity(&candidate) else
            {
                delta_t /= 2.0;
                if delta_t < min_delta_time
                {
                    keep_going = false;
                }
                trace.exit = TraceExit::OutOfDomain;
                continue;
            };
            let next = [next[0] * multiplier, next[1] * multiplier];
            if next[0].abs() <= ZERO_VELOCITY && next[1].abs() <= ZERO_VELOCITY
            {
                trace.distance += distance_2d(&position, &candidate);
                trace.points.push(candidate);
                trace.times.push(start_time + elapsed + delta_t);
                trace.exit = TraceExit::ZeroVelocity;
                return trace;
            }

            let next_speed = next[0].hypot(next[1]);
            let velocity_jump = limits.max_change_velocity > 0.0 && (next_speed - speed).abs() > limits.max_change_velocity;
            let direction_jump = !velocity_jump && limits.max_change_direction > 0.0
                && direction_cosine(velocity, next) < direction_limit;
            if velocity_jump || direction_jump
            {
                delta_t /= 2.0;
                let below_min_delta_time = delta_t < min_delta_time;
                if below_min_delta_time
                {
                    keep_going = false;
                }
                trace.exit = if velocity_jump
                {
                    TraceExit::MaxChangeVelocity { below_min_delta_time }
                }
                else
                {
                    TraceExit::MaxChangeDirection { below_min_delta_time }
                };
                continue;
            }

            let step = distance_2d(&position, &candidate);
            if limits.max_tracing_distance > 0.0 && trace.distance + step > limits.max_tracing_distance
            {
                let fraction = (limits.max_tracing_distance - trace.distance) / step;
                trace.points.push(lerp(&position, &candidate, fraction));
                trace.times.push(start_time + elapsed + delta_t * fraction);
                trace.distance = limits.max_tracing_distance;
                trace.exit = TraceExit::MaxTracingDistance;
                return trace;
            }
            trace.distance += step;
            let is_new = trace.points.last().map_or(true, |p|
                (candidate[0] - p[0]).abs() > ZERO_TOLERANCE || (candidate[1] - p[1]).abs() > ZERO_TOLERANCE);
            if is_new
            {
                trace.points.push(candidate);
                trace.times.push(start_time + elapsed + delta_t);
            }
            position = candidate;
            elapsed += delta_t;
            velocity = next;
            speed = next_speed;
            delta_t *= STEP_GROWTH;
        }
        trace
    }
}

impl<G: Grid + Send + Sync> GridTrace<G>
{
    /// Trace every start point from the same time, spread over the rayon pool.
    pub fn trace_points_parallel(&self, starts: &[Point], start_time: f64) -> Vec<Trace>
    {
        starts.par_iter().map(|p| self.trace_point(p, start_time)).collect()
    }
}

/// Cosine of the angle between two vectors.
#[inline]
fn direction_cosine(a: [f64; 2], b: [f64; 2]) -> f64
{
    (a[0] * b[0] + a[1] * b[1]) / (a[0].hypot(a[1]) * b[0].hypot(b[1]))
}

#[cfg(test)]
fn assert_trace(trace: &Trace, points: &[[f64; 2]], times: &[f64], tol: f64)
{
    assert_eq!(trace.points.len(), points.len(), "{:?}", trace.points);
    assert_eq!(trace.times.len(), times.len(), "{:?}", trace.times);
    for (a, e) in trace.points.iter().zip(points)
    {
        assert!((a[0] - e[0]).abs() < tol && (a[1] - e[1]).abs() < tol, "{:?} != {:?}", trace.points, points);
    }
    for (a, e) in trace.times.iter().zip(times)
    {
        assert!((a - e).abs() < tol, "{:?} != {:?}", trace.times, times);
    }
}

///
/// Unit square split into two triangles along (0,0)-(1,1), with a uniform
/// field of (1,1) at times 0 and 10.
///
#[cfg(test)]
fn single_cell_trace() -> GridTrace<crate::grids::ugrid::UGrid>
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let grid = crate::grids::ugrid::UGrid::new(points, &[5, 3, 0, 1, 2, 5, 3, 2, 3, 0]).unwrap();
    let mut tracer = GridTrace::new(Arc::new(grid));
    tracer.set_limits(TraceLimits
    {
        vector_multiplier: 1.0,
        max_tracing_time: 100.0,
        max_tracing_distance: 100.0,
        min_delta_time: 0.1,
        max_change_distance: 100.0,
        max_change_velocity: 100.0,
        max_change_direction: 1.5 * std::f64::consts::PI,
    });
    let vectors = [[1.0, 1.0]; 4];
    tracer.add_grid_point_scalars_at_time(&vectors, &[true; 4], 0.0).unwrap();
    tracer.add_grid_point_scalars_at_time(&vectors, &[true; 4], 10.0).unwrap();
    tracer
}

/// Two unit quads side by side with cell vectors (0.1,0) and (0.2,0) at times 0 and 10.
#[cfg(test)]
fn two_cell_trace() -> GridTrace<crate::grids::ugrid::UGrid>
{
    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0]];
    let grid = crate::grids::ugrid::UGrid::new(points, &[9, 4, 0, 1, 2, 3, 9, 4, 1, 4, 5, 2]).unwrap();
    let mut tracer = GridTrace::new(Arc::new(grid));
    tracer.set_limits(TraceLimits
    {
        vector_multiplier: 1.0,
        max_tracing_time: 100.0,
        max_tracing_distance: 100.0,
        min_delta_time: 0.1,
        max_change_distance: 100.0,
        max_change_velocity: 100.0,
        max_change_direction: 1.5 * std::f64::consts::PI,
    });
    let vectors = [[0.1, 0.0], [0.2, 0.0]];
    tracer.add_grid_cell_scalars_at_time(&vectors, &[true; 2], 0.0).unwrap();
    tracer.add_grid_cell_scalars_at_time(&vectors, &[true; 2], 10.0).unwrap();
    tracer
}

/// Vectors turning around the unit square, so a trace starting at a corner spirals inwards.
#[cfg(test)]
fn rotating_trace() -> GridTrace<crate::grids::ugrid::UGrid>
{
    let mut tracer = single_cell_trace();
    tracer.set_max_change_direction(std::f64::consts::PI * 0.2);
    tracer.set_min_delta_time(-1.0);
    let vectors = [[0.0, 1.0], [-1.0, 0.0], [0.0, -1.0], [1.0, 0.0]];
    tracer.add_grid_point_scalars_at_time(&vectors, &[true; 4], 0.0).unwrap();
    tracer.add_grid_point_scalars_at_time(&vectors, &[true; 4], 10.0).unwrap();
    tracer
}

#[test]
fn check_basic_trace()
{
    let tracer = single_cell_trace();
    assert_eq!(tracer.vector_multiplier(), 1.0);
    assert_eq!(tracer.max_tracing_time(), 100.0);
    assert_eq!(tracer.min_delta_time(), 0.1);
    assert_eq!(tracer.time_range(), Some((0.0, 10.0)));
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 0.5);
    assert_trace(&trace, &[[1.0, 1.0]], &[1.0], 1e-12);
    assert!((trace.distance - 0.5f64.hypot(0.5)).abs() < 1e-12);
    assert_eq!(trace.exit, TraceExit::OutOfDomain);

    // starting before the first timestep
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], -0.1);
    assert_trace(&trace, &[[1.0, 1.0]], &[0.4], 1e-12);
}

#[test]
fn check_start_rejected()
{
    let tracer = single_cell_trace();
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 10.1);
    assert!(trace.points.is_empty() && trace.times.is_empty());
    assert_eq!(trace.exit, TraceExit::StartAfterLastTimestep);

    let trace = tracer.trace_point(&[-0.1, 0.0, 0.0], 0.5);
    assert!(trace.points.is_empty() && trace.times.is_empty());
    assert_eq!(trace.exit, TraceExit::StartWithoutData);

    let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let grid = crate::grids::ugrid::UGrid::new(points, &[5, 3, 0, 1, 2]).unwrap();
    let empty = GridTrace::new(Arc::new(grid));
    assert_eq!(empty.trace_point(&[0.2, 0.2, 0.0], 0.0).exit, TraceExit::NoVectorData);
    assert_eq!(empty.time_range(), None);
}

#[test]
fn check_max_change_distance()
{
    let mut tracer = single_cell_trace();
    tracer.set_max_change_distance(0.25);
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 0.5);
    let step = 0.25 / 2.0f64.sqrt();
    assert_trace(&trace, &[[0.5 + step, 0.5 + step], [0.5 + 2.0 * step, 0.5 + 2.0 * step]], &[0.5 + step, 0.5 + 2.0 * step], 1e-6);
}

#[test]
fn check_small_vectors()
{
    let mut tracer = single_cell_trace();
    let vectors = [[0.1, 0.1]; 4];
    tracer.add_grid_point_scalars_at_time(&vectors, &[true; 4], 0.0).unwrap();
    tracer.add_grid_point_scalars_at_time(&vectors, &[true; 4], 10.0).unwrap();
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 0.5);
    let expected = [0.6, 0.72, 0.864, 0.9504, 0.97632, 0.991872];
    let points: Vec<[f64; 2]> = expected.iter().map(|&v| [v, v]).collect();
    assert_trace(&trace, &points, &[1.5, 2.7, 4.14, 5.004, 5.2632, 5.41872], 1e-9);
}

#[test]
fn check_strong_direction_change()
{
    let tracer = rotating_trace();
    assert_eq!(tracer.min_delta_time(), ZERO_TOLERANCE);
    let trace = tracer.trace_point(&[0.0, 0.0, 0.0], 0.5);
    assert_eq!(trace.points.len(), 30);
    assert_eq!(trace.times.len(), 30);
    assert_trace(&Trace { points: trace.points[..4].to_vec(), times: trace.times[..4].to_vec(), ..Trace::default() },
        &[[0.0, 0.25], [0.075, 0.475], [0.219, 0.637], [0.309288, 0.668104]], &[0.75, 1.05, 1.41, 1.626], 1e-4);
    let last = trace.points[29];
    assert!((last[0] - 0.49987374966305814).abs() < 1e-4 && (last[1] - 0.49982308521808211).abs() < 1e-4);
    assert!((trace.times[29] - 9.5766343633804656).abs() < 1e-4);
    assert!(trace.times.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn check_max_tracing_time()
{
    let mut tracer = rotating_trace();
    tracer.set_max_tracing_time(5.0);
    let trace = tracer.trace_point(&[0.0, 0.0, 0.0], 0.5);
    assert_eq!(trace.points.len(), 17);
    let last = trace.points[16];
    assert!((last[0] - 0.49237657318600692).abs() < 1e-4 && (last[1] - 0.49772905815126539).abs() < 1e-4);
    assert!((trace.times[16] - 5.5).abs() < 1e-12);
    assert_eq!(trace.exit, TraceExit::MaxTracingTime);
}

#[test]
fn check_max_tracing_distance()
{
    let mut tracer = rotating_trace();
    tracer.set_max_tracing_distance(1.0);
    let trace = tracer.trace_point(&[0.0, 0.0, 0.0], 0.5);
    assert_trace(&trace, &[
        [0.0, 0.25], [0.075, 0.475], [0.219, 0.637], [0.309288, 0.668104],
        [0.4022931072, 0.6739639936], [0.486793619705856, 0.650244984967168], [0.501835563121914, 0.6376337294171657],
    ], &[0.75, 1.05, 1.41, 1.626, 1.8852, 2.19624, 2.288267028296829], 1e-4);
    assert_eq!(trace.distance, 1.0);
    assert_eq!(trace.exit, TraceExit::MaxTracingDistance);
}

#[test]
fn check_vector_multiplier()
{
    let mut tracer = rotating_trace();
    tracer.set_vector_multiplier(0.5);
    let trace = tracer.trace_point(&[0.0, 0.0, 0.0], 0.5);
    assert_eq!(trace.points.len(), 16);
    assert!((trace.points[0][1] - 0.25).abs() < 1e-12);
    assert!((trace.times[0] - 1.0).abs() < 1e-12);
    let last = trace.points[15];
    assert!((last[0] - 0.49175783605462037).abs() < 1e-4 && (last[1] - 0.49422637094165467).abs() < 1e-4);
    assert!((trace.times[15] - 10.0).abs() < 1e-12);
    assert_eq!(trace.exit, TraceExit::ReachedLastTimestep);
}

#[test]
fn check_cell_vectors_across_cells()
{
    let tracer = two_cell_trace();
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 0.0);
    assert_trace(&trace, &[
        [0.6, 0.5], [0.732, 0.5], [0.909408, 0.5], [1.1529537024, 0.5], [1.4957101821296641, 0.5], [1.9923067381693527, 0.5],
    ], &[1.0, 2.2, 3.64, 5.368, 7.4416, 9.92992], 1e-6);
}

#[test]
fn check_max_change_velocity()
{
    let mut tracer = two_cell_trace();
    tracer.set_max_change_velocity(0.015);
    tracer.set_min_delta_time(0.001);
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 0.0);
    assert_trace(&trace, &[
        [0.6, 0.5], [0.732, 0.5], [0.820704, 0.5], [0.9348128256, 0.5], [1.083574219358208, 0.5], [1.1820852043960435, 0.5],
        [1.3076521920701263, 0.5], [1.3886164999164212, 0.5], [1.490125315632377, 0.5], [1.6184829344025988, 0.5],
        [1.7732763449625988, 0.5], [1.9590284376345988, 0.5],
    ], &[1.0, 2.2, 2.92, 3.784, 4.8208, 5.44288, 6.189376, 6.6372736, 7.17475072, 7.819723264, 8.5936903168, 9.52245078016], 1e-9);
}

#[test]
fn check_distinct_timesteps()
{
    let mut tracer = two_cell_trace();
    tracer.add_grid_cell_scalars_at_time(&[[0.2, 0.0], [0.3, 0.0]], &[true; 2], 20.0).unwrap();
    assert_eq!(tracer.time_range(), Some((10.0, 20.0)));
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 10.0);
    assert_trace(&trace, &[[0.6, 0.5], [0.852, 0.5], [1.190688, 0.5], [1.6556388864, 0.5], [1.9666788864, 0.5]],
        &[11.0, 12.2, 13.64, 15.368, 16.4048], 1e-6);
}

#[test]
fn check_inactive_cell_stops_trace()
{
    let mut tracer = two_cell_trace();
    tracer.add_grid_cell_scalars_at_time(&[[0.2, 0.0], [99999.0, 0.0]], &[true, false], 20.0).unwrap();
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 10.0);
    assert_trace(&trace, &[[0.6, 0.5], [0.84, 0.5], [0.984, 0.5]], &[11.0, 12.2, 12.92], 1e-6);
    assert_eq!(trace.exit, TraceExit::OutOfDomain);
}

#[test]
fn check_zero_velocity_stops_trace()
{
    let mut tracer = two_cell_trace();
    tracer.add_grid_cell_scalars_at_time(&[[0.0, 0.0], [0.0, 0.0]], &[], 20.0).unwrap();
    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 10.0);
    assert_trace(&trace, &[[0.6, 0.5]], &[11.0], 1e-9);
    assert_eq!(trace.exit, TraceExit::ZeroVelocity);
}

#[test]
fn check_direction_cosine()
{
    assert!(direction_cosine([0.0, 1.0], [1.0, 0.0]).abs() < 1e-12);
    assert!((direction_cosine([0.0, 1.0], [1.0, 1.0]) - 0.5f64.sqrt()).abs() < 1e-12);
    assert!((direction_cosine([0.0, 1.0], [0.0, -1.0]) + 1.0).abs() < 1e-12);
    assert!((direction_cosine([1.0, 1.0], [-1.0, -1.0]) + 1.0).abs() < 1e-12);
    assert!((direction_cosine([2.0, 5.0], [3.0, 6.0]) - 0.9965).abs() < 1e-3);
    assert!((direction_cosine([0.0, 1.0], [0.0, 1.0]) - 1.0).abs() < 1e-12);
}

#[test]
fn check_circulating_field()
{
    // vectors circle the outside of a 2x2 grid clockwise and double in the second timestep
    let points: Vec<Point> = (0..3).flat_map(|j| (0..3).map(move |i| [i as f64, j as f64, 0.0])).collect();
    let cells = [9, 4, 0, 1, 4, 3, 9, 4, 1, 2, 5, 4, 9, 4, 3, 4, 7, 6, 9, 4, 4, 5, 8, 7];
    let grid = Arc::new(crate::grids::ugrid::UGrid::new(points, &cells).unwrap());
    let mut tracer = GridTrace::new(grid.clone());
    tracer.set_vector_multiplier(2.0);
    tracer.set_min_delta_time(0.01);
    tracer.set_max_change_direction(std::f64::consts::PI / 4.0);
    let first = [[0.0, 1.0], [-0.1, 0.0], [-1.0, 0.0], [0.0, 0.1], [0.0, 0.0], [0.0, -0.1], [1.0, 0.0], [0.1, 0.0], [0.0, -1.0]];
    let second: Vec<[f64; 2]> = first.iter().map(|v| [2.0 * v[0], 2.0 * v[1]]).collect();
    tracer.add_grid_point_scalars_at_time(&first, &[], 0.0).unwrap();
    tracer.add_grid_point_scalars_at_time(&second, &[], 20.0).unwrap();

    let trace = tracer.trace_point(&[0.5, 0.5, 0.0], 0.0);
    assert_eq!(trace.exit, TraceExit::ReachedLastTimestep);
    assert!(trace.points.len() > 30);
    assert_eq!(trace.points.len(), trace.times.len());
    assert!((trace.times[trace.times.len() - 1] - 20.0).abs() < 1e-9);
    assert!(trace.times.windows(2).all(|w| w[0] < w[1]));
    assert!(trace.points.iter().all(|p| (0.0..=2.0).contains(&p[0]) && (0.0..=2.0).contains(&p[1])));
    let walked: f64 = std::iter::once(&[0.5, 0.5, 0.0]).chain(&trace.points).collect::<Vec<_>>()
        .windows(2).map(|w| distance_2d(w[0], w[1])).sum();
    assert!((trace.distance - walked).abs() < 1e-6);

    let copy = GridTrace::from_trace(&tracer);
    assert!(Arc::ptr_eq(copy.grid(), &grid));
    assert_eq!(copy.limits(), tracer.limits());
    assert_eq!(copy.trace_point(&[0.5, 0.5, 0.0], 0.0).exit, TraceExit::NoVectorData);
}

#[test]
fn check_parallel_traces_match()
{
    let tracer = rotating_trace();
    let starts = vec![[0.0, 0.0, 0.0], [0.5, 0.25, 0.0], [0.9, 0.9, 0.0], [2.0, 2.0, 0.0]];
    let parallel = tracer.trace_points_parallel(&starts, 0.5);
    for (start, trace) in starts.iter().zip(&parallel)
    {
        assert_eq!(&tracer.trace_point(start, 0.5), trace);
    }
    assert_eq!(parallel[3].exit, TraceExit::StartWithoutData);
}

#[test]
fn check_exit_messages()
{
    assert_eq!(TraceExit::ReachedLastTimestep.to_string(), "Point reached the last timestep.");
    assert!(TraceExit::MaxChangeDirection { below_min_delta_time: true }.to_string().contains("minimum"));
}
