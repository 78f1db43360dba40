//!
//! Extraction of scalar data from 2D unstructured grids.
//!
//! Values defined at grid points or grid cells are resampled at arbitrary
//! locations ([`extractors::point_extractor::PointExtractor`]) or along a
//! polyline ([`extractors::polyline_extractor::PolylineExtractor`]). The
//! grid-derived spatial structures are built once and shared, so the same
//! extractor can be re-used for every timestep of a transient dataset.
//!
//! [`tracers::grid_trace::GridTrace`] follows particles through a vector field
//! given at two timesteps, using the same extraction machinery.
//!
pub mod algorithms;
pub mod errors;
pub mod extractors;
pub mod grids;
pub mod serialization;
pub mod storage;
pub mod tracers;
pub mod utilities;

pub use errors::GTError;
pub use extractors::point_extractor::PointExtractor;
pub use extractors::polyline_extractor::PolylineExtractor;
pub use grids::grid::{CellType, Grid};
pub use grids::ugrid::UGrid;
pub use storage::scalar_field::{ActivityMask, DataLocation, ScalarField};
pub use tracers::grid_trace::{GridTrace, Trace, TraceExit, TraceLimits};
