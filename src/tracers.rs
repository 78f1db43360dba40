pub mod grid_trace;
