pub mod grid;
pub mod ugrid;
