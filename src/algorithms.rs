pub mod interpolation;
pub mod point_locator;
pub mod traversal;
pub mod triangulation;
