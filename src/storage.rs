pub mod locator_cache;
pub mod scalar_field;
pub mod triangles;
