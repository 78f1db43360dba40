pub mod point_extractor;
pub mod polyline_extractor;
