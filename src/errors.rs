use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GTError
{
    InvalidCellStream,
    UnknownCellType,
    InvalidCellDefinition,
    PointIndexOutOfRange,
    NonFiniteCoordinate,
    KdTreeError,
    LZ4DecompressionFailed,
    SerializationFailed,
    DeserializationFailed,
}
impl std::error::Error for GTError {}

impl Display for GTError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", *self)
    }
}
