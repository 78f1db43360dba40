use serde::{de::DeserializeOwned, Serialize};

use crate::errors::GTError;

///
/// Encode `data` with bincode and compress it with LZ4. The uncompressed size
/// is prepended so the buffer can be restored with [`from_compressed_bytes`].
///
pub fn to_compressed_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>, GTError>
{
    let bytes = bincode::serde::encode_to_vec(data, bincode::config::standard()).map_err(|_|GTError::SerializationFailed)?;
    Ok(lz4_flex::compress_prepend_size(&bytes))
}

pub fn from_compressed_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GTError>
{
    let buffer = lz4_flex::decompress_size_prepended(bytes).map_err(|_|GTError::LZ4DecompressionFailed)?;
    let (data, _) = bincode::serde::decode_from_slice(&buffer, bincode::config::standard()).map_err(|_|GTError::DeserializationFailed)?;
    Ok(data)
}

#[test]
fn check_grid_bytes()
{
    use crate::grids::grid::Grid;
    use crate::grids::ugrid::UGrid;
    let points = vec![[0.0, 0.0, 1.0], [1.0, 0.0, 2.0], [1.0, 1.0, 3.0], [0.0, 1.0, 4.0], [2.0, 0.5, 0.0]];
    let grid = UGrid::new(points, &[9, 4, 0, 1, 2, 3, 5, 3, 1, 4, 2]).unwrap();
    let bytes = grid.to_bytes().unwrap();
    let restored = UGrid::from_bytes(&bytes).unwrap();
    assert_eq!(restored, grid);
    assert_eq!(restored.cell_points(1), &[1, 4, 2]);
}

#[test]
fn check_scalar_field_bytes()
{
    use crate::storage::scalar_field::{ActivityMask, DataLocation, ScalarField};
    let field = ScalarField::new(DataLocation::Cells, &[1.0, 2.5], ActivityMask::new(vec![true, false], DataLocation::Points));
    let restored: ScalarField = from_compressed_bytes(&to_compressed_bytes(&field).unwrap()).unwrap();
    assert_eq!(restored, field);
}

#[test]
fn check_corrupt_bytes()
{
    use crate::grids::ugrid::UGrid;
    assert_eq!(UGrid::from_bytes(&[1, 2, 3]), Err(GTError::LZ4DecompressionFailed));
    let truncated = lz4_flex::compress_prepend_size(&[7u8]);
    assert_eq!(UGrid::from_bytes(&truncated), Err(GTError::DeserializationFailed));
}
