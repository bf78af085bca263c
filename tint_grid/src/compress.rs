use crate::dataset::{Dataset, Encoding, StorageLayout};

/// Data variables with fewer dimensions than this are stored as-is.
pub const DEFAULT_MIN_DIMS: usize = 2;

/// zlib level used for compressed variables.
pub const DEFLATE_LEVEL: u8 = 4;

/// Upper bound on the uncompressed size of one chunk of `f64` values.
pub const MAX_CHUNK_BYTES: usize = 4 << 20;

pub fn compressed_encoding() -> Encoding {
    Encoding {
        deflate_level: Some(DEFLATE_LEVEL),
        layout: StorageLayout::Chunked,
    }
}

/// Enables deflate on every data variable with at least `min_dims` dimensions.
///
/// Coordinates are never touched. Returns the number of variables updated.
pub fn compress_all(dataset: &mut Dataset, min_dims: usize) -> usize {
    let mut updated = 0;
    for variable in dataset.variables_mut() {
        if variable.is_data() && variable.ndims() >= min_dims {
            variable.encoding = compressed_encoding();
            updated += 1;
        }
    }
    updated
}

/// Chunk shape for a compressed variable of the given shape.
///
/// Multi-dimensional variables are chunked one leading step at a time. The
/// largest remaining axis is then halved until a chunk fits in
/// [`MAX_CHUNK_BYTES`].
pub fn chunk_shape(shape: &[usize]) -> Vec<usize> {
    let mut chunks: Vec<usize> = shape.iter().map(|&len| len.max(1)).collect();
    if chunks.len() > 1 {
        chunks[0] = 1;
    }
    let bytes = |chunks: &[usize]| {
        chunks
            .iter()
            .fold(std::mem::size_of::<f64>(), |acc, &len| acc.saturating_mul(len))
    };
    while bytes(chunks.as_slice()) > MAX_CHUNK_BYTES {
        let Some(largest) = chunks.iter_mut().max_by_key(|len| **len) else {
            break;
        };
        if *largest == 1 {
            break;
        }
        *largest = largest.div_ceil(2);
    }
    chunks
}
