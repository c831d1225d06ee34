// src/engine/verify.rs
//
// Structure check for corrupted output, using img-parts as an independent
// JPEG segment parser: the marker sequence before and after corruption must
// be the same.

use crate::error::CrungeError;
use img_parts::jpeg::Jpeg;
use img_parts::Bytes;

/// Marker codes of every top-level segment, in file order.
pub fn marker_layout(bytes: &[u8]) -> Result<Vec<u8>, CrungeError> {
    let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| CrungeError::decode_failed(format!("jpeg segment parse: {e}")))?;
    Ok(jpeg.segments().iter().map(|s| s.marker()).collect())
}

/// Fail unless `corrupted` has the same marker layout as `original`.
pub fn verify_structure(original: &[u8], corrupted: &[u8]) -> Result<(), CrungeError> {
    if original.len() != corrupted.len() {
        return Err(CrungeError::structure_mismatch(format!(
            "length changed from {} to {}",
            original.len(),
            corrupted.len()
        )));
    }

    let before = marker_layout(original)?;
    let after = marker_layout(corrupted).map_err(|e| {
        CrungeError::structure_mismatch(format!("corrupted output no longer parses: {e}"))
    })?;
    if before != after {
        return Err(CrungeError::structure_mismatch(format!(
            "marker layout changed: {} segments before, {} after",
            before.len(),
            after.len()
        )));
    }
    Ok(())
}
