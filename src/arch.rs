use crate::result::*;

/// A checked cast from u64 to usize
///
/// Archive offsets are 64-bit on the wire; on a 32-bit host they might not
/// fit in memory-sized indices.
pub fn usize<I: Into<u64>>(i: I) -> Result<usize> {
    let i: u64 = i.into();
    if cfg!(target_pointer_width = "64") {
        Ok(i as usize)
    } else if i > usize::MAX as u64 {
        Err(Error::TooLarge)
    } else {
        Ok(i as usize)
    }
}
