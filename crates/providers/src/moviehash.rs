//! OpenSubtitles-style 64-bit content hash for local video files.
//!
//! hash = file size + wrapping sum of the little-endian u64 words of the
//! first 64 KiB and the last 64 KiB. Only meaningful for files of at least
//! 64 KiB, and inapplicable to remote streams; kept for future local-file
//! matching, the network search path does not use it.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const HASH_BLOCK: u64 = 64 * 1024;

/// Compute the content hash of `path`.
///
/// Fails with `InvalidInput` for files smaller than 64 KiB.
pub fn compute(path: &Path) -> std::io::Result<u64> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size < HASH_BLOCK {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("file too small for content hash: {size} bytes"),
        ));
    }

    let mut hash = size;
    hash = hash.wrapping_add(sum_block(&mut file)?);

    file.seek(SeekFrom::End(-(HASH_BLOCK as i64)))?;
    hash = hash.wrapping_add(sum_block(&mut file)?);

    Ok(hash)
}

/// Hash formatted the way providers expect it: 16 lowercase hex digits.
pub fn compute_hex(path: &Path) -> std::io::Result<String> {
    Ok(format!("{:016x}", compute(path)?))
}

fn sum_block(file: &mut File) -> std::io::Result<u64> {
    let mut buf = [0u8; HASH_BLOCK as usize];
    file.read_exact(&mut buf)?;

    let mut sum: u64 = 0;
    for word in buf.chunks_exact(8) {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(word);
        sum = sum.wrapping_add(u64::from_le_bytes(bytes));
    }
    Ok(sum)
}
