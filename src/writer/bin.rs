//! Raw blob output.

use std::io::{self, Write};
use std::path::Path;

/// Writes `blob` to `path` and returns the byte count for the `Wrote` line.
pub fn emit(blob: &[u8], path: &Path) -> io::Result<usize> {
    let mut out = super::create(path)?;
    out.write_all(blob)?;
    out.flush()?;
    Ok(blob.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_writes_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets/levels/one.bin");
        assert_eq!(emit(b"LVL1\x01", &path).unwrap(), 5);
        assert_eq!(std::fs::read(&path).unwrap(), b"LVL1\x01");
    }
}
