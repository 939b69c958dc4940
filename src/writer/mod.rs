//! Output artifacts: binary blobs, generated C, symbol maps and JSON dumps.
pub mod bin;
pub mod c;
pub mod json;
pub mod sym;

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Component, Path};

/// Opens `path` for writing, creating missing parent directories first.
/// Directories that already exist, or appear concurrently, are fine.
pub fn create(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Lexically drops `.` and folds `..` into its parent.
fn normalize(path: &Path) -> Vec<Component<'_>> {
    let mut out: Vec<Component> = Vec::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir if matches!(out.last(), Some(Component::Normal(_))) => {
                out.pop();
            }
            _ => out.push(c),
        }
    }
    out
}

/// `target` relative to the directory `from`, with `/` separators, for
/// `#embed` lines. Both paths should be absolute (or both relative to the
/// same directory).
pub fn relative_path(target: &Path, from: &Path) -> String {
    let target = normalize(target);
    let from = normalize(from);
    let common = target
        .iter()
        .zip(&from)
        .take_while(|(a, b)| a == b)
        .count();

    let parts: Vec<String> = std::iter::repeat_n("..".to_string(), from.len() - common)
        .chain(
            target[common..]
                .iter()
                .map(|c| c.as_os_str().to_string_lossy().into_owned()),
        )
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
