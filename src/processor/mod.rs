//! The functional core: parsed definitions in, immutable layouts out.
pub mod ast;
pub mod blob;
pub mod bytecode;
pub mod map;
pub mod symbols;
pub mod tileset;
pub mod vm;

use std::path::Path;

use crate::diagnostics::{DiagnosticSink, Reporter};
use crate::model::{LevelDef, Tileset};

pub use blob::LevelLayout;
pub use tileset::TilesetLayout;

/// Runs every level pass. Problems land in `sink`; the caller decides
/// whether the layout may be written.
pub fn compile_level(level: &LevelDef, path: &Path, sink: &mut dyn DiagnosticSink) -> LevelLayout {
    let mut rep = Reporter::new(sink, path);
    blob::compile(level, &mut rep)
}

pub fn compile_tileset(ts: &Tileset) -> TilesetLayout {
    tileset::compile(ts)
}
