pub mod cli;
pub mod diagnostics;
pub mod model;
pub mod parser;
pub mod processor;
pub mod writer;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use tracing::info;

use diagnostics::ErrorCollector;
use model::Tileset;
use processor::{LevelLayout, TilesetLayout};

/// Parse and lay out one level file. `None` when parsing aborted; the
/// reason is in `errors` either way.
pub fn compile_level_file(input: &Path, errors: &mut ErrorCollector) -> Option<LevelLayout> {
    let level = parser::lvl::parse_file(input, errors).ok()?;
    Some(processor::compile_level(&level, input, errors))
}

pub fn compile_tileset_file(input: &Path, errors: &mut ErrorCollector) -> Option<(Tileset, TilesetLayout)> {
    let ts = parser::tset::parse_file(input, errors).ok()?;
    let layout = processor::compile_tileset(&ts);
    Some((ts, layout))
}

fn write_text(path: &Path, body: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) -> anyhow::Result<()> {
    let mut out = writer::create(path).with_context(|| format!("Creating {}", path.display()))?;
    body(&mut out)
        .and_then(|_| out.flush())
        .with_context(|| format!("Writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_blob(path: &Path, blob: &[u8]) -> anyhow::Result<()> {
    let n = writer::bin::emit(blob, path).with_context(|| format!("Writing {}", path.display()))?;
    println!("Wrote {} ({n} bytes)", path.display());
    Ok(())
}

fn parent(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("."))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `levelc`: compile, report, and write every artifact when nothing failed.
pub fn levelc(args: &cli::LevelcCli) -> anyhow::Result<()> {
    let mut errors = ErrorCollector::new();
    let layout = compile_level_file(&args.input, &mut errors);
    errors.report_and_exit();
    let layout = layout.context("level parse aborted without a diagnostic")?;

    let out = args.outputs(&layout.name);
    info!(?out, "resolved level outputs");

    write_blob(&out.bin, &layout.blob)?;
    write_text(&out.ids, |f| writer::c::level_ids(f, &layout))?;
    write_text(&out.json, |f| writer::json::emit(f, &layout))?;
    write_text(&out.sym, |f| writer::sym::level(f, &layout))?;
    write_text(&out.blob_h, |f| writer::c::level_blob_h(f, &out.blob_name))?;
    let rel_bin = writer::relative_path(&out.bin, parent(&out.blob_c));
    write_text(&out.blob_c, |f| {
        writer::c::level_blob_c(f, &out.blob_name, &file_name(&out.blob_h), &rel_bin)
    })?;
    if let Some(path) = &out.format_h {
        write_text(path, writer::c::level_format_h)?;
    }
    Ok(())
}

/// `tilesetc`: same contract as [`levelc`] for tilesets.
pub fn tilesetc(args: &cli::TilesetcCli) -> anyhow::Result<()> {
    let mut errors = ErrorCollector::new();
    let compiled = compile_tileset_file(&args.input, &mut errors);
    errors.report_and_exit();
    let (ts, layout) = compiled.context("tileset parse aborted without a diagnostic")?;

    // a missing charset was already reported by the parser
    let charset_src = Some(ts.charset_path.as_str())
        .filter(|p| !p.is_empty())
        .and_then(|p| parser::tset::resolve_charset(parent(&args.input), p));

    let out = args.outputs(&ts.name, charset_src.is_some());
    info!(?out, "resolved tileset outputs");

    write_blob(&out.bin, &layout.blob)?;
    write_text(&out.ids, |f| writer::c::tileset_ids(f, &layout))?;

    let array = format!("{}_tset_blob", out.symbol);
    write_text(&out.blob_h, |f| writer::c::tileset_embed_h(f, &array))?;
    let header = format!("tilesets/{}", file_name(&out.blob_h));
    let rel = writer::relative_path(&out.bin, parent(&out.blob_c));
    write_text(&out.blob_c, |f| writer::c::tileset_embed_c(f, &array, &header, &rel))?;

    if let (Some((charset_h, charset_c)), Some(src)) = (&out.charset, &charset_src) {
        let src = std::path::absolute(src).unwrap_or_else(|_| src.clone());
        let array = format!("{}_charset_blob", out.symbol);
        write_text(charset_h, |f| writer::c::tileset_embed_h(f, &array))?;
        let header = format!("tilesets/{}", file_name(charset_h));
        let rel = writer::relative_path(&src, parent(charset_c));
        write_text(charset_c, |f| writer::c::tileset_embed_c(f, &array, &header, &rel))?;
    }

    if let Some(path) = &out.sym {
        write_text(path, |f| writer::sym::tileset(f, &layout))?;
    }
    if let Some(path) = &out.json {
        write_text(path, |f| writer::json::emit(f, &layout))?;
    }
    Ok(())
}
