//! Parser for `.tset` tileset descriptions.
//!
//! ```text
//! TSET name="lab" tileSize=2x2 bgColor=black mc1Color=white mc2Color=blue count=16
//! TILES
//!   FLOOR_A chars=0x51,0x52,0x53,0x54 color=6 flags=FLOOR|STANDABLE
//!   WALL    chars=a,b,c,d colors=6,6,7,7 flags=SOLID
//! END
//! CHARMAP
//!   . FLOOR_A
//!   C CRATE
//! END
//! OBJECTS
//!   CRATE size=2x1 tiles=WALL,WALL
//! END
//! ```
//!
//! OBJECTS and CHARMAP entries are collected while scanning and resolved
//! after all tiles are known, so they may refer to tiles declared later.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::lexer::{LineTokens, source_lines};
use super::{parse_char_or_num, parse_color, parse_list, parse_num, parse_size, read_source};
use crate::diagnostics::{Aborted, DiagnosticSink, ErrorKind, Reporter};
use crate::model::tileset::{flag_bit, tile_key};
use crate::model::{ColorMode, ObjectStamp, SourceLine, StampDef, TileDef, Tileset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Tiles,
    Charmap,
    Objects,
}

/// What a line means, decided from its first word and the open section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Header,
    End,
    FlagBits,
    Open(Section),
    /// `TILE id=.. name=..` outside a TILES block.
    ExplicitTile,
    Entry,
}

fn classify(line: &SourceLine, head: &str, mode: Option<Section>) -> Directive {
    if line.text == "END" {
        return Directive::End;
    }
    match head {
        "TSET" => Directive::Header,
        "FLAGBITS" => Directive::FlagBits,
        "TILES" => Directive::Open(Section::Tiles),
        "CHARMAP" => Directive::Open(Section::Charmap),
        "OBJECTS" => Directive::Open(Section::Objects),
        "TILE" if mode != Some(Section::Tiles) => Directive::ExplicitTile,
        _ => Directive::Entry,
    }
}

struct CharmapEntry {
    line: usize,
    col: usize,
    ch: char,
    target: String,
}

struct TsetParser<'r> {
    rep: Reporter<'r>,
    base_dir: PathBuf,
    default_name: String,
    ts: Option<Tileset>,
    header_line: usize,
    mode: Option<Section>,
    next_id: i64,
    charmap: Vec<CharmapEntry>,
    charmap_keys: HashSet<char>,
    objects: Vec<(SourceLine, LineTokens)>,
}

/// Parse a tileset read from `path`.
pub fn parse_file(path: &Path, sink: &mut dyn DiagnosticSink) -> Result<Tileset, Aborted> {
    let src = read_source(path, sink)?;
    parse(&src, path, sink)
}

/// Parse tileset source. `path` names the file in diagnostics, supplies the
/// default tileset name and anchors a relative `charset=`.
pub fn parse(src: &str, path: &Path, sink: &mut dyn DiagnosticSink) -> Result<Tileset, Aborted> {
    let default_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tileset".to_string());
    let mut p = TsetParser {
        rep: Reporter::new(sink, path),
        base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        default_name,
        ts: None,
        header_line: 1,
        mode: None,
        next_id: 0,
        charmap: Vec::new(),
        charmap_keys: HashSet::new(),
        objects: Vec::new(),
    };

    for line in source_lines(src) {
        let toks = LineTokens::of(&line);
        let head = toks.word(0).unwrap_or("").to_string();
        let directive = classify(&line, &head, p.mode);

        if p.ts.is_none() && directive != Directive::Header {
            p.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                "File must start with TSET ...",
            );
            return Err(Aborted("missing TSET header"));
        }

        match directive {
            Directive::Header => p.header(&line, &toks),
            Directive::End => p.mode = None,
            Directive::FlagBits => p.rep.error(
                ErrorKind::Syntax,
                line.line,
                toks.word_col(0),
                "FLAGBITS section is not allowed in .tset files",
            ),
            Directive::Open(section) => p.mode = Some(section),
            Directive::ExplicitTile => p.tile(&line, &toks, true),
            Directive::Entry => match p.mode {
                Some(Section::Tiles) => p.tile(&line, &toks, false),
                Some(Section::Charmap) => p.charmap_entry(&line, &toks),
                Some(Section::Objects) => p.objects.push((line.clone(), toks)),
                None => p.rep.error(
                    ErrorKind::Syntax,
                    line.line,
                    line.col,
                    format!("Unexpected line: {}", line.text),
                ),
            },
        }
    }

    if p.ts.is_none() {
        p.rep.error(ErrorKind::Syntax, 1, 1, "No TSET header found");
        return Err(Aborted("missing TSET header"));
    }
    p.finish()
}

impl<'r> TsetParser<'r> {
    fn header(&mut self, line: &SourceLine, toks: &LineTokens) {
        let at = toks.word_col(0);
        if self.ts.is_some() {
            self.rep
                .error(ErrorKind::Syntax, line.line, at, "Duplicate TSET header");
            return;
        }
        let name = toks
            .get("name")
            .map(str::to_string)
            .unwrap_or_else(|| self.default_name.clone());
        let mut ts = Tileset::new(name);
        self.header_line = line.line;

        match toks.get("tileSize") {
            None => self
                .rep
                .error(ErrorKind::Syntax, line.line, at, "TSET requires tileSize=2x2"),
            Some(size) if !size.to_ascii_lowercase().contains('x') => self.rep.error(
                ErrorKind::Syntax,
                line.line,
                toks.value_col("tileSize"),
                "tileSize must look like 2x2",
            ),
            Some(size) => match parse_size(size) {
                None => self.rep.error(
                    ErrorKind::Syntax,
                    line.line,
                    toks.value_col("tileSize"),
                    format!("tileSize must contain integers: {size}"),
                ),
                Some((2, 2)) => {}
                Some(_) => self.rep.error(
                    ErrorKind::Range,
                    line.line,
                    toks.value_col("tileSize"),
                    "This tool currently expects tileSize=2x2",
                ),
            },
        }

        if let Some(count) = toks.get("count") {
            match parse_num(count).map(usize::try_from) {
                Some(Ok(n)) => ts.declared_count = n,
                Some(Err(_)) => self.rep.error(
                    ErrorKind::Range,
                    line.line,
                    toks.value_col("count"),
                    format!("count must not be negative: {count}"),
                ),
                None => self.rep.error(
                    ErrorKind::Syntax,
                    line.line,
                    toks.value_col("count"),
                    format!("Invalid count value: {count}"),
                ),
            }
        }

        ts.bg_color = self.header_color(line, toks, "bgColor");
        ts.mc1_color = self.header_color(line, toks, "mc1Color");
        ts.mc2_color = self.header_color(line, toks, "mc2Color");

        if let Some(charset) = toks.get("charset") {
            ts.charset_path = charset.to_string();
            if resolve_charset(&self.base_dir, charset).is_none() {
                self.rep.error(
                    ErrorKind::Io,
                    line.line,
                    toks.value_col("charset"),
                    format!("charset file not found: {charset}"),
                );
            }
        }
        self.ts = Some(ts);
    }

    fn header_color(&mut self, line: &SourceLine, toks: &LineTokens, key: &str) -> u8 {
        let Some(raw) = toks.get(key) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                toks.word_col(0),
                format!("TSET requires {key}="),
            );
            return 0;
        };
        match parse_color(raw) {
            None => {
                self.rep.error(
                    ErrorKind::Syntax,
                    line.line,
                    toks.value_col(key),
                    format!("Invalid {key} value: {raw}"),
                );
                0
            }
            Some(c) if !(0..=15).contains(&c) => {
                self.rep.error(
                    ErrorKind::Range,
                    line.line,
                    toks.value_col(key),
                    format!("{key} must be 0..15"),
                );
                0
            }
            Some(c) => c as u8,
        }
    }

    fn tile(&mut self, line: &SourceLine, toks: &LineTokens, explicit: bool) {
        let ln = line.line;
        let id = if explicit {
            let Some(raw) = toks.get("id") else {
                self.rep.error(
                    ErrorKind::Syntax,
                    ln,
                    toks.word_col(0),
                    format!("TILE missing id=: {}", line.text),
                );
                return;
            };
            match parse_num(raw) {
                Some(id) => id,
                None => {
                    self.rep.error(
                        ErrorKind::Syntax,
                        ln,
                        toks.value_col("id"),
                        format!("Invalid TILE id: {raw}"),
                    );
                    return;
                }
            }
        } else {
            match toks.get("id") {
                Some(raw) => match parse_num(raw) {
                    Some(id) => {
                        if id >= self.next_id {
                            self.next_id = id + 1;
                        }
                        id
                    }
                    None => {
                        self.rep.error(
                            ErrorKind::Syntax,
                            ln,
                            toks.value_col("id"),
                            format!("Invalid TILE id: {raw}"),
                        );
                        return;
                    }
                },
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    id
                }
            }
        };

        let Ok(id) = u8::try_from(id) else {
            self.rep.error(
                ErrorKind::Range,
                ln,
                toks.value_col("id"),
                "TILE id must be 0..255",
            );
            return;
        };

        let name = if explicit {
            toks.get("name").map(str::to_string)
        } else {
            toks.word(0).map(str::to_string)
        }
        .unwrap_or_else(|| format!("TILE_{id}"));

        let chars = self.tile_chars(line, toks);
        let (color_mode, colors) = self.tile_colors(line, toks);
        let flags = self.tile_flags(line, toks);

        let key = tile_key(&name);
        let Some(ts) = self.ts.as_mut() else { return };
        if ts.tiles_by_name.contains_key(&key) {
            self.rep.error(
                ErrorKind::Structural,
                ln,
                toks.word_col(0),
                format!("Duplicate TILE name: {name}"),
            );
            return;
        }
        if ts.tiles.contains_key(&id) {
            self.rep.error(
                ErrorKind::Structural,
                ln,
                toks.key_col("id"),
                format!("Duplicate TILE id={id}"),
            );
            return;
        }
        ts.tiles_by_name.insert(key, id);
        ts.tiles.insert(
            id,
            TileDef {
                id,
                name,
                chars,
                color_mode,
                colors,
                flags,
            },
        );
    }

    fn tile_chars(&mut self, line: &SourceLine, toks: &LineTokens) -> [u8; 4] {
        let Some(raw) = toks.get("chars") else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                toks.word_col(0),
                format!("TILE missing chars=: {}", line.text),
            );
            return [0; 4];
        };
        let col = toks.value_col("chars");
        match parse_list(raw, 4, parse_char_or_num) {
            Err(msg) => {
                self.rep.error(ErrorKind::Syntax, line.line, col, msg);
                [0; 4]
            }
            Ok(values) => {
                let mut out = [0u8; 4];
                for (slot, v) in out.iter_mut().zip(values) {
                    match u8::try_from(v) {
                        Ok(b) => *slot = b,
                        Err(_) => {
                            self.rep.error(
                                ErrorKind::Range,
                                line.line,
                                col,
                                format!("Char code out of range 0..255 in: {}", line.text),
                            );
                        }
                    }
                }
                out
            }
        }
    }

    fn tile_colors(&mut self, line: &SourceLine, toks: &LineTokens) -> (ColorMode, [u8; 4]) {
        let (mode, key, values) = if let Some(raw) = toks.get("colors") {
            match parse_list(raw, 4, parse_color) {
                Ok(v) => (ColorMode::PerQuadrant, "colors", v),
                Err(msg) => {
                    self.rep
                        .error(ErrorKind::Syntax, line.line, toks.value_col("colors"), msg);
                    return (ColorMode::PerQuadrant, [0; 4]);
                }
            }
        } else if let Some(raw) = toks.get("color") {
            match parse_color(raw) {
                Some(c) => (ColorMode::Single, "color", vec![c, 0, 0, 0]),
                None => {
                    self.rep.error(
                        ErrorKind::Syntax,
                        line.line,
                        toks.value_col("color"),
                        format!("Invalid color value: {raw}"),
                    );
                    return (ColorMode::Single, [0; 4]);
                }
            }
        } else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                toks.word_col(0),
                format!("TILE must have color= or colors=: {}", line.text),
            );
            return (ColorMode::Single, [0; 4]);
        };

        let mut out = [0u8; 4];
        for (slot, v) in out.iter_mut().zip(values) {
            if (0..=15).contains(&v) {
                *slot = v as u8;
            } else {
                self.rep.error(
                    ErrorKind::Range,
                    line.line,
                    toks.value_col(key),
                    format!("Color out of range 0..15 in: {}", line.text),
                );
            }
        }
        (mode, out)
    }

    fn tile_flags(&mut self, line: &SourceLine, toks: &LineTokens) -> u16 {
        let Some(raw) = toks.get("flags") else {
            return 0;
        };
        let base = toks.value_col("flags");
        let mut mask = 0u16;
        let mut offset = 0;
        for part in raw.split('|') {
            let col = base + offset;
            offset += part.chars().count() + 1;
            let name = part.trim().to_ascii_uppercase();
            if name.is_empty() {
                continue;
            }
            match flag_bit(&name) {
                Some(bit) => mask |= 1 << bit,
                None => self.rep.error(
                    ErrorKind::UnknownSymbol,
                    line.line,
                    col,
                    format!("Unknown flag '{name}' in: {}", line.text),
                ),
            }
        }
        mask
    }

    fn charmap_entry(&mut self, line: &SourceLine, toks: &LineTokens) {
        let (Some(key), Some(target)) = (toks.word(0), toks.word(1)) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("CHARMAP line missing tile name: {}", line.text),
            );
            return;
        };
        let mut chars = key.chars();
        let (Some(ch), None) = (chars.next(), chars.next()) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                toks.word_col(0),
                format!("CHARMAP key must be a single char: {key}"),
            );
            return;
        };
        if !self.charmap_keys.insert(ch) {
            self.rep.error(
                ErrorKind::Structural,
                line.line,
                toks.word_col(0),
                format!("Duplicate CHARMAP key: {ch}"),
            );
            return;
        }
        self.charmap.push(CharmapEntry {
            line: line.line,
            col: toks.word_col(1),
            ch,
            target: target.to_string(),
        });
    }

    fn object_entry(&mut self, line: &SourceLine, toks: &LineTokens) {
        let ln = line.line;
        let name = toks.word(0).unwrap_or("").to_string();
        if toks.has("char") {
            self.rep.error(
                ErrorKind::Syntax,
                ln,
                toks.value_col("char"),
                format!("OBJECTS entry must not include char=: {}", line.text),
            );
            return;
        }
        let (Some(size), Some(tiles)) = (toks.get("size"), toks.get("tiles")) else {
            self.rep.error(
                ErrorKind::Syntax,
                ln,
                line.col,
                format!("OBJECTS entry requires size= tiles=: {}", line.text),
            );
            return;
        };
        if name.is_empty() {
            self.rep
                .error(ErrorKind::Syntax, ln, line.col, "OBJECTS entry missing name");
            return;
        }
        let size_col = toks.value_col("size");
        let Some((w, h)) = parse_size(size) else {
            self.rep.error(
                ErrorKind::Syntax,
                ln,
                size_col,
                format!("OBJECTS size must look like WxH: {size}"),
            );
            return;
        };
        let (Ok(w), Ok(h)) = (u8::try_from(w), u8::try_from(h)) else {
            self.rep.error(
                ErrorKind::Range,
                ln,
                size_col,
                format!("OBJECTS size out of range 1..255: {size}"),
            );
            return;
        };
        if w == 0 || h == 0 {
            self.rep.error(
                ErrorKind::Range,
                ln,
                size_col,
                format!("OBJECTS size out of range 1..255: {size}"),
            );
            return;
        }

        let tiles_col = toks.value_col("tiles");
        let tile_names: Vec<String> = tiles
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(tile_key)
            .collect();
        if tile_names.len() != usize::from(w) * usize::from(h) {
            self.rep.error(
                ErrorKind::Structural,
                ln,
                tiles_col,
                format!(
                    "OBJECTS tiles count {} does not match size {w}x{h}",
                    tile_names.len()
                ),
            );
            return;
        }

        let Some(ts) = self.ts.as_mut() else { return };
        let mut unknown = false;
        for t in &tile_names {
            if !ts.tiles_by_name.contains_key(t) {
                self.rep.error(
                    ErrorKind::UnknownSymbol,
                    ln,
                    tiles_col,
                    format!("OBJECTS unknown tile name: {t}"),
                );
                unknown = true;
            }
        }
        if unknown {
            return;
        }

        let key = name.to_ascii_uppercase();
        if ts.objects.contains_key(&key) {
            self.rep.error(
                ErrorKind::Structural,
                ln,
                toks.word_col(0),
                format!("Duplicate OBJECT name: {name}"),
            );
            return;
        }
        ts.objects.insert(
            key,
            ObjectStamp {
                name,
                w,
                h,
                tiles: tile_names,
                char: None,
            },
        );
    }

    fn finish(mut self) -> Result<Tileset, Aborted> {
        let header_line = self.header_line;
        {
            let Some(ts) = self.ts.as_mut() else {
                return Err(Aborted("missing TSET header"));
            };
            if ts.tiles.is_empty() {
                self.rep
                    .error(ErrorKind::Structural, header_line, 1, "No TILE definitions found");
            }
            if ts.declared_count == 0 {
                ts.declared_count = ts.tiles.len();
            }
            if ts.tiles.len() > ts.declared_count {
                self.rep.error(
                    ErrorKind::Range,
                    header_line,
                    1,
                    format!(
                        "Defined {} tiles but TSET count={}",
                        ts.tiles.len(),
                        ts.declared_count
                    ),
                );
            }
            if ts.tiles.len() > 255 {
                self.rep.error(
                    ErrorKind::Range,
                    header_line,
                    1,
                    "Too many tiles: max 255 (count stored as u8)",
                );
            }
        }

        for (line, toks) in std::mem::take(&mut self.objects) {
            self.object_entry(&line, &toks);
        }

        let mut ts = self.ts.take().ok_or(Aborted("missing TSET header"))?;
        for entry in std::mem::take(&mut self.charmap) {
            if let Some(id) = ts.tile_id(&entry.target) {
                ts.charmap.insert(entry.ch, id);
                continue;
            }
            let key = entry.target.to_ascii_uppercase();
            let Some(obj) = ts.objects.get_mut(&key) else {
                self.rep.error(
                    ErrorKind::UnknownSymbol,
                    entry.line,
                    entry.col,
                    format!("CHARMAP unknown tile/object name: {}", tile_key(&entry.target)),
                );
                continue;
            };
            match obj.char {
                Some(bound) if bound != entry.ch => self.rep.error(
                    ErrorKind::Structural,
                    entry.line,
                    entry.col,
                    format!("OBJECT '{key}' bound to multiple chars"),
                ),
                _ => obj.char = Some(entry.ch),
            }
        }

        let stamps: Vec<(char, StampDef)> = ts
            .objects
            .values()
            .filter_map(|obj| {
                let ch = obj.char?;
                let tiles = obj
                    .tiles
                    .iter()
                    .map(|t| ts.tiles_by_name.get(t).copied().unwrap_or(0))
                    .collect();
                Some((
                    ch,
                    StampDef {
                        name: obj.name.clone(),
                        w: obj.w,
                        h: obj.h,
                        tiles,
                    },
                ))
            })
            .collect();
        ts.object_stamps.extend(stamps);

        debug!(
            name = %ts.name,
            tiles = ts.tiles.len(),
            objects = ts.objects.len(),
            stamps = ts.object_stamps.len(),
            "parsed tileset"
        );
        Ok(ts)
    }
}

/// Relative charset paths are tried next to the tileset, then one level up.
pub fn resolve_charset(base_dir: &Path, charset: &str) -> Option<PathBuf> {
    let path = Path::new(charset);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    [base_dir.join(path), base_dir.join("..").join(path)]
        .into_iter()
        .find(|p| p.is_file())
}
