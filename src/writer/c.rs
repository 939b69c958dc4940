//! Generated C: id headers, `#embed` wrappers and the LVL1 format header.

use std::io::{self, Write};

use crate::model::{Edge, ObjType, VERBS};
use crate::processor::ast::{Action, Condition};
use crate::processor::blob::*;
use crate::processor::symbols::IdTable;
use crate::processor::{LevelLayout, TilesetLayout};

/// Lowercase, runs of anything but ASCII letters and digits become `_`.
pub fn sanitize_level_name(name: &str) -> String {
    let mut out = String::new();
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "level".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Anything but `[A-Za-z0-9_]` becomes `_`.
pub fn symbol_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// A valid C identifier; a leading digit gets a `lvl_` prefix.
pub fn c_identifier(name: &str) -> String {
    let ident = symbol_safe(name);
    match ident.chars().next() {
        Some(c) if !c.is_ascii_digit() => ident,
        _ => format!("lvl_{ident}"),
    }
}

fn id_enum(out: &mut impl Write, name: &str, table: &IdTable) -> io::Result<()> {
    writeln!(out, "typedef enum {{")?;
    for (id, entry) in table.names().enumerate() {
        writeln!(out, "  {entry} = {id},")?;
    }
    writeln!(out, "  {name}__COUNT = {}", table.len())?;
    writeln!(out, "}} {name};\n")
}

/// `<level>.h`: flag/var/item/message id enums plus the object type codes.
pub fn level_ids(out: &mut impl Write, layout: &LevelLayout) -> io::Result<()> {
    writeln!(out, "// Auto-generated by levelc")?;
    writeln!(out, "#pragma once\n")?;
    id_enum(out, "FlagId", &layout.ids.flags)?;
    id_enum(out, "VarId", &layout.ids.vars)?;
    id_enum(out, "ItemId", &layout.ids.items)?;
    id_enum(out, "MsgId", &layout.ids.messages)?;
    writeln!(out, "typedef enum {{")?;
    for ty in ObjType::ALL {
        writeln!(out, "  OBJ_{} = {},", ty.name(), ty.code())?;
    }
    writeln!(out, "}} ObjType;\n")
}

pub fn level_blob_h(out: &mut impl Write, array: &str) -> io::Result<()> {
    writeln!(out, "#pragma once")?;
    writeln!(out, "extern unsigned char {array}[];")?;
    writeln!(out, "extern unsigned long {array}_size;")
}

/// `header` is the blob header's file name; `rel_bin` is the `.bin` path
/// relative to the `.c` file.
pub fn level_blob_c(out: &mut impl Write, array: &str, header: &str, rel_bin: &str) -> io::Result<()> {
    writeln!(out, "// Auto-generated by levelc")?;
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out, "#include \"levels/{header}\"\n")?;
    writeln!(out, "unsigned char {array}[] = {{")?;
    writeln!(out, "#embed \"{rel_bin}\"")?;
    writeln!(out, "}};")?;
    writeln!(out, "unsigned long {array}_size = (unsigned long)sizeof({array});")
}

/// `level_format.h`: layout constants, opcodes and inline accessors for the
/// engine side.
pub fn level_format_h(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "// Provided by levelc")?;
    writeln!(out, "#pragma once")?;
    writeln!(out, "#include <stdint.h>\n")?;
    writeln!(out, "/* Format header for LVL1 blobs, generated by levelc. */\n")?;

    for (i, c) in MAGIC.iter().enumerate() {
        writeln!(out, "#define LVL_MAGIC_{i} '{}'", char::from(*c))?;
    }
    writeln!(out, "#define LVL_VERSION {VERSION}\n")?;
    writeln!(out, "#define LVL_HEADER_SIZE {HEADER_SIZE}")?;
    writeln!(out, "#define LVL_ROOM_DIRENTRY_SIZE {ROOM_DIRENTRY_SIZE}")?;
    writeln!(out, "#define LVL_OBJ_RECORD_SIZE {OBJ_RECORD_SIZE}\n")?;

    writeln!(out, "/* Header field offsets (byte offsets into blob) */")?;
    let header_fields = [
        ("VERSION", HDR_OFS_VERSION),
        ("ROOMCOUNT", HDR_OFS_ROOMCOUNT),
        ("MAPW", HDR_OFS_MAPW),
        ("MAPH", HDR_OFS_MAPH),
        ("FLAGCOUNT", HDR_OFS_FLAGCOUNT),
        ("VARCOUNT", HDR_OFS_VARCOUNT),
        ("ITEMCOUNT", HDR_OFS_ITEMCOUNT),
        ("MSGCOUNT", HDR_OFS_MSGCOUNT),
        ("STARTROOM", HDR_OFS_STARTROOM),
        ("STARTSPAWN", HDR_OFS_STARTSPAWN),
        ("ROOMDIR", HDR_OFS_ROOMDIR),
        ("CONDSTREAM", HDR_OFS_CONDSTREAM),
        ("ACTSTREAM", HDR_OFS_ACTSTREAM),
        ("MSGTABLE", HDR_OFS_MSGTABLE),
    ];
    for (name, ofs) in header_fields {
        writeln!(out, "#define LVL_HDR_OFS_{name:<12} {ofs}")?;
    }

    writeln!(out, "\n/* Object record field offsets (relative to the record) */")?;
    let byte_fields = ["X", "Y", "TYPE", "VERBS", "P0", "P1"];
    for (ofs, name) in byte_fields.iter().enumerate() {
        writeln!(out, "#define LVL_OBJ_OFS_{name:<8} {ofs}")?;
    }
    let script_fields = ["CONDS", "LOOK", "TAKE", "USE", "TALK", "OPERATE", "ALT0", "ALT1"];
    for (i, name) in script_fields.iter().enumerate() {
        let ofs = byte_fields.len() + i * 2;
        writeln!(out, "#define LVL_OBJ_OFS_{name:<8} {ofs:<3} /* uint16_t */")?;
    }

    writeln!(out, "\n/* Condition opcodes (bytecode triples [op,a,b]) */")?;
    for (op, name) in Condition::C_NAMES.iter().enumerate() {
        writeln!(out, "#define {name:<11} {op}")?;
    }
    writeln!(out, "\n/* Action opcodes (bytecode triples [op,a,b]) */")?;
    for (op, name) in Action::C_NAMES.iter().enumerate() {
        writeln!(out, "#define {name:<12} {op}")?;
    }

    writeln!(out, "\n/* Verbs bitmask */")?;
    for (name, bit) in VERBS {
        writeln!(out, "#define VB_{name:<7} (1<<{})", bit.trailing_zeros())?;
    }

    writeln!(out, "\n/* Exits */")?;
    for edge in [Edge::L, Edge::R, Edge::U, Edge::D] {
        writeln!(out, "#define EXIT_{} {}", edge.as_str(), edge.code())?;
    }
    writeln!(out)?;
    out.write_all(ACCESSORS.as_bytes())
}

const ACCESSORS: &str = r#"static inline uint8_t lvl_rd8(const uint8_t* b, uint16_t o) {
  return b[o];
}
static inline uint16_t lvl_rd16(const uint8_t* b, uint16_t o) {
  return (uint16_t)b[o] | ((uint16_t)b[o+1] << 8);
}

static inline uint16_t lvl_roomdir_ofs(const uint8_t* b) {
  return lvl_rd16(b, LVL_HDR_OFS_ROOMDIR);
}
static inline uint16_t lvl_condstream_ofs(const uint8_t* b) {
  return lvl_rd16(b, LVL_HDR_OFS_CONDSTREAM);
}
static inline uint16_t lvl_actstream_ofs(const uint8_t* b) {
  return lvl_rd16(b, LVL_HDR_OFS_ACTSTREAM);
}
static inline uint16_t lvl_msgtable_ofs(const uint8_t* b) {
  return lvl_rd16(b, LVL_HDR_OFS_MSGTABLE);
}

static inline uint16_t lvl_roomdir_entry_base(const uint8_t* b, uint8_t roomId) {
  return (uint16_t)(lvl_roomdir_ofs(b) + (uint16_t)roomId * LVL_ROOM_DIRENTRY_SIZE);
}

static inline uint16_t lvl_room_map_ofs(const uint8_t* b, uint8_t roomId) {
  return lvl_rd16(b, lvl_roomdir_entry_base(b, roomId) + 0);
}
static inline uint16_t lvl_room_spawns_ofs(const uint8_t* b, uint8_t roomId) {
  return lvl_rd16(b, lvl_roomdir_entry_base(b, roomId) + 2);
}
static inline uint16_t lvl_room_exits_ofs(const uint8_t* b, uint8_t roomId) {
  return lvl_rd16(b, lvl_roomdir_entry_base(b, roomId) + 4);
}
static inline uint16_t lvl_room_objects_ofs(const uint8_t* b, uint8_t roomId) {
  return lvl_rd16(b, lvl_roomdir_entry_base(b, roomId) + 6);
}

static inline uint8_t lvl_spawns_count(const uint8_t* b, uint16_t spawnsOfs) {
  return lvl_rd8(b, spawnsOfs);
}
static inline void lvl_spawn_xy(const uint8_t* b, uint16_t spawnsOfs, uint8_t idx, uint8_t* outX, uint8_t* outY) {
  uint16_t base = (uint16_t)(spawnsOfs + 1 + (uint16_t)idx * 2);
  *outX = lvl_rd8(b, base + 0);
  *outY = lvl_rd8(b, base + 1);
}

static inline uint8_t lvl_exits_count(const uint8_t* b, uint16_t exitsOfs) {
  return lvl_rd8(b, exitsOfs);
}
static inline void lvl_exit(const uint8_t* b, uint16_t exitsOfs, uint8_t idx, uint8_t* outType, uint8_t* outDestRoom, uint8_t* outDestSpawn) {
  uint16_t base = (uint16_t)(exitsOfs + 1 + (uint16_t)idx * 3);
  *outType = lvl_rd8(b, base + 0);
  *outDestRoom = lvl_rd8(b, base + 1);
  *outDestSpawn = lvl_rd8(b, base + 2);
}

static inline uint8_t lvl_objects_count(const uint8_t* b, uint16_t objsOfs) {
  return lvl_rd8(b, objsOfs);
}
static inline uint16_t lvl_object_base(const uint8_t* b, uint16_t objsOfs, uint8_t idx) {
  return (uint16_t)(objsOfs + 1 + (uint16_t)idx * LVL_OBJ_RECORD_SIZE);
}
"#;

/// `<name>_tset_ids.h`: one `TILE_<NAME>` define per tile.
pub fn tileset_ids(out: &mut impl Write, layout: &TilesetLayout) -> io::Result<()> {
    writeln!(out, "// Auto-generated by tilesetc")?;
    writeln!(out, "#pragma once")?;
    writeln!(out, "#include <stdint.h>\n")?;
    writeln!(out, "/* Tile IDs */")?;
    for tile in &layout.tiles {
        writeln!(out, "#define TILE_{} {}", symbol_safe(&tile.name).to_ascii_uppercase(), tile.id)?;
    }
    writeln!(out)
}

/// Header for an embedded tileset resource, e.g. `foo_tset_blob`.
pub fn tileset_embed_h(out: &mut impl Write, array: &str) -> io::Result<()> {
    writeln!(out, "#pragma once")?;
    writeln!(out, "extern const unsigned char {array}[];")?;
    writeln!(out, "extern const unsigned long {array}_size;")
}

/// `header` is relative to the include root, `rel` relative to the `.c`.
pub fn tileset_embed_c(out: &mut impl Write, array: &str, header: &str, rel: &str) -> io::Result<()> {
    writeln!(out, "// Auto-generated by tilesetc")?;
    writeln!(out, "#include \"{header}\"")?;
    writeln!(out, "const unsigned char {array}[] = {{")?;
    writeln!(out, "    #embed \"{rel}\"")?;
    writeln!(out, "}};")?;
    writeln!(out, "const unsigned long {array}_size = (unsigned long)sizeof({array});")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_sanitize_level_name() {
        let test_cases = vec![
            ("Tiny", "tiny"),
            ("Deck 3: Engine Room", "deck_3_engine_room"),
            ("  --Lab--  ", "lab"),
            ("???", "level"),
        ];
        for (input, expected) in test_cases {
            assert_eq!(sanitize_level_name(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_c_identifier() {
        assert_eq!(c_identifier("deck_3"), "deck_3");
        assert_eq!(c_identifier("3rd"), "lvl_3rd");
        assert_eq!(c_identifier("a-b"), "a_b");
    }

    #[test]
    fn test_id_enum() {
        let table: IdTable = ["DOOR_OPEN", "LIGHT"].into_iter().collect();
        let text = render(|out| id_enum(out, "FlagId", &table));
        assert_eq!(
            text,
            "typedef enum {\n  DOOR_OPEN = 0,\n  LIGHT = 1,\n  FlagId__COUNT = 2\n} FlagId;\n\n"
        );
    }

    #[test]
    fn test_format_header_matches_layout() {
        let text = render(level_format_h);
        assert!(text.starts_with("// Provided by levelc\n#pragma once\n"));
        assert!(text.contains("#define LVL_MAGIC_3 '1'"));
        assert!(text.contains("#define LVL_HDR_OFS_MSGTABLE     20"));
        assert!(text.contains("#define LVL_OBJ_OFS_ALT1     20  /* uint16_t */"));
        assert!(text.contains("#define C_VAR_EQ    5"));
        assert!(text.contains("#define A_TRANSITION 8"));
        assert!(text.contains("#define VB_OPERATE (1<<4)"));
        assert!(text.contains("#define EXIT_D 3"));
        assert!(text.contains("lvl_object_base"));
    }

    #[test]
    fn test_level_blob_c() {
        let text = render(|out| level_blob_c(out, "tiny_blob", "tiny-blob.h", "../../assets/levels/tiny.bin"));
        assert_eq!(
            text,
            "// Auto-generated by levelc\n\
             #include <stdint.h>\n\
             #include \"levels/tiny-blob.h\"\n\n\
             unsigned char tiny_blob[] = {\n\
             #embed \"../../assets/levels/tiny.bin\"\n\
             };\n\
             unsigned long tiny_blob_size = (unsigned long)sizeof(tiny_blob);\n"
        );
    }
}
