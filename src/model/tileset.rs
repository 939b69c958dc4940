//! In-memory tileset description produced by the TSET parser.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

/// Fixed tile flag bits. The runtime header `tile_flags.h` uses the same order.
pub const FLAG_BITS: [(&str, u8); 8] = [
    ("SOLID", 0),
    ("DECOR", 1),
    ("STANDABLE", 2),
    ("LADDER", 3),
    ("DOOR", 4),
    ("INTERACTABLE", 5),
    ("FLOOR", 6),
    ("HAZARD", 7),
];

pub fn flag_bit(name: &str) -> Option<u8> {
    FLAG_BITS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, b)| *b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorMode {
    /// One color for the whole metatile, stored in `colors[0]`.
    Single = 0,
    PerQuadrant = 1,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileDef {
    pub id: u8,
    pub name: String,
    /// TL, TR, BL, BR.
    pub chars: [u8; 4],
    pub color_mode: ColorMode,
    pub colors: [u8; 4],
    pub flags: u16,
}

/// A named rectangle of tiles from the OBJECTS block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectStamp {
    pub name: String,
    pub w: u8,
    pub h: u8,
    /// Row-major tile names, `w * h` entries, upper-case with any `TILE_` prefix removed.
    pub tiles: Vec<String>,
    pub char: Option<char>,
}

/// A stamp bound to a map character with its tiles already resolved to ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StampDef {
    pub name: String,
    pub w: u8,
    pub h: u8,
    pub tiles: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tileset {
    pub name: String,
    pub tile_w: u8,
    pub tile_h: u8,
    /// Equals the observed tile count when the header left it at zero.
    pub declared_count: usize,
    pub bg_color: u8,
    pub mc1_color: u8,
    pub mc2_color: u8,
    /// As written in the header; empty when absent.
    pub charset_path: String,
    /// Sorted by id, which is also the record order in the blob.
    pub tiles: BTreeMap<u8, TileDef>,
    pub tiles_by_name: IndexMap<String, u8>,
    pub objects: IndexMap<String, ObjectStamp>,
    pub charmap: IndexMap<char, u8>,
    pub object_stamps: IndexMap<char, StampDef>,
}

impl Tileset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tile_w: 2,
            tile_h: 2,
            declared_count: 0,
            bg_color: 0,
            mc1_color: 0,
            mc2_color: 0,
            charset_path: String::new(),
            tiles: BTreeMap::new(),
            tiles_by_name: IndexMap::new(),
            objects: IndexMap::new(),
            charmap: IndexMap::new(),
            object_stamps: IndexMap::new(),
        }
    }

    /// Case-insensitive lookup; a leading `TILE_` is optional.
    pub fn tile_id(&self, name: &str) -> Option<u8> {
        self.tiles_by_name.get(&tile_key(name)).copied()
    }
}

/// Normalized lookup key for tile names.
pub fn tile_key(name: &str) -> String {
    let upper = name.trim().to_ascii_uppercase();
    match upper.strip_prefix("TILE_") {
        Some(rest) => rest.to_string(),
        None => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_key_strips_prefix_and_case() {
        let test_cases = vec![
            ("floor", "FLOOR"),
            ("TILE_wall", "WALL"),
            ("tile_Door_A", "DOOR_A"),
            ("  crate ", "CRATE"),
        ];
        for (input, expected) in test_cases {
            assert_eq!(tile_key(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_flag_bits_are_fixed() {
        assert_eq!(flag_bit("solid"), Some(0));
        assert_eq!(flag_bit("FLOOR"), Some(6));
        assert_eq!(flag_bit("HAZARD"), Some(7));
        assert_eq!(flag_bit("SLIPPERY"), None);
    }
}
