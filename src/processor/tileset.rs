//! Packs a parsed tileset into the `TSET` blob.
//!
//! Header (little-endian, 17 bytes): magic, version, tileW, tileH,
//! tileCount, recordSize, recordsOffset (u16), namesOffset (u16, always 0),
//! reserved (u32 holding `bg | mc1 << 8 | mc2 << 16`). One 12-byte record
//! per tile follows in ascending id order.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::model::{ObjectStamp, TileDef, Tileset};

pub const MAGIC: &[u8; 4] = b"TSET";
pub const VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 17;
pub const RECORD_SIZE: usize = 12;

#[derive(Debug, Clone, Serialize)]
pub struct TilesetLayout {
    pub name: String,
    pub tile_w: u8,
    pub tile_h: u8,
    pub bg_color: u8,
    pub mc1_color: u8,
    pub mc2_color: u8,
    pub charset: String,
    pub tile_count: usize,
    pub record_size: usize,
    pub ofs_records: usize,
    pub objects: IndexMap<String, ObjectStamp>,
    pub tiles: Vec<TileDef>,
    #[serde(skip)]
    pub blob: Vec<u8>,
    pub blob_size: usize,
}

fn record(tile: &TileDef) -> [u8; RECORD_SIZE] {
    let [c0, c1, c2, c3] = tile.chars;
    let [k0, k1, k2, k3] = tile.colors;
    let [f0, f1] = tile.flags.to_le_bytes();
    [tile.id, c0, c1, c2, c3, tile.color_mode as u8, k0, k1, k2, k3, f0, f1]
}

/// Range problems were reported while parsing, so compiling cannot fail.
pub fn compile(ts: &Tileset) -> TilesetLayout {
    let tiles: Vec<TileDef> = ts.tiles.values().cloned().collect();
    let reserved =
        u32::from(ts.bg_color) | u32::from(ts.mc1_color) << 8 | u32::from(ts.mc2_color) << 16;

    let mut blob = Vec::with_capacity(HEADER_SIZE + RECORD_SIZE * tiles.len());
    blob.extend_from_slice(MAGIC);
    blob.extend([
        VERSION,
        ts.tile_w,
        ts.tile_h,
        (tiles.len() & 0xFF) as u8,
        RECORD_SIZE as u8,
    ]);
    blob.extend((HEADER_SIZE as u16).to_le_bytes());
    blob.extend(0u16.to_le_bytes());
    blob.extend(reserved.to_le_bytes());
    for tile in &tiles {
        blob.extend(record(tile));
    }

    info!(tileset = %ts.name, tiles = tiles.len(), bytes = blob.len(), "packed tileset");

    TilesetLayout {
        name: ts.name.clone(),
        tile_w: ts.tile_w,
        tile_h: ts.tile_h,
        bg_color: ts.bg_color,
        mc1_color: ts.mc1_color,
        mc2_color: ts.mc2_color,
        charset: ts.charset_path.clone(),
        tile_count: tiles.len(),
        record_size: RECORD_SIZE,
        ofs_records: HEADER_SIZE,
        objects: ts.objects.clone(),
        tiles,
        blob_size: blob.len(),
        blob,
    }
}
