//! Typed data model shared by parsers, processors and writers.
//!
//! Entities are built once while parsing and only read afterwards.

pub mod level;
pub mod tileset;

pub use level::{
    Edge, ExitDef, LevelDef, ObjDef, ObjType, RoomDef, ScriptDef, ScriptKind, SourceLine, SpawnDef,
    VERBS, verb_names,
};
pub use tileset::{ColorMode, ObjectStamp, StampDef, TileDef, Tileset};
