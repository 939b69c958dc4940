//! In-memory level description produced by the LVLTEXT parser.
//!
//! Every ordered container here is load-bearing: the position of a name in
//! its container is the id the compiler assigns to it.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use super::tileset::StampDef;

/// One non-empty source line with the comment already stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLine {
    pub line: usize,
    /// 1-based column where `text` starts in the raw line.
    pub col: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScriptKind {
    Cond,
    Act,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptDef {
    pub name: String,
    pub kind: ScriptKind,
    pub line: usize,
    pub lines: Vec<SourceLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Edge {
    L = 0,
    R = 1,
    U = 2,
    D = 3,
}

impl Edge {
    pub fn parse(s: &str) -> Option<Edge> {
        match s {
            "L" => Some(Edge::L),
            "R" => Some(Edge::R),
            "U" => Some(Edge::U),
            "D" => Some(Edge::D),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Edge::L => "L",
            Edge::R => "R",
            Edge::U => "U",
            Edge::D => "D",
        }
    }
}

/// Object type codes shared with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjType {
    Sign = 1,
    Pickup = 2,
    LockerKeypad = 3,
    BreakerPanel = 4,
    HatchPanel = 5,
    ExitTrigger = 6,
    NpcIntercom = 7,
}

impl ObjType {
    pub const ALL: [ObjType; 7] = [
        ObjType::Sign,
        ObjType::Pickup,
        ObjType::LockerKeypad,
        ObjType::BreakerPanel,
        ObjType::HatchPanel,
        ObjType::ExitTrigger,
        ObjType::NpcIntercom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ObjType::Sign => "SIGN",
            ObjType::Pickup => "PICKUP",
            ObjType::LockerKeypad => "LOCKER_KEYPAD",
            ObjType::BreakerPanel => "BREAKER_PANEL",
            ObjType::HatchPanel => "HATCH_PANEL",
            ObjType::ExitTrigger => "EXIT_TRIGGER",
            ObjType::NpcIntercom => "NPC_INTERCOM",
        }
    }

    pub fn parse(s: &str) -> Option<ObjType> {
        Self::ALL.into_iter().find(|t| t.name() == s)
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

pub const VERBS: [(&str, u8); 5] = [
    ("LOOK", 1 << 0),
    ("TAKE", 1 << 1),
    ("USE", 1 << 2),
    ("TALK", 1 << 3),
    ("OPERATE", 1 << 4),
];

pub fn verb_bit(name: &str) -> Option<u8> {
    VERBS.iter().find(|(n, _)| *n == name).map(|(_, b)| *b)
}

/// `LOOK|TAKE`, or `NONE` for an empty mask.
pub fn verb_names(mask: u8) -> String {
    let names: Vec<&str> = VERBS
        .iter()
        .filter(|(_, bit)| mask & bit != 0)
        .map(|(n, _)| *n)
        .collect();
    if names.is_empty() {
        "NONE".to_string()
    } else {
        names.join("|")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnDef {
    pub x: u8,
    pub y: u8,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitDef {
    pub edge: Edge,
    pub dest_room: String,
    pub dest_spawn: String,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjDef {
    pub name: String,
    pub x: u8,
    pub y: u8,
    pub obj_type: ObjType,
    pub verbs: u8,
    pub line: usize,
    pub cond: String,
    pub look: Option<String>,
    pub take: Option<String>,
    #[serde(rename = "use")]
    pub use_: Option<String>,
    pub talk: Option<String>,
    pub operate: Option<String>,
    /// Keypad/breaker `ok`, hatch `fuse`.
    pub alt0: Option<String>,
    /// Keypad/breaker `bad`, hatch `badge`.
    pub alt1: Option<String>,
    /// Everything that was not a recognized key, for type-specific parameters.
    pub props: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomDef {
    pub id: String,
    pub name: String,
    pub line: usize,
    pub spawns: IndexMap<String, SpawnDef>,
    pub exits: Vec<ExitDef>,
    pub objects: Vec<ObjDef>,
    pub map_lines: Vec<SourceLine>,
}

impl RoomDef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, line: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            line,
            spawns: IndexMap::new(),
            exits: Vec::new(),
            objects: Vec::new(),
            map_lines: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelDef {
    pub name: String,
    pub w: u8,
    pub h: u8,
    pub start_room: String,
    pub start_spawn: String,
    pub line: usize,
    pub tiles: IndexMap<char, u8>,
    pub object_stamps: IndexMap<char, StampDef>,
    pub flags: IndexSet<String>,
    pub vars: IndexSet<String>,
    pub items: IndexSet<String>,
    pub messages: IndexMap<String, String>,
    pub conds: IndexMap<String, ScriptDef>,
    pub acts: IndexMap<String, ScriptDef>,
    pub rooms: IndexMap<String, RoomDef>,
}

impl LevelDef {
    pub fn new(name: impl Into<String>, w: u8, h: u8, line: usize) -> Self {
        Self {
            name: name.into(),
            w,
            h,
            start_room: String::new(),
            start_spawn: String::new(),
            line,
            tiles: IndexMap::new(),
            object_stamps: IndexMap::new(),
            flags: IndexSet::new(),
            vars: IndexSet::new(),
            items: IndexSet::new(),
            messages: IndexMap::new(),
            conds: IndexMap::new(),
            acts: IndexMap::new(),
            rooms: IndexMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obj_type_codes() {
        let test_cases = vec![
            ("SIGN", 1),
            ("PICKUP", 2),
            ("LOCKER_KEYPAD", 3),
            ("BREAKER_PANEL", 4),
            ("HATCH_PANEL", 5),
            ("EXIT_TRIGGER", 6),
            ("NPC_INTERCOM", 7),
        ];
        for (name, code) in test_cases {
            assert_eq!(ObjType::parse(name).map(ObjType::code), Some(code));
        }
        assert_eq!(ObjType::parse("sign"), None);
    }

    #[test]
    fn test_verb_names() {
        assert_eq!(verb_names(0), "NONE");
        assert_eq!(verb_names(1 | 16), "LOOK|OPERATE");
        assert_eq!(verb_bit("TALK"), Some(8));
    }

    #[test]
    fn test_edge_codes() {
        let codes: Vec<u8> = ["L", "R", "U", "D"]
            .iter()
            .filter_map(|e| Edge::parse(e))
            .map(Edge::code)
            .collect();
        assert_eq!(codes, vec![0, 1, 2, 3]);
        assert_eq!(Edge::parse("X"), None);
    }
}
