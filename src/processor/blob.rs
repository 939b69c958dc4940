//! Packs a parsed level into the `LVL1` blob.
//!
//! Every section after the room directory is position independent except
//! the message table, so the body is built first with offsets relative to
//! where it will start, then the header and room directory are generated
//! from the finished offsets and the three parts are concatenated. The
//! resulting [`LevelLayout`] is never observable half-built.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use super::bytecode::{Streams, compile_streams};
use super::map::resolve_room_map;
use super::symbols::Symbols;
use crate::diagnostics::{ErrorKind, Reporter};
use crate::model::{Edge, LevelDef, ObjDef, ObjType, RoomDef};
use crate::parser::parse_num;

pub const MAGIC: &[u8; 4] = b"LVL1";
pub const VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 22;
pub const ROOM_DIRENTRY_SIZE: usize = 8;
pub const OBJ_RECORD_SIZE: usize = 22;

pub const HDR_OFS_VERSION: usize = 4;
pub const HDR_OFS_ROOMCOUNT: usize = 5;
pub const HDR_OFS_MAPW: usize = 6;
pub const HDR_OFS_MAPH: usize = 7;
pub const HDR_OFS_FLAGCOUNT: usize = 8;
pub const HDR_OFS_VARCOUNT: usize = 9;
pub const HDR_OFS_ITEMCOUNT: usize = 10;
pub const HDR_OFS_MSGCOUNT: usize = 11;
pub const HDR_OFS_STARTROOM: usize = 12;
pub const HDR_OFS_STARTSPAWN: usize = 13;
pub const HDR_OFS_ROOMDIR: usize = 14;
pub const HDR_OFS_CONDSTREAM: usize = 16;
pub const HDR_OFS_ACTSTREAM: usize = 18;
pub const HDR_OFS_MSGTABLE: usize = 20;

/// Absolute offsets of the top-level sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionOffsets {
    pub room_dir: usize,
    pub cond_stream: usize,
    pub act_stream: usize,
    pub msg_table: usize,
}

/// A script binding on an object record and the stream offset it lowered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRef {
    pub name: Option<String>,
    pub ofs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectLayout {
    pub name: String,
    pub x: u8,
    pub y: u8,
    pub type_name: &'static str,
    pub type_id: u8,
    pub verbs: u8,
    pub p0: u8,
    pub p1: u8,
    pub cond: ScriptRef,
    /// look, take, use, talk, operate, alt0, alt1 in record order.
    pub acts: IndexMap<&'static str, ScriptRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitLayout {
    pub edge: Edge,
    pub dest_room: String,
    pub dest_spawn: String,
    pub room_id: u8,
    pub spawn_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomLayout {
    pub id: String,
    pub name: String,
    pub map_ofs: usize,
    pub map_size: usize,
    pub spawns_ofs: usize,
    pub spawn_keys: Vec<String>,
    pub exits_ofs: usize,
    pub exits: Vec<ExitLayout>,
    pub objects_ofs: usize,
    pub objects: Vec<ObjectLayout>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageLayout {
    pub name: String,
    pub text: String,
    pub ofs: usize,
}

/// The finished level: the blob plus everything the writers report about it.
#[derive(Debug, Clone, Serialize)]
pub struct LevelLayout {
    pub name: String,
    pub w: u8,
    pub h: u8,
    #[serde(skip)]
    pub blob: Vec<u8>,
    pub blob_size: usize,
    pub ids: Symbols,
    pub offsets: SectionOffsets,
    pub start_room: u8,
    pub start_spawn: u8,
    pub rooms: Vec<RoomLayout>,
    pub scripts: Streams,
    pub messages: Vec<MessageLayout>,
}

fn push_u16(buf: &mut Vec<u8>, v: usize) {
    buf.extend_from_slice(&((v & 0xFFFF) as u16).to_le_bytes());
}

/// NUL-terminated ASCII; anything else becomes `?`.
fn ascii_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .chain(std::iter::once(0))
        .collect()
}

/// A count stored in one byte.
fn count_u8(n: usize, what: &str, line: usize, rep: &mut Reporter) -> u8 {
    u8::try_from(n).unwrap_or_else(|_| {
        rep.error(
            ErrorKind::Range,
            line,
            1,
            format!("Too many {what}: {n} (max 255)"),
        );
        0xFF
    })
}

struct Engine<'a, 'r> {
    level: &'a LevelDef,
    syms: &'a Symbols,
    streams: &'a Streams,
    rep: &'a mut Reporter<'r>,
    /// Absolute offset of `body[0]`.
    base: usize,
    body: Vec<u8>,
}

impl Engine<'_, '_> {
    fn pos(&self) -> usize {
        self.base + self.body.len()
    }

    fn room(&mut self, room: &RoomDef) -> RoomLayout {
        let rid = &room.id;

        let map_ofs = self.pos();
        let map = resolve_room_map(self.level, room, self.rep);
        let map_size = map.len();
        self.body.extend(map);

        let spawns_ofs = self.pos();
        let count = count_u8(room.spawns.len(), &format!("spawns in {rid}"), room.line, self.rep);
        self.body.push(count);
        for spawn in room.spawns.values() {
            self.body.extend([spawn.x, spawn.y]);
        }

        let exits_ofs = self.pos();
        let count = count_u8(room.exits.len(), &format!("exits in {rid}"), room.line, self.rep);
        self.body.push(count);
        let mut exits = Vec::with_capacity(room.exits.len());
        for exit in &room.exits {
            let (room_id, spawn_id) = match self.syms.spawn(&exit.dest_room, &exit.dest_spawn) {
                Some((r, s)) => (r as u8, s as u8),
                None => {
                    let msg = if self.syms.rooms.id(&exit.dest_room).is_none() {
                        format!("{rid}: exit dest room unknown {}", exit.dest_room)
                    } else {
                        format!(
                            "{rid}: exit dest spawn unknown {}:{}",
                            exit.dest_room, exit.dest_spawn
                        )
                    };
                    self.rep.error(ErrorKind::Structural, exit.line, exit.col, msg);
                    (0, 0)
                }
            };
            self.body.extend([exit.edge.code(), room_id, spawn_id]);
            exits.push(ExitLayout {
                edge: exit.edge,
                dest_room: exit.dest_room.clone(),
                dest_spawn: exit.dest_spawn.clone(),
                room_id,
                spawn_id,
            });
        }

        let objects_ofs = self.pos();
        let count = count_u8(room.objects.len(), &format!("objects in {rid}"), room.line, self.rep);
        self.body.push(count);
        let objects = room.objects.iter().map(|obj| self.object(rid, obj)).collect();

        RoomLayout {
            id: rid.clone(),
            name: room.name.clone(),
            map_ofs,
            map_size,
            spawns_ofs,
            spawn_keys: room.spawns.keys().cloned().collect(),
            exits_ofs,
            exits,
            objects_ofs,
            objects,
        }
    }

    /// `p0`/`p1` for one object, from raw props and then the type's own keys.
    fn params(&mut self, rid: &str, obj: &ObjDef) -> (u8, u8) {
        let line = obj.line;
        let mut raw = |key: &str| -> u8 {
            let Some(value) = obj.props.get(key) else { return 0 };
            match parse_num(value) {
                None => {
                    self.rep.error(
                        ErrorKind::Syntax,
                        line,
                        1,
                        format!("{rid}: invalid {key} value for object {}: {value}", obj.name),
                    );
                    0
                }
                Some(n) => u8::try_from(n).unwrap_or_else(|_| {
                    self.rep.error(
                        ErrorKind::Range,
                        line,
                        1,
                        format!("{rid}: {key} out of range 0..255 for object {}", obj.name),
                    );
                    0
                }),
            }
        };
        let (mut p0, mut p1) = (raw("p0"), raw("p1"));

        match obj.obj_type {
            ObjType::Pickup => {
                if let Some(item) = obj.props.get("item") {
                    p0 = self.syms.items.resolve(item, "ITEM", self.rep, line, 1);
                }
            }
            ObjType::LockerKeypad => {
                if let Some(code) = obj.props.get("code") {
                    match parse_num(code) {
                        Some(code @ 0..=999) => {
                            p0 = (code / 100) as u8;
                            p1 = (code % 100) as u8;
                        }
                        Some(_) => self.rep.error(
                            ErrorKind::Range,
                            line,
                            1,
                            format!("{rid}: keypad code out of range 0..999"),
                        ),
                        None => self.rep.error(
                            ErrorKind::Syntax,
                            line,
                            1,
                            format!("{rid}: invalid keypad code: {code}"),
                        ),
                    }
                }
            }
            ObjType::BreakerPanel => {
                if let Some(var) = obj.props.get("var") {
                    p0 = self.syms.vars.resolve(var, "VAR", self.rep, line, 1);
                }
                if let Some(expect) = obj.props.get("expect") {
                    match parse_num(expect) {
                        Some(n @ 0..=7) => p1 = n as u8,
                        Some(_) => self.rep.error(
                            ErrorKind::Range,
                            line,
                            1,
                            format!("{rid}: breaker expect must be 0..7"),
                        ),
                        None => self.rep.error(
                            ErrorKind::Syntax,
                            line,
                            1,
                            format!("{rid}: invalid breaker expect value: {expect}"),
                        ),
                    }
                }
            }
            _ => {}
        }
        (p0, p1)
    }

    fn act_ref(&mut self, name: Option<&String>, line: usize) -> ScriptRef {
        let ofs = match name {
            None => 0,
            Some(name) => self.streams.act_offset(name).unwrap_or_else(|| {
                self.rep.error(
                    ErrorKind::UnknownSymbol,
                    line,
                    1,
                    format!("Unknown ACT script: {name}"),
                );
                0
            }),
        };
        ScriptRef {
            name: name.cloned(),
            ofs,
        }
    }

    fn object(&mut self, rid: &str, obj: &ObjDef) -> ObjectLayout {
        let (p0, p1) = self.params(rid, obj);

        let cond_ofs = self.streams.cond_offset(&obj.cond).unwrap_or_else(|| {
            self.rep.error(
                ErrorKind::UnknownSymbol,
                obj.line,
                1,
                format!("Unknown COND script: {}", obj.cond),
            );
            0
        });
        let cond = ScriptRef {
            name: Some(obj.cond.clone()),
            ofs: cond_ofs,
        };

        let bindings = [
            ("look", &obj.look),
            ("take", &obj.take),
            ("use", &obj.use_),
            ("talk", &obj.talk),
            ("operate", &obj.operate),
            ("alt0", &obj.alt0),
            ("alt1", &obj.alt1),
        ];
        let acts: IndexMap<_, _> = bindings
            .into_iter()
            .map(|(key, name)| (key, self.act_ref(name.as_ref(), obj.line)))
            .collect();

        let start = self.body.len();
        self.body
            .extend([obj.x, obj.y, obj.obj_type.code(), obj.verbs, p0, p1]);
        push_u16(&mut self.body, cond.ofs);
        for script in acts.values() {
            push_u16(&mut self.body, script.ofs);
        }
        debug_assert_eq!(self.body.len() - start, OBJ_RECORD_SIZE);

        ObjectLayout {
            name: obj.name.clone(),
            x: obj.x,
            y: obj.y,
            type_name: obj.obj_type.name(),
            type_id: obj.obj_type.code(),
            verbs: obj.verbs,
            p0,
            p1,
            cond,
            acts,
        }
    }

    /// Emits the message table; returns the stored count with the layouts.
    fn messages(&mut self) -> (u8, Vec<MessageLayout>) {
        let level = self.level;
        let count = count_u8(level.messages.len(), "messages", level.line, self.rep);
        let table = self.pos();
        let mut ofs = table + 1 + 2 * level.messages.len();
        let mut strings = Vec::new();
        let mut out = Vec::with_capacity(level.messages.len());

        self.body.push(count);
        for (name, text) in &level.messages {
            push_u16(&mut self.body, ofs);
            let bytes = ascii_bytes(text);
            out.push(MessageLayout {
                name: name.clone(),
                text: text.clone(),
                ofs,
            });
            ofs += bytes.len();
            strings.extend(bytes);
        }
        self.body.extend(strings);
        (count, out)
    }
}

/// Start room and spawn ids; unknown names are reported and become 0.
fn start_ids(level: &LevelDef, syms: &Symbols, rep: &mut Reporter) -> (u8, u8) {
    let Some(room) = syms.rooms.id(&level.start_room) else {
        rep.error(
            ErrorKind::Structural,
            level.line,
            1,
            format!("Start room unknown: {}", level.start_room),
        );
        return (0, 0);
    };
    match syms.spawn(&level.start_room, &level.start_spawn) {
        Some((_, spawn)) => (room as u8, spawn as u8),
        None => {
            rep.error(
                ErrorKind::Structural,
                level.line,
                1,
                format!("Start spawn unknown: {}:{}", level.start_room, level.start_spawn),
            );
            (room as u8, 0)
        }
    }
}

/// Lay out the whole level. Problems are recorded on `rep`; the returned
/// blob is only meaningful when nothing was recorded.
pub fn compile(level: &LevelDef, rep: &mut Reporter) -> LevelLayout {
    let syms = Symbols::build(level);
    let streams = compile_streams(level, &syms, rep);

    let room_count = count_u8(level.rooms.len(), "rooms", level.line, rep);
    let counts = [
        count_u8(syms.flags.len(), "flags", level.line, rep),
        count_u8(syms.vars.len(), "vars", level.line, rep),
        count_u8(syms.items.len(), "items", level.line, rep),
    ];
    let (start_room, start_spawn) = start_ids(level, &syms, rep);

    let room_dir = HEADER_SIZE;
    let mut engine = Engine {
        level,
        syms: &syms,
        streams: &streams,
        rep,
        base: room_dir + ROOM_DIRENTRY_SIZE * level.rooms.len(),
        body: Vec::new(),
    };

    let rooms: Vec<RoomLayout> = level.rooms.values().map(|room| engine.room(room)).collect();

    let cond_stream = engine.pos();
    engine.body.extend(streams.cond_bytes());
    let act_stream = engine.pos();
    engine.body.extend(streams.act_bytes());

    let msg_table = engine.pos();
    let (msg_count, messages) = engine.messages();

    let body = engine.body;
    let offsets = SectionOffsets {
        room_dir,
        cond_stream,
        act_stream,
        msg_table,
    };

    let mut blob = Vec::with_capacity(room_dir + ROOM_DIRENTRY_SIZE * rooms.len() + body.len());
    blob.extend_from_slice(MAGIC);
    blob.extend([
        VERSION,
        room_count,
        level.w,
        level.h,
        counts[0],
        counts[1],
        counts[2],
        msg_count,
        start_room,
        start_spawn,
    ]);
    for ofs in [room_dir, cond_stream, act_stream, msg_table] {
        push_u16(&mut blob, ofs);
    }
    debug_assert_eq!(blob.len(), HEADER_SIZE);
    for room in &rooms {
        for ofs in [room.map_ofs, room.spawns_ofs, room.exits_ofs, room.objects_ofs] {
            push_u16(&mut blob, ofs);
        }
    }
    blob.extend(body);

    if blob.len() > usize::from(u16::MAX) {
        rep.error(
            ErrorKind::Range,
            level.line,
            1,
            format!("Level blob is {} bytes; offsets are limited to 65535", blob.len()),
        );
    }

    info!(
        level = %level.name,
        rooms = rooms.len(),
        bytes = blob.len(),
        "laid out level"
    );
    debug!(?offsets, "section offsets");

    LevelLayout {
        name: level.name.clone(),
        w: level.w,
        h: level.h,
        blob_size: blob.len(),
        blob,
        ids: syms,
        offsets,
        start_room,
        start_spawn,
        rooms,
        scripts: streams,
        messages,
    }
}
