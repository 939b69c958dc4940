//! Parser for `.lvl` level descriptions (LVLTEXT).
//!
//! Parsing is a small state machine: the first word of a line either opens or
//! closes a block (`LEVEL`, `FLAGS`, `COND name`, `ROOM id`, `MAP`, `END`,
//! `ENDROOM`, ...) or is an entry of the block that is currently open.
//! Script bodies and map rows are stored verbatim and compiled later, once
//! every id table is complete.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::lexer::{LineTokens, source_lines};
use super::{parse_num, read_source, tset};
use crate::diagnostics::{Aborted, DiagnosticSink, ErrorKind, Reporter};
use crate::model::level::verb_bit;
use crate::model::{
    Edge, ExitDef, LevelDef, ObjDef, ObjType, RoomDef, ScriptDef, ScriptKind, SourceLine, SpawnDef,
    Tileset,
};

/// Object keys with a dedicated field; everything else lands in `props`.
pub const OBJECT_KEYS: [&str; 13] = [
    "type", "verbs", "cond", "look", "take", "use", "talk", "operate", "ok", "bad", "fuse",
    "badge", "reject",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Tiles,
    Flags,
    Vars,
    Items,
    Messages,
    Spawns,
    Exits,
    Objects,
    Map,
}

impl Mode {
    fn parse(head: &str) -> Option<Mode> {
        Some(match head {
            "TILES" => Mode::Tiles,
            "FLAGS" => Mode::Flags,
            "VARS" => Mode::Vars,
            "ITEMS" => Mode::Items,
            "MESSAGES" => Mode::Messages,
            "SPAWNS" => Mode::Spawns,
            "EXITS" => Mode::Exits,
            "OBJECTS" => Mode::Objects,
            "MAP" => Mode::Map,
            _ => return None,
        })
    }

    fn in_room(self) -> bool {
        matches!(self, Mode::Spawns | Mode::Exits | Mode::Objects | Mode::Map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    End,
    EndRoom,
    Level,
    Open(Mode),
    Script(ScriptKind),
    Room,
    Entry,
}

fn classify(text: &str, head: &str) -> Directive {
    match text {
        "END" => return Directive::End,
        "ENDROOM" => return Directive::EndRoom,
        _ => {}
    }
    match head {
        "LEVEL" => Directive::Level,
        "COND" => Directive::Script(ScriptKind::Cond),
        "ACT" => Directive::Script(ScriptKind::Act),
        "ROOM" => Directive::Room,
        _ => Mode::parse(head).map_or(Directive::Entry, Directive::Open),
    }
}

struct LvlParser<'r> {
    rep: Reporter<'r>,
    base_dir: PathBuf,
    level: Option<LevelDef>,
    level_seen: bool,
    tset: Option<Tileset>,
    saw_tiles: bool,
    mode: Option<Mode>,
    room: Option<RoomDef>,
    script: Option<ScriptDef>,
}

/// Parse a level read from `path`.
pub fn parse_file(path: &Path, sink: &mut dyn DiagnosticSink) -> Result<LevelDef, Aborted> {
    let src = read_source(path, sink)?;
    parse(&src, path, sink)
}

/// Parse level source. `path` names the file in diagnostics and anchors a
/// relative `tset=`.
pub fn parse(src: &str, path: &Path, sink: &mut dyn DiagnosticSink) -> Result<LevelDef, Aborted> {
    let mut p = LvlParser {
        rep: Reporter::new(sink, path),
        base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        level: None,
        level_seen: false,
        tset: None,
        saw_tiles: false,
        mode: None,
        room: None,
        script: None,
    };
    for line in source_lines(src) {
        p.line(line);
    }
    p.finish()
}

impl<'r> LvlParser<'r> {
    fn line(&mut self, line: SourceLine) {
        let toks = LineTokens::of(&line);
        let head = toks.word(0).unwrap_or("").to_string();
        let directive = classify(&line.text, &head);

        match directive {
            Directive::End => {
                self.close_script();
                self.mode = None;
                return;
            }
            Directive::EndRoom => {
                match self.room.take() {
                    Some(room) => self.store_room(room),
                    None => self.rep.error(
                        ErrorKind::Syntax,
                        line.line,
                        line.col,
                        "ENDROOM without ROOM",
                    ),
                }
                self.mode = None;
                return;
            }
            _ => {}
        }

        if let Some(script) = self.script.as_mut() {
            script.lines.push(line);
            return;
        }
        if self.mode == Some(Mode::Map) {
            if let Some(room) = self.room.as_mut() {
                room.map_lines.push(line);
            }
            return;
        }

        if directive == Directive::Level {
            self.level_header(&line, &toks);
            return;
        }
        if !self.level_seen {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("Expected LEVEL block, found: {}", line.text),
            );
            return;
        }
        if self.level.is_none() {
            // header was rejected; its errors are already recorded
            return;
        }

        match directive {
            Directive::Open(mode) if mode.in_room() && self.room.is_none() => self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("{head} outside ROOM"),
            ),
            Directive::Open(mode) => self.mode = Some(mode),
            Directive::Script(kind) => self.open_script(kind, &line, &toks),
            Directive::Room => self.open_room(&line, &toks),
            _ => self.entry(&line, &toks),
        }
    }

    fn level_header(&mut self, line: &SourceLine, toks: &LineTokens) {
        let ln = line.line;
        if self.level_seen {
            self.rep
                .error(ErrorKind::Syntax, ln, line.col, "Duplicate LEVEL header");
            return;
        }
        self.level_seen = true;

        let (Some(w), Some(h), Some(start)) = (toks.get("w"), toks.get("h"), toks.get("start"))
        else {
            self.rep.error(
                ErrorKind::Syntax,
                ln,
                line.col,
                "LEVEL requires w=, h=, start=R?:S?",
            );
            return;
        };
        let w = self.dimension(line, toks, "w", w);
        let h = self.dimension(line, toks, "h", h);
        let start = match start.split_once(':') {
            Some((room, spawn)) if !room.is_empty() && !spawn.is_empty() && !spawn.contains(':') => {
                Some((room.to_string(), spawn.to_string()))
            }
            _ => {
                self.rep.error(
                    ErrorKind::Syntax,
                    ln,
                    toks.value_col("start"),
                    format!("Invalid LEVEL start (expected ROOM:SPAWN): {start}"),
                );
                None
            }
        };

        if let Some(tset_path) = toks.get("tset") {
            self.load_tset(line, toks, tset_path);
        }

        let (Some(w), Some(h), Some((start_room, start_spawn))) = (w, h, start) else {
            return;
        };
        let name = toks.get("name").unwrap_or("UNNAMED");
        let mut level = LevelDef::new(name, w, h, ln);
        level.start_room = start_room;
        level.start_spawn = start_spawn;
        if let Some(ts) = &self.tset {
            level.object_stamps = ts.object_stamps.clone();
        }
        info!(name = %level.name, w, h, "level header");
        self.level = Some(level);
    }

    fn dimension(&mut self, line: &SourceLine, toks: &LineTokens, key: &str, raw: &str) -> Option<u8> {
        match parse_num(raw) {
            None => {
                self.rep.error(
                    ErrorKind::Syntax,
                    line.line,
                    toks.value_col(key),
                    format!("Invalid LEVEL {key} value: {raw}"),
                );
                None
            }
            Some(v) if (1..=255).contains(&v) => Some(v as u8),
            Some(_) => {
                self.rep.error(
                    ErrorKind::Range,
                    line.line,
                    toks.value_col(key),
                    format!("LEVEL {key} must be 1..255"),
                );
                None
            }
        }
    }

    fn load_tset(&mut self, line: &SourceLine, toks: &LineTokens, raw: &str) {
        let path = Path::new(raw);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        if !path.is_file() {
            self.rep.error(
                ErrorKind::Io,
                line.line,
                toks.value_col("tset"),
                format!("TSET file not found: {}", path.display()),
            );
            return;
        }
        debug!(path = %path.display(), "loading tileset");
        // diagnostics from the tileset are attributed to the tileset file
        if let Ok(ts) = tset::parse_file(&path, self.rep.sink()) {
            self.tset = Some(ts);
        }
    }

    fn open_script(&mut self, kind: ScriptKind, line: &SourceLine, toks: &LineTokens) {
        let label = match kind {
            ScriptKind::Cond => "COND",
            ScriptKind::Act => "ACT",
        };
        let Some(name) = toks.word(1) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("{label} missing name: {}", line.text),
            );
            return;
        };
        let Some(level) = self.level.as_ref() else { return };
        let taken = match kind {
            ScriptKind::Cond => level.conds.contains_key(name),
            ScriptKind::Act => level.acts.contains_key(name),
        };
        if taken {
            self.rep.error(
                ErrorKind::Structural,
                line.line,
                toks.word_col(1),
                format!("Duplicate {label}: {name}"),
            );
            return;
        }
        self.script = Some(ScriptDef {
            name: name.to_string(),
            kind,
            line: line.line,
            lines: Vec::new(),
        });
    }

    fn close_script(&mut self) {
        let (Some(script), Some(level)) = (self.script.take(), self.level.as_mut()) else {
            return;
        };
        let table = match script.kind {
            ScriptKind::Cond => &mut level.conds,
            ScriptKind::Act => &mut level.acts,
        };
        table.insert(script.name.clone(), script);
    }

    fn open_room(&mut self, line: &SourceLine, toks: &LineTokens) {
        let Some(rid) = toks.word(1) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("ROOM missing id: {}", line.text),
            );
            return;
        };
        if let Some(open) = self.room.take() {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("ROOM {rid} opened before ENDROOM of {}", open.id),
            );
            self.store_room(open);
        }
        let Some(level) = self.level.as_ref() else { return };
        if level.rooms.contains_key(rid) {
            self.rep.error(
                ErrorKind::Structural,
                line.line,
                toks.word_col(1),
                format!("Duplicate ROOM: {rid}"),
            );
            return;
        }
        let name = toks.get("name").unwrap_or(rid);
        self.room = Some(RoomDef::new(rid, name, line.line));
        self.mode = None;
    }

    fn store_room(&mut self, room: RoomDef) {
        if let Some(level) = self.level.as_mut() {
            level.rooms.insert(room.id.clone(), room);
        }
    }

    fn entry(&mut self, line: &SourceLine, toks: &LineTokens) {
        match self.mode {
            Some(Mode::Tiles) => self.tile_entry(line, toks),
            Some(Mode::Flags) => self.name_entry(line, toks, Mode::Flags),
            Some(Mode::Vars) => self.name_entry(line, toks, Mode::Vars),
            Some(Mode::Items) => self.name_entry(line, toks, Mode::Items),
            Some(Mode::Messages) => self.message_entry(line),
            Some(Mode::Spawns) => self.spawn_entry(line, toks),
            Some(Mode::Exits) => self.exit_entry(line, toks),
            Some(Mode::Objects) => self.object_entry(line, toks),
            Some(Mode::Map) | None => self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("Unexpected line: {}", line.text),
            ),
        }
    }

    fn tile_entry(&mut self, line: &SourceLine, toks: &LineTokens) {
        self.saw_tiles = true;
        let key = toks.word(0).unwrap_or("");
        let mut chars = key.chars();
        let (Some(ch), None) = (chars.next(), chars.next()) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("TILES key must be a single char: {key}"),
            );
            return;
        };
        let Some(value) = toks.word(1) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("TILES entry for '{ch}' missing tile"),
            );
            return;
        };
        let col = toks.word_col(1);

        let id = match parse_num(value) {
            Some(n) => match u8::try_from(n) {
                Ok(id) => id,
                Err(_) => {
                    self.rep.error(
                        ErrorKind::Range,
                        line.line,
                        col,
                        format!("TILES id for '{ch}' must be 0..255: {value}"),
                    );
                    return;
                }
            },
            None => match &self.tset {
                Some(ts) => match ts.tile_id(value) {
                    Some(id) => id,
                    None => {
                        self.rep.error(
                            ErrorKind::UnknownSymbol,
                            line.line,
                            col,
                            format!("TILES unknown tile name for '{ch}': {value}"),
                        );
                        return;
                    }
                },
                None => {
                    self.rep.error(
                        ErrorKind::UnknownSymbol,
                        line.line,
                        col,
                        format!("TILES invalid value for '{ch}': {value} (add LEVEL tset=... to use names)"),
                    );
                    return;
                }
            },
        };
        if let Some(level) = self.level.as_mut() {
            if level.tiles.insert(ch, id).is_some() {
                self.rep.error(
                    ErrorKind::Structural,
                    line.line,
                    line.col,
                    format!("Duplicate TILES char: {ch}"),
                );
            }
        }
    }

    fn name_entry(&mut self, line: &SourceLine, toks: &LineTokens, mode: Mode) {
        let Some(level) = self.level.as_mut() else { return };
        let name = toks.word(0).unwrap_or("").to_string();
        let (table, label) = match mode {
            Mode::Flags => (&mut level.flags, "FLAG"),
            Mode::Vars => (&mut level.vars, "VAR"),
            _ => (&mut level.items, "ITEM"),
        };
        if !table.insert(name.clone()) {
            self.rep.error(
                ErrorKind::Structural,
                line.line,
                line.col,
                format!("Duplicate {label}: {name}"),
            );
        }
    }

    fn message_entry(&mut self, line: &SourceLine) {
        let parsed = line.text.split_once('=').and_then(|(key, value)| {
            let key = key.trim();
            let value = value.trim();
            let valid_key = !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
            let text = value.strip_prefix('"')?.strip_suffix('"')?;
            valid_key.then(|| (key.to_string(), text.to_string()))
        });
        let Some((key, text)) = parsed else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("Bad message line: {}", line.text),
            );
            return;
        };
        let Some(level) = self.level.as_mut() else { return };
        if level.messages.contains_key(&key) {
            self.rep.error(
                ErrorKind::Structural,
                line.line,
                line.col,
                format!("Duplicate MESSAGE: {key}"),
            );
            return;
        }
        level.messages.insert(key, text);
    }

    /// `x,y` with both parts in 0..=255.
    fn position(&mut self, line: &SourceLine, col: usize, raw: &str, what: &str) -> Option<(u8, u8)> {
        let Some((x, y)) = raw.split_once(',') else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                col,
                format!("{what} invalid position: {raw}"),
            );
            return None;
        };
        match (parse_num(x), parse_num(y)) {
            (Some(x), Some(y)) => match (u8::try_from(x), u8::try_from(y)) {
                (Ok(x), Ok(y)) => Some((x, y)),
                _ => {
                    self.rep.error(
                        ErrorKind::Range,
                        line.line,
                        col,
                        format!("{what} position out of range 0..255: {raw}"),
                    );
                    None
                }
            },
            _ => {
                self.rep.error(
                    ErrorKind::Syntax,
                    line.line,
                    col,
                    format!("{what} invalid position: {raw}"),
                );
                None
            }
        }
    }

    fn spawn_entry(&mut self, line: &SourceLine, toks: &LineTokens) {
        let (Some(sid), Some(pos)) = (toks.word(0), toks.word(1)) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("SPAWNS line missing position: {}", line.text),
            );
            return;
        };
        if self.room.as_ref().is_some_and(|r| r.spawns.contains_key(sid)) {
            self.rep.error(
                ErrorKind::Structural,
                line.line,
                line.col,
                format!("Duplicate SPAWN: {sid}"),
            );
            return;
        }
        let what = format!("SPAWNS '{sid}'");
        let Some((x, y)) = self.position(line, toks.word_col(1), pos, &what) else {
            return;
        };
        if let Some(room) = self.room.as_mut() {
            room.spawns
                .insert(sid.to_string(), SpawnDef { x, y, line: line.line });
        }
    }

    fn exit_entry(&mut self, line: &SourceLine, toks: &LineTokens) {
        let (Some(edge), Some(dest)) = (toks.word(0), toks.word(1)) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("EXITS line missing destination: {}", line.text),
            );
            return;
        };
        let Some(edge) = Edge::parse(edge) else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                line.col,
                format!("Bad exit edge {edge} (expected L, R, U or D)"),
            );
            return;
        };
        let col = toks.word_col(1);
        let Some((room, spawn)) = dest.split_once(':').filter(|(r, s)| !r.is_empty() && !s.is_empty())
        else {
            self.rep.error(
                ErrorKind::Syntax,
                line.line,
                col,
                format!("EXITS invalid destination format: {dest}"),
            );
            return;
        };
        if let Some(cur) = self.room.as_mut() {
            cur.exits.push(ExitDef {
                edge,
                dest_room: room.to_string(),
                dest_spawn: spawn.to_string(),
                line: line.line,
                col,
            });
        }
    }

    fn object_entry(&mut self, line: &SourceLine, toks: &LineTokens) {
        let ln = line.line;
        let (Some(name), Some("at"), Some(pos)) = (toks.word(0), toks.word(1), toks.word(2)) else {
            self.rep.error(
                ErrorKind::Syntax,
                ln,
                line.col,
                format!("Bad OBJECT line: {}", line.text),
            );
            return;
        };
        if self
            .room
            .as_ref()
            .is_some_and(|r| r.objects.iter().any(|o| o.name == name))
        {
            self.rep.error(
                ErrorKind::Structural,
                ln,
                line.col,
                format!("Duplicate OBJECT: {name}"),
            );
            return;
        }
        let what = format!("OBJECT '{name}'");
        let Some((x, y)) = self.position(line, toks.word_col(2), pos, &what) else {
            return;
        };

        let (Some(type_name), Some(verbs_raw)) = (toks.get("type"), toks.get("verbs")) else {
            self.rep.error(
                ErrorKind::Syntax,
                ln,
                line.col,
                format!("Object missing type/verbs: {}", line.text),
            );
            return;
        };
        let Some(obj_type) = ObjType::parse(type_name) else {
            self.rep.error(
                ErrorKind::UnknownSymbol,
                ln,
                toks.value_col("type"),
                format!("Unknown object type {type_name}"),
            );
            return;
        };

        let mut verbs = 0u8;
        for verb in verbs_raw.split('|') {
            let verb = verb.trim().to_ascii_uppercase();
            match verb_bit(&verb) {
                Some(bit) => verbs |= bit,
                None => self.rep.error(
                    ErrorKind::UnknownSymbol,
                    ln,
                    toks.value_col("verbs"),
                    format!("Unknown verb {verb} in {}", line.text),
                ),
            }
        }

        let binding = |key: &str| toks.get(key).filter(|v| !v.is_empty()).map(str::to_string);
        let mut obj = ObjDef {
            name: name.to_string(),
            x,
            y,
            obj_type,
            verbs,
            line: ln,
            cond: binding("cond").unwrap_or_else(|| "ALWAYS".to_string()),
            look: binding("look"),
            take: binding("take"),
            use_: binding("use"),
            talk: binding("talk"),
            operate: binding("operate"),
            alt0: binding("ok"),
            alt1: binding("bad"),
            props: Default::default(),
        };
        // hatch panels name their alternates differently
        if let Some(fuse) = binding("fuse") {
            obj.alt0 = Some(fuse);
        }
        if let Some(badge) = binding("badge") {
            obj.alt1 = Some(badge);
        }
        if let Some(reject) = binding("reject") {
            obj.use_ = Some(reject);
        }
        for (k, v) in toks.pairs() {
            if !OBJECT_KEYS.contains(&k) {
                obj.props.insert(k.to_string(), v.to_string());
            }
        }

        if let Some(room) = self.room.as_mut() {
            room.objects.push(obj);
        }
    }

    fn finish(mut self) -> Result<LevelDef, Aborted> {
        if let Some(script) = &self.script {
            let (kind, name, ln) = (script.kind, script.name.clone(), script.line);
            let label = if kind == ScriptKind::Cond { "COND" } else { "ACT" };
            self.rep.error(
                ErrorKind::Syntax,
                ln,
                1,
                format!("{label} {name} missing END"),
            );
            self.close_script();
        }
        if let Some(room) = self.room.take() {
            self.rep.error(
                ErrorKind::Syntax,
                room.line,
                1,
                format!("ROOM {} missing ENDROOM", room.id),
            );
            self.store_room(room);
        }

        if !self.level_seen {
            self.rep.error(ErrorKind::Syntax, 1, 1, "No LEVEL block found");
            return Err(Aborted("missing LEVEL header"));
        }
        let Some(mut level) = self.level.take() else {
            return Err(Aborted("invalid LEVEL header"));
        };

        if !self.saw_tiles {
            match self.tset.as_ref().filter(|ts| !ts.charmap.is_empty()) {
                Some(ts) => level.tiles = ts.charmap.clone(),
                None => self.rep.error(
                    ErrorKind::Structural,
                    level.line,
                    1,
                    "No TILES section and no CHARMAP found in tset",
                ),
            }
        }

        if !level.conds.contains_key("ALWAYS") {
            let always = ScriptDef {
                name: "ALWAYS".to_string(),
                kind: ScriptKind::Cond,
                line: level.line,
                lines: vec![SourceLine {
                    line: level.line,
                    col: 1,
                    text: "TRUE".to_string(),
                }],
            };
            level.conds.insert("ALWAYS".to_string(), always);
        }

        debug!(
            rooms = level.rooms.len(),
            conds = level.conds.len(),
            acts = level.acts.len(),
            messages = level.messages.len(),
            "parsed level"
        );
        Ok(level)
    }
}
