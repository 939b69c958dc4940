//! Lowers COND/ACT script bodies into the two byte-code streams.
//!
//! Each script becomes a run of `[opcode, a, b]` triples closed by an END
//! triple. Offsets are relative to the start of their stream. The condition
//! stream always starts with `ALWAYS` and the action stream with the built-in
//! `NOOP`, so offset 0 is "always true" and "do nothing" respectively.

use serde::Serialize;
use tracing::debug;

use super::ast::{Action, Condition, ToBytecode};
use super::symbols::Symbols;
use crate::diagnostics::{ErrorKind, Reporter};
use crate::model::{LevelDef, ScriptDef, SourceLine};
use crate::parser::parse_num;

pub const ALWAYS: &str = "ALWAYS";
pub const NOOP: &str = "NOOP";

/// One compiled script. `code` ends with the END instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledScript<T> {
    pub name: String,
    pub offset: usize,
    pub code: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Streams {
    pub conds: Vec<CompiledScript<Condition>>,
    pub acts: Vec<CompiledScript<Action>>,
}

impl Streams {
    pub fn cond_offset(&self, name: &str) -> Option<usize> {
        self.conds.iter().find(|s| s.name == name).map(|s| s.offset)
    }

    pub fn act_offset(&self, name: &str) -> Option<usize> {
        self.acts.iter().find(|s| s.name == name).map(|s| s.offset)
    }

    pub fn cond_bytes(&self) -> Vec<u8> {
        encode(&self.conds)
    }

    pub fn act_bytes(&self) -> Vec<u8> {
        encode(&self.acts)
    }
}

fn encode<T: ToBytecode>(scripts: &[CompiledScript<T>]) -> Vec<u8> {
    scripts
        .iter()
        .flat_map(|s| s.code.iter())
        .flat_map(|instr| instr.to_bytes())
        .collect()
}

/// Whitespace-separated words with their absolute columns.
fn words(line: &SourceLine) -> Vec<(&str, usize)> {
    let mut out = Vec::new();
    let mut start: Option<(usize, usize)> = None;
    for (idx, (byte, c)) in line.text.char_indices().enumerate() {
        match (c.is_whitespace(), start) {
            (false, None) => start = Some((byte, line.col + idx)),
            (true, Some((from, col))) => {
                out.push((&line.text[from..byte], col));
                start = None;
            }
            _ => {}
        }
    }
    if let Some((from, col)) = start {
        out.push((&line.text[from..], col));
    }
    out
}

/// One script line split into its mnemonic and operands.
struct Instr<'a> {
    line: usize,
    op: String,
    op_col: usize,
    args: Vec<(&'a str, usize)>,
}

impl<'a> Instr<'a> {
    fn of(line: &'a SourceLine) -> Option<Self> {
        let mut parts = words(line).into_iter();
        let (op, op_col) = parts.next()?;
        Some(Self {
            line: line.line,
            op: op.to_ascii_uppercase(),
            op_col,
            args: parts.collect(),
        })
    }

    /// Operand `idx`, or a syntax error naming what was expected.
    fn arg(&self, idx: usize, kind: &str, what: &str, rep: &mut Reporter) -> Option<(&'a str, usize)> {
        let found = self.args.get(idx).copied();
        if found.is_none() {
            rep.error(
                ErrorKind::Syntax,
                self.line,
                self.op_col,
                format!("{kind} op {} requires {what}", self.op),
            );
        }
        found
    }

    /// Numeric operand in 0..=255. Bad values are reported and become 0.
    fn byte(&self, (raw, col): (&str, usize), kind: &str, what: &str, rep: &mut Reporter) -> u8 {
        match parse_num(raw) {
            None => {
                rep.error(
                    ErrorKind::Syntax,
                    self.line,
                    col,
                    format!("{kind} op {} has invalid {what}: {raw}", self.op),
                );
                0
            }
            Some(v) => u8::try_from(v).unwrap_or_else(|_| {
                rep.error(
                    ErrorKind::Range,
                    self.line,
                    col,
                    format!("{kind} op {} {what} out of range 0..255: {raw}", self.op),
                );
                0
            }),
        }
    }
}

/// Compile a COND body. Lines after an explicit END are ignored.
pub fn compile_condition(script: &ScriptDef, syms: &Symbols, rep: &mut Reporter) -> Vec<Condition> {
    let mut code = Vec::new();
    for line in &script.lines {
        let Some(ins) = Instr::of(line) else { continue };
        let Some(op) = Condition::opcode_of(&ins.op) else {
            rep.error(
                ErrorKind::Syntax,
                ins.line,
                ins.op_col,
                format!("Unknown COND op: {}", ins.op),
            );
            continue;
        };
        let cond = match op {
            0 => break,
            1 => Condition::True,
            2 | 3 => {
                let Some((flag, col)) = ins.arg(0, "COND", "a flag name", rep) else { continue };
                let id = syms.flags.resolve(flag, "FLAG", rep, ins.line, col);
                if op == 2 { Condition::FlagSet(id) } else { Condition::FlagClr(id) }
            }
            4 => {
                let Some((item, col)) = ins.arg(0, "COND", "an item name", rep) else { continue };
                Condition::Has(syms.items.resolve(item, "ITEM", rep, ins.line, col))
            }
            _ => {
                let (Some((var, col)), Some(value)) = (
                    ins.arg(0, "COND", "a var name and value", rep),
                    ins.args.get(1).copied(),
                ) else {
                    if ins.args.len() == 1 {
                        rep.error(
                            ErrorKind::Syntax,
                            ins.line,
                            ins.op_col,
                            format!("COND op {} requires a var name and value", ins.op),
                        );
                    }
                    continue;
                };
                Condition::VarEq {
                    var: syms.vars.resolve(var, "VAR", rep, ins.line, col),
                    value: ins.byte(value, "COND", "value", rep),
                }
            }
        };
        code.push(cond);
    }
    code.push(Condition::End);
    code
}

/// Compile an ACT body. Lines after an explicit END are ignored.
pub fn compile_action(script: &ScriptDef, syms: &Symbols, rep: &mut Reporter) -> Vec<Action> {
    let mut code = Vec::new();
    for line in &script.lines {
        let Some(ins) = Instr::of(line) else { continue };
        let Some(op) = Action::opcode_of(&ins.op) else {
            rep.error(
                ErrorKind::Syntax,
                ins.line,
                ins.op_col,
                format!("Unknown ACT op: {}", ins.op),
            );
            continue;
        };
        let act = match op {
            0 => break,
            1 => {
                let Some((msg, col)) = ins.arg(0, "ACT", "a message name", rep) else { continue };
                Action::Msg(syms.messages.resolve(msg, "MSG", rep, ins.line, col))
            }
            2 | 3 => {
                let Some((flag, col)) = ins.arg(0, "ACT", "a flag name", rep) else { continue };
                let id = syms.flags.resolve(flag, "FLAG", rep, ins.line, col);
                if op == 2 { Action::SetFlag(id) } else { Action::ClrFlag(id) }
            }
            4 | 5 => {
                let Some((item, col)) = ins.arg(0, "ACT", "an item name", rep) else { continue };
                let id = syms.items.resolve(item, "ITEM", rep, ins.line, col);
                if op == 4 { Action::Give(id) } else { Action::Take(id) }
            }
            6 => {
                if ins.args.len() < 2 {
                    rep.error(
                        ErrorKind::Syntax,
                        ins.line,
                        ins.op_col,
                        format!("ACT op {} requires a var name and value", ins.op),
                    );
                    continue;
                }
                let (var, col) = ins.args[0];
                Action::SetVar {
                    var: syms.vars.resolve(var, "VAR", rep, ins.line, col),
                    value: ins.byte(ins.args[1], "ACT", "value", rep),
                }
            }
            7 => {
                let Some(sound) = ins.arg(0, "ACT", "a sound id", rep) else { continue };
                Action::Sfx(ins.byte(sound, "ACT", "sound id", rep))
            }
            _ => {
                if ins.args.len() < 2 {
                    rep.error(
                        ErrorKind::Syntax,
                        ins.line,
                        ins.op_col,
                        format!("ACT op {} requires room and spawn", ins.op),
                    );
                    continue;
                }
                let ((room, room_col), (spawn, spawn_col)) = (ins.args[0], ins.args[1]);
                let room_id = syms.rooms.resolve(room, "ROOM", rep, ins.line, room_col);
                let spawn_id = match syms.spawn(room, spawn) {
                    Some((_, sid)) => sid as u8,
                    None if syms.rooms.id(room).is_some() => {
                        rep.error(
                            ErrorKind::UnknownSymbol,
                            ins.line,
                            spawn_col,
                            format!("Unknown spawn {spawn} in room {room} for TRANSITION"),
                        );
                        0
                    }
                    // the unknown room is already reported
                    None => 0,
                };
                Action::Transition {
                    room: room_id,
                    spawn: spawn_id,
                }
            }
        };
        code.push(act);
    }
    code.push(Action::End);
    code
}

/// Compile every script of the level into the two streams.
pub fn compile_streams(level: &LevelDef, syms: &Symbols, rep: &mut Reporter) -> Streams {
    let mut streams = Streams::default();

    let always_first = level
        .conds
        .get(ALWAYS)
        .into_iter()
        .chain(level.conds.values().filter(|s| s.name != ALWAYS));
    let mut offset = 0;
    for script in always_first {
        let code = compile_condition(script, syms, rep);
        let len = code.len() * 3;
        streams.conds.push(CompiledScript {
            name: script.name.clone(),
            offset,
            code,
        });
        offset += len;
    }

    streams.acts.push(CompiledScript {
        name: NOOP.to_string(),
        offset: 0,
        code: vec![Action::End],
    });
    let mut offset = 3;
    for script in level.acts.values() {
        if script.name == NOOP {
            rep.error(
                ErrorKind::Structural,
                script.line,
                1,
                "ACT NOOP is built in and cannot be redefined",
            );
            continue;
        }
        let code = compile_action(script, syms, rep);
        let len = code.len() * 3;
        streams.acts.push(CompiledScript {
            name: script.name.clone(),
            offset,
            code,
        });
        offset += len;
    }

    debug!(
        conds = streams.conds.len(),
        acts = streams.acts.len(),
        cond_bytes = streams.conds.iter().map(|s| s.code.len() * 3).sum::<usize>(),
        act_bytes = offset,
        "compiled script streams"
    );
    streams
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticSink, ErrorCollector};
    use crate::model::ScriptKind;

    fn script(kind: ScriptKind, body: &[&str]) -> ScriptDef {
        ScriptDef {
            name: "S".into(),
            kind,
            line: 1,
            lines: body
                .iter()
                .enumerate()
                .map(|(i, t)| SourceLine {
                    line: i + 2,
                    col: 3,
                    text: t.to_string(),
                })
                .collect(),
        }
    }

    fn symbols() -> Symbols {
        let mut syms = Symbols::default();
        syms.flags = ["DOOR", "LIGHT"].into_iter().collect();
        syms.vars = ["BREAKER"].into_iter().collect();
        syms.items = ["KEY", "FUSE"].into_iter().collect();
        syms.messages = ["HELLO"].into_iter().collect();
        syms.rooms = ["R0", "R1"].into_iter().collect();
        syms.spawns.insert("R0".into(), ["S0"].into_iter().collect());
        syms.spawns.insert("R1".into(), ["S0", "S1"].into_iter().collect());
        syms
    }

    #[test]
    fn test_condition_lowering() {
        let mut errors = ErrorCollector::new();
        let mut rep = Reporter::new(&mut errors, "t.lvl");
        let code = compile_condition(
            &script(ScriptKind::Cond, &["flagset LIGHT", "HAS FUSE", "VAREQ BREAKER $05", "FLAGCLR DOOR"]),
            &symbols(),
            &mut rep,
        );
        assert_eq!(
            code,
            vec![
                Condition::FlagSet(1),
                Condition::Has(1),
                Condition::VarEq { var: 0, value: 5 },
                Condition::FlagClr(0),
                Condition::End,
            ]
        );
        assert!(!errors.has_errors());
    }

    #[test]
    fn test_action_lowering() {
        let mut errors = ErrorCollector::new();
        let mut rep = Reporter::new(&mut errors, "t.lvl");
        let code = compile_action(
            &script(
                ScriptKind::Act,
                &["MSG HELLO", "GIVE KEY", "SETVAR BREAKER 3", "SFX 0x10", "TRANSITION R1 S1", "END", "MSG NOPE"],
            ),
            &symbols(),
            &mut rep,
        );
        let bytes: Vec<u8> = code.iter().flat_map(|a| a.to_bytes()).collect();
        assert_eq!(
            bytes,
            vec![1, 0, 0, 4, 0, 0, 6, 0, 3, 7, 16, 0, 8, 1, 1, 0, 0, 0]
        );
        assert!(!errors.has_errors());
    }

    #[test]
    fn test_unknown_operand_emits_zero_and_continues() {
        let mut errors = ErrorCollector::new();
        let mut rep = Reporter::new(&mut errors, "t.lvl");
        let code = compile_action(
            &script(ScriptKind::Act, &["GIVE UNDECLARED_ITEM", "SETFLAG LIGHT"]),
            &symbols(),
            &mut rep,
        );
        assert_eq!(code, vec![Action::Give(0), Action::SetFlag(1), Action::End]);
        assert_eq!(errors.error_count(), 1);
        assert_eq!(errors.count_kind(ErrorKind::UnknownSymbol), 1);
        let d = &errors.entries()[0];
        assert_eq!((d.line, d.col), (2, 8));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let mut errors = ErrorCollector::new();
        let mut rep = Reporter::new(&mut errors, "t.lvl");
        let code = compile_action(
            &script(ScriptKind::Act, &["JUMP R0", "GIVE", "SETVAR BREAKER", "SETVAR BREAKER 300", "TRANSITION R9 S0"]),
            &symbols(),
            &mut rep,
        );
        assert_eq!(
            code,
            vec![
                Action::SetVar { var: 0, value: 0 },
                Action::Transition { room: 0, spawn: 0 },
                Action::End
            ]
        );
        assert_eq!(errors.count_kind(ErrorKind::Syntax), 3);
        assert_eq!(errors.count_kind(ErrorKind::Range), 1);
        assert_eq!(errors.count_kind(ErrorKind::UnknownSymbol), 1);
    }

    #[test]
    fn test_vareq_needs_two_operands() {
        let mut errors = ErrorCollector::new();
        let mut rep = Reporter::new(&mut errors, "t.lvl");
        let code = compile_condition(
            &script(ScriptKind::Cond, &["VAREQ", "VAREQ BREAKER"]),
            &symbols(),
            &mut rep,
        );
        assert_eq!(code, vec![Condition::End]);
        assert_eq!(errors.error_count(), 2);
    }

    #[test]
    fn test_streams_reserve_offset_zero() {
        let mut level = LevelDef::new("t", 1, 1, 1);
        let mut open = script(ScriptKind::Cond, &["FLAGSET DOOR"]);
        open.name = "IS_OPEN".into();
        level.conds.insert("IS_OPEN".into(), open);
        let mut always = script(ScriptKind::Cond, &["TRUE"]);
        always.name = ALWAYS.into();
        level.conds.insert(ALWAYS.into(), always);
        let mut act = script(ScriptKind::Act, &["SETFLAG DOOR", "MSG HELLO"]);
        act.name = "OPEN".into();
        level.acts.insert("OPEN".into(), act);

        let mut errors = ErrorCollector::new();
        let mut rep = Reporter::new(&mut errors, "t.lvl");
        let streams = compile_streams(&level, &symbols(), &mut rep);

        assert_eq!(streams.cond_offset(ALWAYS), Some(0));
        assert_eq!(streams.cond_offset("IS_OPEN"), Some(6));
        assert_eq!(streams.cond_bytes(), vec![1, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0]);
        assert_eq!(streams.act_offset(NOOP), Some(0));
        assert_eq!(streams.act_offset("OPEN"), Some(3));
        assert_eq!(streams.act_bytes().len(), 3 + 9);
    }
}
