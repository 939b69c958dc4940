//! Reference interpreter for compiled levels.
//!
//! Mirrors what the engine does with a `LVL1` blob: condition streams are an
//! AND of every instruction up to END, action streams run linearly, and
//! offset 0 means "always" / "nothing" in each stream.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use super::ast::{Action, Condition};
use super::blob::{HDR_OFS_ACTSTREAM, HDR_OFS_CONDSTREAM, HDR_OFS_MSGTABLE, HEADER_SIZE, MAGIC};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VmError {
    #[error("not a LVL1 blob")]
    BadMagic,
    #[error("blob truncated at offset {0}")]
    Truncated(usize),
    #[error("unknown action opcode {op} at offset {ofs}")]
    BadOpcode { op: u8, ofs: usize },
}

/// Read-only view over the sections of a compiled level.
#[derive(Debug, Clone, Copy)]
pub struct LevelBlob<'a> {
    bytes: &'a [u8],
}

impl<'a> LevelBlob<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, VmError> {
        if bytes.len() < HEADER_SIZE {
            return Err(VmError::Truncated(bytes.len()));
        }
        if &bytes[..4] != MAGIC {
            return Err(VmError::BadMagic);
        }
        let blob = Self { bytes };
        let (conds, acts, msgs) = blob.stream_bounds();
        if !(conds <= acts && acts <= msgs && msgs < bytes.len()) {
            return Err(VmError::Truncated(msgs));
        }
        Ok(blob)
    }

    fn rd16(&self, at: usize) -> usize {
        usize::from(u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]))
    }

    fn stream_bounds(&self) -> (usize, usize, usize) {
        (
            self.rd16(HDR_OFS_CONDSTREAM),
            self.rd16(HDR_OFS_ACTSTREAM),
            self.rd16(HDR_OFS_MSGTABLE),
        )
    }

    pub fn cond_stream(&self) -> &'a [u8] {
        let (conds, acts, _) = self.stream_bounds();
        &self.bytes[conds..acts]
    }

    pub fn act_stream(&self) -> &'a [u8] {
        let (_, acts, msgs) = self.stream_bounds();
        &self.bytes[acts..msgs]
    }

    /// Text of message `id`, without its NUL.
    pub fn message(&self, id: u8) -> Option<&'a str> {
        let (_, _, table) = self.stream_bounds();
        if id >= self.bytes[table] {
            return None;
        }
        let slot = table + 1 + 2 * usize::from(id);
        let start = self.rd16(slot);
        let rest = self.bytes.get(start..)?;
        let end = rest.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&rest[..end]).ok()
    }
}

/// Mutable game state touched by scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmState {
    pub flags: BTreeSet<u8>,
    pub vars: BTreeMap<u8, u8>,
    pub inventory: BTreeSet<u8>,
    /// Message ids in the order they were shown.
    pub messages: Vec<u8>,
    pub sfx: Option<u8>,
    /// `(room, spawn)` requested by the last TRANSITION.
    pub transition: Option<(u8, u8)>,
}

impl VmState {
    pub fn var(&self, id: u8) -> u8 {
        self.vars.get(&id).copied().unwrap_or(0)
    }
}

fn triple(stream: &[u8], at: usize) -> Option<[u8; 3]> {
    stream.get(at..at + 3)?.try_into().ok()
}

/// True when every instruction from `ofs` up to END holds. Offset 0 always
/// passes; a truncated stream or an unknown opcode fails.
pub fn eval_condition(stream: &[u8], ofs: usize, state: &VmState) -> bool {
    if ofs == 0 {
        return true;
    }
    let mut pc = ofs;
    loop {
        let Some(cond) = triple(stream, pc).and_then(Condition::decode) else {
            return false;
        };
        let holds = match cond {
            Condition::End => return true,
            Condition::True => true,
            Condition::FlagSet(f) => state.flags.contains(&f),
            Condition::FlagClr(f) => !state.flags.contains(&f),
            Condition::Has(i) => state.inventory.contains(&i),
            Condition::VarEq { var, value } => state.var(var) == value,
        };
        if !holds {
            return false;
        }
        pc += 3;
    }
}

/// Run the action at `ofs` until END. Returns the number of instructions
/// executed, END excluded. Offset 0 does nothing.
pub fn run_action(stream: &[u8], ofs: usize, state: &mut VmState) -> Result<usize, VmError> {
    if ofs == 0 {
        return Ok(0);
    }
    let mut pc = ofs;
    let mut executed = 0;
    loop {
        let bytes = triple(stream, pc).ok_or(VmError::Truncated(pc))?;
        let act = Action::decode(bytes).ok_or(VmError::BadOpcode { op: bytes[0], ofs: pc })?;
        match act {
            Action::End => return Ok(executed),
            Action::Msg(m) => state.messages.push(m),
            Action::SetFlag(f) => {
                state.flags.insert(f);
            }
            Action::ClrFlag(f) => {
                state.flags.remove(&f);
            }
            Action::Give(i) => {
                state.inventory.insert(i);
            }
            Action::Take(i) => {
                state.inventory.remove(&i);
            }
            Action::SetVar { var, value } => {
                state.vars.insert(var, value);
            }
            Action::Sfx(s) => state.sfx = Some(s),
            Action::Transition { room, spawn } => state.transition = Some((room, spawn)),
        }
        executed += 1;
        pc += 3;
    }
}
