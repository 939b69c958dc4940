//! Typed condition/action instructions, one per script line, before they
//! are lowered to byte-code triples.

use std::fmt;

use serde::Serialize;

/// Condition opcodes. Every instruction in a condition must hold (AND).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Condition {
    End,
    True,
    /// `FLAGSET flag`
    FlagSet(u8),
    /// `FLAGCLR flag`
    FlagClr(u8),
    /// `HAS item`
    Has(u8),
    /// `VAREQ var value`
    VarEq { var: u8, value: u8 },
}

/// Action opcodes, executed in order until `End`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    End,
    /// `MSG message`
    Msg(u8),
    SetFlag(u8),
    ClrFlag(u8),
    Give(u8),
    Take(u8),
    /// `SETVAR var value`
    SetVar { var: u8, value: u8 },
    /// `SFX n`, a raw sound id.
    Sfx(u8),
    /// `TRANSITION room spawn`
    Transition { room: u8, spawn: u8 },
}

impl Condition {
    /// Source mnemonics; index == opcode.
    pub const VARIANT_NAMES: &'static [&'static str] =
        &["END", "TRUE", "FLAGSET", "FLAGCLR", "HAS", "VAREQ"];

    /// Names used for the opcode defines in generated C.
    pub const C_NAMES: &'static [&'static str] = &[
        "C_END",
        "C_TRUE",
        "C_FLAG_SET",
        "C_FLAG_CLR",
        "C_HAS_ITEM",
        "C_VAR_EQ",
    ];

    pub fn opcode_of(mnemonic: &str) -> Option<u8> {
        Self::VARIANT_NAMES
            .iter()
            .position(|n| *n == mnemonic)
            .map(|p| p as u8)
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Condition::End => 0,
            Condition::True => 1,
            Condition::FlagSet(_) => 2,
            Condition::FlagClr(_) => 3,
            Condition::Has(_) => 4,
            Condition::VarEq { .. } => 5,
        }
    }

    pub fn decode(bytes: [u8; 3]) -> Option<Self> {
        let [op, a, b] = bytes;
        Some(match op {
            0 => Condition::End,
            1 => Condition::True,
            2 => Condition::FlagSet(a),
            3 => Condition::FlagClr(a),
            4 => Condition::Has(a),
            5 => Condition::VarEq { var: a, value: b },
            _ => return None,
        })
    }
}

impl Action {
    /// Source mnemonics; index == opcode.
    pub const VARIANT_NAMES: &'static [&'static str] = &[
        "END",
        "MSG",
        "SETFLAG",
        "CLRFLAG",
        "GIVE",
        "TAKE",
        "SETVAR",
        "SFX",
        "TRANSITION",
    ];

    pub const C_NAMES: &'static [&'static str] = &[
        "A_END",
        "A_SHOW_MSG",
        "A_SET_FLAG",
        "A_CLR_FLAG",
        "A_GIVE_ITEM",
        "A_TAKE_ITEM",
        "A_SET_VAR",
        "A_SFX",
        "A_TRANSITION",
    ];

    pub fn opcode_of(mnemonic: &str) -> Option<u8> {
        Self::VARIANT_NAMES
            .iter()
            .position(|n| *n == mnemonic)
            .map(|p| p as u8)
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Action::End => 0,
            Action::Msg(_) => 1,
            Action::SetFlag(_) => 2,
            Action::ClrFlag(_) => 3,
            Action::Give(_) => 4,
            Action::Take(_) => 5,
            Action::SetVar { .. } => 6,
            Action::Sfx(_) => 7,
            Action::Transition { .. } => 8,
        }
    }

    pub fn decode(bytes: [u8; 3]) -> Option<Self> {
        let [op, a, b] = bytes;
        Some(match op {
            0 => Action::End,
            1 => Action::Msg(a),
            2 => Action::SetFlag(a),
            3 => Action::ClrFlag(a),
            4 => Action::Give(a),
            5 => Action::Take(a),
            6 => Action::SetVar { var: a, value: b },
            7 => Action::Sfx(a),
            8 => Action::Transition { room: a, spawn: b },
            _ => return None,
        })
    }
}

/// Lowering to the fixed `[opcode, a, b]` triple.
pub trait ToBytecode {
    fn to_bytes(&self) -> [u8; 3];
}

impl ToBytecode for Condition {
    fn to_bytes(&self) -> [u8; 3] {
        let (a, b) = match *self {
            Condition::End | Condition::True => (0, 0),
            Condition::FlagSet(f) | Condition::FlagClr(f) => (f, 0),
            Condition::Has(i) => (i, 0),
            Condition::VarEq { var, value } => (var, value),
        };
        [self.opcode(), a, b]
    }
}

impl ToBytecode for Action {
    fn to_bytes(&self) -> [u8; 3] {
        let (a, b) = match *self {
            Action::End => (0, 0),
            Action::Msg(id)
            | Action::SetFlag(id)
            | Action::ClrFlag(id)
            | Action::Give(id)
            | Action::Take(id)
            | Action::Sfx(id) => (id, 0),
            Action::SetVar { var, value } => (var, value),
            Action::Transition { room, spawn } => (room, spawn),
        };
        [self.opcode(), a, b]
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [op, a, b] = self.to_bytes();
        let name = Self::VARIANT_NAMES[usize::from(op)];
        match self {
            Condition::End | Condition::True => f.write_str(name),
            Condition::VarEq { .. } => write!(f, "{name} {a} {b}"),
            _ => write!(f, "{name} {a}"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [op, a, b] = self.to_bytes();
        let name = Self::VARIANT_NAMES[usize::from(op)];
        match self {
            Action::End => f.write_str(name),
            Action::SetVar { .. } | Action::Transition { .. } => write!(f, "{name} {a} {b}"),
            _ => write!(f, "{name} {a}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_bytes() {
        let test_cases = vec![
            (Condition::End, [0, 0, 0]),
            (Condition::True, [1, 0, 0]),
            (Condition::FlagSet(3), [2, 3, 0]),
            (Condition::FlagClr(4), [3, 4, 0]),
            (Condition::Has(1), [4, 1, 0]),
            (Condition::VarEq { var: 2, value: 9 }, [5, 2, 9]),
        ];
        for (cond, expected) in test_cases {
            assert_eq!(cond.to_bytes(), expected, "{cond:?}");
            assert_eq!(Condition::decode(expected), Some(cond));
        }
        assert_eq!(Condition::decode([6, 0, 0]), None);
    }

    #[test]
    fn test_action_bytes() {
        let test_cases = vec![
            (Action::End, [0, 0, 0]),
            (Action::Msg(5), [1, 5, 0]),
            (Action::SetFlag(1), [2, 1, 0]),
            (Action::ClrFlag(1), [3, 1, 0]),
            (Action::Give(2), [4, 2, 0]),
            (Action::Take(2), [5, 2, 0]),
            (Action::SetVar { var: 0, value: 7 }, [6, 0, 7]),
            (Action::Sfx(12), [7, 12, 0]),
            (Action::Transition { room: 1, spawn: 2 }, [8, 1, 2]),
        ];
        for (act, expected) in test_cases {
            assert_eq!(act.to_bytes(), expected, "{act:?}");
        }
    }

    #[test]
    fn test_mnemonics_match_opcodes() {
        assert_eq!(Condition::opcode_of("VAREQ"), Some(5));
        assert_eq!(Action::opcode_of("TRANSITION"), Some(8));
        assert_eq!(Action::opcode_of("JUMP"), None);
        assert_eq!(Condition::VARIANT_NAMES.len(), Condition::C_NAMES.len());
        assert_eq!(Action::VARIANT_NAMES.len(), Action::C_NAMES.len());
    }

    #[test]
    fn test_display() {
        assert_eq!(Condition::True.to_string(), "TRUE");
        assert_eq!(Condition::FlagSet(2).to_string(), "FLAGSET 2");
        assert_eq!(Action::Transition { room: 1, spawn: 0 }.to_string(), "TRANSITION 1 0");
    }
}
