//! Dense id tables. A name's id is its position in declaration order.

use indexmap::{IndexMap, IndexSet};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::diagnostics::{ErrorKind, Reporter};
use crate::model::LevelDef;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdTable {
    names: IndexSet<String>,
}

impl IdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `name`, assigning the next free one on first sight.
    pub fn insert(&mut self, name: &str) -> usize {
        self.names.insert_full(name.to_string()).0
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.names.get_index_of(name)
    }

    /// Look up `name`; an unknown name records an error and resolves to 0.
    pub fn resolve(&self, name: &str, kind: &str, rep: &mut Reporter, line: usize, col: usize) -> u8 {
        match self.id(name) {
            Some(id) => id as u8,
            None => {
                rep.error(
                    ErrorKind::UnknownSymbol,
                    line,
                    col,
                    format!("Unknown {kind} id: {name}"),
                );
                0
            }
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for IdTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut table = IdTable::new();
        for name in iter {
            table.insert(name.as_ref());
        }
        table
    }
}

/// Serialized as `{ name: id, ... }` in declaration order.
impl Serialize for IdTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.names.len()))?;
        for (id, name) in self.names.iter().enumerate() {
            map.serialize_entry(name, &id)?;
        }
        map.end()
    }
}

/// Every id table of one level.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Symbols {
    pub flags: IdTable,
    pub vars: IdTable,
    pub items: IdTable,
    #[serde(rename = "msgs")]
    pub messages: IdTable,
    pub rooms: IdTable,
    /// Per room id, spawn ids in that room's declaration order.
    pub spawns: IndexMap<String, IdTable>,
}

impl Symbols {
    pub fn build(level: &LevelDef) -> Self {
        Self {
            flags: level.flags.iter().collect(),
            vars: level.vars.iter().collect(),
            items: level.items.iter().collect(),
            messages: level.messages.keys().collect(),
            rooms: level.rooms.keys().collect(),
            spawns: level
                .rooms
                .iter()
                .map(|(rid, room)| (rid.clone(), room.spawns.keys().collect()))
                .collect(),
        }
    }

    /// `(room id, spawn id)` when both exist.
    pub fn spawn(&self, room: &str, spawn: &str) -> Option<(usize, usize)> {
        let rid = self.rooms.id(room)?;
        let sid = self.spawns.get(room)?.id(spawn)?;
        Some((rid, sid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticSink, ErrorCollector};

    #[test]
    fn test_ids_follow_first_insertion() {
        let mut table = IdTable::new();
        assert_eq!(table.insert("b"), 0);
        assert_eq!(table.insert("a"), 1);
        assert_eq!(table.insert("b"), 0);
        assert_eq!(table.len(), 2);
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_resolve_unknown_defaults_to_zero() {
        let table: IdTable = ["KEY", "FUSE"].into_iter().collect();
        let mut errors = ErrorCollector::new();
        let mut rep = Reporter::new(&mut errors, "x.lvl");
        assert_eq!(table.resolve("FUSE", "ITEM", &mut rep, 3, 1), 1);
        assert_eq!(table.resolve("BADGE", "ITEM", &mut rep, 3, 1), 0);
        assert!(errors.has_errors());
        assert_eq!(errors.entries()[0].message, "Unknown ITEM id: BADGE");
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let table: IdTable = ["Z", "A"].into_iter().collect();
        assert_eq!(serde_json::to_string(&table).unwrap(), r#"{"Z":0,"A":1}"#);
    }
}
