//! Resolves a room's MAP rows into `w * h` tile ids, expanding object stamps.

use std::collections::HashSet;

use crate::diagnostics::{ErrorKind, Reporter};
use crate::model::{LevelDef, RoomDef, StampDef};

/// One map row, `None` when it had the wrong width (already reported).
struct Row {
    line: usize,
    cells: Option<Vec<char>>,
}

struct Grid<'a> {
    w: usize,
    h: usize,
    rows: Vec<Row>,
    tiles: Vec<Option<u8>>,
    room: &'a RoomDef,
}

impl<'a> Grid<'a> {
    fn char_at(&self, x: usize, y: usize) -> Option<char> {
        self.rows.get(y)?.cells.as_ref()?.get(x).copied()
    }

    fn has_cells(&self, y: usize) -> bool {
        self.rows.get(y).is_some_and(|r| r.cells.is_some())
    }

    fn line(&self, y: usize) -> usize {
        self.rows.get(y).map_or(self.room.line, |r| r.line)
    }

    fn stamp(&mut self, ch: char, stamp: &StampDef, is_tile: bool, x: usize, y: usize, rep: &mut Reporter) {
        let rid = &self.room.id;
        let (sw, sh) = (usize::from(stamp.w), usize::from(stamp.h));
        let line = self.line(y);
        if is_tile {
            rep.error(
                ErrorKind::Structural,
                line,
                x + 1,
                format!("{rid}: MAP char '{ch}' is both a tile and an object stamp"),
            );
        }
        if x + sw > self.w || y + sh > self.h {
            rep.error(
                ErrorKind::Structural,
                line,
                x + 1,
                format!("{rid}: OBJECT stamp '{ch}' out of bounds at {x},{y}"),
            );
            self.tiles[y * self.w + x] = Some(0);
            return;
        }

        let solid = (0..sh).all(|dy| {
            (0..sw).all(|dx| {
                // missing rows and rows with a bad width were reported on their own
                !self.has_cells(y + dy) || self.char_at(x + dx, y + dy) == Some(ch)
            })
        });
        if !solid {
            rep.error(
                ErrorKind::Structural,
                line,
                x + 1,
                format!("{rid}: OBJECT stamp '{ch}' is not a solid {sw}x{sh} block at {x},{y}"),
            );
        }

        let mut overlap = None;
        for dy in 0..sh {
            if !self.has_cells(y + dy) {
                continue;
            }
            for dx in 0..sw {
                let cell = &mut self.tiles[(y + dy) * self.w + x + dx];
                if cell.is_some() {
                    overlap.get_or_insert((x + dx, y + dy));
                    continue;
                }
                *cell = Some(stamp.tiles.get(dy * sw + dx).copied().unwrap_or(0));
            }
        }
        if let Some((ox, oy)) = overlap {
            rep.error(
                ErrorKind::Structural,
                self.line(oy),
                ox + 1,
                format!("{rid}: OBJECT stamp '{ch}' overlaps another tile at {ox},{oy}"),
            );
        }
    }
}

/// Row-major tile ids for one room, always exactly `w * h` bytes.
/// Cells that cannot be resolved are reported and become tile 0.
pub fn resolve_room_map(level: &LevelDef, room: &RoomDef, rep: &mut Reporter) -> Vec<u8> {
    let (w, h) = (usize::from(level.w), usize::from(level.h));
    let rid = &room.id;

    if room.map_lines.len() != h {
        rep.error(
            ErrorKind::Structural,
            room.line,
            1,
            format!("{rid}: MAP has {} lines, expected {h}", room.map_lines.len()),
        );
    }
    let rows = room
        .map_lines
        .iter()
        .take(h)
        .enumerate()
        .map(|(y, src)| {
            let cells: Vec<char> = src.text.chars().collect();
            if cells.len() != w {
                rep.error(
                    ErrorKind::Structural,
                    src.line,
                    src.col,
                    format!("{rid}: MAP line {y} length {}, expected {w}", cells.len()),
                );
                return Row {
                    line: src.line,
                    cells: None,
                };
            }
            Row {
                line: src.line,
                cells: Some(cells),
            }
        })
        .collect();

    let mut grid = Grid {
        w,
        h,
        rows,
        tiles: vec![None; w * h],
        room,
    };
    let mut unknown = HashSet::new();

    for y in 0..h {
        for x in 0..w {
            if grid.tiles[y * w + x].is_some() {
                continue;
            }
            let Some(ch) = grid.char_at(x, y) else { continue };
            if let Some(stamp) = level.object_stamps.get(&ch) {
                grid.stamp(ch, stamp, level.tiles.contains_key(&ch), x, y, rep);
                continue;
            }
            let id = match level.tiles.get(&ch) {
                Some(id) => *id,
                None => {
                    if unknown.insert(ch) {
                        rep.error(
                            ErrorKind::UnknownSymbol,
                            grid.line(y),
                            x + 1,
                            format!("{rid}: MAP uses char '{ch}' with no TILES mapping"),
                        );
                    }
                    0
                }
            };
            grid.tiles[y * w + x] = Some(id);
        }
    }

    grid.tiles.into_iter().map(|t| t.unwrap_or(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticSink, ErrorCollector};
    use crate::model::SourceLine;

    fn level(w: u8, h: u8) -> LevelDef {
        let mut level = LevelDef::new("t", w, h, 1);
        level.tiles.insert('.', 0);
        level.tiles.insert('#', 1);
        level.object_stamps.insert(
            'C',
            StampDef {
                name: "CRATE".into(),
                w: 2,
                h: 2,
                tiles: vec![10, 11, 12, 13],
            },
        );
        level
    }

    fn room(rows: &[&str]) -> RoomDef {
        let mut room = RoomDef::new("R0", "R0", 1);
        room.map_lines = rows
            .iter()
            .enumerate()
            .map(|(i, r)| SourceLine {
                line: i + 10,
                col: 5,
                text: r.to_string(),
            })
            .collect();
        room
    }

    fn resolve(level: &LevelDef, room: &RoomDef) -> (Vec<u8>, ErrorCollector) {
        let mut errors = ErrorCollector::new();
        let map = resolve_room_map(level, room, &mut Reporter::new(&mut errors, "t.lvl"));
        (map, errors)
    }

    #[test]
    fn test_plain_tiles() {
        let (map, errors) = resolve(&level(3, 2), &room(&["#.#", "..#"]));
        assert_eq!(map, vec![1, 0, 1, 0, 0, 1]);
        assert!(!errors.has_errors());
    }

    #[test]
    fn test_stamp_expands_row_major() {
        let (map, errors) = resolve(&level(4, 2), &room(&[".CC#", ".CC#"]));
        assert_eq!(map, vec![0, 10, 11, 1, 0, 12, 13, 1]);
        assert!(!errors.has_errors());
    }

    #[test]
    fn test_two_stamps_side_by_side() {
        let (map, errors) = resolve(&level(4, 2), &room(&["CCCC", "CCCC"]));
        assert_eq!(map, vec![10, 11, 10, 11, 12, 13, 12, 13]);
        assert!(!errors.has_errors());
    }

    #[test]
    fn test_broken_stamp_is_structural() {
        let test_cases = vec![
            (vec!["CC.", "C.."], "not a solid"),
            (vec!["..C", "..C"], "out of bounds"),
            (vec!["...", ".CC"], "out of bounds"),
        ];
        for (rows, needle) in test_cases {
            let (map, errors) = resolve(&level(3, 2), &room(&rows));
            assert_eq!(map.len(), 6);
            assert!(errors.count_kind(ErrorKind::Structural) >= 1, "{rows:?}");
            assert!(
                errors.entries().iter().any(|d| d.message.contains(needle)),
                "{rows:?}: {:?}",
                errors.entries()
            );
        }
    }

    #[test]
    fn test_overlapping_stamps() {
        // the second row's stamp at x=0 runs into cells taken by the first stamp
        let (_, errors) = resolve(&level(3, 3), &room(&[".CC", "CCC", "CC."]));
        assert!(errors.entries().iter().any(|d| d.message.contains("overlaps")));
    }

    #[test]
    fn test_unknown_char_reported_once() {
        let (map, errors) = resolve(&level(3, 1), &room(&["?.?"]));
        assert_eq!(map, vec![0, 0, 0]);
        assert_eq!(errors.error_count(), 1);
        assert_eq!(errors.count_kind(ErrorKind::UnknownSymbol), 1);
    }

    #[test]
    fn test_stamp_over_missing_row() {
        let (map, errors) = resolve(&level(3, 2), &room(&["CC."]));
        assert_eq!(map, vec![10, 11, 0, 0, 0, 0]);
        assert_eq!(errors.error_count(), 1);
        assert!(errors.entries()[0].message.contains("MAP has 1 lines, expected 2"));
    }

    #[test]
    fn test_stamp_over_short_row() {
        let (map, errors) = resolve(&level(3, 2), &room(&["CC.", "C"]));
        assert_eq!(map, vec![10, 11, 0, 0, 0, 0]);
        assert_eq!(errors.error_count(), 1);
        assert_eq!(errors.count_kind(ErrorKind::Structural), 1);
    }

    #[test]
    fn test_stamp_with_extra_rows() {
        let (map, errors) = resolve(&level(2, 2), &room(&["CC", "CC", "CC"]));
        assert_eq!(map, vec![10, 11, 12, 13]);
        assert_eq!(errors.error_count(), 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (map, errors) = resolve(&level(2, 2), &room(&["..", "...", ".."]));
        assert_eq!(map, vec![0, 0, 0, 0]);
        assert_eq!(errors.error_count(), 2);
    }
}
