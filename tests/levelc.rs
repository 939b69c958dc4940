use std::path::Path;

use assetc::diagnostics::{DiagnosticSink, ErrorCollector, ErrorKind};
use assetc::parser::lvl;
use assetc::processor::blob::{HDR_OFS_MSGTABLE, HEADER_SIZE, OBJ_RECORD_SIZE};
use assetc::processor::vm::{LevelBlob, VmState, eval_condition, run_action};
use assetc::processor::{LevelLayout, compile_level};

const DECK: &str = "tests/fixtures/deck.lvl";

fn deck() -> LevelLayout {
    let mut errors = ErrorCollector::new();
    let layout = assetc::compile_level_file(Path::new(DECK), &mut errors).expect("deck parses");
    assert!(!errors.has_errors(), "unexpected errors: {:?}", errors.entries());
    layout
}

fn compile_src(src: &str) -> (Option<LevelLayout>, ErrorCollector) {
    let mut errors = ErrorCollector::new();
    let path = Path::new("inline.lvl");
    let layout = lvl::parse(src, path, &mut errors)
        .ok()
        .map(|level| compile_level(&level, path, &mut errors));
    (layout, errors)
}

#[test]
fn deck_section_offsets() {
    let layout = deck();
    assert_eq!(layout.name, "Deck 1");
    assert_eq!((layout.w, layout.h), (6, 4));
    assert_eq!((layout.start_room, layout.start_spawn), (0, 0));

    let ofs = &layout.offsets;
    assert_eq!(ofs.room_dir, HEADER_SIZE);
    assert_eq!(ofs.cond_stream, 214);
    assert_eq!(ofs.act_stream, 235);
    assert_eq!(ofs.msg_table, 271);
    assert_eq!(layout.blob_size, 360);
    assert_eq!(layout.blob.len(), layout.blob_size);

    let blob = &layout.blob;
    assert_eq!(&blob[..4], b"LVL1");
    // version, rooms, w, h, flags, vars, items, msgs, start room, start spawn
    assert_eq!(&blob[4..14], &[1, 2, 6, 4, 2, 1, 2, 4, 0, 0]);
    assert_eq!(&blob[HDR_OFS_MSGTABLE..HDR_OFS_MSGTABLE + 2], &271u16.to_le_bytes());

    let bridge = &layout.rooms[0];
    assert_eq!(
        (bridge.map_ofs, bridge.spawns_ofs, bridge.exits_ofs, bridge.objects_ofs),
        (38, 62, 67, 71)
    );
    let cargo = &layout.rooms[1];
    assert_eq!(
        (cargo.map_ofs, cargo.spawns_ofs, cargo.exits_ofs, cargo.objects_ofs),
        (138, 162, 165, 169)
    );
    let dir: Vec<u8> = [38u16, 62, 67, 71, 138, 162, 165, 169]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    assert_eq!(&blob[HEADER_SIZE..HEADER_SIZE + 16], dir.as_slice());
}

#[test]
fn deck_maps_use_charmap_and_stamps() {
    let layout = deck();
    let bridge = &layout.rooms[0];
    assert_eq!(bridge.map_size, 24);
    let map = &layout.blob[bridge.map_ofs..bridge.map_ofs + bridge.map_size];
    assert_eq!(
        map,
        &[
            1, 1, 1, 1, 1, 1, //
            1, 0, 0, 5, 6, 1, //
            1, 0, 0, 7, 8, 4, //
            1, 1, 1, 1, 1, 1,
        ]
    );
    let cargo = &layout.rooms[1];
    assert_eq!(&layout.blob[cargo.map_ofs + 6..cargo.map_ofs + 12], &[4, 0, 0, 0, 0, 1]);
}

#[test]
fn deck_spawns_and_exits() {
    let layout = deck();
    let blob = &layout.blob;
    let bridge = &layout.rooms[0];
    assert_eq!(&blob[bridge.spawns_ofs..bridge.exits_ofs], &[2, 1, 1, 4, 1]);
    // R edge to CARGO:WEST
    assert_eq!(&blob[bridge.exits_ofs..bridge.objects_ofs], &[1, 1, 1, 0]);
    let cargo = &layout.rooms[1];
    // L edge back to BRIDGE:EAST
    assert_eq!(&blob[cargo.exits_ofs..cargo.objects_ofs], &[1, 0, 0, 1]);
}

#[test]
fn deck_script_offsets() {
    let layout = deck();
    let conds: Vec<(&str, usize)> = layout
        .scripts
        .conds
        .iter()
        .map(|s| (s.name.as_str(), s.offset))
        .collect();
    assert_eq!(conds, vec![("ALWAYS", 0), ("HAS_CARD", 6), ("POWERED", 12)]);
    let acts: Vec<(&str, usize)> = layout
        .scripts
        .acts
        .iter()
        .map(|s| (s.name.as_str(), s.offset))
        .collect();
    assert_eq!(
        acts,
        vec![("NOOP", 0), ("READ_SIGN", 3), ("OPEN_LOCKER", 9), ("BAD_CODE", 24), ("GO_CARGO", 30)]
    );
}

#[test]
fn deck_object_records() {
    let layout = deck();
    let bridge = &layout.rooms[0];
    assert_eq!(layout.blob[bridge.objects_ofs], 3);

    let locker_at = bridge.objects_ofs + 1 + OBJ_RECORD_SIZE;
    let locker = &layout.blob[locker_at..locker_at + OBJ_RECORD_SIZE];
    // x, y, LOCKER_KEYPAD, LOOK|USE, code 729 split as 7 / 29
    assert_eq!(&locker[..6], &[3, 1, 3, 0b101, 7, 29]);
    let words: Vec<u16> = locker[6..]
        .chunks(2)
        .map(|w| u16::from_le_bytes([w[0], w[1]]))
        .collect();
    // cond, look, take, use, talk, operate, ok, bad
    assert_eq!(words, vec![0, 3, 0, 0, 0, 0, 9, 24]);

    let card = &bridge.objects[2];
    assert_eq!((card.type_name, card.p0), ("PICKUP", 0));
    assert_eq!(card.cond.ofs, 6);

    let cargo = &layout.rooms[1];
    let panel = &cargo.objects[0];
    assert_eq!((panel.p0, panel.p1), (0, 5));
    let hatch = &cargo.objects[1];
    assert_eq!(hatch.cond.ofs, 12);
    assert_eq!(hatch.acts["use"].ofs, 24);
    assert_eq!(hatch.acts["alt0"].ofs, 30);
    assert_eq!(hatch.acts["alt1"].ofs, 24);
}

#[test]
fn deck_runs_in_the_interpreter() {
    let layout = deck();
    let blob = LevelBlob::new(&layout.blob).expect("valid blob");
    assert_eq!(blob.message(0), Some("Authorized crew only"));
    assert_eq!(blob.message(3), Some("Wrong code."));
    assert_eq!(blob.message(4), None);

    let locker = &layout.rooms[0].objects[1];
    let mut state = VmState::default();
    assert!(eval_condition(blob.cond_stream(), locker.cond.ofs, &state));
    let ran = run_action(blob.act_stream(), locker.acts["alt0"].ofs, &mut state).unwrap();
    assert_eq!(ran, 4);
    assert_eq!(state.messages, vec![2]);
    assert!(state.inventory.contains(&1));
    assert!(state.flags.contains(&0));
    assert_eq!(state.sfx, Some(3));

    // POWERED wants BREAKERS == 5 and DOOR_OPEN clear
    let hatch = &layout.rooms[1].objects[1];
    assert!(!eval_condition(blob.cond_stream(), hatch.cond.ofs, &state));
    state.vars.insert(0, 5);
    state.flags.clear();
    assert!(eval_condition(blob.cond_stream(), hatch.cond.ofs, &state));

    run_action(blob.act_stream(), hatch.acts["alt0"].ofs, &mut state).unwrap();
    assert_eq!(state.transition, Some((1, 0)));
    assert_eq!(run_action(blob.act_stream(), 0, &mut state), Ok(0));
}

#[test]
fn deck_compiles_deterministically() {
    let a = deck();
    let b = deck();
    assert_eq!(a.blob, b.blob);
    let dump = |l: &LevelLayout| serde_json::to_string(l).unwrap();
    assert_eq!(dump(&a), dump(&b));
}

#[test]
fn minimal_level() {
    let (layout, errors) = compile_src(
        "LEVEL name=\"Tiny\" w=2 h=1 start=R0:S0\nTILES\n . 0\n # 1\nEND\nROOM R0\nSPAWNS\n S0 0,0\nEND\nMAP\n .#\nEND\nENDROOM\n",
    );
    assert!(!errors.has_errors(), "{:?}", errors.entries());
    let layout = layout.unwrap();
    let room = &layout.rooms[0];
    assert_eq!(room.map_size, 2);
    assert_eq!(&layout.blob[room.map_ofs..room.map_ofs + 2], &[0, 1]);
    // ALWAYS is TRUE, END
    let cs = layout.offsets.cond_stream;
    assert_eq!(&layout.blob[cs..cs + 6], &[1, 0, 0, 0, 0, 0]);
    // NOOP is a bare END
    let acts = layout.offsets.act_stream;
    assert_eq!(&layout.blob[acts..acts + 3], &[0, 0, 0]);
}

#[test]
fn map_size_is_w_times_h_for_every_room() {
    let layout = deck();
    for room in &layout.rooms {
        assert_eq!(room.map_size, usize::from(layout.w) * usize::from(layout.h));
    }
}

#[test]
fn exit_to_unknown_room_is_one_structural_error() {
    let (layout, errors) = compile_src(
        "LEVEL name=x w=1 h=1 start=R0:S0\nTILES\n . 0\nEND\nROOM R0\nSPAWNS\n S0 0,0\nEND\nEXITS\n R R9:S0\nEND\nMAP\n .\nEND\nENDROOM\n",
    );
    assert_eq!(errors.error_count(), 1);
    assert_eq!(errors.count_kind(ErrorKind::Structural), 1);
    assert!(errors.entries()[0].message.contains("R9"));
    let layout = layout.unwrap();
    let room = &layout.rooms[0];
    assert_eq!(&layout.blob[room.exits_ofs..room.exits_ofs + 4], &[1, 1, 0, 0]);
}

#[test]
fn undeclared_item_is_reported_and_compilation_continues() {
    let (layout, errors) = compile_src(
        "LEVEL name=x w=2 h=1 start=R0:S0\nTILES\n . 0\nEND\nACT GRAB\n GIVE GHOST_ITEM\nEND\nROOM R0\nSPAWNS\n S0 0,0\nEND\nMAP\n .\nEND\nENDROOM\n",
    );
    // the undeclared item and the short map row are both reported
    assert_eq!(errors.error_count(), 2);
    assert_eq!(errors.count_kind(ErrorKind::UnknownSymbol), 1);
    assert_eq!(errors.count_kind(ErrorKind::Structural), 1);
    assert_eq!(errors.entries()[0].message, "Unknown ITEM id: GHOST_ITEM");

    let layout = layout.unwrap();
    let grab = &layout.scripts.acts[1];
    assert_eq!(grab.name, "GRAB");
    let at = layout.offsets.act_stream + grab.offset;
    assert_eq!(&layout.blob[at..at + 6], &[4, 0, 0, 0, 0, 0]);
}

#[test]
fn missing_level_header_aborts() {
    let (layout, errors) = compile_src("ROOM R0\nENDROOM\n");
    assert!(layout.is_none());
    assert!(errors.has_errors());
}
