use std::path::Path;

use assetc::diagnostics::{DiagnosticSink, ErrorCollector, ErrorKind};
use assetc::parser::tset;
use assetc::processor::tileset::{HEADER_SIZE, RECORD_SIZE};

#[test]
fn ship_tileset_blob() {
    let mut errors = ErrorCollector::new();
    let (ts, layout) =
        assetc::compile_tileset_file(Path::new("tests/fixtures/ship.tset"), &mut errors).expect("ship parses");
    assert!(!errors.has_errors(), "unexpected errors: {:?}", errors.entries());

    assert_eq!(ts.name, "ship");
    assert_eq!(layout.tile_count, 7);
    assert_eq!(layout.blob_size, HEADER_SIZE + 7 * RECORD_SIZE);

    let blob = &layout.blob;
    assert_eq!(&blob[..4], b"TSET");
    assert_eq!(&blob[4..9], &[1, 2, 2, 7, 12]);
    // black, dark grey, light blue
    assert_eq!(&blob[13..17], &[0, 11, 14, 0]);

    let ids: Vec<u8> = blob[HEADER_SIZE..].chunks(RECORD_SIZE).map(|r| r[0]).collect();
    assert_eq!(ids, vec![0, 1, 4, 5, 6, 7, 8]);

    let wall = &blob[HEADER_SIZE + RECORD_SIZE..HEADER_SIZE + 2 * RECORD_SIZE];
    assert_eq!(wall, &[1, 1, 2, 3, 4, 1, 6, 6, 7, 7, 0x01, 0]);
    let door = &blob[HEADER_SIZE + 2 * RECORD_SIZE..HEADER_SIZE + 3 * RECORD_SIZE];
    // DOOR | INTERACTABLE
    assert_eq!(door, &[4, 1, 2, 3, 4, 0, 9, 0, 0, 0, 0x30, 0]);

    assert_eq!(ts.charmap.get(&'D'), Some(&4));
    assert_eq!(ts.object_stamps[&'C'].tiles, vec![5, 6, 7, 8]);
}

#[test]
fn declared_count_too_small_is_a_range_error() {
    let mut errors = ErrorCollector::new();
    let src = "TSET name=small tileSize=2x2 bgColor=0 mc1Color=0 mc2Color=0 count=1\n\
               TILES\n\
               A chars=1,1,1,1 color=0\n\
               B chars=2,2,2,2 color=0\n\
               END\n";
    tset::parse(src, Path::new("small.tset"), &mut errors).expect("recoverable");
    assert_eq!(errors.error_count(), 1);
    assert_eq!(errors.count_kind(ErrorKind::Range), 1);
}

#[test]
fn missing_charset_is_reported() {
    let mut errors = ErrorCollector::new();
    let src = "TSET name=t tileSize=2x2 bgColor=0 mc1Color=0 mc2Color=0 charset=nowhere.bin\n\
               TILES\n\
               A chars=1,1,1,1 color=0\n\
               END\n";
    tset::parse(src, Path::new("tests/fixtures/t.tset"), &mut errors).expect("recoverable");
    assert_eq!(errors.count_kind(ErrorKind::Io), 1);
    assert_eq!(errors.entries()[0].message, "charset file not found: nowhere.bin");
}
