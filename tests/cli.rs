use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn run(bin: &str, input: &Path, root: &Path, extra: &[&str]) -> Output {
    Command::new(bin)
        .arg(input)
        .arg("--gen-root")
        .arg(root.join("gen"))
        .arg("--analysis-root")
        .arg(root.join("analysis"))
        .args(extra)
        .env_remove("RUST_LOG")
        .output()
        .expect("tool runs")
}

#[test]
fn levelc_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let out = run(
        env!("CARGO_BIN_EXE_levelc"),
        &fixture("deck.lvl"),
        root,
        &["--format-h", root.join("gen/include/level_format.h").to_str().unwrap()],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    let bin = root.join("gen/assets/levels/deck_1.bin");
    assert!(stdout.contains(&format!("Wrote {} (360 bytes)", bin.display())));
    assert_eq!(fs::read(&bin).unwrap().len(), 360);

    for rel in [
        "gen/include/levels/deck_1.h",
        "gen/include/levels/deck_1-blob.h",
        "gen/include/level_format.h",
        "analysis/levels/deck_1.sym",
        "analysis/levels/deck_1.json",
    ] {
        assert!(root.join(rel).is_file(), "missing {rel}");
    }

    let c = fs::read_to_string(root.join("gen/src/levels/deck_1.c")).unwrap();
    assert!(c.contains("deck_1_blob"));
    assert!(c.contains("../../assets/levels/deck_1.bin"));

    let ids = fs::read_to_string(root.join("gen/include/levels/deck_1.h")).unwrap();
    assert!(ids.contains("KEYCARD"));
    assert!(ids.contains("BREAKERS"));
}

#[test]
fn levelc_fails_without_writing_on_errors() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let input = root.join("broken.lvl");
    fs::write(
        &input,
        "LEVEL name=broken w=1 h=1 start=R0:S0\nTILES\n . 0\nEND\nROOM R0\nSPAWNS\n S0 0,0\nEND\nEXITS\n R R9:S0\nEND\nMAP\n .\nEND\nENDROOM\n",
    )
    .unwrap();

    let out = run(env!("CARGO_BIN_EXE_levelc"), &input, root, &[]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("broken.lvl:10:"), "{stderr}");
    assert!(stderr.contains(": error: R0: exit dest room unknown R9"), "{stderr}");
    assert!(!root.join("gen").exists());
}

#[test]
fn levelc_short_map_with_stamp_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let input = root.join("short.lvl");
    fs::write(
        &input,
        format!(
            "LEVEL name=short w=3 h=2 start=R0:S0 tset={}\nROOM R0\nSPAWNS\n S0 2,0\nEND\nMAP\n CC.\nEND\nENDROOM\n",
            fixture("ship.tset").display()
        ),
    )
    .unwrap();

    let out = run(env!("CARGO_BIN_EXE_levelc"), &input, root, &[]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains(": error: R0: MAP has 1 lines, expected 2"), "{stderr}");
    assert_eq!(stderr.matches(": error: ").count(), 1, "{stderr}");
    assert!(!root.join("gen").exists());
}

#[test]
fn tilesetc_writes_blob_and_charset_wrappers() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let out = run(env!("CARGO_BIN_EXE_tilesetc"), &fixture("ship.tset"), root, &[]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    assert_eq!(fs::read(root.join("gen/assets/ship.bin")).unwrap().len(), 101);
    for rel in [
        "gen/include/ship_tset_ids.h",
        "gen/include/tilesets/ship_tset-blob.h",
        "gen/src/tilesets/ship_tset.c",
        "gen/include/tilesets/ship_charset-blob.h",
        "analysis/tilesets/ship.sym",
        "analysis/tilesets/ship.json",
    ] {
        assert!(root.join(rel).is_file(), "missing {rel}");
    }

    let charset_c = fs::read_to_string(root.join("gen/src/tilesets/ship_charset.c")).unwrap();
    assert!(charset_c.contains("ship_charset_blob"));
    assert!(charset_c.contains("ship_charset.bin"));
}

#[test]
fn tilesetc_respects_no_debug_flags() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let out = run(
        env!("CARGO_BIN_EXE_tilesetc"),
        &fixture("ship.tset"),
        root,
        &["--no-sym", "--no-json"],
    );
    assert!(out.status.success());
    assert!(root.join("gen/assets/ship.bin").is_file());
    assert!(!root.join("analysis").exists());
}

#[test]
fn tilesetc_count_overflow_exits_with_one_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let input = root.join("small.tset");
    fs::write(
        &input,
        "TSET name=small tileSize=2x2 bgColor=0 mc1Color=0 mc2Color=0 count=1\nTILES\n A chars=1,1,1,1 color=0\n B chars=2,2,2,2 color=0\nEND\n",
    )
    .unwrap();

    let out = run(env!("CARGO_BIN_EXE_tilesetc"), &input, root, &[]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert_eq!(stderr.matches(": error: ").count(), 1, "{stderr}");
    assert!(!root.join("gen/assets/small.bin").exists());
}
