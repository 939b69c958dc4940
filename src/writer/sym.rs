//! Human-readable `.sym` maps of where everything landed in a blob.

use std::io::{self, Write};

use crate::model::verb_names;
use crate::processor::blob::{OBJ_RECORD_SIZE, ScriptRef};
use crate::processor::{LevelLayout, TilesetLayout};

fn script_ref(r: &ScriptRef) -> String {
    format!("{}@{}", r.name.as_deref().unwrap_or("-"), r.ofs)
}

pub fn level(out: &mut impl Write, layout: &LevelLayout) -> io::Result<()> {
    writeln!(out, "LEVEL name=\"{}\" blob_size={}", layout.name, layout.blob_size)?;
    let ofs = &layout.offsets;
    writeln!(
        out,
        "HDR room_dir={} cond_stream={} act_stream={} msg_table={}\n",
        ofs.room_dir, ofs.cond_stream, ofs.act_stream, ofs.msg_table
    )?;

    for (i, room) in layout.rooms.iter().enumerate() {
        writeln!(out, "ROOM[{i}] id={} name=\"{}\"", room.id, room.name)?;
        writeln!(out, "  MAP ofs={} size={}", room.map_ofs, room.map_size)?;
        writeln!(
            out,
            "  SPAWNS ofs={} count={} keys={}",
            room.spawns_ofs,
            room.spawn_keys.len(),
            room.spawn_keys.join(",")
        )?;
        writeln!(out, "  EXITS ofs={} count={}", room.exits_ofs, room.exits.len())?;
        for (e, exit) in room.exits.iter().enumerate() {
            writeln!(
                out,
                "    EXIT[{e}] edge={} -> {}:{}",
                exit.edge.as_str(),
                exit.dest_room,
                exit.dest_spawn
            )?;
        }
        writeln!(
            out,
            "  OBJS ofs={} count={} recsize={OBJ_RECORD_SIZE}",
            room.objects_ofs,
            room.objects.len()
        )?;
        for (o, obj) in room.objects.iter().enumerate() {
            writeln!(
                out,
                "    OBJ[{o}] name={} pos={},{} type={}({}) verbs={} p0={} p1={}",
                obj.name,
                obj.x,
                obj.y,
                obj.type_name,
                obj.type_id,
                verb_names(obj.verbs),
                obj.p0,
                obj.p1
            )?;
            writeln!(out, "      cond={}", script_ref(&obj.cond))?;
            let acts: Vec<String> = obj
                .acts
                .iter()
                .map(|(key, r)| format!("{key}={}", script_ref(r)))
                .collect();
            writeln!(out, "      {}", acts.join(" "))?;
        }
        writeln!(out)?;
    }

    writeln!(out, "SCRIPTS")?;
    for script in &layout.scripts.conds {
        writeln!(out, "  COND@{} {}", script.offset, script.name)?;
        for instr in &script.code {
            writeln!(out, "    {instr}")?;
        }
    }
    for script in &layout.scripts.acts {
        writeln!(out, "  ACT@{} {}", script.offset, script.name)?;
        for instr in &script.code {
            writeln!(out, "    {instr}")?;
        }
    }
    writeln!(out)?;

    writeln!(out, "MESSAGES")?;
    for (i, msg) in layout.messages.iter().enumerate() {
        writeln!(out, "  MSG[{i}] {} ofs={}", msg.name, msg.ofs)?;
    }
    Ok(())
}

pub fn tileset(out: &mut impl Write, layout: &TilesetLayout) -> io::Result<()> {
    writeln!(out, "TSET name=\"{}\" blob_size={}", layout.name, layout.blob_size)?;
    writeln!(
        out,
        "GLOBAL bg={} mc1={} mc2={}",
        layout.bg_color, layout.mc1_color, layout.mc2_color
    )?;
    if !layout.charset.is_empty() {
        writeln!(out, "CHARSET {}", layout.charset)?;
    }
    writeln!(
        out,
        "HDR records={} tileCount={} recordSize={}\n",
        layout.ofs_records, layout.tile_count, layout.record_size
    )?;
    writeln!(out, "TILES")?;
    for t in &layout.tiles {
        let [c0, c1, c2, c3] = t.chars;
        let [k0, k1, k2, k3] = t.colors;
        writeln!(
            out,
            "  id={:3} name={} chars={c0:02X},{c1:02X},{c2:02X},{c3:02X} colorMode={} colors={k0},{k1},{k2},{k3} flags=0x{:04X}",
            t.id, t.name, t.color_mode as u8, t.flags
        )?;
    }
    Ok(())
}
