#![no_main]

use cheat_core::{
    analyse_entry, decode_line, CheatAction, CheatEntry, Endianness, Engine, InstructionWord,
    Location, MemoryMap, Record,
};
use libfuzzer_sys::fuzz_target;

const FRAMES: usize = 4;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        for line in text.lines() {
            let _ = decode_line(line);
        }
    }

    let actions: Vec<CheatAction> = data
        .chunks_exact(16)
        .take(16)
        .map(|chunk| {
            let word = |i: usize| u32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]]);
            CheatAction::new(InstructionWord::from_raw(word(0)), Location::cpu(0), word(4) & 0x1FF, word(8))
                .with_extend(word(12))
        })
        .collect();
    let Ok(mut entry) = CheatEntry::with_actions(0, "fuzz", actions) else {
        return;
    };
    let _ = analyse_entry(&entry, None);

    let mut host = MemoryMap::new().with_space(Location::cpu(0), 0x100, Endianness::Little);
    let mut engine = Engine::default();
    if engine.activate(&mut entry, &mut host).is_err() {
        return;
    }
    for _ in 0..FRAMES {
        let _ = engine.step(&mut entry, &mut host);
        host.end_frame();
    }
    engine.deactivate(&mut entry, &mut host);
    let _ = engine.drain_popups();

    if let Some(Record::Cheat(record)) = std::str::from_utf8(data).ok().and_then(decode_line) {
        let _ = record.action.view();
    }
});
