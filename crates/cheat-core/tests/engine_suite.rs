//! Execution engine scenarios against the in-memory reference space.

#![allow(clippy::pedantic, clippy::nursery)]

use bitflags as _;
use cheat_core::{
    AddressRead, AddressSpace, CheatAction, CheatEntry, CheatList, CodeType, Condition, Endianness, Engine,
    EngineConfig, EntryFlags, InstructionWord, LegacyCode, LegacyGrammar, LinkLevel, Location,
    MemoryMap, StepOutcome, WriteMode,
};
use cheat_core::{read_value, Field};
use log as _;
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;

const CPU0: Location = Location::cpu(0);

fn host() -> MemoryMap {
    MemoryMap::new().with_space(CPU0, 0x2000, Endianness::Little)
}

fn write(word: InstructionWord, address: u32, data: u32) -> CheatAction {
    CheatAction::new(word, CPU0, address, data).with_extend(0xFF)
}

fn linked(action: CheatAction) -> CheatAction {
    let mut action = action;
    action.word = action.word.with_link(LinkLevel::Linked);
    action
}

#[test]
fn scenario_a_write_lands_after_one_step() {
    let mut host = host();
    let mut entry = CheatEntry::with_actions(
        0,
        "lives",
        vec![write(InstructionWord::new(CodeType::Write), 0x1000, 0x63)],
    )
    .expect("entry");
    let mut engine = Engine::default();

    engine.activate(&mut entry, &mut host).expect("activate");
    assert_eq!(engine.step(&mut entry, &mut host), StepOutcome::Ran { executed: 1 });
    assert_eq!(read_value(&mut host, CPU0, 0x1000, 1, false), Ok(0x63));
}

#[test]
fn scenario_c_branch_skips_to_target() {
    let mut host = host();
    host.poke(CPU0, 0xA0, &[5]).expect("poke");
    let branch = CheatAction::new(
        InstructionWord::new(CodeType::Branch).with_condition(Condition::Equal),
        CPU0,
        0xA0,
        5,
    )
    .with_extend(2);
    let skipped = linked(write(InstructionWord::new(CodeType::Write), 0xA0, 99));
    let target = linked(write(InstructionWord::new(CodeType::Write), 0xA1, 7));
    let mut entry = CheatEntry::with_actions(0, "branch", vec![branch, skipped, target]).expect("entry");
    let mut engine = Engine::default();

    engine.activate(&mut entry, &mut host).expect("activate");
    assert_eq!(engine.step(&mut entry, &mut host), StepOutcome::Ran { executed: 2 });
    assert_eq!(host.peek(CPU0, 0xA0), Some(5));
    assert_eq!(host.peek(CPU0, 0xA1), Some(7));

    host.poke(CPU0, 0xA0, &[6]).expect("poke");
    engine.step(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0xA0), Some(99));
}

#[rstest]
#[case(WriteMode::Merge, 0x12, 0x34, 0x34)]
#[case(WriteMode::SetBits, 0x10, 0x01, 0x11)]
#[case(WriteMode::ClearBits, 0x11, 0x01, 0x10)]
fn restore_value_undoes_every_write_mode(
    #[case] mode: WriteMode,
    #[case] before: u8,
    #[case] data: u32,
    #[case] during: u8,
) {
    let mut host = host();
    host.poke(CPU0, 0x200, &[before]).expect("poke");
    let word = InstructionWord::new(CodeType::Write)
        .with_write_mode(mode)
        .with_flag(Field::RestoreValue, true);
    let mut entry = CheatEntry::with_actions(0, "mode", vec![write(word, 0x200, data)]).expect("entry");
    let mut engine = Engine::default();

    engine.activate(&mut entry, &mut host).expect("activate");
    engine.step(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x200), Some(during));
    engine.deactivate(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x200), Some(before));
}

#[test]
fn one_shot_action_in_a_continuous_entry_runs_once() {
    let mut host = host();
    let once = write(
        InstructionWord::new(CodeType::Write).with_flag(Field::OneShot, true),
        0x10,
        1,
    );
    let every = linked(write(InstructionWord::new(CodeType::Write), 0x11, 2));
    let mut entry = CheatEntry::with_actions(0, "mixed", vec![once, every]).expect("entry");
    assert!(!entry.flags().contains(EntryFlags::ONE_SHOT));
    let mut engine = Engine::default();

    engine.activate(&mut entry, &mut host).expect("activate");
    assert_eq!(engine.step(&mut entry, &mut host), StepOutcome::Ran { executed: 2 });
    host.poke(CPU0, 0x10, &[0]).expect("poke");
    for _ in 0..5 {
        assert_eq!(engine.step(&mut entry, &mut host), StepOutcome::Ran { executed: 1 });
    }
    assert_eq!(host.peek(CPU0, 0x10), Some(0));
    assert!(entry.is_active());
}

#[test]
fn legacy_actions_execute_through_their_view() {
    let mut host = host();
    let legacy = LegacyCode {
        code: 0,
        cpu: 0,
        mask: 0,
        grammar: LegacyGrammar::Short,
    };
    let action = CheatAction::from_legacy(legacy, 0x300, 0x42);
    let mut entry = CheatEntry::with_actions(0, "legacy", vec![action]).expect("entry");
    let before = entry.actions()[0].clone();
    let mut engine = Engine::default();

    engine.activate(&mut entry, &mut host).expect("activate");
    engine.step(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x300), Some(0x42));
    assert_eq!(entry.actions()[0].word, before.word);
    assert_eq!(entry.actions()[0].data, before.data);
}

#[test]
fn temp_pause_restores_and_resume_reapplies() {
    let mut host = host();
    host.poke(CPU0, 0x40, &[1]).expect("poke");
    let word = InstructionWord::new(CodeType::Write).with_flag(Field::RestoreValue, true);
    let mut entry = CheatEntry::with_actions(0, "pause", vec![write(word, 0x40, 9)]).expect("entry");
    let mut engine = Engine::default();

    engine.activate(&mut entry, &mut host).expect("activate");
    engine.step(&mut entry, &mut host);
    engine.temp_deactivate(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x40), Some(1));
    assert!(entry.actions()[0].backup.is_some());

    engine.resume(&mut entry);
    engine.step(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x40), Some(9));
    engine.deactivate(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x40), Some(1));
}

#[test]
fn missing_space_is_a_no_op() {
    let mut host = host();
    let action = CheatAction::new(
        InstructionWord::new(CodeType::Write),
        Location::region(7),
        0,
        1,
    )
    .with_extend(0xFF);
    let mut entry = CheatEntry::with_actions(0, "ghost", vec![action]).expect("entry");
    let mut engine = Engine::default();

    engine.activate(&mut entry, &mut host).expect("activate");
    assert_eq!(engine.step(&mut entry, &mut host), StepOutcome::Ran { executed: 0 });
    assert!(host.info(Location::region(7)).is_none());
}

#[test]
fn repeat_backup_is_capped_by_config() {
    let mut host = host();
    let word = InstructionWord::new(CodeType::RepeatWrite).with_flag(Field::RestoreValue, true);
    let action = CheatAction::new(word, CPU0, 0x100, 0xEE).with_extend(0x0010_0001);
    let mut entry = CheatEntry::with_actions(0, "fill", vec![action]).expect("entry");
    let mut engine = Engine::new(EngineConfig {
        max_repeat_backup: 4,
        ..EngineConfig::default()
    });

    engine.activate(&mut entry, &mut host).expect("activate");
    let backup = entry.actions()[0].backup.as_ref().expect("captured");
    assert_eq!(backup.values().len(), 4);
    engine.step(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x10F), Some(0xEE));
    engine.deactivate(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x103), Some(0));
    assert_eq!(host.peek(CPU0, 0x104), Some(0xEE));
}

#[test]
fn restore_targets_the_address_captured_at_activation() {
    let mut host = host();
    host.poke(CPU0, 0x00, &[0x11]).expect("poke");
    host.poke(CPU0, 0x20, &[0x30]).expect("poke");
    host.poke(CPU0, 0x31, &[0xAB]).expect("poke");
    let mv = CheatAction::new(
        InstructionWord::new(CodeType::Move).with(Field::Parameter, 2),
        CPU0,
        0x20,
        1,
    );
    let store = CheatAction::new(
        InstructionWord::new(CodeType::Write)
            .with_address_read(AddressRead::IndirectVariable)
            .with_flag(Field::RestoreValue, true)
            .with_link(LinkLevel::Linked),
        CPU0,
        2,
        0x77,
    )
    .with_extend(0xFF);
    let mut entry = CheatEntry::with_actions(0, "pointer", vec![mv, store]).expect("entry");
    let mut engine = Engine::default();

    engine.activate(&mut entry, &mut host).expect("activate");
    engine.step(&mut entry, &mut host);
    assert_eq!(engine.variables()[2], 0x31);
    assert_eq!(host.peek(CPU0, 0x31), Some(0x77));
    host.poke(CPU0, 0x00, &[0x55]).expect("poke");

    engine.deactivate(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x00), Some(0x11));
    assert_eq!(host.peek(CPU0, 0x31), Some(0x77));
}

#[test]
fn indexed_restore_ignores_a_moved_pointer() {
    let mut host = host();
    host.poke(CPU0, 0x10, &[0x40]).expect("poke");
    host.poke(CPU0, 0x40, &[0x01]).expect("poke");
    host.poke(CPU0, 0x50, &[0x02]).expect("poke");
    let word = InstructionWord::new(CodeType::IndexedWrite).with_flag(Field::RestoreValue, true);
    let action = CheatAction::new(word, CPU0, 0x10, 0x99);
    let mut entry = CheatEntry::with_actions(0, "indexed", vec![action]).expect("entry");
    let mut engine = Engine::default();

    engine.activate(&mut entry, &mut host).expect("activate");
    engine.step(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x40), Some(0x99));
    host.poke(CPU0, 0x10, &[0x50]).expect("poke");

    engine.deactivate(&mut entry, &mut host);
    assert_eq!(host.peek(CPU0, 0x40), Some(0x01));
    assert_eq!(host.peek(CPU0, 0x50), Some(0x02));
}

#[test]
fn step_list_runs_only_active_entries() {
    let mut host = host();
    let mut list = CheatList::new();
    for address in [0x500, 0x501] {
        let entry = CheatEntry::with_actions(
            0,
            "entry",
            vec![write(InstructionWord::new(CodeType::Write), address, 3)],
        )
        .expect("entry");
        list.push(entry).expect("push");
    }
    let mut engine = Engine::default();
    let first = list.get_mut(0).expect("first");
    engine.activate(first, &mut host).expect("activate");

    assert_eq!(engine.step_list(&mut list, &mut host), 1);
    assert_eq!(host.peek(CPU0, 0x500), Some(3));
    assert_eq!(host.peek(CPU0, 0x501), Some(0));
}
