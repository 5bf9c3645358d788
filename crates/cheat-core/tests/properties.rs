//! Property coverage for word fields, search narrowing and restore.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation
)]

use bitflags as _;
use cheat_core::{
    decode_line, encode_entry, AddressRead, CheatAction, CheatEntry, CodeType, Comparison,
    Endianness, Engine, Field, InstructionWord, Location, MemoryMap, Operand, Record, SearchConfig,
    SearchRegion, SearchSession, SearchWidth, SUB_FIELDS, TOP_LEVEL_FIELDS,
};
use log as _;
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;

const CPU0: Location = Location::cpu(0);

const COMPARISONS: [Comparison; 8] = [
    Comparison::Less,
    Comparison::Greater,
    Comparison::Equal,
    Comparison::LessOrEqual,
    Comparison::GreaterOrEqual,
    Comparison::NotEqual,
    Comparison::IncreasedBy,
    Comparison::NearTo,
];

const WIDTHS: [SearchWidth; 5] = [
    SearchWidth::Bits8,
    SearchWidth::Bits16,
    SearchWidth::Bits24,
    SearchWidth::Bits32,
    SearchWidth::Bit,
];

const OPERANDS: [Operand; 4] = [Operand::Current, Operand::Previous, Operand::First, Operand::Value];

fn pass() -> impl Strategy<Value = (Comparison, Operand, u32, Vec<u8>)> {
    (
        prop::sample::select(&COMPARISONS[..]),
        prop::sample::select(&OPERANDS[..]),
        any::<u8>().prop_map(u32::from),
        prop::collection::vec(any::<u8>(), 16),
    )
}

fn searched_host(bytes: &[u8]) -> MemoryMap {
    let mut host = MemoryMap::new().with_space(CPU0, 0x40, Endianness::Little);
    host.poke(CPU0, 0, bytes).expect("poke");
    host
}

fn search_session() -> SearchSession {
    let mut session = SearchSession::new(SearchConfig::default());
    session
        .set_regions(vec![SearchRegion::new(CPU0, 0, 16, "ram")])
        .expect("regions");
    session
}

fn snapshot(session: &SearchSession) -> Vec<(usize, u32)> {
    session.results().map(|r| (r.offset, r.current)).collect()
}

proptest! {
    #[test]
    fn property_top_level_fields_are_isolated(
        raw in any::<u32>(),
        index in 0..TOP_LEVEL_FIELDS.len(),
        value in any::<u32>(),
    ) {
        let field = TOP_LEVEL_FIELDS[index];
        let word = InstructionWord::from_raw(raw);
        let updated = word.with(field, value);
        prop_assert_eq!(updated.get(field), value & field.spec().max_value());
        for other in TOP_LEVEL_FIELDS.iter().filter(|f| **f != field) {
            prop_assert_eq!(updated.get(*other), word.get(*other));
        }
    }

    #[test]
    fn property_sub_fields_stay_inside_their_parent(
        raw in any::<u32>(),
        index in 0..SUB_FIELDS.len(),
        value in any::<u32>(),
    ) {
        let field = SUB_FIELDS[index];
        let parent = field.parent().expect("sub-field parent");
        let word = InstructionWord::from_raw(raw);
        let updated = word.with(field, value);
        prop_assert_eq!(updated.get(field), value & field.spec().max_value());
        prop_assert_eq!(updated.raw() & !parent.spec().mask(), raw & !parent.spec().mask());
    }

    #[test]
    fn property_search_never_grows(
        start in prop::collection::vec(any::<u8>(), 16),
        passes in prop::collection::vec(pass(), 1..6),
    ) {
        let mut host = searched_host(&start);
        let mut session = search_session();
        session.init(&mut host).expect("init");
        let mut count = session.result_count();
        for (op, rhs, value, bytes) in passes {
            session.config.op = op;
            session.config.rhs = rhs;
            session.config.value = value;
            host.poke(CPU0, 0, &bytes).expect("poke");
            session.compare(&mut host).expect("compare");
            prop_assert!(session.result_count() <= count);
            count = session.result_count();
        }
    }

    #[test]
    fn property_search_never_grows_when_the_width_changes(
        start in prop::collection::vec(any::<u8>(), 16),
        initial in prop::sample::select(&WIDTHS[..]),
        passes in prop::collection::vec((prop::sample::select(&WIDTHS[..]), pass()), 1..6),
    ) {
        let mut host = searched_host(&start);
        let mut session = search_session();
        session.config.width = initial;
        session.init(&mut host).expect("init");
        let mut count = session.result_count();
        for (width, (op, rhs, value, bytes)) in passes {
            session.config.width = width;
            session.config.op = op;
            session.config.rhs = rhs;
            session.config.value = value;
            host.poke(CPU0, 0, &bytes).expect("poke");
            session.compare(&mut host).expect("compare");
            let seen = session.results().count();
            prop_assert!(seen <= count);
            count = seen;
        }
    }

    #[test]
    fn property_undo_restores_the_previous_result_set(
        start in prop::collection::vec(any::<u8>(), 16),
        step in pass(),
    ) {
        let mut host = searched_host(&start);
        let mut session = search_session();
        session.init(&mut host).expect("init");
        let before = snapshot(&session);

        let (op, rhs, value, bytes) = step;
        session.config.op = op;
        session.config.rhs = rhs;
        session.config.value = value;
        session.backup();
        host.poke(CPU0, 0, &bytes).expect("poke");
        session.compare(&mut host).expect("compare");
        session.restore();
        prop_assert_eq!(snapshot(&session), before);
    }

    #[test]
    fn property_deactivate_restores_the_original_byte(
        original in any::<u8>(),
        data in any::<u8>(),
        mode in 0u32..3,
    ) {
        let mut host = searched_host(&[original]);
        let word = InstructionWord::new(CodeType::Write)
            .with(Field::WriteMode, mode)
            .with_flag(Field::RestoreValue, true);
        let action = CheatAction::new(word, CPU0, 0, u32::from(data)).with_extend(0xFF);
        let mut entry = CheatEntry::with_actions(0, "restore", vec![action]).expect("entry");
        let mut engine = Engine::default();
        engine.activate(&mut entry, &mut host).expect("activate");
        engine.step(&mut entry, &mut host);
        engine.step(&mut entry, &mut host);
        engine.deactivate(&mut entry, &mut host);
        prop_assert_eq!(host.peek(CPU0, 0), Some(original));
    }

    #[test]
    fn property_restore_uses_the_address_resolved_at_activation(
        original in prop::collection::vec(any::<u8>(), 0x40),
        first in 0u8..0x30,
        second in 0u8..0x30,
        data in any::<u8>(),
        indexed in any::<bool>(),
    ) {
        const POINTER: u32 = 0x3F;
        let mut original = original;
        if indexed {
            original[POINTER as usize] = first;
        }
        let mut host = searched_host(&original);
        let word = if indexed {
            InstructionWord::new(CodeType::IndexedWrite)
        } else {
            InstructionWord::new(CodeType::Write).with_address_read(AddressRead::IndirectVariable)
        }
        .with_flag(Field::RestoreValue, true);
        let (address, extend) = if indexed { (POINTER, 0) } else { (2, 0xFF) };
        let action = CheatAction::new(word, CPU0, address, u32::from(data)).with_extend(extend);
        let mut entry = CheatEntry::with_actions(0, "moving", vec![action]).expect("entry");
        let mut engine = Engine::default();
        engine.set_variable(2, u32::from(first));

        engine.activate(&mut entry, &mut host).expect("activate");
        engine.step(&mut entry, &mut host);
        if indexed {
            host.poke(CPU0, POINTER, &[second]).expect("poke");
        } else {
            engine.set_variable(2, u32::from(second));
        }
        engine.step(&mut entry, &mut host);
        engine.deactivate(&mut entry, &mut host);

        for address in 0..POINTER as u8 {
            let expected = if address != first && address == second {
                data
            } else {
                original[usize::from(address)]
            };
            prop_assert_eq!(host.peek(CPU0, u32::from(address)), Some(expected));
        }
    }

    #[test]
    fn property_decode_line_never_panics(line in "\\PC{0,80}") {
        let _ = decode_line(&line);
    }

    #[test]
    fn property_encoded_entries_decode_to_the_same_words(
        raw in any::<u32>(),
        address in any::<u32>(),
        data in any::<u32>(),
        extend in any::<u32>(),
        name in "[A-Za-z0-9]{1,16}",
    ) {
        let word = InstructionWord::from_raw(raw).with(Field::Link, 0).with(Field::Custom, 0);
        let action = CheatAction::new(word, CPU0, address, data).with_extend(extend);
        let entry = CheatEntry::with_actions(0, name.clone(), vec![action]).expect("entry");
        let text = encode_entry(&entry, "drv");
        let Some(Record::Cheat(record)) = decode_line(text.trim_end()) else {
            return Err(TestCaseError::fail(format!("did not re-decode: {text}")));
        };
        prop_assert_eq!(record.action.word, word);
        prop_assert_eq!(record.action.address, address);
        prop_assert_eq!(record.action.data, data);
        prop_assert_eq!(record.action.extend_data, extend);
        prop_assert_eq!(record.action.name, name);
    }
}
