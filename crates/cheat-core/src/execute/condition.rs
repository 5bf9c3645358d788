use crate::api::AddressSpace;
use crate::encoding::Condition;

/// Evaluates `condition` of a live value against `operand`.
///
/// `live` is `None` when the memory read failed; memory-based conditions are
/// then false. `previous` holds the value seen on the previous evaluation and
/// is updated whenever a live value is available.
pub fn evaluate<S: AddressSpace + ?Sized>(
    condition: Condition,
    live: Option<u32>,
    operand: u32,
    previous: &mut Option<u32>,
    host: &S,
) -> bool {
    match condition {
        Condition::KeyPressedOnce => return host.key_pressed(operand, false),
        Condition::KeyPressedRepeat => return host.key_pressed(operand, true),
        Condition::Always => return true,
        _ => {}
    }

    let Some(value) = live else {
        return false;
    };
    let last = previous.replace(value);

    match condition {
        Condition::Equal => value == operand,
        Condition::NotEqual => value != operand,
        Condition::Less => value < operand,
        Condition::LessOrEqual => value <= operand,
        Condition::Greater => value > operand,
        Condition::GreaterOrEqual => value >= operand,
        Condition::BitSet => value & operand != 0,
        Condition::BitClear => value & operand == 0,
        Condition::ChangedSinceLast => last.is_some_and(|last| last != value),
        Condition::KeyPressedOnce | Condition::KeyPressedRepeat | Condition::Always => true,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::evaluate;
    use crate::encoding::Condition;
    use crate::memory::MemoryMap;

    #[rstest]
    #[case(Condition::Equal, 5, 5, true)]
    #[case(Condition::NotEqual, 5, 5, false)]
    #[case(Condition::Less, 4, 5, true)]
    #[case(Condition::LessOrEqual, 5, 5, true)]
    #[case(Condition::Greater, 5, 5, false)]
    #[case(Condition::GreaterOrEqual, 6, 5, true)]
    #[case(Condition::BitSet, 0b0110, 0b0100, true)]
    #[case(Condition::BitClear, 0b0110, 0b0001, true)]
    #[case(Condition::BitClear, 0b0110, 0b0010, false)]
    #[case(Condition::Always, 0, 1, true)]
    fn value_conditions(
        #[case] condition: Condition,
        #[case] live: u32,
        #[case] operand: u32,
        #[case] expected: bool,
    ) {
        let mut previous = None;
        assert_eq!(
            evaluate(condition, Some(live), operand, &mut previous, &MemoryMap::new()),
            expected
        );
    }

    #[test]
    fn failed_reads_are_false() {
        let mut previous = None;
        assert!(!evaluate(Condition::NotEqual, None, 1, &mut previous, &MemoryMap::new()));
        assert!(evaluate(Condition::Always, None, 1, &mut previous, &MemoryMap::new()));
    }

    #[test]
    fn changed_since_last_needs_a_baseline() {
        let host = MemoryMap::new();
        let mut previous = None;
        assert!(!evaluate(Condition::ChangedSinceLast, Some(3), 0, &mut previous, &host));
        assert!(!evaluate(Condition::ChangedSinceLast, Some(3), 0, &mut previous, &host));
        assert!(evaluate(Condition::ChangedSinceLast, Some(4), 0, &mut previous, &host));
        assert_eq!(previous, Some(4));
    }

    #[test]
    fn key_conditions_ask_the_host() {
        let mut host = MemoryMap::new();
        let mut previous = None;
        host.press_key(12);
        assert!(evaluate(Condition::KeyPressedOnce, None, 12, &mut previous, &host));
        host.end_frame();
        assert!(!evaluate(Condition::KeyPressedOnce, None, 12, &mut previous, &host));
        assert!(evaluate(Condition::KeyPressedRepeat, None, 12, &mut previous, &host));
    }
}
