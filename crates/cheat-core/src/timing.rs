//! Frame-based timing constants and prefill values.

use crate::encoding::Prefill;
use crate::memory::width_mask;

/// Frames per second assumed when the host does not configure one.
pub const DEFAULT_FRAMES_PER_SECOND: u16 = 60;

/// Largest value of the 3-bit delay field.
pub const DELAY_SECONDS_MAX: u32 = 7;

/// Prefill selector to constant, before truncation to the operand width.
pub const PREFILL_TABLE: [(Prefill, Option<u32>); 4] = [
    (Prefill::None, None),
    (Prefill::AllOnes, Some(u32::MAX)),
    (Prefill::Zero, Some(0)),
    (Prefill::One, Some(1)),
];

/// Frames an action waits for a delay of `seconds`; never less than one.
#[must_use]
pub const fn delay_threshold(seconds: u32, frames_per_second: u16) -> u32 {
    let frames = seconds.saturating_mul(frames_per_second as u32);
    if frames == 0 {
        1
    } else {
        frames
    }
}

/// Prefill constant at an operand width of `bytes`, `None` when disabled.
#[must_use]
pub fn prefill_value(prefill: Prefill, bytes: u32) -> Option<u32> {
    PREFILL_TABLE
        .iter()
        .find_map(|(kind, value)| (*kind == prefill).then_some(*value))
        .flatten()
        .map(|value| value & width_mask(bytes))
}
