use crate::memory::{sign_extend, width_mask};

/// Where a comparison operand comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operand {
    /// Live memory.
    #[default]
    Current,
    /// Snapshot taken at the previous comparison.
    Previous,
    /// Snapshot taken at session start.
    First,
    /// The configured literal.
    Value,
}

/// Element width of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SearchWidth {
    /// One byte.
    #[default]
    Bits8,
    /// Two bytes.
    Bits16,
    /// Three bytes.
    Bits24,
    /// Four bytes.
    Bits32,
    /// Per-bit search over single bytes.
    Bit,
}

impl SearchWidth {
    /// Bytes per element.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Bits8 | Self::Bit => 1,
            Self::Bits16 => 2,
            Self::Bits24 => 3,
            Self::Bits32 => 4,
        }
    }

    /// True for per-bit narrowing.
    #[must_use]
    pub const fn is_bit(self) -> bool {
        matches!(self, Self::Bit)
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Comparison {
    /// `lhs < rhs`
    Less,
    /// `lhs > rhs`
    Greater,
    /// `lhs == rhs`
    #[default]
    Equal,
    /// `lhs <= rhs`
    LessOrEqual,
    /// `lhs >= rhs`
    GreaterOrEqual,
    /// `lhs != rhs`
    NotEqual,
    /// `lhs == rhs + value`
    IncreasedBy,
    /// `lhs == rhs` or `lhs == rhs + 1`
    NearTo,
}

impl Comparison {
    /// Bit mode keeps matching bits for these operators and differing bits
    /// for the rest.
    #[must_use]
    pub const fn keeps_matching_bits(self) -> bool {
        matches!(self, Self::Equal | Self::NearTo)
    }
}

/// Applies `op` to two `bytes`-wide operands.
///
/// Ordering operators compare sign-extended values when `signed` is set;
/// `IncreasedBy` and `NearTo` wrap at the element width.
#[must_use]
pub fn compare_values(op: Comparison, lhs: u32, rhs: u32, value: u32, bytes: u32, signed: bool) -> bool {
    let mask = width_mask(bytes);
    let (lhs, rhs) = (lhs & mask, rhs & mask);
    let widen = |v: u32| {
        if signed {
            sign_extend(v, bytes)
        } else {
            i64::from(v)
        }
    };
    match op {
        Comparison::Less => widen(lhs) < widen(rhs),
        Comparison::Greater => widen(lhs) > widen(rhs),
        Comparison::Equal => lhs == rhs,
        Comparison::LessOrEqual => widen(lhs) <= widen(rhs),
        Comparison::GreaterOrEqual => widen(lhs) >= widen(rhs),
        Comparison::NotEqual => lhs != rhs,
        Comparison::IncreasedBy => lhs == rhs.wrapping_add(value) & mask,
        Comparison::NearTo => lhs == rhs || lhs == rhs.wrapping_add(1) & mask,
    }
}

/// Bits of a status byte that survive a bit-mode comparison.
#[must_use]
pub const fn bit_keep_mask(op: Comparison, lhs: u8, rhs: u8) -> u8 {
    let differ = lhs ^ rhs;
    if op.keeps_matching_bits() {
        !differ
    } else {
        differ
    }
}
