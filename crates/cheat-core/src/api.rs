//! Host-facing contracts: address spaces, configuration, and the values the
//! engine hands back to the display layer.

use std::fmt;

use crate::encoding::PopupLayout;
use crate::fault::AccessError;
use crate::timing::DEFAULT_FRAMES_PER_SECOND;

/// Number of variable slots shared by Move, Loop and indirect addressing.
pub const VARIABLE_SLOT_COUNT: usize = 8;

/// Slot index for `value` when it names an existing variable slot.
#[must_use]
pub fn variable_slot(value: u32) -> Option<usize> {
    usize::try_from(value)
        .ok()
        .filter(|slot| *slot < VARIABLE_SLOT_COUNT)
}

/// Default cap on per-action backup slots for repeat writes.
pub const DEFAULT_MAX_REPEAT_BACKUP: usize = 4096;

/// Default number of undrained popup messages kept by the engine.
pub const DEFAULT_POPUP_QUEUE_CAPACITY: usize = 32;

/// Stable identifier assigned to an entry by its owning list.
pub type EntryId = u32;

/// Address space selector inside a CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SpaceKind {
    /// Program space.
    #[default]
    Program,
    /// Data space.
    Data,
    /// I/O space.
    Io,
}

impl SpaceKind {
    /// Converts the space nibble of a location code.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Program),
            1 => Some(Self::Data),
            2 => Some(Self::Io),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Data => "data",
            Self::Io => "io",
        }
    }
}

/// Memory an action or search region refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Location {
    /// An address space of an emulated CPU.
    Cpu {
        /// CPU index.
        index: u8,
        /// Space inside that CPU.
        space: SpaceKind,
    },
    /// A static memory region (ROM, NVRAM, EEPROM...).
    Region {
        /// Region index.
        index: u8,
    },
}

impl Default for Location {
    fn default() -> Self {
        Self::cpu(0)
    }
}

impl Location {
    /// Program space of CPU `index`.
    #[must_use]
    pub const fn cpu(index: u8) -> Self {
        Self::Cpu {
            index,
            space: SpaceKind::Program,
        }
    }

    /// Static region `index`.
    #[must_use]
    pub const fn region(index: u8) -> Self {
        Self::Region { index }
    }

    /// Packs the location as `kind << 12 | space << 8 | index`.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Cpu { index, space } => ((space as u16) << 8) | index as u16,
            Self::Region { index } => 0x1000 | index as u16,
        }
    }

    /// Inverse of [`Location::code`].
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        let index = (code & 0xFF) as u8;
        let space = ((code >> 8) & 0xF) as u8;
        match code >> 12 {
            0 => match SpaceKind::from_u4(space) {
                Some(space) => Some(Self::Cpu { index, space }),
                None => None,
            },
            1 if space == 0 => Some(Self::Region { index }),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu { index, space } => write!(f, "cpu {index} {}", space.name()),
            Self::Region { index } => write!(f, "region {index}"),
        }
    }
}

/// Native byte order of a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endianness {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

/// Metadata the host reports for a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SpaceInfo {
    /// Native data bus width in bytes.
    pub data_width: u8,
    /// Address width in bytes.
    pub address_width: u8,
    /// Highest valid bus address.
    pub address_mask: u32,
    /// Native byte order.
    pub endianness: Endianness,
    /// Right shift turning a byte address into a bus address.
    pub address_shift: u8,
}

impl SpaceInfo {
    /// Byte-addressed space covering `0..=address_mask`.
    #[must_use]
    pub const fn bytes(address_mask: u32, endianness: Endianness) -> Self {
        Self {
            data_width: 1,
            address_width: bytes_for_mask(address_mask),
            address_mask,
            endianness,
            address_shift: 0,
        }
    }

    /// Bus address for a byte address.
    #[must_use]
    pub const fn bus_address(&self, address: u32) -> u32 {
        address >> self.address_shift
    }

    /// Returns true when the byte address is reachable on the bus.
    #[must_use]
    pub const fn contains(&self, address: u32) -> bool {
        self.bus_address(address) <= self.address_mask
    }
}

/// Minimum number of bytes that hold `mask`.
#[must_use]
pub const fn bytes_for_mask(mask: u32) -> u8 {
    if mask > 0x00FF_FFFF {
        4
    } else if mask > 0xFFFF {
        3
    } else if mask > 0xFF {
        2
    } else {
        1
    }
}

/// The one capability the engine consumes from its host.
pub trait AddressSpace {
    /// Describes the space behind `location`, or `None` when it does not exist.
    fn info(&self, location: Location) -> Option<SpaceInfo>;

    /// Reads `buf.len()` consecutive bytes starting at byte address `address`.
    ///
    /// # Errors
    ///
    /// Returns an [`AccessError`] when the location or address cannot be
    /// resolved.
    fn read_bytes(
        &mut self,
        location: Location,
        address: u32,
        buf: &mut [u8],
    ) -> Result<(), AccessError>;

    /// Writes `bytes` starting at byte address `address`.
    ///
    /// # Errors
    ///
    /// Returns an [`AccessError`] when the location or address cannot be
    /// resolved.
    fn write_bytes(
        &mut self,
        location: Location,
        address: u32,
        bytes: &[u8],
    ) -> Result<(), AccessError>;

    /// Reports whether `key` is pressed. `repeat` asks for held-key semantics,
    /// otherwise only a fresh press counts.
    fn key_pressed(&self, key: u32, repeat: bool) -> bool {
        let _ = (key, repeat);
        false
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EngineConfig {
    /// Frames per emulated second, used to turn delay seconds into frames.
    pub frames_per_second: u16,
    /// Upper bound on backup slots captured for a single repeat write.
    pub max_repeat_backup: usize,
    /// Popups kept before the oldest is dropped.
    pub popup_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames_per_second: DEFAULT_FRAMES_PER_SECOND,
            max_repeat_backup: DEFAULT_MAX_REPEAT_BACKUP,
            popup_queue_capacity: DEFAULT_POPUP_QUEUE_CAPACITY,
        }
    }
}

/// Passive display request for a memory location.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct WatchInfo {
    /// Entry whose lifecycle the watch follows, if any.
    pub owner: Option<EntryId>,
    /// Watched space.
    pub location: Location,
    /// First watched byte address.
    pub address: u32,
    /// Bytes per element.
    pub element_bytes: u32,
    /// Number of consecutive elements.
    pub count: u32,
    /// Display label.
    pub label: String,
    /// Elements are byte-swapped relative to the space.
    pub swap: bool,
}

/// Message queued by a Popup action for the display layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PopupMessage {
    /// Entry that produced the message.
    pub entry: EntryId,
    /// Rendered text.
    pub text: String,
    /// Live value observed by the popup.
    pub value: u32,
    /// Layout used to render `text`.
    pub layout: PopupLayout,
}

/// Result of stepping one entry for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepOutcome {
    /// Entry is not active; nothing ran.
    Inactive,
    /// Entry is active but globally paused.
    Paused,
    /// A pass ran and executed `executed` operations.
    Ran {
        /// Operations whose side effect ran this frame.
        executed: usize,
    },
    /// A one-shot entry completed and deactivated itself.
    Deactivated {
        /// Operations whose side effect ran this frame.
        executed: usize,
    },
}
