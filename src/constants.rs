//! Bit layout for the 16-bit encoded instruction word.
//!
//! ```text
//! bits 15..10  opcode  (6 bits, only the low 5 used; bit 15 reserved zero)
//! bits  9..5   dest    (5 bits)
//! bits  4..0   src     (5 bits)
//! ```

pub const OPCODE_WIDTH: u32 = 6;
pub const FIELD_WIDTH: u32 = 5;

pub const OPCODE_OFFSET: u32 = 10;
pub const DEST_OFFSET: u32 = 5;
pub const SRC_OFFSET: u32 = 0;

pub const OPCODE_MASK: u16 = 0b0011_1111;
pub const FIELD_MASK: u16 = 0b0001_1111;

/// Field value meaning "no operand in this slot".
pub const NONE: u16 = 0x1F;

/// Field value meaning "the next word holds a 16-bit immediate or address".
pub const IMMEDIATE: u16 = 0x1E;

/// Number of addressable registers (`R0..R7, SP, PC, ACC`).
pub const REGISTER_COUNT: usize = 11;

/// Size of VM memory in 16-bit words (64 KiW).
pub const MEMORY_WORDS: usize = 65_536;

/// Maximum number of encoded words a single program may contain.
pub const MAX_CODE_WORDS: usize = 65_536;

/// Memory-mapped output port: a store here also emits a byte to stdout.
pub const OUTPUT_PORT: u16 = 0xFF00;
