use num_derive::{FromPrimitive, ToPrimitive};
use util::EnumFromStr;
use util_derive::EnumFromStr;

use crate::constants;

/// The set of operations the virtual machine understands.
///
/// Ordinal values are the on-wire opcode field; do not reorder variants.
#[derive(FromPrimitive, ToPrimitive, EnumFromStr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    MOV,
    LD,
    ST,
    PUSH,
    POP,
    ADD,
    SUB,
    MUL,
    DIV,
    INC,
    DEC,
    CLR,
    AND,
    OR,
    XOR,
    NOT,
    JMP,
    JEZ,
    JLZ,
    JGZ,
    PRN,
    HLT,
    NOP,
}

/// The eleven addressable registers.
///
/// Ordinal values are encoded directly in the dest/src instruction fields.
#[derive(FromPrimitive, ToPrimitive, EnumFromStr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterId {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    SP,
    PC,
    ACC,
}

/// The raw 5-bit field value for a register id, as written into an
/// instruction word's dest/src slot.
pub fn register_field(id: RegisterId) -> u16 {
    num_traits::ToPrimitive::to_u16(&id).expect("register id fits in u16")
}

/// Encodes an instruction's opcode and two 5-bit operand fields into one word.
///
/// `dest` and `src` are either a [`RegisterId`] ordinal, [`constants::NONE`], or
/// [`constants::IMMEDIATE`].
pub fn encode_word(opcode: Opcode, dest: u16, src: u16) -> u16 {
    let op = num_traits::ToPrimitive::to_u16(&opcode).expect("opcode fits in u16");
    (op << constants::OPCODE_OFFSET)
        | ((dest & constants::FIELD_MASK) << constants::DEST_OFFSET)
        | (src & constants::FIELD_MASK)
}

/// A decoded instruction word, prior to any operand-specific interpretation.
pub struct DecodedWord {
    pub opcode: u16,
    pub dest: u16,
    pub src: u16,
}

pub fn decode_word(word: u16) -> DecodedWord {
    DecodedWord {
        opcode: (word >> constants::OPCODE_OFFSET) & constants::OPCODE_MASK,
        dest: (word >> constants::DEST_OFFSET) & constants::FIELD_MASK,
        src: word & constants::FIELD_MASK,
    }
}
