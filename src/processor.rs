//! Fetch/decode/execute loop over an encoded word stream.

use std::error::Error as StdError;
use std::fmt;

use log::{debug, trace};
use num_traits::FromPrimitive;

use crate::constants;
use crate::memory::{Memory, OutputSink};
use crate::opcode::{decode_word, Opcode, RegisterId};

/// A fatal condition encountered while running a program. Each variant maps
/// to the `[VM]: ...` message the driver prints before exiting with code 68.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmFault {
    DivisionByZero,
    StackOverflow,
    StackUnderflow,
    JumpOutOfRange,
    UnexpectedEndOfBytecode,
    InvalidOpcode,
    InvalidOperand,
}

impl fmt::Display for VmFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            VmFault::DivisionByZero => "Division by zero",
            VmFault::StackOverflow => "Stack overflow",
            VmFault::StackUnderflow => "Stack underflow",
            VmFault::JumpOutOfRange => "Jump target out of range",
            VmFault::UnexpectedEndOfBytecode => "Unexpected end of bytecode",
            VmFault::InvalidOpcode => "Unknown opcode",
            VmFault::InvalidOperand => "Invalid operand",
        };
        f.write_str(msg)
    }
}

impl StdError for VmFault {}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitCode {
    Halted,
    Fault(VmFault),
}

/// Owns the register file, memory, and stack bookkeeping for one run of a
/// program. Constructed fresh for each run; a `Processor` never outlives the
/// bytecode slice it was handed.
pub struct Processor {
    registers: [u16; constants::REGISTER_COUNT],
    memory: Memory,
    stack_count: u32,
}

impl Processor {
    pub fn new() -> Processor {
        Processor {
            registers: [0; constants::REGISTER_COUNT],
            memory: Memory::new(),
            stack_count: 0,
        }
    }

    pub fn register(&self, id: RegisterId) -> u16 {
        self.registers[register_index(id)]
    }

    /// Runs `code` to completion, writing emitted output bytes through `sink`.
    pub fn run(&mut self, code: &[u16], sink: &mut dyn OutputSink) -> ExitCode {
        // `pc` counts words, not a 16-bit register value: a program whose
        // `codeLen` is exactly `MAX_CODE_WORDS` (65536, a size the assembler
        // accepts) must be able to represent "one past the last word" to
        // terminate by fall-through. A `u16` pc cannot hold 65536 and would
        // wrap back to 0, looping forever instead of halting.
        let mut pc: usize = 0;
        let code_len = code.len();

        loop {
            if pc >= code_len {
                return ExitCode::Halted;
            }

            match self.tick(code, &mut pc, sink) {
                Ok(true) => return ExitCode::Halted,
                Ok(false) => continue,
                Err(fault) => return ExitCode::Fault(fault),
            }
        }
    }

    /// Executes one instruction, advancing `pc`. Returns `Ok(true)` on `HLT`.
    fn tick(
        &mut self,
        code: &[u16],
        pc: &mut usize,
        sink: &mut dyn OutputSink,
    ) -> Result<bool, VmFault> {
        let word = fetch(code, pc)?;
        let decoded = decode_word(word);
        let opcode = Opcode::from_u16(decoded.opcode).ok_or(VmFault::InvalidOpcode)?;
        trace!("pc={} opcode={:?} dest={} src={}", *pc - 1, opcode, decoded.dest, decoded.src);

        match opcode {
            Opcode::MOV => {
                let value = self.operand_value(code, pc, decoded.src)?;
                self.set_register(decoded.dest, value)?;
            }
            Opcode::LD => {
                self.require_immediate(decoded.src)?;
                let addr = fetch(code, pc)?;
                let value = self.memory.read(addr);
                self.set_register(decoded.dest, value)?;
            }
            Opcode::ST => {
                self.require_immediate(decoded.src)?;
                let addr = fetch(code, pc)?;
                let value = self.register_raw_field(decoded.dest)?;
                self.memory
                    .store(addr, value, sink)
                    .map_err(|_| VmFault::InvalidOperand)?;
            }
            Opcode::PUSH => {
                let value = self.register_raw_field(decoded.dest)?;
                if self.stack_count as usize == constants::MEMORY_WORDS {
                    return Err(VmFault::StackOverflow);
                }
                let sp = self.register(RegisterId::SP).wrapping_sub(1);
                self.registers[register_index(RegisterId::SP)] = sp;
                self.memory.set(sp, value);
                self.stack_count += 1;
            }
            Opcode::POP => {
                if self.stack_count == 0 {
                    return Err(VmFault::StackUnderflow);
                }
                let sp = self.register(RegisterId::SP);
                let value = self.memory.read(sp);
                self.registers[register_index(RegisterId::SP)] = sp.wrapping_add(1);
                self.stack_count -= 1;
                self.set_register(decoded.dest, value)?;
            }
            Opcode::ADD | Opcode::SUB | Opcode::MUL | Opcode::DIV => {
                let acc = self.register(RegisterId::ACC) as i16 as i32;
                let raw_operand = self.register_raw_field(decoded.dest)?;
                let operand = raw_operand as i16 as i32;
                let result = match opcode {
                    Opcode::ADD => acc.wrapping_add(operand),
                    Opcode::SUB => acc.wrapping_sub(operand),
                    Opcode::MUL => acc.wrapping_mul(operand),
                    Opcode::DIV => {
                        if raw_operand == 0 {
                            return Err(VmFault::DivisionByZero);
                        }
                        acc.wrapping_div(operand)
                    }
                    _ => unreachable!(),
                };
                self.set_acc(result as u32 as u16);
            }
            Opcode::INC => {
                let acc = self.register(RegisterId::ACC) as i16;
                self.set_acc(acc.wrapping_add(1) as u16);
            }
            Opcode::DEC => {
                let acc = self.register(RegisterId::ACC) as i16;
                self.set_acc(acc.wrapping_sub(1) as u16);
            }
            Opcode::CLR => self.set_acc(0),
            Opcode::NOT => {
                let acc = self.register(RegisterId::ACC);
                self.set_acc(!acc);
            }
            Opcode::AND | Opcode::OR | Opcode::XOR => {
                let acc = self.register(RegisterId::ACC);
                let operand = self.register_raw_field(decoded.dest)?;
                let result = match opcode {
                    Opcode::AND => acc & operand,
                    Opcode::OR => acc | operand,
                    Opcode::XOR => acc ^ operand,
                    _ => unreachable!(),
                };
                self.set_acc(result);
            }
            Opcode::JMP | Opcode::JEZ | Opcode::JLZ | Opcode::JGZ => {
                self.require_immediate(decoded.dest)?;
                let target = fetch(code, pc)?;
                let acc = self.register(RegisterId::ACC);
                let take = match opcode {
                    Opcode::JMP => true,
                    Opcode::JEZ => acc == 0,
                    Opcode::JLZ => (acc as i16) < 0,
                    Opcode::JGZ => (acc as i16) > 0,
                    _ => unreachable!(),
                };
                if take {
                    if target as usize >= code.len() {
                        return Err(VmFault::JumpOutOfRange);
                    }
                    *pc = target as usize;
                }
            }
            Opcode::PRN => {
                let acc = self.register(RegisterId::ACC);
                sink.emit((acc & 0xFF) as u8)
                    .map_err(|_| VmFault::InvalidOperand)?;
            }
            Opcode::HLT => {
                debug!("halted at pc={}", *pc - 1);
                return Ok(true);
            }
            Opcode::NOP => {}
        }

        Ok(false)
    }

    fn operand_value(&self, code: &[u16], pc: &mut usize, src: u16) -> Result<u16, VmFault> {
        if src == constants::IMMEDIATE {
            fetch(code, pc)
        } else {
            self.register_raw_field(src)
        }
    }

    fn register_raw_field(&self, field: u16) -> Result<u16, VmFault> {
        let id = RegisterId::from_u16(field).ok_or(VmFault::InvalidOperand)?;
        Ok(self.register(id))
    }

    fn set_register(&mut self, field: u16, value: u16) -> Result<(), VmFault> {
        let id = RegisterId::from_u16(field).ok_or(VmFault::InvalidOperand)?;
        self.registers[register_index(id)] = value;
        Ok(())
    }

    fn set_acc(&mut self, value: u16) {
        self.registers[register_index(RegisterId::ACC)] = value;
    }

    fn require_immediate(&self, field: u16) -> Result<(), VmFault> {
        if field == constants::IMMEDIATE {
            Ok(())
        } else {
            Err(VmFault::InvalidOperand)
        }
    }
}

impl Default for Processor {
    fn default() -> Processor {
        Processor::new()
    }
}

fn fetch(code: &[u16], pc: &mut usize) -> Result<u16, VmFault> {
    let idx = *pc;
    if idx >= code.len() {
        return Err(VmFault::UnexpectedEndOfBytecode);
    }
    *pc += 1;
    Ok(code[idx])
}

fn register_index(id: RegisterId) -> usize {
    num_traits::ToPrimitive::to_usize(&id).expect("register id fits in usize")
}
