//! Consumes a token stream line-by-line, builds the label table, and emits
//! encoded words, deferring forward label references to a patch list that is
//! resolved once the whole program has been scanned.

use std::collections::HashMap;
use std::str::FromStr;

use log::{debug, trace};
use vcpu::{constants, encode_word, register_field, Opcode, RegisterId};

use crate::error::AssembleError;
use crate::lexer::{Token, TokenKind};

/// `(word_index, referencing_line)` forward reference, keyed by uppercased
/// label name; resolved against the label table once every line has been
/// scanned.
type PatchList = Vec<(String, usize, u32)>;

/// `(word_address, defining_line)`, keyed by uppercased label name.
type LabelTable = HashMap<String, (u32, u32)>;

pub fn assemble(tokens: &[Token]) -> Result<Vec<u16>, AssembleError> {
    let mut code: Vec<u16> = Vec::new();
    let mut labels: LabelTable = HashMap::new();
    let mut patches: PatchList = Vec::new();

    let mut i = 0usize;
    loop {
        if tokens[i].kind == TokenKind::End {
            break;
        }
        let line = tokens[i].line;

        while tokens[i].kind == TokenKind::Label && tokens[i].text.starts_with('@') {
            let name = label_name(&tokens[i].text);
            if let Some((_, defined_at)) = labels.get(&name) {
                return Err(AssembleError::at_line(
                    tokens[i].line,
                    format!("Duplicate label '{}' (first defined on line {})", name, defined_at),
                ));
            }
            debug!("label '{}' -> word {}", name, code.len());
            labels.insert(name, (code.len() as u32, tokens[i].line));
            i += 1;
        }

        if tokens[i].kind == TokenKind::End || tokens[i].line != line {
            continue;
        }

        if tokens[i].kind != TokenKind::Op {
            return Err(AssembleError::at_line(line, "Unexpected token"));
        }
        let mnemonic = tokens[i].text.to_uppercase();
        i += 1;

        let mut operands: Vec<&Token> = Vec::new();
        while i < tokens.len() && tokens[i].kind != TokenKind::End && tokens[i].line == line {
            operands.push(&tokens[i]);
            i += 1;
            if operands.len() > 3 {
                return Err(AssembleError::at_line(line, "Too many operands"));
            }
        }

        emit(&mnemonic, &operands, line, &mut code, &mut patches)?;

        if code.len() > constants::MAX_CODE_WORDS {
            return Err(AssembleError::ProgramTooLarge);
        }
    }

    for (name, index, line) in patches {
        match labels.get(&name) {
            None => {
                return Err(AssembleError::at_line(
                    line,
                    format!("Undefined label '{}'", name),
                ))
            }
            Some((addr, _)) => {
                // Bounded against the fixed capacity, not the just-computed
                // `code.len()`: a label defined at end-of-file (address ==
                // codeLen) is a valid jump target that simply never gets
                // executed by falling off the end, and resolving it here is
                // not this phase's job. `execJump`'s runtime `target >=
                // codeLen` check (exit 68) is what actually rejects it if
                // the jump is ever taken.
                if *addr as usize >= constants::MAX_CODE_WORDS {
                    return Err(AssembleError::at_line(
                        line,
                        format!("Label '{}' resolves outside the program", name),
                    ));
                }
                trace!("patching word {} with label '{}' = {}", index, name, addr);
                code[index] = *addr as u16;
            }
        }
    }

    Ok(code)
}

fn label_name(text: &str) -> String {
    text.trim_start_matches('@').trim_end_matches(':').to_uppercase()
}

fn emit(
    mnemonic: &str,
    operands: &[&Token],
    line: u32,
    code: &mut Vec<u16>,
    patches: &mut PatchList,
) -> Result<(), AssembleError> {
    let opcode = Opcode::from_str(mnemonic)
        .map_err(|_| AssembleError::at_line(line, format!("Unknown mnemonic '{}'", mnemonic)))?;

    match opcode {
        Opcode::MOV => {
            require_arity(operands, 2, line)?;
            let dest = register_field(parse_register(operands[0], line)?);
            match operands[1].kind {
                TokenKind::Register => {
                    let src = register_field(parse_register(operands[1], line)?);
                    code.push(encode_word(Opcode::MOV, dest, src));
                }
                TokenKind::Immediate => {
                    let value = parse_immediate(operands[1], line)?;
                    code.push(encode_word(Opcode::MOV, dest, constants::IMMEDIATE));
                    code.push(value);
                }
                _ => {
                    return Err(AssembleError::at_line(
                        line,
                        "MOV's second operand must be a register or an immediate",
                    ))
                }
            }
        }
        Opcode::LD => {
            require_arity(operands, 2, line)?;
            let dest = register_field(parse_register(operands[0], line)?);
            let addr = parse_address(operands[1], line)?;
            code.push(encode_word(Opcode::LD, dest, constants::IMMEDIATE));
            code.push(addr);
        }
        Opcode::ST => {
            require_arity(operands, 2, line)?;
            let src = register_field(parse_register(operands[0], line)?);
            let addr = parse_address(operands[1], line)?;
            code.push(encode_word(Opcode::ST, src, constants::IMMEDIATE));
            code.push(addr);
        }
        Opcode::PUSH
        | Opcode::POP
        | Opcode::ADD
        | Opcode::SUB
        | Opcode::MUL
        | Opcode::DIV
        | Opcode::AND
        | Opcode::OR
        | Opcode::XOR => {
            require_arity(operands, 1, line)?;
            let reg = register_field(parse_register(operands[0], line)?);
            code.push(encode_word(opcode, reg, constants::NONE));
        }
        Opcode::PRN => {
            require_arity(operands, 1, line)?;
            let reg = parse_register(operands[0], line)?;
            if reg != RegisterId::ACC {
                return Err(AssembleError::at_line(line, "PRN only accepts the ACC register"));
            }
            code.push(encode_word(Opcode::PRN, register_field(reg), constants::NONE));
        }
        Opcode::INC | Opcode::DEC | Opcode::CLR | Opcode::NOT | Opcode::HLT | Opcode::NOP => {
            require_arity(operands, 0, line)?;
            code.push(encode_word(opcode, constants::NONE, constants::NONE));
        }
        Opcode::JMP | Opcode::JEZ | Opcode::JLZ | Opcode::JGZ => {
            require_arity(operands, 1, line)?;
            let name = parse_label_ref(operands[0], line)?;
            code.push(encode_word(opcode, constants::IMMEDIATE, constants::NONE));
            patches.push((name, code.len(), line));
            code.push(0);
        }
    }

    Ok(())
}

fn require_arity(operands: &[&Token], expected: usize, line: u32) -> Result<(), AssembleError> {
    if operands.len() == expected {
        Ok(())
    } else {
        Err(AssembleError::at_line(
            line,
            format!("Expected {} operand(s), found {}", expected, operands.len()),
        ))
    }
}

fn parse_register(token: &Token, line: u32) -> Result<RegisterId, AssembleError> {
    if token.kind != TokenKind::Register {
        return Err(AssembleError::at_line(line, "Expected a register operand"));
    }
    RegisterId::from_str(&token.text.to_uppercase())
        .map_err(|err| AssembleError::at_line(line, err.to_string()))
}

fn parse_immediate(token: &Token, line: u32) -> Result<u16, AssembleError> {
    let body = token.text.strip_prefix('#').unwrap_or(&token.text);
    let value = parse_int_literal(body).map_err(|msg| AssembleError::at_line(line, msg))?;
    if !(-32768..=65535).contains(&value) {
        return Err(AssembleError::at_line(
            line,
            format!("Immediate {} is out of range -32768..=65535", value),
        ));
    }
    Ok(value as u16)
}

fn parse_address(token: &Token, line: u32) -> Result<u16, AssembleError> {
    if token.kind != TokenKind::Address {
        return Err(AssembleError::at_line(line, "Expected an address operand in '[...]'"));
    }
    let body = token
        .text
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(&token.text);
    let value = parse_int_literal(body).map_err(|msg| AssembleError::at_line(line, msg))?;
    if !(0..65536).contains(&value) {
        return Err(AssembleError::at_line(
            line,
            format!("Address {} is out of range 0..65536", value),
        ));
    }
    Ok(value as u16)
}

fn parse_label_ref(token: &Token, line: u32) -> Result<String, AssembleError> {
    if token.kind != TokenKind::Label || token.text.starts_with('@') {
        return Err(AssembleError::at_line(line, "Expected a label operand"));
    }
    Ok(token.text.to_uppercase())
}

fn parse_int_literal(text: &str) -> Result<i64, String> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).map_err(|_| format!("Invalid numeric literal '{}'", text))?
    } else {
        rest.parse::<i64>()
            .map_err(|_| format!("Invalid numeric literal '{}'", text))?
    };
    Ok(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn assemble_source(source: &str) -> Result<Vec<u16>, AssembleError> {
        let tokens = lex(source).expect("lexing should succeed");
        assemble(&tokens)
    }

    #[test]
    fn mov_immediate_emits_two_words() {
        let code = assemble_source("MOV ACC, #72\nHLT\n").unwrap();
        assert_eq!(code[0], encode_word(Opcode::MOV, register_field(RegisterId::ACC), constants::IMMEDIATE));
        assert_eq!(code[1], 72);
        assert_eq!(code[2], encode_word(Opcode::HLT, constants::NONE, constants::NONE));
    }

    #[test]
    fn mov_register_emits_one_word() {
        let code = assemble_source("MOV R1, R0\n").unwrap();
        assert_eq!(code.len(), 1);
    }

    #[test]
    fn forward_label_reference_patches_to_correct_address() {
        let code = assemble_source("JMP SKIP\nNOP\n@SKIP:\nHLT\n").unwrap();
        assert_eq!(code[1], 2);
        assert_eq!(code[2], encode_word(Opcode::NOP, constants::NONE, constants::NONE));
        assert_eq!(code[3], encode_word(Opcode::HLT, constants::NONE, constants::NONE));
    }

    #[test]
    fn renaming_labels_consistently_is_bit_identical() {
        let a = assemble_source("JMP LOOP\n@LOOP:\nHLT\n").unwrap();
        let b = assemble_source("JMP AGAIN\n@AGAIN:\nHLT\n").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn stacked_label_definitions_match_separate_lines() {
        let stacked = assemble_source("@A: @B: HLT\nJMP A\nJMP B\n").unwrap();
        let separate = assemble_source("@A:\n@B:\nHLT\nJMP A\nJMP B\n").unwrap();
        assert_eq!(stacked, separate);
    }

    #[test]
    fn label_defined_at_end_of_file_compiles() {
        // @END is never actually reachable at runtime here (falling off the
        // end already halts the VM), but resolving it to `codeLen` is this
        // phase's job; only the VM's jump check may reject an out-of-range
        // target, and only if the jump is actually taken.
        let code = assemble_source("MOV ACC, #1\nJGZ END\nHLT\n@END:\n").unwrap();
        assert_eq!(code.len(), 5);
        assert_eq!(code[3], 5);
    }

    #[test]
    fn undefined_label_is_an_error() {
        let err = assemble_source("JMP MISSING\nHLT\n").unwrap_err();
        assert_eq!(
            err,
            AssembleError::at_line(1, "Undefined label 'MISSING'")
        );
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let err = assemble_source("@L:\nNOP\n@L:\nHLT\n").unwrap_err();
        assert!(matches!(err, AssembleError::AtLine { line: 3, .. }));
    }

    #[test]
    fn immediate_boundary_values_are_accepted() {
        assemble_source("MOV ACC, #-32768\n").unwrap();
        assemble_source("MOV ACC, #65535\n").unwrap();
    }

    #[test]
    fn immediate_out_of_range_is_rejected() {
        assert!(assemble_source("MOV ACC, #-32769\n").is_err());
        assert!(assemble_source("MOV ACC, #65536\n").is_err());
    }

    #[test]
    fn address_boundary_values_are_accepted() {
        assemble_source("LD R0, [0]\n").unwrap();
        assemble_source("LD R0, [65535]\n").unwrap();
    }

    #[test]
    fn address_out_of_range_is_rejected() {
        assert!(assemble_source("LD R0, [-1]\n").is_err());
        assert!(assemble_source("LD R0, [65536]\n").is_err());
    }

    #[test]
    fn prn_of_non_acc_register_is_rejected() {
        assert!(assemble_source("PRN R0\n").is_err());
    }

    #[test]
    fn too_many_operands_is_rejected() {
        assert!(assemble_source("MOV R0, R1, R2, R3\n").is_err());
    }
}
