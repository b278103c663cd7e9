//! End-to-end scenario tests: source text all the way through to VM exit
//! code and emitted stdout bytes.

use vcpu::{CaptureSink, ExitCode, Processor, RegisterId};

fn run_source(source: &str) -> (ExitCode, Vec<u8>, Processor) {
    let tokens = crate::lex(source).expect("lexing should succeed");
    let code = crate::assemble(&tokens).expect("assembly should succeed");
    let mut processor = Processor::new();
    let mut sink = CaptureSink::default();
    let exit = processor.run(&code, &mut sink);
    (exit, sink.0, processor)
}

#[test]
fn s1_print_one_character() {
    let (exit, out, _) = run_source(
        "  MOV ACC, #72\n\
         PRN ACC\n\
         HLT\n",
    );
    assert_eq!(exit, ExitCode::Halted);
    assert_eq!(out, vec![0x48]);
}

#[test]
fn s2_arithmetic_and_conditional_branch_terminates() {
    let (exit, _, _) = run_source(
        "  MOV R0, #3\n\
         MOV ACC, #0\n\
       @LOOP:\n\
         ADD R0\n\
         DEC\n\
         MOV R1, ACC\n\
         MOV ACC, R0\n\
         DEC\n\
         MOV R0, ACC\n\
         JGZ LOOP\n\
         HLT\n",
    );
    assert_eq!(exit, ExitCode::Halted);
}

#[test]
fn s3_memory_mapped_output_via_st() {
    let (exit, out, _) = run_source(
        "  MOV R0, #65\n\
         ST  R0, [0xFF00]\n\
         HLT\n",
    );
    assert_eq!(exit, ExitCode::Halted);
    assert_eq!(out, vec![b'A']);
}

#[test]
fn s4_stack_discipline_round_trips() {
    let (exit, _, processor) = run_source(
        "  MOV R0, #7\n\
         PUSH R0\n\
         MOV R0, #0\n\
         POP R0\n\
         HLT\n",
    );
    assert_eq!(exit, ExitCode::Halted);
    assert_eq!(processor.register(RegisterId::R0), 7);
}

#[test]
fn s5_division_by_zero_is_fatal() {
    let (exit, out, _) = run_source(
        "  MOV R0, #0\n\
         MOV ACC, #10\n\
         DIV R0\n\
         HLT\n",
    );
    assert!(matches!(exit, ExitCode::Fault(_)));
    assert!(out.is_empty());
}

#[test]
fn s6_undefined_label_is_a_fatal_assemble_error() {
    let tokens = crate::lex("JMP MISSING\nHLT\n").unwrap();
    let err = crate::assemble(&tokens).unwrap_err();
    assert_eq!(
        err.to_string(),
        "[Compiler][Line 1]: Undefined label 'MISSING'"
    );
}

#[test]
fn label_defined_at_end_of_file_compiles_and_faults_only_if_the_jump_is_taken() {
    // @END resolves to codeLen, which the assembler accepts (it defers to
    // the VM's runtime bounds check); here the jump is always taken, so
    // running it to completion must hit the out-of-range fault at runtime
    // with exit code 68, not an assemble-time error.
    let (exit, out, _) = run_source("MOV ACC, #1\nJGZ END\nHLT\n@END:\n");
    assert_eq!(exit, ExitCode::Fault(vcpu::VmFault::JumpOutOfRange));
    assert!(out.is_empty());
}

#[test]
fn nop_and_hlt_only_program_halts_cleanly_with_no_output() {
    let (exit, out, _) = run_source("NOP\nNOP\nHLT\n");
    assert_eq!(exit, ExitCode::Halted);
    assert!(out.is_empty());
}

#[test]
fn program_at_exactly_the_word_limit_compiles() {
    let mut source = String::new();
    for _ in 0..65_535 {
        source.push_str("NOP\n");
    }
    source.push_str("HLT\n");
    let tokens = crate::lex(&source).unwrap();
    let code = crate::assemble(&tokens).unwrap();
    assert_eq!(code.len(), 65_536);
}

#[test]
fn program_one_word_over_the_limit_is_rejected() {
    let mut source = String::new();
    for _ in 0..65_536 {
        source.push_str("NOP\n");
    }
    source.push_str("HLT\n");
    let tokens = crate::lex(&source).unwrap();
    let err = crate::assemble(&tokens).unwrap_err();
    assert_eq!(err, crate::AssembleError::ProgramTooLarge);
}
