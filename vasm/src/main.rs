use std::env;
use std::fs;
use std::process::ExitCode;

use log::info;
use vcpu::{stdout_sink, ExitCode as VmExitCode, Processor};

const EXIT_OK: u8 = 0;
const EXIT_LEXER_ERROR: u8 = 65;
const EXIT_ASSEMBLE_ERROR: u8 = 66;
const EXIT_PROGRAM_TOO_LARGE: u8 = 67;
const EXIT_VM_FAULT: u8 = 68;
const EXIT_IO_ERROR: u8 = 74;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        println!("usage: {} <source_file>", args.get(0).map(String::as_str).unwrap_or("vasm"));
        return ExitCode::from(EXIT_OK);
    }

    ExitCode::from(run(&args[1]))
}

fn run(path: &str) -> u8 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("[IO]: failed to read '{}': {}", path, err);
            return EXIT_IO_ERROR;
        }
    };

    let tokens = match vasm::lex(&source) {
        Ok(tokens) => tokens,
        Err(err) => {
            eprintln!("{}", err);
            return EXIT_LEXER_ERROR;
        }
    };
    info!("lexed {} tokens", tokens.len());

    let code = match vasm::assemble(&tokens) {
        Ok(code) => code,
        Err(vasm::AssembleError::ProgramTooLarge) => {
            eprintln!("[Compiler]: Program exceeds maximum size of 65536 words");
            return EXIT_PROGRAM_TOO_LARGE;
        }
        Err(err) => {
            eprintln!("{}", err);
            return EXIT_ASSEMBLE_ERROR;
        }
    };
    info!("assembled {} words", code.len());

    let mut processor = Processor::new();
    let mut sink = stdout_sink();
    match processor.run(&code, &mut sink) {
        VmExitCode::Halted => EXIT_OK,
        VmExitCode::Fault(fault) => {
            eprintln!("[VM]: {}", fault);
            EXIT_VM_FAULT
        }
    }
}
