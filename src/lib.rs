pub mod constants;
pub mod memory;
pub mod opcode;
pub mod processor;

pub use memory::{stdout_sink, CaptureSink, Memory, OutputSink, WriteSink};
pub use opcode::{decode_word, encode_word, register_field, Opcode, RegisterId};
pub use processor::{ExitCode, Processor, VmFault};
