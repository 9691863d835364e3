//! NMOS 6502 interpreter.
//!
//! Executes one whole instruction per [`Mos6502::step`]. The base cost of
//! each opcode is charged to the bus before the instruction touches memory,
//! and indexed page crossings and taken branches add their extra cycles at
//! the point where they occur. That is enough for a machine that schedules
//! its sound chip and timers by cycle stamps rather than by bus activity.
//!
//! Implemented undocumented opcodes:
//! - ASO (SLO), RLA, LSE (SRE), RRA, DCM (DCP), INS (ISB)
//! - SAX, LAX, ANC, ALR, ARR, ANE, ANX (LXA), LAS, SBX
//! - SHA, SHS, SHX, SHY (the "unstable" high-byte stores)
//! - the one, two and three byte NOPs
//! - CIM (KIL/JAM), which halts the CPU with PC left on the opcode

mod addressing;
mod cpu;
pub mod flags;
mod opcodes;
mod registers;

pub use cpu::Mos6502;
pub use flags::Status;
pub use opcodes::CYCLES;
pub use registers::Registers;
