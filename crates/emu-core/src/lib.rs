//! Core traits and types for cycle-counted emulation.
//!
//! Everything is timed in master clock cycles. The sound output rate is
//! derived from the master clock through [`SampleClock`], never the other
//! way round.

mod bus;
mod clock;
mod cpu;
mod observable;

pub use bus::Bus;
pub use clock::{MasterClock, SampleClock};
pub use cpu::Cpu;
pub use observable::{Observable, Value};
