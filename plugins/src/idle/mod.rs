//! Idle probes for the environments lull knows about.
//!
//! Each probe may fail; `lull_core::idle::ProbeChain` tries them in order.

mod command;
pub mod ioreg;
pub mod loadavg;
pub mod tty;
pub mod xprintidle;

pub use ioreg::IoregProbe;
pub use loadavg::LoadAverageProbe;
pub use tty::TtyIdleProbe;
pub use xprintidle::XprintidleProbe;
