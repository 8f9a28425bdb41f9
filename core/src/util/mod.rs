pub mod clock;

mod output_tail;
pub use clock::{Clock, ManualClock, SystemClock};
pub use output_tail::OutputTail;
