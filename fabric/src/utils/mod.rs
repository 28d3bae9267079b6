//! Small building blocks shared by the components: wall clock, backoff
//! schedule and trailing-edge debouncer.

pub mod backoff;
pub mod clock;
pub mod debounce;

pub use backoff::Backoff;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use debounce::Debouncer;
