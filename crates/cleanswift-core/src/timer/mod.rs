mod clock;

pub use clock::{
    format_elapsed, ManualTime, MonotonicTime, SessionClock, TimeSource,
    DEFAULT_ESTIMATE_MINUTES,
};
