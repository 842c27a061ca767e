mod countdown;

pub use countdown::{format_clock, ClockEvent, ClockStatus, Countdown, CountdownState};
