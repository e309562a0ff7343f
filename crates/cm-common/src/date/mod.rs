pub mod availability;
pub mod window;

pub use availability::{AvailabilityWindow, WindowDay, availability_overlap_ratio};
pub use window::{RequestWindow, WindowError, parse_timestamp};
