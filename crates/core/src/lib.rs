#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod permissions;
pub mod playback;
pub mod time;
pub mod validation;

pub use time::Clock;
