//! Eviction policy.
//!
//! - [`ClockReplacer`] - CLOCK (second chance) sweep over the frame table

mod clock;

pub use clock::ClockReplacer;
