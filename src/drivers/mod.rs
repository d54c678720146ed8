//! Operator panel helpers: push-button debouncing and indicator blink
//! sequencing.

pub mod button;
pub mod led_patterns;
