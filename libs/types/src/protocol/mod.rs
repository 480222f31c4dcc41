//! Protocol constants and change-notification events

pub mod constants;
pub mod events;
