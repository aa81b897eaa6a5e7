//! Vitae bot — recruiting-assistant conversational service.

pub mod activity;
pub mod channels;
pub mod config;
pub mod delegate;
pub mod dialogs;
pub mod document;
pub mod error;
pub mod extract;
pub mod router;
pub mod store;
pub mod turn;
