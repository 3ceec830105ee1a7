//! Modem Bridge Module
//!
//! Drives a SIM800-class modem over its serial channel: the transaction
//! engine, notification routing and the typed AT command set.

mod commands;
mod connection;
#[cfg(test)]
pub mod fake;

pub use commands::AtCommandSender;
pub use connection::{Modem, UrcReceiver};
