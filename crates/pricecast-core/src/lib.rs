#![doc = include_str!("../README.md")]

mod error;
pub mod event;
pub mod types;

pub use error::{Error, Result};
pub use event::{EventRecord, format_server_sent_event};
pub use types::{PRICE_UPDATE_EVENT, Price};
