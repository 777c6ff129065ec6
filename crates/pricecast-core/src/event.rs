//! Server-Sent Events record encoding.
//!
//! Every record produced here has exactly two fields followed by the blank
//! line that terminates an SSE event:
//!
//! ```text
//! event: <name>\n
//! data: {"data":<payload>}\n
//! \n
//! ```
//!
//! The payload is wrapped in a `{"data": ...}` object and encoded as compact
//! JSON, so it never contains a raw line break.

use crate::{Error, Result};
use serde::Serialize;

/// JSON envelope carried on the `data:` line.
#[derive(Serialize)]
struct Envelope<'a, T: ?Sized> {
    data: &'a T,
}

/// A single named event, ready to be encoded once and written once.
#[derive(Clone, Copy, Debug)]
pub struct EventRecord<'a, T: ?Sized> {
    pub event: &'a str,
    pub data: &'a T,
}

impl<'a, T> EventRecord<'a, T>
where
    T: Serialize + ?Sized,
{
    pub const fn new(event: &'a str, data: &'a T) -> Self {
        Self { event, data }
    }

    /// Encodes the record into its wire form.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEventName`] if the name is empty or contains `\r` or
    ///   `\n`.
    /// - [`Error::Encoding`] if the payload fails to serialize.
    pub fn encode(&self) -> Result<String> {
        if self.event.is_empty() || self.event.contains(['\r', '\n']) {
            return Err(Error::InvalidEventName {
                name: self.event.to_owned(),
            });
        }

        let json = serde_json::to_string(&Envelope { data: self.data })?;

        let mut out = String::with_capacity(16 + self.event.len() + json.len());
        out.push_str("event: ");
        out.push_str(self.event);
        out.push('\n');
        out.push_str("data: ");
        out.push_str(&json);
        out.push_str("\n\n");
        Ok(out)
    }
}

/// Formats `data` as an SSE record named `event`.
///
/// Shorthand for `EventRecord::new(event, data).encode()`.
///
/// ```
/// use pricecast_core::{Price, format_server_sent_event};
///
/// let price = Price::new(10).unwrap();
/// let record = format_server_sent_event("price-update", &price).unwrap();
/// assert_eq!(record, "event: price-update\ndata: {\"data\":10}\n\n");
/// ```
pub fn format_server_sent_event<T>(event: &str, data: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    EventRecord::new(event, data).encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PRICE_UPDATE_EVENT, Price};
    use serde::Serializer;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S>(&self, _serializer: S) -> core::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            Err(serde::ser::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn every_price_matches_the_wire_grammar() {
        for name in [PRICE_UPDATE_EVENT, "tick", "a"] {
            for v in 0..Price::UPPER_BOUND {
                let price = Price::new(v).unwrap();
                let expected = format!("event: {name}\ndata: {{\"data\":{v}}}\n\n");
                assert_eq!(format_server_sent_event(name, &price).unwrap(), expected);
            }
        }
    }

    #[test]
    fn record_ends_with_blank_line() {
        let record = format_server_sent_event(PRICE_UPDATE_EVENT, &7_u32).unwrap();
        assert!(record.ends_with("\n\n"));
        assert_eq!(record.matches('\n').count(), 3);
    }

    #[test]
    fn structured_payloads_are_wrapped() {
        #[derive(Serialize)]
        struct Quote<'a> {
            symbol: &'a str,
            price: u32,
        }

        let record = format_server_sent_event(
            "quote",
            &Quote {
                symbol: "BTC",
                price: 64,
            },
        )
        .unwrap();
        assert_eq!(
            record,
            "event: quote\ndata: {\"data\":{\"symbol\":\"BTC\",\"price\":64}}\n\n"
        );
    }

    #[test]
    fn string_payload_newlines_are_escaped() {
        let record = format_server_sent_event("note", "line one\nline two").unwrap();
        assert_eq!(
            record,
            "event: note\ndata: {\"data\":\"line one\\nline two\"}\n\n"
        );
    }

    #[test]
    fn unserializable_payload_is_an_encoding_error() {
        let err = format_server_sent_event(PRICE_UPDATE_EVENT, &Unserializable).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)), "got {err:?}");
    }

    #[test]
    fn rejects_names_that_break_framing() {
        for name in ["", "price\nupdate", "price\r"] {
            let err = format_server_sent_event(name, &1_u8).unwrap_err();
            assert!(matches!(err, Error::InvalidEventName { .. }), "got {err:?}");
        }
    }
}
