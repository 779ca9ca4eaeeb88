//! Wire protocol: separator-framed messages and the command vocabulary.
//!
//! A message on the wire is `field_0 FS field_1 FS ... field_n RS`, where
//! [`FIELD_SEP`] and [`RECORD_SEP`] are single reserved bytes outside the
//! printable range. There is no escaping: payload fields must not contain
//! either byte. See [`codec`] for the framing rules and [`Message`] for
//! the parsed form.

mod codec;
mod message;

pub use codec::{decode, encode};
pub use message::Message;

/// Byte separating fields within a message (ASCII unit separator).
pub const FIELD_SEP: u8 = 0x1f;

/// Byte terminating a message (ASCII record separator).
pub const RECORD_SEP: u8 = 0x1e;

/// Response tag the editor uses to answer the given request command.
///
/// The pairing is part of the protocol; helper tools wait on the tag
/// returned here when issuing the matching request.
///
/// ```
/// use edrelay::protocol::response_tag;
///
/// assert_eq!(response_tag("edit"), Some("done"));
/// assert_eq!(response_tag("bogus"), None);
/// ```
pub fn response_tag(request: &str) -> Option<&'static str> {
    match request {
        "clear" => Some("cleared"),
        "scratch" => Some("scratched"),
        "edit" => Some("done"),
        "look" => Some("looked"),
        "bufinfo" => Some("bufinfo"),
        "checktime" => Some("timechecked"),
        "change" => Some("changed"),
        "open" => Some("opened"),
        _ => None,
    }
}
