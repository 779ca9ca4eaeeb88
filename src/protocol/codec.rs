//! Frame codec for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for the receive buffer. [`decode`] only ever
//! consumes bytes once a complete record is present, so it can be called
//! repeatedly against a buffer that is still growing: every call on an
//! incomplete record returns `None` and leaves the buffer untouched, and
//! the call that finally sees the record separator yields the same message
//! no matter how many attempts preceded it.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use edrelay::protocol::{decode, encode};
//!
//! let mut buf = BytesMut::new();
//! encode(&["edit", "/tmp", "notes.txt"], &mut buf);
//!
//! let msg = decode(&mut buf).unwrap();
//! assert_eq!(msg.field(0), Some(&b"edit"[..]));
//! assert!(buf.is_empty());
//! ```

use bytes::{BufMut, BytesMut};

use super::message::Message;
use super::{FIELD_SEP, RECORD_SEP};

/// Extract one complete message from the front of the buffer.
///
/// Scans for the record separator. If none is present yet, returns `None`
/// without mutating the buffer. Otherwise the record (including its
/// terminating separator) is split off the front and its body is split on
/// the field separator into owned [`bytes::Bytes`] fields.
///
/// A record always decodes to at least one field; a bare record separator
/// decodes to a single empty field.
pub fn decode(buf: &mut BytesMut) -> Option<Message> {
    let end = buf.iter().position(|&b| b == RECORD_SEP)?;
    let record = buf.split_to(end + 1).freeze();

    let mut fields = Vec::new();
    let mut start = 0;
    for i in 0..end {
        if record[i] == FIELD_SEP {
            fields.push(record.slice(start..i));
            start = i + 1;
        }
    }
    fields.push(record.slice(start..end));

    Some(Message::new(fields))
}

/// Append one encoded message to the output buffer.
///
/// Joins the fields with the field separator and terminates the record
/// with the record separator. Performs no I/O.
///
/// Payload precondition: fields must not contain [`FIELD_SEP`] or
/// [`RECORD_SEP`]. The protocol has no escaping; a reserved byte inside a
/// field would silently corrupt framing for the receiving side.
pub fn encode<B: AsRef<[u8]>>(fields: &[B], out: &mut BytesMut) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.put_u8(FIELD_SEP);
        }
        out.extend_from_slice(field.as_ref());
    }
    out.put_u8(RECORD_SEP);
}
