//! Parsed message with typed accessors.
//!
//! Fields are owned `bytes::Bytes` slices of the record they were decoded
//! from, so a message stays valid however the receive buffer is grown or
//! drained afterwards.

use bytes::Bytes;

/// One decoded protocol message: an ordered list of opaque byte fields.
///
/// By convention field 0 is a command name or response tag; what follows
/// depends on the direction (see the crate documentation for the field
/// layout). A decoded message always has at least one field, but fields
/// may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    fields: Vec<Bytes>,
}

impl Message {
    /// Create a message from already-split fields.
    pub(crate) fn new(fields: Vec<Bytes>) -> Self {
        Self { fields }
    }

    /// Build a message by copying the given fields.
    pub fn from_fields<B: AsRef<[u8]>>(fields: &[B]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|f| Bytes::copy_from_slice(f.as_ref()))
                .collect(),
        }
    }

    /// Number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the message has no fields at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The first field, conventionally the command or response tag.
    #[inline]
    pub fn first(&self) -> Option<&[u8]> {
        self.field(0)
    }

    /// Field at the given index as raw bytes.
    #[inline]
    pub fn field(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index).map(|f| &f[..])
    }

    /// Field at the given index as UTF-8 text, if it is valid UTF-8.
    pub fn field_str(&self, index: usize) -> Option<&str> {
        self.field(index).and_then(|f| std::str::from_utf8(f).ok())
    }

    /// All fields.
    #[inline]
    pub fn fields(&self) -> &[Bytes] {
        &self.fields
    }

    /// Consume the message, yielding its fields.
    pub fn into_fields(self) -> Vec<Bytes> {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let msg = Message::from_fields(&["done", "3"]);
        assert_eq!(msg.len(), 2);
        assert!(!msg.is_empty());
        assert_eq!(msg.first(), Some(&b"done"[..]));
        assert_eq!(msg.field(1), Some(&b"3"[..]));
        assert_eq!(msg.field(2), None);
    }

    #[test]
    fn test_field_str() {
        let msg = Message::new(vec![
            Bytes::from_static(b"port"),
            Bytes::from_static(&[0xff, 0xfe]),
        ]);
        assert_eq!(msg.field_str(0), Some("port"));
        assert_eq!(msg.field_str(1), None);
        assert_eq!(msg.field_str(9), None);
    }

    #[test]
    fn test_into_fields_preserves_order() {
        let msg = Message::from_fields(&["a", "", "c"]);
        let fields = msg.into_fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(&fields[0][..], b"a");
        assert_eq!(&fields[1][..], b"");
        assert_eq!(&fields[2][..], b"c");
    }
}
