//! Cached Object
//!
//! An immutable payload paired with its modification time.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A cached payload plus its modification timestamp.
///
/// Payload length is the unit of all size accounting. Cloning shares the
/// underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    data: Bytes,
    mod_time: DateTime<Utc>,
}

impl Object {
    /// Create a new object
    pub fn new(data: impl Into<Bytes>, mod_time: DateTime<Utc>) -> Self {
        Self {
            data: data.into(),
            mod_time,
        }
    }

    /// Create an object stamped with the current time
    pub fn now(data: impl Into<Bytes>) -> Self {
        Self::new(data, Utc::now())
    }

    /// Get the payload
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Get the modification time
    #[inline]
    pub fn mod_time(&self) -> DateTime<Utc> {
        self.mod_time
    }

    /// Payload length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload length as used by size accounting
    #[inline]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Consume the object, returning the payload
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_object_accessors() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let obj = Object::new(Bytes::from_static(b"hello"), ts);

        assert_eq!(obj.len(), 5);
        assert_eq!(obj.size(), 5);
        assert!(!obj.is_empty());
        assert_eq!(obj.mod_time(), ts);
        assert_eq!(obj.data().as_ref(), b"hello");
    }

    #[test]
    fn test_object_clone_shares_payload() {
        let obj = Object::now(vec![7u8; 64]);
        let copy = obj.clone();

        assert_eq!(obj, copy);
        assert_eq!(obj.data().as_ptr(), copy.data().as_ptr());
    }

    #[test]
    fn test_empty_object() {
        let obj = Object::now(Bytes::new());
        assert!(obj.is_empty());
        assert_eq!(obj.into_data().len(), 0);
    }
}
