//! Fixed-length values
//!
//! Every value in an index has the same length. `FixedValue` can only be built
//! through an `EntryLayout`, so a block never holds a value of the wrong size.

use bytes::Bytes;

use crate::error::{IndexError, Result};

/// Size of an encoded key
pub const KEY_SIZE: usize = 8;

/// Entry geometry shared by every block of one index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLayout {
    value_length: usize,
}

impl EntryLayout {
    pub fn new(value_length: usize) -> Self {
        Self { value_length }
    }

    pub fn value_length(&self) -> usize {
        self.value_length
    }

    /// Encoded size of one entry: key + value
    pub fn entry_size(&self) -> usize {
        KEY_SIZE + self.value_length
    }

    /// Wrap `bytes` as a value, rejecting any other length
    pub fn value(&self, bytes: &[u8]) -> Result<FixedValue> {
        self.check(bytes)?;
        Ok(FixedValue(Bytes::copy_from_slice(bytes)))
    }

    /// Like `value`, but takes ownership of an existing buffer
    pub fn value_from(&self, bytes: Bytes) -> Result<FixedValue> {
        self.check(&bytes)?;
        Ok(FixedValue(bytes))
    }

    fn check(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.value_length {
            return Err(IndexError::ValueTooLong {
                expected: self.value_length,
                actual: bytes.len(),
            });
        }
        Ok(())
    }
}

/// A value whose length was checked against the index's `EntryLayout`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedValue(Bytes);

impl FixedValue {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl AsRef<[u8]> for FixedValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
