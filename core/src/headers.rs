//! Editable list of custom request headers.
//!
//! Entries are kept exactly as typed. Trimming, dropping blank keys and
//! collapsing duplicates happen only when a request is assembled.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Key,
    Value,
}

/// Ordered header rows. Never empty after `new`/`reset`; may become empty
/// through `remove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<HeaderEntry>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self {
            entries: vec![HeaderEntry::default()],
        }
    }

    /// Rows restored from history; an empty list becomes a single blank row.
    pub fn from_entries(entries: Vec<HeaderEntry>) -> Self {
        if entries.is_empty() {
            Self::new()
        } else {
            Self { entries }
        }
    }

    pub fn add(&mut self) {
        self.entries.push(HeaderEntry::default());
    }

    pub fn remove(&mut self, index: usize) {
        if index < self.entries.len() {
            self.entries.remove(index);
        }
    }

    /// Returns `false` if `index` is out of range.
    pub fn set(&mut self, index: usize, field: HeaderField, value: impl Into<String>) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        match field {
            HeaderField::Key => entry.key = value.into(),
            HeaderField::Value => entry.value = value.into(),
        }
        true
    }

    pub fn reset(&mut self) {
        self.entries = vec![HeaderEntry::default()];
    }

    pub fn entries(&self) -> &[HeaderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HeaderSet {
    fn default() -> Self {
        Self::new()
    }
}
