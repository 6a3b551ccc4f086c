//! Node entries and their front-coded byte encoding.
//!
//! # Entry Layout
//! ```text
//! ┌────────────┬────────────┬─────────────────┬──────────────────┐
//! │ prefix_len │ suffix_len │ child_w │ val_w │ count_w │ inline │  4-byte prologue
//! └────────────┴────────────┴─────────────────┴──────────────────┘
//! ┌──────────────┬───────────────┬───────────────┬───────────────┐
//! │ suffix bytes │ child (LE)    │ value (LE)    │ count (LE)    │
//! └──────────────┴───────────────┴───────────────┴───────────────┘
//! ```
//!
//! `prefix_len` bytes of the key are shared with the previous entry in the
//! node and not stored. Document counts up to `0x0f` live in the low nibble
//! of the last prologue byte with no count bytes after the value; larger
//! counts store their width in the high nibble and leave the low nibble 0.

use std::fmt;

use crate::common::config::MAX_KEY_SIZE;
use crate::common::{Error, PageId, Result};

use super::width::{byte_width, pack_nibbles, read_uint, unpack_nibbles, write_uint};

/// Size of the fixed part of every encoded entry.
pub const PROLOGUE_LEN: usize = 4;

/// Largest document count stored inline in the prologue.
pub const MAX_INLINE_COUNT: u64 = 0x0f;

/// One key with its payload, as stored in a node.
///
/// `child` is only meaningful in branch nodes, where it names the subtree
/// holding keys between this entry and the next. Leaf entries, and entries
/// handed back by lookups and iteration, carry `PageId::INVALID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    /// Offset of the key's posting list.
    pub value: u64,
    /// Number of documents containing the key.
    pub doc_count: u64,
    pub child: PageId,
}

impl Entry {
    pub fn new(key: impl Into<Vec<u8>>, value: u64, doc_count: u64) -> Self {
        Self {
            key: key.into(),
            value,
            doc_count,
            child: PageId::INVALID,
        }
    }

    pub fn with_child(mut self, child: PageId) -> Self {
        self.child = child;
        self
    }

    /// Same entry without its child pointer.
    pub(crate) fn detached(mut self) -> Self {
        self.child = PageId::INVALID;
        self
    }

    pub(crate) fn check_key(&self) -> Result<()> {
        if self.key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLong {
                len: self.key.len(),
                max: MAX_KEY_SIZE,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' value={} doc_count={} child={}",
            String::from_utf8_lossy(&self.key),
            self.value,
            self.doc_count,
            self.child
        )
    }
}

/// The decoded fixed part of an encoded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prologue {
    pub prefix_len: u8,
    pub suffix_len: u8,
    pub child_width: u8,
    pub value_width: u8,
    pub count_width: u8,
    pub inline_count: u8,
}

impl Prologue {
    fn for_entry(entry: &Entry, prefix_len: usize) -> Self {
        let (count_width, inline_count) = if entry.doc_count <= MAX_INLINE_COUNT {
            (0, entry.doc_count as u8)
        } else {
            (byte_width(entry.doc_count) as u8, 0)
        };
        Self {
            prefix_len: prefix_len as u8,
            suffix_len: (entry.key.len() - prefix_len) as u8,
            child_width: byte_width(u64::from(entry.child.0)) as u8,
            value_width: byte_width(entry.value) as u8,
            count_width,
            inline_count,
        }
    }

    /// Parse the 4 bytes at the start of `bytes`.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PROLOGUE_LEN {
            return Err(Error::Corruption(format!(
                "entry prologue truncated to {} bytes",
                bytes.len()
            )));
        }
        let (child_width, value_width) = unpack_nibbles(bytes[2]);
        let (count_width, low) = unpack_nibbles(bytes[3]);
        let prologue = Self {
            prefix_len: bytes[0],
            suffix_len: bytes[1],
            child_width,
            value_width,
            count_width,
            inline_count: if count_width == 0 { low } else { 0 },
        };

        if prologue.child_width > 4 || prologue.value_width > 8 || prologue.count_width > 8 {
            return Err(Error::Corruption(format!(
                "entry widths out of range: child {} value {} count {}",
                prologue.child_width, prologue.value_width, prologue.count_width
            )));
        }
        if prologue.key_len() > MAX_KEY_SIZE {
            return Err(Error::Corruption(format!(
                "entry key length {} exceeds {}",
                prologue.key_len(),
                MAX_KEY_SIZE
            )));
        }
        Ok(prologue)
    }

    pub fn write(&self, out: &mut [u8]) {
        out[0] = self.prefix_len;
        out[1] = self.suffix_len;
        out[2] = pack_nibbles(self.child_width, self.value_width);
        out[3] = if self.count_width == 0 {
            self.inline_count & 0x0f
        } else {
            pack_nibbles(self.count_width, 0)
        };
    }

    #[inline]
    pub fn key_len(&self) -> usize {
        usize::from(self.prefix_len) + usize::from(self.suffix_len)
    }

    /// Total encoded length of the entry this prologue starts.
    #[inline]
    pub fn entry_len(&self) -> usize {
        PROLOGUE_LEN
            + usize::from(self.suffix_len)
            + usize::from(self.child_width)
            + usize::from(self.value_width)
            + usize::from(self.count_width)
    }
}

/// Length of the longest common prefix of two keys.
#[inline]
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Bytes `entry` takes when front-coded against a key sharing `prefix_len`.
pub fn encoded_len(entry: &Entry, prefix_len: usize) -> usize {
    Prologue::for_entry(entry, prefix_len).entry_len()
}

/// Encode `entry` into the start of `out`, sharing `prefix_len` key bytes
/// with its predecessor. Returns the number of bytes written.
///
/// # Panics
/// Panics if `out` is shorter than [`encoded_len`], or if `prefix_len`
/// exceeds the key length.
pub fn encode_into(entry: &Entry, prefix_len: usize, out: &mut [u8]) -> usize {
    let prologue = Prologue::for_entry(entry, prefix_len);
    prologue.write(out);

    let mut at = PROLOGUE_LEN;
    let suffix = &entry.key[prefix_len..];
    out[at..at + suffix.len()].copy_from_slice(suffix);
    at += suffix.len();
    at += write_uint(&mut out[at..], u64::from(entry.child.0), prologue.child_width.into());
    at += write_uint(&mut out[at..], entry.value, prologue.value_width.into());
    at += write_uint(&mut out[at..], entry.doc_count, prologue.count_width.into());
    at
}

/// Decode the entry at the start of `bytes`, expanding its key against
/// `prev_key`. Returns the entry and its encoded length.
pub fn decode(bytes: &[u8], prev_key: &[u8]) -> Result<(Entry, usize)> {
    let prologue = Prologue::read(bytes)?;
    let len = prologue.entry_len();
    if bytes.len() < len {
        return Err(Error::Corruption(format!(
            "entry of {} bytes overruns the key space ({} left)",
            len,
            bytes.len()
        )));
    }
    let prefix_len = usize::from(prologue.prefix_len);
    if prefix_len > prev_key.len() {
        return Err(Error::Corruption(format!(
            "entry shares {} bytes with a {}-byte predecessor",
            prefix_len,
            prev_key.len()
        )));
    }

    let mut key = Vec::with_capacity(prologue.key_len());
    key.extend_from_slice(&prev_key[..prefix_len]);
    let mut at = PROLOGUE_LEN;
    key.extend_from_slice(&bytes[at..at + usize::from(prologue.suffix_len)]);
    at += usize::from(prologue.suffix_len);

    let child = read_uint(&bytes[at..], prologue.child_width.into());
    at += usize::from(prologue.child_width);
    let value = read_uint(&bytes[at..], prologue.value_width.into());
    at += usize::from(prologue.value_width);
    let doc_count = if prologue.count_width == 0 {
        u64::from(prologue.inline_count)
    } else {
        read_uint(&bytes[at..], prologue.count_width.into())
    };

    let entry = Entry {
        key,
        value,
        doc_count,
        child: PageId::new(child as u32),
    };
    Ok((entry, len))
}
