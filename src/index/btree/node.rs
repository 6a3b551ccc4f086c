//! Node - a view over one B-tree page.
//!
//! # Page Layout
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────┐
//! │ NodeHeader (10B)     │ key space (8182B)                        │
//! │ flags|free|count|low │ [entry 0][entry 1]...[entry n-1][ free ] │
//! └──────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Entries are packed back to back in ascending key order, each one
//! front-coded against its predecessor (see [`entry`](super::entry)).
//! Because of that, entry `i` can only be decoded after entry `i - 1`.
//! A [`Node`] keeps two pieces of non-persistent state to make this cheap:
//! the byte offset of every entry, computed once on load, and a cursor
//! holding the last decoded entry so forward walks do not restart.
//!
//! `Node` is generic over its buffer: a page guard from the buffer pool,
//! a plain `Vec<u8>` in tests, or anything else exposing the page bytes.

use std::cmp::Ordering;
use std::io::Write;

use crate::common::config::{MAX_KEY_COUNT, MAX_KEY_SPACE, NODE_HEADER_SIZE, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{NodeHeader, NodeKind};

use super::entry::{self, common_prefix_len, encode_into, encoded_len, Entry, Prologue};

/// Outcome of looking a key up inside one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Search {
    /// The key is stored at `position`.
    Found { position: usize, entry: Entry },
    /// The key is absent. `position` is the index of the first entry
    /// greater than the key (where it would be inserted) and `child` the
    /// subtree that would hold it: the child of the last smaller entry,
    /// or the low child when there is none.
    NotFound { position: usize, child: PageId },
}

#[derive(Debug)]
struct Cursor {
    index: usize,
    entry: Entry,
}

/// A decoded view over a node page.
pub struct Node<B> {
    buf: B,
    header: NodeHeader,
    offsets: Vec<usize>,
    cursor: Option<Cursor>,
    key_limit: usize,
}

impl<B: AsRef<[u8]>> Node<B> {
    /// Interpret `buf` as a node page and index its entries.
    ///
    /// # Errors
    /// `Error::Corruption` if the header is out of range or the entry
    /// lengths do not add up to the space the header says is used.
    pub fn load(buf: B) -> Result<Self> {
        let page = buf.as_ref();
        if page.len() < PAGE_SIZE {
            return Err(Error::Corruption(format!(
                "node buffer holds {} bytes, expected {}",
                page.len(),
                PAGE_SIZE
            )));
        }
        let header = NodeHeader::from_bytes(page);
        let count = usize::from(header.key_count);
        let free = usize::from(header.free_space);
        if count > MAX_KEY_COUNT || free > MAX_KEY_SPACE {
            return Err(Error::Corruption(format!(
                "node header out of range: {count} entries, {free} bytes free"
            )));
        }

        let used = MAX_KEY_SPACE - free;
        let space = &page[NODE_HEADER_SIZE..NODE_HEADER_SIZE + used];
        let mut offsets = Vec::with_capacity(count);
        let mut at = 0usize;
        for _ in 0..count {
            if at >= used {
                break;
            }
            offsets.push(at);
            at += Prologue::read(&space[at..])?.entry_len();
        }
        if offsets.len() != count || at != used {
            return Err(Error::Corruption(format!(
                "{} of {} entries span {} bytes but the header declares {} used",
                offsets.len(),
                count,
                at,
                used
            )));
        }

        Ok(Self {
            buf,
            header,
            offsets,
            cursor: None,
            key_limit: MAX_KEY_COUNT,
        })
    }

    /// Cap the number of entries this node accepts before reporting full.
    pub fn with_key_limit(mut self, key_limit: usize) -> Self {
        self.key_limit = key_limit.min(MAX_KEY_COUNT);
        self
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.header.kind()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        usize::from(self.header.key_count)
    }

    #[inline]
    pub fn free_space(&self) -> usize {
        usize::from(self.header.free_space)
    }

    /// Bytes of key space taken by entries.
    #[inline]
    pub fn used_space(&self) -> usize {
        MAX_KEY_SPACE - self.free_space()
    }

    #[inline]
    pub fn low_child(&self) -> PageId {
        self.header.low_child
    }

    /// Encoded length of entry `index`.
    pub fn entry_len(&self, index: usize) -> usize {
        self.entry_end(index) - self.offsets[index]
    }

    /// Decode entry `index`, walking forward from the cursor when it is at
    /// or before `index` and from entry 0 otherwise.
    pub fn entry_at(&mut self, index: usize) -> Result<&Entry> {
        if index >= self.entry_count() {
            return Err(Error::Corruption(format!(
                "entry {} requested from a node of {}",
                index,
                self.entry_count()
            )));
        }

        let mut cursor = match self.cursor.take() {
            Some(cursor) if cursor.index <= index => cursor,
            _ => Cursor {
                index: 0,
                entry: self.decode_at(0, &[])?,
            },
        };
        while cursor.index < index {
            let next = self.decode_at(cursor.index + 1, &cursor.entry.key)?;
            cursor = Cursor {
                index: cursor.index + 1,
                entry: next,
            };
        }
        Ok(&self.cursor.insert(cursor).entry)
    }

    /// Decode every entry in order.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        let mut out: Vec<Entry> = Vec::with_capacity(self.entry_count());
        for index in 0..self.entry_count() {
            let prev = out.last().map(|e| e.key.as_slice()).unwrap_or(&[]);
            let entry = self.decode_at(index, prev)?;
            out.push(entry);
        }
        Ok(out)
    }

    /// Linear scan for `key`.
    pub fn search(&mut self, key: &[u8]) -> Result<Search> {
        let mut child = self.low_child();
        let mut prev = Vec::new();
        let mut found = None;

        for index in 0..self.entry_count() {
            let entry = self.decode_at(index, &prev)?;
            match key.cmp(entry.key.as_slice()) {
                Ordering::Equal => {
                    found = Some(Search::Found {
                        position: index,
                        entry: entry.clone(),
                    });
                    self.cursor = Some(Cursor { index, entry });
                    break;
                }
                Ordering::Less => {
                    found = Some(Search::NotFound { position: index, child });
                    self.cursor = Some(Cursor { index, entry });
                    break;
                }
                Ordering::Greater => {
                    child = entry.child;
                    prev = entry.key;
                }
            }
        }

        Ok(found.unwrap_or(Search::NotFound {
            position: self.entry_count(),
            child,
        }))
    }

    /// Verify the space accounting, the key order and the child pointers.
    pub fn check_integrity(&self) -> Result<()> {
        let entries = self.entries()?;
        let mut computed = 0usize;
        let mut prev: &[u8] = &[];
        for e in &entries {
            computed += encoded_len(e, common_prefix_len(prev, &e.key));
            prev = e.key.as_slice();
        }
        if MAX_KEY_SPACE - computed != self.free_space() {
            return Err(Error::Corruption(format!(
                "free space calculated {} but reported {}",
                MAX_KEY_SPACE - computed,
                self.free_space()
            )));
        }

        for pair in entries.windows(2) {
            if pair[0].key >= pair[1].key {
                return Err(Error::Corruption(format!(
                    "keys out of order: '{}' before '{}'",
                    String::from_utf8_lossy(&pair[0].key),
                    String::from_utf8_lossy(&pair[1].key)
                )));
            }
        }

        if self.is_leaf() {
            if self.low_child().is_valid() || entries.iter().any(|e| e.child.is_valid()) {
                return Err(Error::Corruption("leaf node carries child pointers".to_string()));
            }
        } else if !self.low_child().is_valid() || entries.iter().any(|e| !e.child.is_valid()) {
            return Err(Error::Corruption("branch node has an empty child pointer".to_string()));
        }
        Ok(())
    }

    /// Human-readable listing of the node, with computed and declared free
    /// space.
    pub fn dump<W: Write>(&self, page_id: PageId, out: &mut W) -> Result<()> {
        writeln!(
            out,
            "{} {:?} entries={} low_child={}",
            page_id,
            self.kind(),
            self.entry_count(),
            self.low_child()
        )?;
        let mut used = 0usize;
        for (index, entry) in self.entries()?.iter().enumerate() {
            used += self.entry_len(index);
            writeln!(out, "    #{index} {entry}")?;
        }
        writeln!(
            out,
            "    free space calculated={} reported={}",
            MAX_KEY_SPACE - used,
            self.free_space()
        )?;
        Ok(())
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    fn key_space(&self) -> &[u8] {
        &self.buf.as_ref()[NODE_HEADER_SIZE..PAGE_SIZE]
    }

    fn entry_end(&self, index: usize) -> usize {
        self.offsets
            .get(index + 1)
            .copied()
            .unwrap_or_else(|| self.used_space())
    }

    fn decode_at(&self, index: usize, prev_key: &[u8]) -> Result<Entry> {
        let bytes = &self.key_space()[self.offsets[index]..self.entry_end(index)];
        entry::decode(bytes, prev_key).map(|(entry, _)| entry)
    }

    /// Key of entry `index`, cloned out of the cursor.
    fn key_at(&mut self, index: usize) -> Result<Vec<u8>> {
        Ok(self.entry_at(index)?.key.clone())
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Node<B> {
    /// Format `buf` as an empty node of the given kind.
    pub fn init(mut buf: B, kind: NodeKind) -> Self {
        let header = NodeHeader::new(kind);
        let page = buf.as_mut();
        page[..PAGE_SIZE].fill(0);
        header.write_to(page);

        Self {
            buf,
            header,
            offsets: Vec::new(),
            cursor: None,
            key_limit: MAX_KEY_COUNT,
        }
    }

    pub fn set_low_child(&mut self, child: PageId) {
        self.header.low_child = child;
        self.write_header();
    }

    /// Add `entry` after the last one.
    ///
    /// # Errors
    /// - `Error::KeyTooLong` for keys longer than the entry format allows
    /// - `Error::NodeFull` when the entry does not fit or the key limit is
    ///   reached
    pub fn append(&mut self, entry: &Entry) -> Result<()> {
        entry.check_key()?;
        let count = self.entry_count();
        if count >= self.key_limit {
            return Err(Error::NodeFull);
        }

        let prefix_len = match count {
            0 => 0,
            _ => common_prefix_len(&self.entry_at(count - 1)?.key, &entry.key),
        };
        let len = encoded_len(entry, prefix_len);
        if len > self.free_space() {
            return Err(Error::NodeFull);
        }

        let at = self.used_space();
        let written = encode_into(entry, prefix_len, &mut self.key_space_mut()[at..]);
        debug_assert_eq!(written, len);

        self.offsets.push(at);
        self.header.key_count += 1;
        self.header.free_space -= len as u16;
        self.cursor = Some(Cursor {
            index: count,
            entry: entry.clone(),
        });
        self.write_header();
        Ok(())
    }

    /// Insert `entry` so that it becomes entry `position`.
    ///
    /// The entry that used to be at `position` is re-encoded against the
    /// new key and everything after it shifts by exactly the change in
    /// length. The caller is responsible for `position` keeping the keys
    /// sorted.
    ///
    /// # Errors
    /// As [`Node::append`].
    pub fn insert_before(&mut self, position: usize, entry: &Entry) -> Result<()> {
        let count = self.entry_count();
        if position >= count {
            return self.append(entry);
        }
        entry.check_key()?;
        if count >= self.key_limit {
            return Err(Error::NodeFull);
        }

        let prefix_len = match position {
            0 => 0,
            _ => common_prefix_len(&self.key_at(position - 1)?, &entry.key),
        };
        let next = self.entry_at(position)?.clone();
        let next_prefix = common_prefix_len(&entry.key, &next.key);

        let new_len = encoded_len(entry, prefix_len);
        let next_old_len = self.entry_len(position);
        let next_new_len = encoded_len(&next, next_prefix);
        let delta = (new_len + next_new_len) as isize - next_old_len as isize;
        if delta > self.free_space() as isize {
            return Err(Error::NodeFull);
        }

        let start = self.offsets[position];
        let tail_from = start + next_old_len;
        let tail_to = start + new_len + next_new_len;
        let used = self.used_space();
        let space = self.key_space_mut();
        space.copy_within(tail_from..used, tail_to);
        let new_used = (used as isize + delta) as usize;
        if new_used < used {
            space[new_used..used].fill(0);
        }
        encode_into(entry, prefix_len, &mut space[start..]);
        encode_into(&next, next_prefix, &mut space[start + new_len..]);

        self.offsets.insert(position, start);
        self.offsets[position + 1] = start + new_len;
        for offset in &mut self.offsets[position + 2..] {
            *offset = (*offset as isize + delta) as usize;
        }
        self.header.key_count += 1;
        self.header.free_space = (self.free_space() as isize - delta) as u16;
        self.cursor = None;
        self.write_header();
        Ok(())
    }

    /// Drop every entry from `keep` onwards, zeroing the bytes they used.
    pub fn truncate(&mut self, keep: usize) {
        if keep >= self.entry_count() {
            return;
        }
        let cut = self.offsets[keep];
        let used = self.used_space();
        self.key_space_mut()[cut..used].fill(0);

        self.offsets.truncate(keep);
        self.header.key_count = keep as u16;
        self.header.free_space = (MAX_KEY_SPACE - cut) as u16;
        if self.cursor.as_ref().is_some_and(|c| c.index >= keep) {
            self.cursor = None;
        }
        self.write_header();
    }

    /// Copy `count` already-encoded entries to the end of the node.
    ///
    /// The first copied entry must be front-coded against the current
    /// last entry; no re-encoding happens.
    pub fn extend_raw(&mut self, bytes: &[u8], count: usize) -> Result<()> {
        if bytes.len() > self.free_space() || self.entry_count() + count > MAX_KEY_COUNT {
            return Err(Error::NodeFull);
        }
        let base = self.used_space();
        let mut offsets = Vec::with_capacity(count);
        let mut at = 0usize;
        while at < bytes.len() {
            offsets.push(base + at);
            at += Prologue::read(&bytes[at..])?.entry_len();
        }
        if offsets.len() != count || at != bytes.len() {
            return Err(Error::Corruption(format!(
                "raw copy of {} bytes holds {} entries, expected {}",
                bytes.len(),
                offsets.len(),
                count
            )));
        }

        self.key_space_mut()[base..base + bytes.len()].copy_from_slice(bytes);
        self.offsets.extend(offsets);
        self.header.key_count += count as u16;
        self.header.free_space -= bytes.len() as u16;
        self.write_header();
        Ok(())
    }

    /// Move the upper half of this node into the empty node `right`.
    ///
    /// The median is the first entry at which the running total of entry
    /// lengths reaches half the key space; when that never happens (the
    /// node is full by count, not bytes) it is the middle entry. It is
    /// kept at least three entries from the end so `right` gets two or
    /// more. Entries after the median move to `right`, the first of them
    /// re-encoded with its full key, and `right`'s low child becomes the
    /// median's child. The median is removed and returned.
    ///
    /// # Errors
    /// `Error::SplitFailed` for nodes with fewer than 3 entries.
    pub fn split_into<R>(&mut self, right: &mut Node<R>) -> Result<Entry>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let count = self.entry_count();
        if count < 3 {
            return Err(Error::SplitFailed { entries: count });
        }

        let half = MAX_KEY_SPACE / 2;
        let mut consumed = 0usize;
        let mut median = None;
        for index in 0..count {
            consumed += self.entry_len(index);
            if consumed >= half {
                median = Some(index);
                break;
            }
        }
        let m = median.unwrap_or((count + 1) / 2 - 1).min(count - 3);

        let median_entry = self.entry_at(m)?.clone();
        let first_right = self.entry_at(m + 1)?.clone();
        right.append(&first_right)?;
        let tail = self.entry_end(m + 1)..self.used_space();
        right.extend_raw(&self.key_space()[tail], count - m - 2)?;
        right.set_low_child(median_entry.child);

        self.truncate(m);
        Ok(median_entry)
    }

    fn key_space_mut(&mut self) -> &mut [u8] {
        &mut self.buf.as_mut()[NODE_HEADER_SIZE..PAGE_SIZE]
    }

    fn write_header(&mut self) {
        let header = self.header;
        header.write_to(self.buf.as_mut());
    }
}
