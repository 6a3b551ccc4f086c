//! Bottom-up bulk building from sorted records.
//!
//! # Algorithm
//! Records are appended to leaf pages in order. When a record does not
//! fit, the full page is released and a new one started; the record is
//! not stored on this level at all. Instead it is written to a spill file
//! with its child pointing at the new page, and the new page's low child
//! takes the record's old child (nothing, on the leaf level).
//!
//! The spill file is then the input for the level above, whose first page
//! gets the first page of the level below as its low child. Levels are
//! built until one produces no spill; its single page is the root.
//!
//! ```text
//!   level 2:            [ k ]
//!                      /     \
//!   level 1:   [ e . . ]     [ o . . ]      e, o, k were spilled
//!             /   |          |    \
//!   level 0: [a b c d] [f ...] [...] [p ...]
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::buffer::{BufferPoolManager, PageWriteGuard};
use crate::common::config::BTreeOptions;
use crate::common::{Error, PageId, Result};
use crate::storage::page::NodeKind;
use crate::storage::DiskManager;

use super::entry::Entry;
use super::meta::TreeMeta;
use super::node::Node;
use super::tree::BTree;

impl BTree {
    /// Build a new tree file at `path` from records in strictly ascending
    /// key order. Any existing file is truncated.
    ///
    /// Child pointers on the input records are ignored. An empty input
    /// produces an empty tree, the same as [`BTree::create`].
    ///
    /// # Errors
    /// - `Error::UnsortedInput` at the first record whose key is not
    ///   greater than its predecessor's
    /// - `Error::KeyTooLong` for keys over 254 bytes
    /// - I/O errors from the tree file or the spill files
    ///
    /// # Example
    /// ```no_run
    /// use yase_btree::{BTree, BTreeOptions, Entry};
    ///
    /// let words = ["apple", "banana", "cherry"];
    /// let records = words
    ///     .iter()
    ///     .enumerate()
    ///     .map(|(i, w)| Entry::new(w.as_bytes(), i as u64 * 512, 1));
    /// let tree = BTree::build_from_sorted("fruit.btree", records, BTreeOptions::default())?;
    /// assert_eq!(tree.iter().count(), 3);
    /// # Ok::<(), yase_btree::Error>(())
    /// ```
    pub fn build_from_sorted<P, I>(path: P, records: I, options: BTreeOptions) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = Entry>,
    {
        options.validate()?;
        let pool = BufferPoolManager::new(options.pool_size, DiskManager::create(path)?);
        drop(pool.new_page()?);

        let leaves = LevelBuilder::start(&pool, &options, NodeKind::Leaf, PageId::INVALID)?;
        let mut level = leaves.build(SortedRecords::new(records.into_iter()))?;
        let total = level.records;
        let mut height = 0u32;

        loop {
            debug!(
                level = height,
                first_page = %level.first_page,
                pages = level.pages,
                records = level.records,
                "btree.bulk_load.level"
            );
            height += 1;
            let Some(spill) = level.spill.take() else {
                break;
            };
            let branches = LevelBuilder::start(&pool, &options, NodeKind::Branch, level.first_page)?;
            level = branches.build(spill.into_reader()?)?;
        }

        let meta = TreeMeta {
            root: level.first_page,
            last_block: PageId::new(pool.disk_page_count()),
        };
        info!(
            records = total,
            height,
            root = %meta.root,
            last_block = %meta.last_block,
            "btree.bulk_load.complete"
        );

        let mut tree = Self::from_parts(pool, meta, options)?;
        tree.stats.keys_added = total;
        Ok(tree)
    }
}

/// Result of building one level.
struct Level {
    first_page: PageId,
    pages: u32,
    records: u64,
    spill: Option<SpillWriter>,
}

/// Fills the pages of one level, left to right.
struct LevelBuilder<'a> {
    pool: &'a BufferPoolManager,
    kind: NodeKind,
    key_limit: usize,
    current: Node<PageWriteGuard<'a>>,
    first_page: PageId,
    pages: u32,
    spill: Option<SpillWriter>,
}

impl<'a> LevelBuilder<'a> {
    fn start(
        pool: &'a BufferPoolManager,
        options: &BTreeOptions,
        kind: NodeKind,
        low_child: PageId,
    ) -> Result<Self> {
        let guard = pool.new_page()?;
        let first_page = guard.page_id();
        let mut current = Node::init(guard, kind).with_key_limit(options.max_key_count);
        current.set_low_child(low_child);

        Ok(Self {
            pool,
            kind,
            key_limit: options.max_key_count,
            current,
            first_page,
            pages: 1,
            spill: None,
        })
    }

    fn build<R>(mut self, records: R) -> Result<Level>
    where
        R: Iterator<Item = Result<Entry>>,
    {
        let mut pushed = 0u64;
        for record in records {
            self.push(record?)?;
            pushed += 1;
        }

        let spill = match self.spill {
            Some(mut spill) => {
                spill.flush()?;
                Some(spill)
            }
            None => None,
        };
        Ok(Level {
            first_page: self.first_page,
            pages: self.pages,
            records: pushed,
            spill,
        })
    }

    fn push(&mut self, record: Entry) -> Result<()> {
        match self.current.append(&record) {
            Ok(()) => return Ok(()),
            Err(Error::NodeFull) => {}
            Err(e) => return Err(e),
        }

        let guard = self.pool.new_page()?;
        let page_id = guard.page_id();
        let mut next = Node::init(guard, self.kind).with_key_limit(self.key_limit);
        next.set_low_child(record.child);
        self.current = next;
        self.pages += 1;

        let mut spill = match self.spill.take() {
            Some(spill) => spill,
            None => SpillWriter::new()?,
        };
        spill.write(&record.with_child(page_id))?;
        self.spill = Some(spill);
        Ok(())
    }
}

/// Checks order on the caller's records and strips their child pointers.
struct SortedRecords<I> {
    inner: I,
    prev: Option<Vec<u8>>,
    index: u64,
    failed: bool,
}

impl<I> SortedRecords<I> {
    fn new(inner: I) -> Self {
        Self {
            inner,
            prev: None,
            index: 0,
            failed: false,
        }
    }
}

impl<I: Iterator<Item = Entry>> Iterator for SortedRecords<I> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let record = self.inner.next()?.with_child(PageId::INVALID);
        let index = self.index;
        self.index += 1;

        if self.prev.as_ref().is_some_and(|prev| record.key <= *prev) {
            self.failed = true;
            return Some(Err(Error::UnsortedInput { index }));
        }
        self.prev = Some(record.key.clone());
        Some(Ok(record))
    }
}

/// Anonymous temporary file holding the records promoted out of a level.
///
/// Record layout: `[key len u8][key][value u64][doc count u64][child u32]`,
/// integers little-endian.
struct SpillWriter {
    out: BufWriter<File>,
    records: u64,
}

impl SpillWriter {
    fn new() -> Result<Self> {
        Ok(Self {
            out: BufWriter::new(tempfile::tempfile()?),
            records: 0,
        })
    }

    fn write(&mut self, entry: &Entry) -> Result<()> {
        entry.check_key()?;
        self.out.write_all(&[entry.key.len() as u8])?;
        self.out.write_all(&entry.key)?;
        self.out.write_all(&entry.value.to_le_bytes())?;
        self.out.write_all(&entry.doc_count.to_le_bytes())?;
        self.out.write_all(&entry.child.0.to_le_bytes())?;
        self.records += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn into_reader(self) -> Result<SpillReader> {
        let mut file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;
        Ok(SpillReader {
            input: BufReader::new(file),
            remaining: self.records,
        })
    }
}

struct SpillReader {
    input: BufReader<File>,
    remaining: u64,
}

impl SpillReader {
    fn read_record(&mut self) -> Result<Entry> {
        let mut len = [0u8; 1];
        self.input.read_exact(&mut len)?;
        let mut key = vec![0u8; usize::from(len[0])];
        self.input.read_exact(&mut key)?;

        let mut value = [0u8; 8];
        let mut doc_count = [0u8; 8];
        let mut child = [0u8; 4];
        self.input.read_exact(&mut value)?;
        self.input.read_exact(&mut doc_count)?;
        self.input.read_exact(&mut child)?;

        Ok(Entry::new(key, u64::from_le_bytes(value), u64::from_le_bytes(doc_count))
            .with_child(PageId::new(u32::from_le_bytes(child))))
    }
}

impl Iterator for SpillReader {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let record = self.read_record();
        if record.is_err() {
            self.remaining = 0;
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn records(n: u32) -> impl Iterator<Item = Entry> {
        (0..n).map(|i| Entry::new(format!("key{i:06}"), u64::from(i) * 10, u64::from(i % 7)))
    }

    #[test]
    fn test_empty_input_builds_empty_tree() {
        let dir = tempdir().unwrap();
        let tree =
            BTree::build_from_sorted(dir.path().join("empty.btree"), records(0), BTreeOptions::default())
                .unwrap();

        assert_eq!(tree.root(), PageId::new(2));
        assert_eq!(tree.last_block(), PageId::new(2));
        assert_eq!(tree.iter().count(), 0);
        assert_eq!(tree.check_integrity().unwrap().depth, 1);
    }

    #[test]
    fn test_single_page_input() {
        let dir = tempdir().unwrap();
        let tree =
            BTree::build_from_sorted(dir.path().join("one.btree"), records(100), BTreeOptions::default())
                .unwrap();

        let report = tree.check_integrity().unwrap();
        assert_eq!((report.leaves, report.branches, report.entries), (1, 0, 100));
        assert_eq!(tree.stats().keys_added, 100);
        assert_eq!(tree.get(b"key000042").unwrap().unwrap().value, 420);
    }

    #[test]
    fn test_promoted_records_live_in_branches() {
        let dir = tempdir().unwrap();
        let options = BTreeOptions::default().with_max_key_count(4);
        let tree = BTree::build_from_sorted(dir.path().join("small.btree"), records(9), options).unwrap();

        // keys 0-3 fill page 2, key 4 moves up and keys 5-8 land on page 3
        let mut root = tree.read_node(tree.root()).unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.entry_count(), 1);
        assert_eq!(root.low_child(), PageId::new(2));
        let promoted = root.entry_at(0).unwrap().clone();
        drop(root);
        assert_eq!(promoted.key, b"key000004");
        assert_eq!(promoted.child, PageId::new(3));

        let report = tree.check_integrity().unwrap();
        assert_eq!((report.leaves, report.branches, report.entries, report.depth), (2, 1, 9, 2));
    }

    #[test]
    fn test_multi_level_build_iterates_in_order() {
        let dir = tempdir().unwrap();
        let options = BTreeOptions::default().with_max_key_count(5);
        let tree = BTree::build_from_sorted(dir.path().join("deep.btree"), records(500), options).unwrap();

        let report = tree.check_integrity().unwrap();
        assert_eq!(report.entries, 500);
        assert!(report.depth >= 4);

        let keys: Vec<Entry> = tree.iter().map(|e| e.unwrap()).collect();
        let expected: Vec<Entry> = records(500).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_rejects_unsorted_input() {
        let dir = tempdir().unwrap();
        let input = vec![
            Entry::new("a", 1, 1),
            Entry::new("c", 1, 1),
            Entry::new("b", 1, 1),
        ];
        let result = BTree::build_from_sorted(dir.path().join("bad.btree"), input, BTreeOptions::default());
        assert!(matches!(result, Err(Error::UnsortedInput { index: 2 })));
    }

    #[test]
    fn test_rejects_duplicate_input() {
        let dir = tempdir().unwrap();
        let input = vec![Entry::new("a", 1, 1), Entry::new("a", 2, 2)];
        let result = BTree::build_from_sorted(dir.path().join("dup.btree"), input, BTreeOptions::default());
        assert!(matches!(result, Err(Error::UnsortedInput { index: 1 })));
    }

    #[test]
    fn test_input_children_are_ignored() {
        let dir = tempdir().unwrap();
        let input = vec![Entry::new("a", 1, 1).with_child(PageId::new(99))];
        let tree = BTree::build_from_sorted(dir.path().join("child.btree"), input, BTreeOptions::default())
            .unwrap();
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_spill_file_round_trip() {
        let mut spill = SpillWriter::new().unwrap();
        let written = vec![
            Entry::new("", 0, 0).with_child(PageId::new(2)),
            Entry::new(vec![b'z'; 254], u64::MAX, 17).with_child(PageId::new(u32::MAX)),
        ];
        for entry in &written {
            spill.write(entry).unwrap();
        }
        let read: Vec<Entry> = spill.into_reader().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(read, written);
    }
}
