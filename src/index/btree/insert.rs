//! Single-key insertion with node splitting.
//!
//! # Algorithm
//! 1. Descend from the root to the leaf that should hold the key,
//!    remembering every branch page on the way. A match at any level means
//!    the key is already present and nothing changes.
//! 2. Insert into the leaf. If it has no room, split it: the upper half
//!    moves to a new sibling, the pending key goes to whichever half owns
//!    its range, and the median entry becomes the pending key for the
//!    parent, pointing at the new sibling.
//! 3. Repeat with the parent popped from the path. Splitting the root
//!    grows the tree by one level with a fresh branch root whose low child
//!    is the old root.

use tracing::{debug, trace};

use crate::common::config::MAX_KEY_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::NodeKind;

use super::entry::Entry;
use super::node::{Node, Search};
use super::tree::BTree;

impl BTree {
    /// Insert `key` with its posting offset and document count.
    ///
    /// Returns `Ok(false)`, leaving the tree untouched, if the key is
    /// already present.
    ///
    /// # Errors
    /// - `Error::KeyTooLong` for keys over 254 bytes
    /// - `Error::ReadOnly` if the tree was opened read-only
    /// - I/O, buffer pool and corruption errors from the pages involved
    pub fn insert(&mut self, key: &[u8], value: u64, doc_count: u64) -> Result<bool> {
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_SIZE,
            });
        }
        if self.pool.is_read_only() {
            return Err(Error::ReadOnly);
        }

        let Some((leaf, mut path)) = self.find_leaf(key)? else {
            self.stats.duplicates_ignored += 1;
            trace!(key = %String::from_utf8_lossy(key), "btree.insert.duplicate");
            return Ok(false);
        };

        let mut pending = Entry::new(key, value, doc_count);
        let mut target = leaf;
        loop {
            let Some((median, right)) = self.insert_or_split(target, &pending)? else {
                break;
            };

            pending = median.with_child(right);
            match path.pop() {
                Some(parent) => {
                    self.write_meta()?;
                    target = parent;
                }
                None => {
                    self.grow_root(target, &pending)?;
                    break;
                }
            }
        }

        self.stats.keys_added += 1;
        Ok(true)
    }

    /// Root-to-leaf descent for `key`. Returns the leaf and the branch
    /// pages above it, or `None` when the key is found on the way.
    fn find_leaf(&self, key: &[u8]) -> Result<Option<(PageId, Vec<PageId>)>> {
        let mut path = Vec::new();
        let mut page_id = self.meta.root;
        loop {
            if path.len() >= self.max_depth() {
                return Err(self.too_deep());
            }
            let mut node = self.read_node(page_id)?;
            match node.search(key)? {
                Search::Found { .. } => return Ok(None),
                Search::NotFound { .. } if node.is_leaf() => return Ok(Some((page_id, path))),
                Search::NotFound { child, .. } => {
                    path.push(page_id);
                    page_id = self.check_child(page_id, child)?;
                }
            }
        }
    }

    /// Put `pending` into page `target`, splitting it when full.
    ///
    /// On a split, returns the median to push up and the new right page.
    fn insert_or_split(&mut self, target: PageId, pending: &Entry) -> Result<Option<(Entry, PageId)>> {
        let key_limit = self.options.max_key_count;
        let mut left = Node::load(self.pool.fetch_page_write(target)?)?.with_key_limit(key_limit);

        let position = position_for(&mut left, &pending.key)?;
        match left.insert_before(position, pending) {
            Ok(()) => return Ok(None),
            Err(Error::NodeFull) => {}
            Err(e) => return Err(e),
        }

        let right_guard = self.pool.new_page()?;
        let right_id = right_guard.page_id();
        let mut right = Node::init(right_guard, left.kind()).with_key_limit(key_limit);
        let median = left.split_into(&mut right)?;

        self.meta.last_block = right_id;
        self.stats.nodes_split += 1;
        debug!(
            left = %target,
            right = %right_id,
            left_entries = left.entry_count(),
            right_entries = right.entry_count(),
            "btree.split"
        );

        let owner = if pending.key < median.key { &mut left } else { &mut right };
        let position = position_for(owner, &pending.key)?;
        owner.insert_before(position, pending)?;

        Ok(Some((median, right_id)))
    }

    /// Replace the root after it split: the new root holds only `median`,
    /// with the old root as its low child.
    fn grow_root(&mut self, old_root: PageId, median: &Entry) -> Result<()> {
        let guard = self.pool.new_page()?;
        let root_id = guard.page_id();
        let mut root = Node::init(guard, NodeKind::Branch);
        root.set_low_child(old_root);
        root.append(median)?;
        drop(root);

        self.meta.root = root_id;
        self.meta.last_block = root_id;
        self.stats.roots_created += 1;
        debug!(root = %root_id, low_child = %old_root, "btree.new_root");
        self.write_meta()
    }
}

/// Index at which `key` belongs in `node`.
fn position_for<B: AsRef<[u8]>>(node: &mut Node<B>, key: &[u8]) -> Result<usize> {
    match node.search(key)? {
        Search::NotFound { position, .. } => Ok(position),
        Search::Found { position, .. } => Err(Error::Corruption(format!(
            "key '{}' appeared at entry {} during insert",
            String::from_utf8_lossy(key),
            position
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::BTreeOptions;
    use tempfile::tempdir;

    fn small_tree(dir: &tempfile::TempDir, key_limit: usize) -> BTree {
        let options = BTreeOptions::default().with_max_key_count(key_limit);
        BTree::create(dir.path().join("insert.btree"), options).unwrap()
    }

    #[test]
    fn test_insert_then_get() {
        let dir = tempdir().unwrap();
        let mut tree = small_tree(&dir, 1636);

        assert!(tree.insert(b"beta", 20, 2).unwrap());
        assert!(tree.insert(b"alpha", 10, 1).unwrap());
        assert!(tree.insert(b"gamma", 30, 300).unwrap());

        let gamma = tree.get(b"gamma").unwrap().unwrap();
        assert_eq!((gamma.value, gamma.doc_count), (30, 300));
        assert_eq!(tree.get(b"delta").unwrap(), None);
        assert_eq!(tree.stats().keys_added, 3);
    }

    #[test]
    fn test_duplicate_is_ignored() {
        let dir = tempdir().unwrap();
        let mut tree = small_tree(&dir, 1636);

        assert!(tree.insert(b"same", 1, 1).unwrap());
        assert!(!tree.insert(b"same", 99, 99).unwrap());

        assert_eq!(tree.get(b"same").unwrap().unwrap().value, 1);
        assert_eq!(tree.stats().duplicates_ignored, 1);
        assert_eq!(tree.stats().keys_added, 1);
    }

    #[test]
    fn test_root_split_creates_branch() {
        let dir = tempdir().unwrap();
        let mut tree = small_tree(&dir, 4);

        for key in ["a", "b", "c", "d", "e"] {
            assert!(tree.insert(key.as_bytes(), 1, 1).unwrap());
        }

        let stats = tree.stats();
        assert_eq!(stats.nodes_split, 1);
        assert_eq!(stats.roots_created, 1);
        // header, old leaf root, right sibling, new root
        assert_eq!(tree.root(), PageId::new(4));
        assert_eq!(tree.last_block(), PageId::new(4));

        let mut root = tree.read_node(tree.root()).unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.entry_count(), 1);
        assert_eq!(root.low_child(), PageId::new(2));
        assert_eq!(root.entry_at(0).unwrap().child, PageId::new(3));
        drop(root);

        let report = tree.check_integrity().unwrap();
        assert_eq!(report.entries, 5);
        assert_eq!(report.depth, 2);
    }

    #[test]
    fn test_duplicate_of_branch_key_is_ignored() {
        let dir = tempdir().unwrap();
        let mut tree = small_tree(&dir, 4);
        for key in ["a", "b", "c", "d", "e"] {
            tree.insert(key.as_bytes(), 1, 1).unwrap();
        }

        let mut root = tree.read_node(tree.root()).unwrap();
        let median = root.entry_at(0).unwrap().key.clone();
        drop(root);

        assert!(!tree.insert(&median, 5, 5).unwrap());
        assert!(tree.get(&median).unwrap().is_some());
    }

    #[test]
    fn test_many_splits_keep_tree_valid() {
        let dir = tempdir().unwrap();
        let mut tree = small_tree(&dir, 5);

        // Interleave ascending and descending halves to split on both sides.
        for i in 0..300u32 {
            let k = if i % 2 == 0 { i } else { 1000 - i };
            assert!(tree.insert(format!("{k:06}").as_bytes(), u64::from(k), 1).unwrap());
        }

        let report = tree.check_integrity().unwrap();
        assert_eq!(report.entries, 300);
        assert!(report.depth >= 4);
        assert_eq!(
            tree.stats().nodes_split,
            u64::from(tree.last_block().0) - 2 - tree.stats().roots_created
        );
        for i in 0..300u32 {
            let k = if i % 2 == 0 { i } else { 1000 - i };
            assert_eq!(tree.get(format!("{k:06}").as_bytes()).unwrap().unwrap().value, u64::from(k));
        }
    }

    #[test]
    fn test_key_too_long() {
        let dir = tempdir().unwrap();
        let mut tree = small_tree(&dir, 1636);
        assert!(matches!(
            tree.insert(&[b'x'; MAX_KEY_SIZE + 1], 0, 0),
            Err(Error::KeyTooLong { .. })
        ));
        assert!(tree.insert(&[b'x'; MAX_KEY_SIZE], 0, 0).unwrap());
    }
}
