//! Ordered iteration.
//!
//! Keys live in branches as well as leaves, so an in-order walk has to
//! yield each branch entry between the subtree to its left and the subtree
//! named by its child pointer. [`TreeIter`] keeps the branch pages it still
//! owes entries for on an explicit stack of `(page, next entry)` pairs.
//! The current leaf is copied out of the pool and decoded one entry per
//! step through the node cursor. Branch pages are fetched and released
//! within a single step, so an iterator holds no pins between calls to
//! `next`.

use crate::buffer::PageReadGuard;
use crate::common::{Error, PageId, Result};

use super::entry::Entry;
use super::node::{Node, Search};
use super::tree::BTree;

/// Ascending iterator over the entries of a [`BTree`].
///
/// Created by [`BTree::iter`] and [`BTree::iter_from`]. Yields entries
/// without child pointers. After the first error the iterator is fused.
pub struct TreeIter<'a> {
    tree: &'a BTree,
    stack: Vec<(PageId, usize)>,
    leaf: Option<(Node<Vec<u8>>, usize)>,
    pending: Option<PageId>,
    deferred: Option<Error>,
    done: bool,
}

impl<'a> TreeIter<'a> {
    fn new(tree: &'a BTree) -> Self {
        Self {
            tree,
            stack: Vec::new(),
            leaf: None,
            pending: None,
            deferred: None,
            done: false,
        }
    }

    fn failed(tree: &'a BTree, error: Error) -> Self {
        Self {
            deferred: Some(error),
            ..Self::new(tree)
        }
    }

    /// Descend towards `start`, stacking every branch on the way together
    /// with the first of its entries that is not smaller than `start`.
    fn seek(&mut self, start: &[u8]) -> Result<()> {
        let mut page_id = self.tree.root();
        loop {
            self.check_depth()?;
            let mut node = self.tree.read_node(page_id)?;
            let is_leaf = node.is_leaf();
            match (node.search(start)?, is_leaf) {
                (Search::Found { position, .. }, true) | (Search::NotFound { position, .. }, true) => {
                    self.leaf = Some((Self::unpin(node)?, position));
                    return Ok(());
                }
                (Search::Found { position, .. }, false) => {
                    self.stack.push((page_id, position));
                    return Ok(());
                }
                (Search::NotFound { position, child }, false) => {
                    self.stack.push((page_id, position));
                    page_id = self.tree.check_child(page_id, child)?;
                }
            }
        }
    }

    /// Follow low children from `page_id` down to a leaf.
    fn descend_leftmost(&mut self, mut page_id: PageId) -> Result<()> {
        loop {
            self.check_depth()?;
            let node = self.tree.read_node(page_id)?;
            if node.is_leaf() {
                self.leaf = Some((Self::unpin(node)?, 0));
                return Ok(());
            }
            self.stack.push((page_id, 0));
            page_id = self.tree.check_child(page_id, node.low_child())?;
        }
    }

    /// Emit the next branch entry owed by the stack, queueing its subtree.
    fn next_from_stack(&mut self) -> Result<Option<Entry>> {
        while let Some((page_id, index)) = self.stack.pop() {
            let mut node = self.tree.read_node(page_id)?;
            if index >= node.entry_count() {
                continue;
            }
            let entry = node.entry_at(index)?.clone();
            self.stack.push((page_id, index + 1));
            self.pending = Some(self.tree.check_child(page_id, entry.child)?);
            return Ok(Some(entry.detached()));
        }
        Ok(None)
    }

    fn step(&mut self) -> Result<Option<Entry>> {
        if let Some(child) = self.pending.take() {
            self.descend_leftmost(child)?;
        }
        if let Some(entry) = self.next_in_leaf()? {
            return Ok(Some(entry));
        }
        self.next_from_stack()
    }

    fn check_depth(&self) -> Result<()> {
        if self.stack.len() >= self.tree.max_depth() {
            return Err(self.tree.too_deep());
        }
        Ok(())
    }

    fn next_in_leaf(&mut self) -> Result<Option<Entry>> {
        let Some((node, index)) = self.leaf.as_mut() else {
            return Ok(None);
        };
        if *index >= node.entry_count() {
            self.leaf = None;
            return Ok(None);
        }
        let entry = node.entry_at(*index)?.clone().detached();
        *index += 1;
        Ok(Some(entry))
    }

    /// Copy a leaf out of its frame so the page can be released.
    fn unpin(node: Node<PageReadGuard<'_>>) -> Result<Node<Vec<u8>>> {
        Node::load(node.into_inner().as_ref().to_vec())
    }
}

impl Iterator for TreeIter<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(e) = self.deferred.take() {
            self.done = true;
            return Some(Err(e));
        }
        match self.step() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for TreeIter<'_> {}

impl BTree {
    /// Every entry in ascending key order.
    pub fn iter(&self) -> TreeIter<'_> {
        let mut iter = TreeIter::new(self);
        if let Err(e) = iter.descend_leftmost(self.root()) {
            return TreeIter::failed(self, e);
        }
        iter
    }

    /// Entries with keys greater than or equal to `start`, ascending.
    pub fn iter_from(&self, start: &[u8]) -> TreeIter<'_> {
        let mut iter = TreeIter::new(self);
        if let Err(e) = iter.seek(start) {
            return TreeIter::failed(self, e);
        }
        iter
    }

    /// Call `visit(start, entry)` for entries from `start` onwards until
    /// it returns `false` or the tree is exhausted.
    ///
    /// Returns the number of entries passed to `visit`.
    ///
    /// # Example
    /// ```no_run
    /// # use yase_btree::{BTree, BTreeOptions};
    /// # fn main() -> yase_btree::Result<()> {
    /// let tree = BTree::create("terms.btree", BTreeOptions::default())?;
    /// let mut terms = Vec::new();
    /// tree.iterate(b"app", |start, entry| {
    ///     let more = entry.key.starts_with(start);
    ///     if more {
    ///         terms.push(entry.key.clone());
    ///     }
    ///     more
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn iterate<F>(&self, start: &[u8], mut visit: F) -> Result<usize>
    where
        F: FnMut(&[u8], &Entry) -> bool,
    {
        let mut visited = 0;
        for entry in self.iter_from(start) {
            let entry = entry?;
            visited += 1;
            if !visit(start, &entry) {
                break;
            }
        }
        Ok(visited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::BTreeOptions;
    use tempfile::tempdir;

    fn tree_with(dir: &tempfile::TempDir, key_limit: usize, keys: &[u32]) -> BTree {
        let options = BTreeOptions::default().with_max_key_count(key_limit);
        let mut tree = BTree::create(dir.path().join("iter.btree"), options).unwrap();
        for &k in keys {
            tree.insert(format!("{k:05}").as_bytes(), u64::from(k), 1).unwrap();
        }
        tree
    }

    fn keys(iter: TreeIter<'_>) -> Vec<String> {
        iter.map(|e| String::from_utf8(e.unwrap().key).unwrap()).collect()
    }

    #[test]
    fn test_empty_tree_yields_nothing() {
        let dir = tempdir().unwrap();
        let tree = tree_with(&dir, 4, &[]);
        assert_eq!(tree.iter().count(), 0);
        assert_eq!(tree.iter_from(b"anything").count(), 0);
        assert_eq!(tree.iterate(b"", |_, _| true).unwrap(), 0);
    }

    #[test]
    fn test_full_scan_is_sorted_across_levels() {
        let dir = tempdir().unwrap();
        let inserted: Vec<u32> = (0..200).map(|i| (i * 37) % 200).collect();
        let tree = tree_with(&dir, 4, &inserted);
        assert!(tree.check_integrity().unwrap().depth >= 3);

        let expected: Vec<String> = (0..200).map(|k| format!("{k:05}")).collect();
        assert_eq!(keys(tree.iter()), expected);
    }

    #[test]
    fn test_entries_come_back_detached() {
        let dir = tempdir().unwrap();
        let tree = tree_with(&dir, 4, &(0..50u32).collect::<Vec<_>>());
        for entry in tree.iter() {
            let entry = entry.unwrap();
            assert_eq!(entry.child, PageId::INVALID);
            assert_eq!(entry.key, format!("{:05}", entry.value).into_bytes());
        }
    }

    #[test]
    fn test_iter_from_every_start_point() {
        let dir = tempdir().unwrap();
        let even: Vec<u32> = (0..120).map(|i| i * 2).collect();
        let tree = tree_with(&dir, 5, &even);

        for start in 0..242u32 {
            let got = keys(tree.iter_from(format!("{start:05}").as_bytes()));
            let expected: Vec<String> =
                even.iter().filter(|&&k| k >= start).map(|k| format!("{k:05}")).collect();
            assert_eq!(got, expected, "start {start}");
        }
    }

    #[test]
    fn test_iterate_stops_when_visitor_declines() {
        let dir = tempdir().unwrap();
        let tree = tree_with(&dir, 4, &(0..100u32).collect::<Vec<_>>());

        let mut seen = Vec::new();
        let visited = tree
            .iterate(b"00010", |start, entry| {
                assert_eq!(start, b"00010");
                seen.push(entry.value);
                entry.value < 14
            })
            .unwrap();

        assert_eq!(visited, 5);
        assert_eq!(seen, vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_walks_a_full_leaf_from_the_middle() {
        let dir = tempdir().unwrap();
        let tree = tree_with(&dir, 1000, &(0..900u32).rev().collect::<Vec<_>>());
        assert_eq!(tree.check_integrity().unwrap().depth, 1);

        let got = keys(tree.iter_from(b"00450"));
        let expected: Vec<String> = (450..900).map(|k| format!("{k:05}")).collect();
        assert_eq!(got, expected);
        assert_eq!(tree.iter_from(b"00899a").count(), 0);
    }

    #[test]
    fn test_iterator_holds_no_pins_between_steps() {
        let dir = tempdir().unwrap();
        let tree = tree_with(&dir, 4, &(0..60u32).collect::<Vec<_>>());
        let pool = tree.buffer_pool();

        let mut iter = tree.iter();
        for _ in 0..30 {
            iter.next().unwrap().unwrap();
            for page in 2..=tree.last_block().0 {
                assert_eq!(pool.pin_count(PageId::new(page)).unwrap_or(0), 0);
            }
        }
    }
}
