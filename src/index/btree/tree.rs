//! BTree - the tree handle, lookup and maintenance operations.
//!
//! Insertion lives in [`insert`](super::insert), ordered iteration in
//! [`iter`](super::iter) and bottom-up building in [`bulk`](super::bulk).

use std::fmt;
use std::io::Write;
use std::path::Path;

use tracing::{debug, error};

use crate::buffer::{BufferPoolManager, PageReadGuard};
use crate::common::config::BTreeOptions;
use crate::common::{Error, PageId, Result};
use crate::storage::page::NodeKind;
use crate::storage::{DiskManager, OpenMode};

use super::entry::Entry;
use super::meta::{TreeMeta, HEADER_PAGE};
use super::node::{Node, Search};

/// Counters kept by a tree handle since it was opened.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub keys_added: u64,
    pub duplicates_ignored: u64,
    pub nodes_split: u64,
    pub roots_created: u64,
}

/// Shape of a tree as seen by [`BTree::check_integrity`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityReport {
    pub leaves: u32,
    pub branches: u32,
    /// Entries across all nodes; every key is stored exactly once.
    pub entries: u64,
    /// Levels from root to leaves, 1 for a lone leaf root.
    pub depth: u32,
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries in {} leaves and {} branches, depth {}",
            self.entries, self.leaves, self.branches, self.depth
        )
    }
}

/// A paged B-tree over one file.
///
/// Keys are byte strings of at most 254 bytes, ordered bytewise. Each key
/// carries a posting offset (`value`) and a document count. A key lives in
/// exactly one node, leaf or branch.
///
/// The header page stays pinned while the handle is open. Call
/// [`BTree::close`] to flush and surface I/O errors; dropping the handle
/// flushes too but can only log failures.
///
/// # Example
/// ```no_run
/// use yase_btree::{BTree, BTreeOptions};
///
/// let mut tree = BTree::create("words.btree", BTreeOptions::default())?;
/// tree.insert(b"rust", 4096, 12)?;
///
/// let entry = tree.get(b"rust")?.expect("just inserted");
/// assert_eq!(entry.value, 4096);
/// tree.close()?;
/// # Ok::<(), yase_btree::Error>(())
/// ```
pub struct BTree {
    pub(super) pool: BufferPoolManager,
    pub(super) meta: TreeMeta,
    pub(super) options: BTreeOptions,
    pub(super) stats: TreeStats,
    header_pinned: bool,
}

impl BTree {
    /// Create an empty tree: header page 1 and an empty leaf root on page 2.
    pub fn create<P: AsRef<Path>>(path: P, options: BTreeOptions) -> Result<Self> {
        options.validate()?;
        let pool = BufferPoolManager::new(options.pool_size, DiskManager::create(path)?);

        drop(pool.new_page()?);
        let root = {
            let guard = pool.new_page()?;
            let page_id = guard.page_id();
            Node::init(guard, NodeKind::Leaf);
            page_id
        };

        let meta = TreeMeta {
            root,
            last_block: root,
        };
        Self::from_parts(pool, meta, options)
    }

    /// Open an existing tree file, or create one with [`OpenMode::Create`].
    ///
    /// # Errors
    /// `Error::Corruption` if the header checksum fails or the header does
    /// not match the file size.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, options: BTreeOptions) -> Result<Self> {
        if mode == OpenMode::Create {
            return Self::create(path, options);
        }
        options.validate()?;
        let disk = DiskManager::open(path, mode)?;
        let page_count = disk.page_count();
        let pool = BufferPoolManager::new(options.pool_size, disk);

        let meta = {
            let guard = pool.fetch_page_read(HEADER_PAGE)?;
            TreeMeta::read_from(guard.as_ref())?
        };
        meta.validate(page_count)?;

        pool.pin_page(HEADER_PAGE)?;
        debug!(root = %meta.root, last_block = %meta.last_block, ?mode, "btree.open");

        Ok(Self {
            pool,
            meta,
            options,
            stats: TreeStats::default(),
            header_pinned: true,
        })
    }

    /// Wrap a freshly built file, writing its metadata to the header page.
    pub(super) fn from_parts(
        pool: BufferPoolManager,
        meta: TreeMeta,
        options: BTreeOptions,
    ) -> Result<Self> {
        pool.pin_page(HEADER_PAGE)?;
        let tree = Self {
            pool,
            meta,
            options,
            stats: TreeStats::default(),
            header_pinned: true,
        };
        tree.write_meta()?;
        debug!(root = %meta.root, last_block = %meta.last_block, "btree.open");
        Ok(tree)
    }

    /// Unpin the header page, flush every dirty page and sync the file.
    pub fn close(mut self) -> Result<()> {
        self.release_header()?;
        self.pool.close()
    }

    /// Point lookup. The returned entry carries no child pointer.
    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        let mut page_id = self.meta.root;
        for _ in 0..self.max_depth() {
            let mut node = self.read_node(page_id)?;
            match node.search(key)? {
                Search::Found { entry, .. } => return Ok(Some(entry.detached())),
                Search::NotFound { .. } if node.is_leaf() => return Ok(None),
                Search::NotFound { child, .. } => page_id = self.check_child(page_id, child)?,
            }
        }
        Err(self.too_deep())
    }

    pub fn root(&self) -> PageId {
        self.meta.root
    }

    pub fn last_block(&self) -> PageId {
        self.meta.last_block
    }

    pub fn meta(&self) -> TreeMeta {
        self.meta
    }

    pub fn stats(&self) -> TreeStats {
        self.stats
    }

    pub fn options(&self) -> BTreeOptions {
        self.options
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.pool
    }

    /// Walk every node reachable from the root and verify it.
    ///
    /// Checks each node's space accounting and key order, that all leaves
    /// sit at the same depth, that keys are ordered across nodes, and that
    /// every page in the file is reached exactly once.
    pub fn check_integrity(&self) -> Result<IntegrityReport> {
        let mut report = IntegrityReport::default();
        let mut leaf_depth = None;
        let mut seen = vec![false; self.meta.last_block.0 as usize + 1];
        // (page, depth, lower bound, upper bound)
        let mut stack: Vec<(PageId, u32, Option<Vec<u8>>, Option<Vec<u8>>)> =
            vec![(self.meta.root, 1, None, None)];

        while let Some((page_id, depth, low, high)) = stack.pop() {
            let slot = seen
                .get_mut(page_id.0 as usize)
                .filter(|_| page_id.0 > HEADER_PAGE.0)
                .ok_or_else(|| Error::Corruption(format!("child pointer to {page_id} is out of range")))?;
            if std::mem::replace(slot, true) {
                return Err(Error::Corruption(format!("{page_id} is reachable twice")));
            }

            let node = self.read_node(page_id)?;
            node.check_integrity()
                .map_err(|e| Error::Corruption(format!("{page_id}: {e}")))?;
            let entries = node.entries()?;

            let out_of_bounds = entries.iter().any(|e| {
                low.as_ref().is_some_and(|l| e.key <= *l) || high.as_ref().is_some_and(|h| e.key >= *h)
            });
            if out_of_bounds {
                return Err(Error::Corruption(format!("{page_id} holds keys outside its parent's range")));
            }
            report.entries += entries.len() as u64;

            if node.is_leaf() {
                report.leaves += 1;
                if *leaf_depth.get_or_insert(depth) != depth {
                    return Err(Error::Corruption(format!("leaf {page_id} at depth {depth}")));
                }
                continue;
            }

            report.branches += 1;
            let first = entries.first().map(|e| e.key.clone()).or_else(|| high.clone());
            stack.push((node.low_child(), depth + 1, low, first));
            for (index, entry) in entries.iter().enumerate() {
                let upper = entries.get(index + 1).map(|e| e.key.clone()).or_else(|| high.clone());
                stack.push((entry.child, depth + 1, Some(entry.key.clone()), upper));
            }
        }

        let unreached = (HEADER_PAGE.0 + 1..=self.meta.last_block.0)
            .filter(|&p| !seen[p as usize])
            .count();
        if unreached > 0 {
            return Err(Error::Corruption(format!("{unreached} pages are not reachable from the root")));
        }

        report.depth = leaf_depth.unwrap_or(1);
        Ok(report)
    }

    /// Write a listing of every node page, in page order.
    pub fn dump<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "root={} last_block={}", self.meta.root, self.meta.last_block)?;
        for page in HEADER_PAGE.0 + 1..=self.meta.last_block.0 {
            self.read_node(PageId::new(page))?.dump(PageId::new(page), out)?;
        }
        Ok(())
    }

    pub(super) fn read_node(&self, page_id: PageId) -> Result<Node<PageReadGuard<'_>>> {
        Node::load(self.pool.fetch_page_read(page_id)?)
    }

    /// Persist `meta` to the pinned header page.
    pub(super) fn write_meta(&self) -> Result<()> {
        let mut guard = self.pool.fetch_page_write(HEADER_PAGE)?;
        self.meta.write_to(guard.as_mut());
        Ok(())
    }

    /// No root-to-leaf path can visit more pages than the file holds.
    pub(super) fn max_depth(&self) -> usize {
        self.meta.last_block.0 as usize
    }

    pub(super) fn too_deep(&self) -> Error {
        Error::Corruption(format!(
            "descent from {} visits more than {} pages",
            self.meta.root, self.meta.last_block.0
        ))
    }

    pub(super) fn check_child(&self, parent: PageId, child: PageId) -> Result<PageId> {
        if child.0 <= HEADER_PAGE.0 || child > self.meta.last_block {
            return Err(Error::Corruption(format!("{parent} points to invalid child {child}")));
        }
        Ok(child)
    }

    fn release_header(&mut self) -> Result<()> {
        if self.header_pinned {
            self.header_pinned = false;
            self.pool.unpin_page(HEADER_PAGE)?;
        }
        Ok(())
    }
}

impl Drop for BTree {
    fn drop(&mut self) {
        if let Err(e) = self.release_header() {
            error!(error = %e, "btree.drop.unpin_failed");
        }
    }
}

impl fmt::Debug for BTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BTree")
            .field("meta", &self.meta)
            .field("options", &self.options)
            .field("stats", &self.stats)
            .finish()
    }
}
