//! Ordered, indexable view over the page tree.
//!
//! Every branch caches the number of leaves beneath it in `/Count`. Indexed
//! access descends from the root and skips whole subtrees by their count;
//! insertion and removal splice one `/Kids` entry and then adjust the count of
//! every ancestor by one. Counts are never recomputed lazily on read.
//!
//! The tree is not rebalanced: a new page always goes into the branch that
//! already owns the neighbouring position.

use super::error::{PDFError, PDFResult};
use super::node::TreeNode;
use super::page::Page;
use super::primitives::Ref;
use super::store::ObjectStore;
use rustc_hash::FxHashSet;
use smallvec::{SmallVec, smallvec};
use std::iter::FusedIterator;
use tracing::{trace, warn};

/// Default bound on page-tree depth; deeper trees are treated as corrupt.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 256;

/// Branches from the root down to (and including) some node.
type BranchPath = SmallVec<[TreeNode; 8]>;

/// Where a position lives: the branch path and the slot in the last branch.
struct Location {
    path: BranchPath,
    slot: usize,
    leaf: TreeNode,
}

/// Page-tree index rooted at a `/Type /Pages` node.
///
/// A `PageTree` is a cheap view: it borrows the store and holds only the root
/// handle, so it can be created on demand.
#[derive(Debug, Clone, Copy)]
pub struct PageTree<'a> {
    store: &'a ObjectStore,
    root: Ref,
    max_depth: usize,
}

impl<'a> PageTree<'a> {
    pub fn new(store: &'a ObjectStore, root: Ref) -> Self {
        PageTree {
            store,
            root,
            max_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn root(&self) -> Ref {
        self.root
    }

    pub fn store(&self) -> &'a ObjectStore {
        self.store
    }

    fn root_node(&self) -> PDFResult<TreeNode> {
        TreeNode::load_branch(self.store, self.root)
    }

    fn check_depth(&self, depth: usize) -> PDFResult<()> {
        if depth > self.max_depth {
            return Err(PDFError::CorruptPageTree(format!(
                "page tree deeper than {} levels",
                self.max_depth
            )));
        }
        Ok(())
    }

    /// Total number of pages: the root's cached count.
    pub fn count(&self) -> PDFResult<usize> {
        Ok(self.root_node()?.cached_count())
    }

    pub fn is_empty(&self) -> PDFResult<bool> {
        Ok(self.count()? == 0)
    }

    /// Returns the page at `index`.
    pub fn get(&self, index: usize) -> PDFResult<Page> {
        let location = self.locate(index)?;
        Ok(Page::from_node(location.leaf))
    }

    /// Descends from the root to the leaf at `index` without recursion.
    ///
    /// At each branch the kids are scanned left to right: a leaf either
    /// matches or advances the offset by one; a branch is entered when the
    /// position falls inside it and skipped by its count otherwise.
    fn locate(&self, index: usize) -> PDFResult<Location> {
        let root = self.root_node()?;
        let count = root.cached_count();
        if index >= count {
            return Err(PDFError::IndexOutOfRange { index, count });
        }

        let mut path: BranchPath = smallvec![root];
        let mut offset = 0;

        loop {
            self.check_depth(path.len())?;
            let kids = match path.last() {
                Some(branch) => branch.kids()?,
                None => return Err(PDFError::IndexOutOfRange { index, count }),
            };

            let mut descend = None;
            for (slot, kid) in kids.iter().enumerate() {
                let node = TreeNode::load(self.store, *kid)?;
                if node.is_leaf() {
                    if offset == index {
                        return Ok(Location {
                            path,
                            slot,
                            leaf: node,
                        });
                    }
                    offset += 1;
                } else {
                    let subtree = node.cached_count();
                    if offset + subtree > index {
                        descend = Some(node);
                        break;
                    }
                    offset += subtree;
                }
            }

            match descend {
                Some(branch) => {
                    trace!(branch = %branch.reference(), offset, index, "descending");
                    path.push(branch);
                }
                None => return Err(PDFError::IndexOutOfRange { index, count }),
            }
        }
    }

    /// Branch path and slot for appending after the last page: follows the
    /// last kid while it is a branch.
    fn locate_tail(&self) -> PDFResult<(BranchPath, usize)> {
        let mut path: BranchPath = smallvec![self.root_node()?];
        loop {
            self.check_depth(path.len())?;
            let kids = match path.last() {
                Some(branch) => branch.kids()?,
                None => return Err(PDFError::CorruptPageTree("empty branch path".into())),
            };
            let Some(last) = kids.last() else {
                return Ok((path, 0));
            };
            let node = TreeNode::load(self.store, *last)?;
            if node.is_leaf() {
                return Ok((path, kids.len()));
            }
            path.push(node);
        }
    }

    /// Walks `/Parent` links from `start` up to the root, returning the
    /// branches in bottom-up order (`start` first, root last).
    fn ancestors(&self, start: Ref) -> PDFResult<BranchPath> {
        let mut chain: BranchPath = SmallVec::new();
        let mut visited = FxHashSet::default();
        let mut current = start;

        loop {
            if !visited.insert(current) {
                return Err(PDFError::CorruptPageTree(format!(
                    "cycle in /Parent chain at {}",
                    current
                )));
            }
            self.check_depth(chain.len())?;
            let node = TreeNode::load_branch(self.store, current)?;
            let parent = node.parent()?;
            let is_root = node.reference() == self.root;
            chain.push(node);

            if is_root {
                return Ok(chain);
            }
            match parent {
                Some(parent) => current = parent,
                None => return Err(PDFError::UnattachedNode(current)),
            }
        }
    }

    /// Position of `page` in document order.
    ///
    /// Replays the offset accumulation of [`get`](Self::get) bottom-up: at each
    /// level, every kid left of the current node contributes its leaf count.
    pub fn index_of(&self, page: &Page) -> PDFResult<usize> {
        self.index_of_ref(page.reference())
    }

    /// Like [`index_of`](Self::index_of), by handle.
    pub fn index_of_ref(&self, leaf: Ref) -> PDFResult<usize> {
        let mut child = TreeNode::load_leaf(self.store, leaf)?;
        let mut index = 0;
        let mut visited = FxHashSet::default();

        loop {
            if child.reference() == self.root {
                return Ok(index);
            }
            let parent_ref = child
                .parent()?
                .ok_or(PDFError::UnattachedNode(child.reference()))?;
            if !visited.insert(parent_ref) {
                return Err(PDFError::CorruptPageTree(format!(
                    "cycle in /Parent chain at {}",
                    parent_ref
                )));
            }
            self.check_depth(visited.len())?;

            let parent = TreeNode::load_branch(self.store, parent_ref)?;
            let kids = parent.kids()?;
            let slot = kids
                .iter()
                .position(|kid| *kid == child.reference())
                .ok_or_else(|| {
                    PDFError::CorruptPageTree(format!(
                        "{} is not among the kids of its parent {}",
                        child.reference(),
                        parent_ref
                    ))
                })?;
            for kid in &kids[..slot] {
                index += TreeNode::load(self.store, *kid)?.leaf_count();
            }
            child = parent;
        }
    }

    /// Inserts a detached page so that it ends up at `index`.
    ///
    /// `index == count()` appends. The page joins the branch that currently
    /// owns `index`, directly before the page that held it.
    pub fn insert(&self, index: usize, page: &Page) -> PDFResult<()> {
        let count = self.count()?;
        if index > count {
            return Err(PDFError::IndexOutOfRange { index, count });
        }
        let leaf = TreeNode::load_leaf(self.store, page.reference())?;
        if leaf.parent()?.is_some() {
            return Err(PDFError::AlreadyAttached(leaf.reference()));
        }

        let (path, slot) = if index == count {
            self.locate_tail()?
        } else {
            let location = self.locate(index)?;
            (location.path, location.slot)
        };
        Self::link(&path, slot, &leaf);
        Ok(())
    }

    /// Appends a detached page after the last page.
    pub fn append(&self, page: &Page) -> PDFResult<()> {
        self.insert(self.count()?, page)
    }

    /// Unlinks `page` from its parent and repairs every ancestor's count.
    pub fn remove(&self, page: &Page) -> PDFResult<()> {
        let leaf = TreeNode::load_leaf(self.store, page.reference())?;
        self.unlink(&leaf)
    }

    /// Removes and returns the page at `index`.
    pub fn remove_at(&self, index: usize) -> PDFResult<Page> {
        let location = self.locate(index)?;
        let Location { path, slot, leaf } = location;
        if let Some(owner) = path.last() {
            owner.remove_kid(slot);
        }
        leaf.set_parent(None);
        for branch in &path {
            branch.adjust_count(-1);
        }
        Ok(Page::from_node(leaf))
    }

    /// Splices a detached node (a page or a whole branch) into `parent`'s
    /// `/Kids` at `slot`, clamped to the end, and adds its leaf count to every
    /// ancestor.
    pub fn attach(&self, parent: Ref, slot: usize, node: Ref) -> PDFResult<()> {
        if node == self.root {
            return Err(PDFError::CorruptPageTree(
                "the root cannot become a child".into(),
            ));
        }
        let child = TreeNode::load(self.store, node)?;
        if child.parent()?.is_some() {
            return Err(PDFError::AlreadyAttached(node));
        }
        let mut chain = self.ancestors(parent)?;
        chain.reverse();
        Self::link(&chain, slot, &child);
        Ok(())
    }

    /// Unlinks any non-root node; a branch takes its whole subtree with it.
    pub fn detach(&self, node: Ref) -> PDFResult<()> {
        if node == self.root {
            return Err(PDFError::CorruptPageTree("the root cannot be detached".into()));
        }
        let child = TreeNode::load(self.store, node)?;
        self.unlink(&child)
    }

    fn unlink(&self, child: &TreeNode) -> PDFResult<()> {
        let parent_ref = child
            .parent()?
            .ok_or(PDFError::UnattachedNode(child.reference()))?;

        // Validate the whole chain before touching anything
        let chain = self.ancestors(parent_ref)?;
        let parent = chain
            .first()
            .ok_or(PDFError::UnattachedNode(child.reference()))?;
        let slot = parent
            .kids()?
            .iter()
            .position(|kid| *kid == child.reference())
            .ok_or_else(|| {
                PDFError::CorruptPageTree(format!(
                    "{} is not among the kids of its parent {}",
                    child.reference(),
                    parent_ref
                ))
            })?;

        let delta = child.leaf_count() as isize;
        parent.remove_kid(slot);
        child.set_parent(None);
        for branch in &chain {
            branch.adjust_count(-delta);
        }
        Ok(())
    }

    /// Link step shared by insertion and attachment. `path` runs from the root
    /// to the owning branch; nothing here can fail.
    fn link(path: &[TreeNode], slot: usize, child: &TreeNode) {
        let Some(owner) = path.last() else {
            return;
        };
        owner.insert_kid(slot, child.reference());
        child.set_parent(Some(owner.reference()));
        let delta = child.leaf_count() as isize;
        for branch in path {
            branch.adjust_count(delta);
        }
    }

    /// Forward enumeration in document order.
    pub fn iter(&self) -> PageIter<'a> {
        PageIter::new(self.store, self.root, self.max_depth)
    }

    /// Recomputes every branch `/Count` bottom-up and repairs `/Parent`
    /// links. Returns the number of nodes that had to be fixed.
    pub fn recount(&self) -> PDFResult<usize> {
        struct Frame {
            node: TreeNode,
            kids: Vec<Ref>,
            next: usize,
            total: usize,
        }

        let root = self.root_node()?;
        let mut visited = FxHashSet::default();
        visited.insert(self.root);
        let mut repaired = 0;
        let mut stack: SmallVec<[Frame; 8]> = smallvec![Frame {
            kids: root.kids()?,
            node: root,
            next: 0,
            total: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.kids.len() {
                let kid_ref = frame.kids[frame.next];
                frame.next += 1;
                let parent_ref = frame.node.reference();

                let kid = TreeNode::load(self.store, kid_ref)?;
                if kid.parent()? != Some(parent_ref) {
                    warn!(node = %kid_ref, parent = %parent_ref, "repairing /Parent link");
                    kid.set_parent(Some(parent_ref));
                    repaired += 1;
                }

                if kid.is_leaf() {
                    frame.total += 1;
                } else {
                    if !visited.insert(kid_ref) {
                        return Err(PDFError::CorruptPageTree(format!(
                            "{} appears more than once in the page tree",
                            kid_ref
                        )));
                    }
                    self.check_depth(stack.len() + 1)?;
                    let kids = kid.kids()?;
                    stack.push(Frame {
                        node: kid,
                        kids,
                        next: 0,
                        total: 0,
                    });
                }
            } else {
                let Some(done) = stack.pop() else { break };
                if done.node.cached_count() != done.total {
                    warn!(
                        node = %done.node.reference(),
                        cached = done.node.cached_count(),
                        actual = done.total,
                        "repairing /Count"
                    );
                    done.node.set_count(done.total);
                    repaired += 1;
                }
                if let Some(parent) = stack.last_mut() {
                    parent.total += done.total;
                }
            }
        }

        Ok(repaired)
    }
}

impl<'a> IntoIterator for &PageTree<'a> {
    type Item = PDFResult<Page>;
    type IntoIter = PageIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Depth-first, left-to-right page enumeration with an explicit stack of
/// `(kids, next slot)` frames.
///
/// The iterator is single-pass. Mutating the tree while it is running is
/// unsupported: each frame holds a snapshot of its branch's kids. The first
/// error ends the iteration.
pub struct PageIter<'a> {
    store: &'a ObjectStore,
    root: Option<Ref>,
    stack: SmallVec<[(Vec<Ref>, usize); 8]>,
    max_depth: usize,
    done: bool,
}

impl<'a> PageIter<'a> {
    fn new(store: &'a ObjectStore, root: Ref, max_depth: usize) -> Self {
        PageIter {
            store,
            root: Some(root),
            stack: SmallVec::new(),
            max_depth,
            done: false,
        }
    }

    fn fail(&mut self, err: PDFError) -> Option<PDFResult<Page>> {
        self.done = true;
        self.stack.clear();
        Some(Err(err))
    }
}

impl Iterator for PageIter<'_> {
    type Item = PDFResult<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(root) = self.root.take() {
            match TreeNode::load_branch(self.store, root).and_then(|node| node.kids()) {
                Ok(kids) => self.stack.push((kids, 0)),
                Err(e) => return self.fail(e),
            }
        }

        loop {
            // Climb when the current branch is exhausted
            let Some((kids, next)) = self.stack.last_mut() else {
                self.done = true;
                return None;
            };
            if *next >= kids.len() {
                self.stack.pop();
                continue;
            }

            // Scan horizontally
            let kid = kids[*next];
            *next += 1;

            let node = match TreeNode::load(self.store, kid) {
                Ok(node) => node,
                Err(e) => return self.fail(e),
            };
            if node.is_leaf() {
                return Some(Ok(Page::from_node(node)));
            }

            // Dive
            if self.stack.len() >= self.max_depth {
                return self.fail(PDFError::CorruptPageTree(format!(
                    "page tree deeper than {} levels",
                    self.max_depth
                )));
            }
            match node.kids() {
                Ok(kids) => self.stack.push((kids, 0)),
                Err(e) => return self.fail(e),
            }
        }
    }
}

impl FusedIterator for PageIter<'_> {}
