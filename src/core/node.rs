use super::error::{PDFError, PDFResult};
use super::primitives::{PDFObject, Ref, SharedObject};
use super::store::ObjectStore;

/// Keys owned by the page tree, not writable through [`TreeNode::set`].
pub const STRUCTURAL_KEYS: [&str; 3] = ["Parent", "Kids", "Count"];

/// Shape of a page-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `/Type /Pages`: ordered `/Kids` plus a cached `/Count`
    Branch,
    /// `/Type /Page`
    Leaf,
}

/// A resolved page-tree node: its handle plus the shared record behind it.
///
/// Accessors borrow the record only for the duration of the call, so a
/// `TreeNode` may be held across store lookups.
#[derive(Debug, Clone)]
pub struct TreeNode {
    reference: Ref,
    object: SharedObject,
    kind: NodeKind,
}

impl TreeNode {
    /// Resolves `reference` and classifies it.
    ///
    /// `/Type /Pages` is a branch and `/Type /Page` a leaf. Nodes without a
    /// `/Type` are classified by the presence of `/Kids`. Anything else is a
    /// `TypeMismatch`.
    pub fn load(store: &ObjectStore, reference: Ref) -> PDFResult<Self> {
        let object = store.resolve(reference)?;
        let kind = {
            let obj = object.borrow();
            let PDFObject::Dictionary(dict) = &*obj else {
                return Err(PDFError::type_mismatch(
                    reference,
                    "page tree node",
                    obj.type_name(),
                ));
            };
            match dict.get("Type").and_then(PDFObject::as_name) {
                Some("Pages") => NodeKind::Branch,
                Some("Page") => NodeKind::Leaf,
                Some(other) => {
                    return Err(PDFError::type_mismatch(
                        reference,
                        "page tree node",
                        format!("/Type /{}", other),
                    ));
                }
                None if dict.contains_key("Kids") => NodeKind::Branch,
                None => NodeKind::Leaf,
            }
        };
        Ok(TreeNode {
            reference,
            object,
            kind,
        })
    }

    /// Resolves `reference`, requiring a branch.
    pub fn load_branch(store: &ObjectStore, reference: Ref) -> PDFResult<Self> {
        let node = Self::load(store, reference)?;
        if node.kind != NodeKind::Branch {
            return Err(PDFError::type_mismatch(reference, "page tree branch", "page"));
        }
        Ok(node)
    }

    /// Resolves `reference`, requiring a leaf.
    pub fn load_leaf(store: &ObjectStore, reference: Ref) -> PDFResult<Self> {
        let node = Self::load(store, reference)?;
        if node.kind != NodeKind::Leaf {
            return Err(PDFError::type_mismatch(reference, "page", "page tree branch"));
        }
        Ok(node)
    }

    pub fn reference(&self) -> Ref {
        self.reference
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn is_branch(&self) -> bool {
        self.kind == NodeKind::Branch
    }

    /// The shared record behind this node.
    pub fn object(&self) -> &SharedObject {
        &self.object
    }

    /// Number of leaves this node contributes to its parent's offset:
    /// one for a leaf, the cached `/Count` for a branch.
    pub fn leaf_count(&self) -> usize {
        match self.kind {
            NodeKind::Leaf => 1,
            NodeKind::Branch => self.cached_count(),
        }
    }

    /// The branch's `/Count`, 0 if missing or malformed.
    pub fn cached_count(&self) -> usize {
        self.object
            .borrow()
            .get("Count")
            .and_then(PDFObject::as_usize)
            .unwrap_or(0)
    }

    /// Child handles of a branch, in page order. Leaves have none.
    pub fn kids(&self) -> PDFResult<Vec<Ref>> {
        if self.is_leaf() {
            return Ok(Vec::new());
        }
        let obj = self.object.borrow();
        let Some(kids) = obj.get("Kids") else {
            return Ok(Vec::new());
        };
        let Some(items) = kids.as_array() else {
            return Err(PDFError::type_mismatch(
                self.reference,
                "/Kids array",
                kids.type_name(),
            ));
        };
        items
            .iter()
            .map(|kid| {
                kid.as_reference().ok_or_else(|| {
                    PDFError::type_mismatch(self.reference, "kid reference", kid.type_name())
                })
            })
            .collect()
    }

    /// The `/Parent` handle, if the node has one.
    pub fn parent(&self) -> PDFResult<Option<Ref>> {
        match self.object.borrow().get("Parent") {
            None | Some(PDFObject::Null) => Ok(None),
            Some(PDFObject::Ref(r)) => Ok(Some(*r)),
            Some(other) => Err(PDFError::type_mismatch(
                self.reference,
                "/Parent reference",
                other.type_name(),
            )),
        }
    }

    /// Reads an entry of the node's own dictionary.
    pub fn get(&self, key: &str) -> Option<PDFObject> {
        self.object.borrow().get(key).cloned()
    }

    /// Sets an entry of the node's own dictionary.
    ///
    /// `/Parent`, `/Kids` and `/Count` are maintained by the page tree and
    /// cannot be set here.
    pub fn set(&self, key: &str, value: PDFObject) -> PDFResult<()> {
        Self::check_writable(key)?;
        self.put(key, value);
        Ok(())
    }

    /// Removes an entry of the node's own dictionary. The page-tree keys
    /// refused by [`TreeNode::set`] are refused here too.
    pub fn remove(&self, key: &str) -> PDFResult<Option<PDFObject>> {
        Self::check_writable(key)?;
        Ok(self.take(key))
    }

    fn check_writable(key: &str) -> PDFResult<()> {
        if STRUCTURAL_KEYS.contains(&key) {
            return Err(PDFError::Generic(format!(
                "/{} is maintained by the page tree",
                key
            )));
        }
        Ok(())
    }

    fn put(&self, key: &str, value: PDFObject) {
        if let Some(dict) = self.object.borrow_mut().as_dict_mut() {
            dict.insert(key.to_string(), value);
        }
    }

    fn take(&self, key: &str) -> Option<PDFObject> {
        self.object
            .borrow_mut()
            .as_dict_mut()
            .and_then(|dict| dict.shift_remove(key))
    }

    /// Sets or clears the `/Parent` link.
    pub(crate) fn set_parent(&self, parent: Option<Ref>) {
        match parent {
            Some(r) => self.put("Parent", PDFObject::Ref(r)),
            None => {
                self.take("Parent");
            }
        }
    }

    /// Overwrites a branch's `/Count`.
    pub(crate) fn set_count(&self, count: usize) {
        self.put("Count", PDFObject::Number(count as f64));
    }

    /// Adds `delta` to a branch's `/Count`, saturating at zero.
    pub(crate) fn adjust_count(&self, delta: isize) {
        let count = self.cached_count().saturating_add_signed(delta);
        self.set_count(count);
    }

    /// Splices `kid` into `/Kids` at `slot` (clamped to the end), creating
    /// the array if it is missing.
    pub(crate) fn insert_kid(&self, slot: usize, kid: Ref) {
        let mut obj = self.object.borrow_mut();
        let Some(dict) = obj.as_dict_mut() else {
            return;
        };
        let kids = dict
            .entry("Kids".to_string())
            .or_insert_with(|| PDFObject::Array(Vec::new()));
        if !matches!(kids, PDFObject::Array(_)) {
            *kids = PDFObject::Array(Vec::new());
        }
        if let Some(items) = kids.as_array_mut() {
            let slot = slot.min(items.len());
            items.insert(slot, PDFObject::Ref(kid));
        }
    }

    /// Removes the `/Kids` entry at `slot`; out-of-range slots are ignored.
    pub(crate) fn remove_kid(&self, slot: usize) {
        let mut obj = self.object.borrow_mut();
        if let Some(items) = obj
            .as_dict_mut()
            .and_then(|dict| dict.get_mut("Kids"))
            .and_then(PDFObject::as_array_mut)
        {
            if slot < items.len() {
                items.remove(slot);
            }
        }
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for TreeNode {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;

    fn branch(store: &ObjectStore, kids: Vec<PDFObject>, count: i64) -> Ref {
        store.register(PDFObject::Dictionary(dict! {
            "Type" => PDFObject::name("Pages"),
            "Kids" => PDFObject::Array(kids),
            "Count" => count,
        }))
    }

    #[test]
    fn test_classification() {
        let store = ObjectStore::new();
        let page = store.register(PDFObject::Dictionary(dict! { "Type" => PDFObject::name("Page") }));
        let pages = branch(&store, vec![], 0);
        let untyped = store.register(PDFObject::Dictionary(dict! { "Kids" => PDFObject::Array(vec![]) }));
        let font = store.register(PDFObject::Dictionary(dict! { "Type" => PDFObject::name("Font") }));
        let number = store.register(PDFObject::Number(3.0));

        assert_eq!(TreeNode::load(&store, page).unwrap().kind(), NodeKind::Leaf);
        assert_eq!(TreeNode::load(&store, pages).unwrap().kind(), NodeKind::Branch);
        assert_eq!(TreeNode::load(&store, untyped).unwrap().kind(), NodeKind::Branch);
        assert!(matches!(
            TreeNode::load(&store, font),
            Err(PDFError::TypeMismatch { .. })
        ));
        assert!(matches!(
            TreeNode::load(&store, number),
            Err(PDFError::TypeMismatch { .. })
        ));
        assert!(matches!(
            TreeNode::load_leaf(&store, pages),
            Err(PDFError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_structural_keys_are_not_writable() {
        let store = ObjectStore::new();
        let page = store.register(PDFObject::Dictionary(dict! { "Type" => PDFObject::name("Page") }));
        let root = branch(&store, vec![PDFObject::Ref(page)], 1);
        let node = TreeNode::load(&store, root).unwrap();

        for key in STRUCTURAL_KEYS {
            assert!(node.set(key, PDFObject::Null).is_err());
            assert!(node.remove(key).is_err());
        }
        assert_eq!(node.cached_count(), 1);
        assert_eq!(node.kids().unwrap(), vec![page]);

        node.set("Rotate", PDFObject::Number(90.0)).unwrap();
        assert_eq!(node.get("Rotate"), Some(PDFObject::Number(90.0)));
        assert_eq!(node.remove("Rotate").unwrap(), Some(PDFObject::Number(90.0)));
        assert_eq!(node.remove("Rotate").unwrap(), None);
    }

    #[test]
    fn test_kids_must_be_references() {
        let store = ObjectStore::new();
        let bad = branch(&store, vec![PDFObject::Number(1.0)], 1);
        let node = TreeNode::load(&store, bad).unwrap();
        assert!(matches!(node.kids(), Err(PDFError::TypeMismatch { .. })));
    }

    #[test]
    fn test_kid_splicing_and_counts() {
        let store = ObjectStore::new();
        let root = branch(&store, vec![], 0);
        let node = TreeNode::load_branch(&store, root).unwrap();

        node.insert_kid(0, Ref::new(10, 0));
        node.insert_kid(5, Ref::new(11, 0));
        node.insert_kid(0, Ref::new(9, 0));
        assert_eq!(
            node.kids().unwrap(),
            vec![Ref::new(9, 0), Ref::new(10, 0), Ref::new(11, 0)]
        );

        node.remove_kid(1);
        assert_eq!(node.kids().unwrap(), vec![Ref::new(9, 0), Ref::new(11, 0)]);

        node.adjust_count(2);
        assert_eq!(node.cached_count(), 2);
        node.adjust_count(-5);
        assert_eq!(node.cached_count(), 0);
    }

    #[test]
    fn test_parent_link() {
        let store = ObjectStore::new();
        let page = store.register(PDFObject::Dictionary(dict! { "Type" => PDFObject::name("Page") }));
        let node = TreeNode::load_leaf(&store, page).unwrap();
        assert_eq!(node.parent().unwrap(), None);
        node.set_parent(Some(Ref::new(2, 0)));
        assert_eq!(node.parent().unwrap(), Some(Ref::new(2, 0)));
        node.set_parent(None);
        assert_eq!(node.parent().unwrap(), None);
        assert_eq!(node.leaf_count(), 1);
    }
}
