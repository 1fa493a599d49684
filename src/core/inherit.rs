//! Inheritable page attributes.
//!
//! A page may omit `/Resources`, `/MediaBox`, `/CropBox` and `/Rotate`; the
//! effective value is the one set on the nearest ancestor. Beneath the root
//! sit the document defaults.

use super::error::{PDFError, PDFResult};
use super::primitives::{Dict, PDFObject, Ref};
use super::store::ObjectStore;
use super::page_tree::DEFAULT_MAX_TREE_DEPTH;
use rustc_hash::FxHashSet;
use tracing::trace;

/// Keys a page inherits from its ancestors.
pub const INHERITABLE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// US Letter, in default user space units.
pub const LETTER_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Document-wide fallbacks consulted after the root branch.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultAttributes {
    pub media_box: [f64; 4],
    pub resources: Option<Dict>,
}

impl DefaultAttributes {
    /// The fallback for `key`, if the document defines one.
    ///
    /// Only `/MediaBox` and `/Resources` have document defaults.
    pub fn get(&self, key: &str) -> Option<PDFObject> {
        match key {
            "MediaBox" => Some(PDFObject::number_array(&self.media_box)),
            "Resources" => self.resources.clone().map(PDFObject::Dictionary),
            _ => None,
        }
    }
}

impl Default for DefaultAttributes {
    fn default() -> Self {
        DefaultAttributes {
            media_box: LETTER_MEDIA_BOX,
            resources: None,
        }
    }
}

/// Upward attribute lookup for nodes of one page tree.
#[derive(Debug, Clone, Copy)]
pub struct InheritedAttributes<'a> {
    store: &'a ObjectStore,
    root: Ref,
    defaults: Option<&'a DefaultAttributes>,
    max_depth: usize,
}

impl<'a> InheritedAttributes<'a> {
    pub fn new(store: &'a ObjectStore, root: Ref) -> Self {
        InheritedAttributes {
            store,
            root,
            defaults: None,
            max_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    pub fn with_defaults(mut self, defaults: &'a DefaultAttributes) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn store(&self) -> &'a ObjectStore {
        self.store
    }

    /// Effective value of `key` for `node`.
    ///
    /// Checks the node's own dictionary, then each ancestor's in turn. A value
    /// that is itself a reference is resolved one level. When the root is
    /// reached without a hit, the document default (if any) is returned.
    /// A node other than the root without a `/Parent` fails with
    /// `UnattachedNode`.
    pub fn resolve(&self, node: Ref, key: &str) -> PDFResult<Option<PDFObject>> {
        let mut current = node;
        let mut visited = FxHashSet::default();

        loop {
            if !visited.insert(current) {
                return Err(PDFError::CorruptPageTree(format!(
                    "cycle in /Parent chain at {}",
                    current
                )));
            }
            if visited.len() > self.max_depth + 1 {
                return Err(PDFError::CorruptPageTree(format!(
                    "/Parent chain longer than {} levels",
                    self.max_depth
                )));
            }

            let shared = self.store.resolve(current)?;
            let (value, parent) = {
                let obj = shared.borrow();
                let Some(dict) = obj.as_dict() else {
                    return Err(PDFError::type_mismatch(
                        current,
                        "page tree node",
                        obj.type_name(),
                    ));
                };
                (dict.get(key).cloned(), dict.get("Parent").cloned())
            };

            if let Some(value) = value {
                trace!(%node, key, found_at = %current, "inherited attribute");
                return self.store.fetch_if_ref(&value).map(Some);
            }

            if current == self.root {
                return Ok(self.defaults.and_then(|d| d.get(key)));
            }

            match parent {
                Some(PDFObject::Ref(parent)) => current = parent,
                None | Some(PDFObject::Null) => return Err(PDFError::UnattachedNode(current)),
                Some(other) => {
                    return Err(PDFError::type_mismatch(
                        current,
                        "/Parent reference",
                        other.type_name(),
                    ));
                }
            }
        }
    }

    /// Every inheritable key that resolves to a value, in `INHERITABLE_KEYS` order.
    pub fn effective(&self, node: Ref) -> PDFResult<Dict> {
        let mut out = Dict::new();
        for key in INHERITABLE_KEYS {
            if let Some(value) = self.resolve(node, key)? {
                out.insert(key.to_string(), value);
            }
        }
        Ok(out)
    }
}
