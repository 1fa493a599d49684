//! Per-document registry of indirectly addressable records.
//!
//! Every object number resolves to exactly one [`SharedObject`] for the
//! lifetime of the store. Records loaded from a file are parsed on first
//! access and cached; records created in memory are cached at registration.

use super::error::{PDFError, PDFResult};
use super::primitives::{PDFObject, Ref, SharedObject};
use super::xref::XRef;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: SharedObject,
}

/// Owns the universe of indirect objects for one document.
///
/// All methods take `&self`: the cache lives behind a `RefCell` so that the
/// page tree, the attribute resolver and typed wrappers can share one store
/// while still registering and loading records. The store is deliberately not
/// `Sync`; a document is one exclusively-owned resource.
#[derive(Debug)]
pub struct ObjectStore {
    /// Resolved records keyed by object number
    cache: RefCell<FxHashMap<u32, Slot>>,

    /// Backing file, if the document was loaded rather than created
    source: Option<XRef>,

    /// Next object number handed out by `register`
    next_num: Cell<u32>,
}

impl ObjectStore {
    /// Creates an empty store. Object number 0 is reserved (the head of the
    /// free list in a written file), so the first handle is `1 0 R`.
    pub fn new() -> Self {
        ObjectStore {
            cache: RefCell::new(FxHashMap::default()),
            source: None,
            next_num: Cell::new(1),
        }
    }

    /// Creates a store that resolves lazily from a parsed file.
    pub fn with_source(xref: XRef) -> Self {
        let next_num = xref.size().max(1);
        ObjectStore {
            cache: RefCell::new(FxHashMap::default()),
            source: Some(xref),
            next_num: Cell::new(next_num),
        }
    }

    /// The backing cross-reference table, if any.
    pub fn source(&self) -> Option<&XRef> {
        self.source.as_ref()
    }

    /// Stores `object` under a fresh handle.
    pub fn register(&self, object: PDFObject) -> Ref {
        let num = self.next_num.get();
        self.next_num.set(num + 1);
        let reference = Ref::new(num, 0);
        debug!(%reference, kind = object.type_name(), "registered object");
        self.cache.borrow_mut().insert(
            num,
            Slot {
                generation: 0,
                object: Rc::new(RefCell::new(object)),
            },
        );
        reference
    }

    /// Resolves `reference` to its shared record.
    ///
    /// Returns the same `Rc` for the same handle on every call, so a mutation
    /// through one holder is visible to all of them. Fails with
    /// `UnresolvedHandle` if neither the cache nor the backing file knows the
    /// object number, or if the generation does not match.
    pub fn resolve(&self, reference: Ref) -> PDFResult<SharedObject> {
        if let Some(slot) = self.cache.borrow().get(&reference.num) {
            return if slot.generation == reference.generation {
                Ok(Rc::clone(&slot.object))
            } else {
                Err(PDFError::UnresolvedHandle(reference))
            };
        }

        let source = self
            .source
            .as_ref()
            .ok_or(PDFError::UnresolvedHandle(reference))?;
        let object = source.fetch(reference)?;
        debug!(%reference, kind = object.type_name(), "loaded object from source");

        let shared = Rc::new(RefCell::new(object));
        self.cache.borrow_mut().insert(
            reference.num,
            Slot {
                generation: reference.generation,
                object: Rc::clone(&shared),
            },
        );
        Ok(shared)
    }

    /// Returns a copy of the resolved record.
    pub fn get(&self, reference: Ref) -> PDFResult<PDFObject> {
        Ok(self.resolve(reference)?.borrow().clone())
    }

    /// Fetches an object if it's a reference, otherwise returns the object as-is.
    pub fn fetch_if_ref(&self, obj: &PDFObject) -> PDFResult<PDFObject> {
        match obj {
            PDFObject::Ref(r) => self.get(*r),
            _ => Ok(obj.clone()),
        }
    }

    /// Replaces the payload of an existing record in place. Every holder of
    /// the handle observes the new value.
    pub fn replace(&self, reference: Ref, object: PDFObject) -> PDFResult<()> {
        let shared = self.resolve(reference)?;
        *shared.borrow_mut() = object;
        Ok(())
    }

    /// True if `reference` is cached or present in the backing file.
    pub fn contains(&self, reference: Ref) -> bool {
        if let Some(slot) = self.cache.borrow().get(&reference.num) {
            return slot.generation == reference.generation;
        }
        self.source
            .as_ref()
            .is_some_and(|source| source.contains(reference))
    }

    /// Every live handle, cached or not yet loaded, in object-number order.
    pub fn refs(&self) -> Vec<Ref> {
        let cache = self.cache.borrow();
        let mut refs: Vec<Ref> = cache
            .iter()
            .map(|(num, slot)| Ref::new(*num, slot.generation))
            .collect();
        if let Some(source) = &self.source {
            refs.extend(
                source
                    .live_refs()
                    .filter(|r| !cache.contains_key(&r.num)),
            );
        }
        refs.sort_unstable();
        refs
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.refs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records currently materialized in memory.
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// One past the highest object number in use.
    pub fn next_object_number(&self) -> u32 {
        self.next_num.get()
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}
