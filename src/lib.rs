//! In-memory object model for PDF documents.
//!
//! Indirect objects live in an [`ObjectStore`], which resolves each handle to
//! one shared record, loading it lazily when the document was opened from a
//! file. Pages are the leaves of a page tree whose branches cache their leaf
//! counts; [`PageTree`] turns that tree into an ordered, indexable collection
//! and keeps the counts and `/Parent` links consistent across insertion and
//! removal. Attributes a page omits are looked up on its ancestors through
//! [`InheritedAttributes`].
//!
//! ```
//! use pdf_x_dom::{PDFDocument, PDFObject};
//!
//! let doc = PDFDocument::new();
//! let a = doc.create_page(None).unwrap();
//! let b = doc.create_page(Some([0.0, 0.0, 595.0, 842.0])).unwrap();
//! doc.append_page(&a).unwrap();
//! doc.append_page(&b).unwrap();
//!
//! let root = doc.store().resolve(doc.pages_root()).unwrap();
//! root.borrow_mut()
//!     .as_dict_mut()
//!     .unwrap()
//!     .insert("Rotate".into(), PDFObject::Number(90.0));
//!
//! assert_eq!(a.rotate(&doc.inherited()).unwrap(), 90);
//! assert_eq!(doc.index_of(&b).unwrap(), 1);
//! ```

pub mod core;

// Re-export main types for convenience
pub use core::{
    DefaultAttributes, Dict, DocumentOptions, InheritedAttributes, ObjectStore, PDFDocument,
    PDFError, PDFObject, PDFResult, PDFWriter, Page, PageIter, PageTree, Ref, TreeNode, XRef,
};
