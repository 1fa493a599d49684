pub mod decode;
pub mod document;
pub mod error;
pub mod inherit;
pub mod lexer;
pub mod node;
pub mod page;
pub mod page_tree;
pub mod parser;
pub mod pdf_writer;
pub mod primitives;
pub mod store;
pub mod stream;
pub mod xref;

pub use document::{DocumentOptions, PDFDocument};
pub use error::{PDFError, PDFResult};
pub use inherit::{DefaultAttributes, INHERITABLE_KEYS, InheritedAttributes};
pub use lexer::{Lexer, Token};
pub use node::{NodeKind, TreeNode};
pub use page::Page;
pub use page_tree::{PageIter, PageTree};
pub use parser::Parser;
pub use pdf_writer::PDFWriter;
pub use primitives::{Dict, PDFObject, Ref, SharedObject};
pub use store::ObjectStore;
pub use stream::Stream;
pub use xref::{XRef, XRefEntry};
