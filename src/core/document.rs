use super::decode::encode_flate;
use super::error::{PDFError, PDFResult};
use super::inherit::{DefaultAttributes, InheritedAttributes, LETTER_MEDIA_BOX};
use super::page::Page;
use super::page_tree::{DEFAULT_MAX_TREE_DEPTH, PageIter, PageTree};
use super::pdf_writer::PDFWriter;
use super::primitives::{Dict, PDFObject, Ref};
use super::store::ObjectStore;
use super::xref::XRef;
use crate::dict;
use std::path::Path;
use tracing::info;

/// Settings applied when a document is created or opened.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOptions {
    /// Page size for pages that inherit none
    pub default_media_box: [f64; 4],

    /// Resource dictionary for pages that inherit none
    pub default_resources: Option<Dict>,

    /// Deepest page tree accepted before it is treated as corrupt
    pub max_tree_depth: usize,

    /// Recompute every `/Count` and repair `/Parent` links when opening
    pub recount_on_load: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        DocumentOptions {
            default_media_box: LETTER_MEDIA_BOX,
            default_resources: None,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            recount_on_load: true,
        }
    }
}

impl DocumentOptions {
    pub fn with_default_media_box(mut self, media_box: [f64; 4]) -> Self {
        self.default_media_box = media_box;
        self
    }

    pub fn with_default_resources(mut self, resources: Dict) -> Self {
        self.default_resources = Some(resources);
        self
    }

    pub fn with_max_tree_depth(mut self, depth: usize) -> Self {
        self.max_tree_depth = depth.max(1);
        self
    }

    pub fn with_recount_on_load(mut self, recount: bool) -> Self {
        self.recount_on_load = recount;
        self
    }

    fn defaults(&self) -> DefaultAttributes {
        DefaultAttributes {
            media_box: self.default_media_box,
            resources: self.default_resources.clone(),
        }
    }
}

/// A PDF document: the object store plus the catalog and page-tree root.
///
/// This is the only place new pages and new branch nodes are created. Pages
/// come out detached; placing them is a separate step through
/// [`insert_page`](Self::insert_page) or [`append_page`](Self::append_page).
///
/// # Example
/// ```
/// use pdf_x_dom::core::PDFDocument;
///
/// let doc = PDFDocument::new();
/// let page = doc.create_page(None).unwrap();
/// doc.append_page(&page).unwrap();
/// assert_eq!(doc.page_count().unwrap(), 1);
/// assert_eq!(doc.get_page(0).unwrap(), page);
/// ```
#[derive(Debug)]
pub struct PDFDocument {
    /// Every indirect object of the document
    store: ObjectStore,

    /// The document catalog (root dictionary)
    catalog: Ref,

    /// Root branch of the page tree
    pages_root: Ref,

    /// Document information dictionary, if the file had one
    info: Option<Ref>,

    defaults: DefaultAttributes,
    options: DocumentOptions,
}

impl PDFDocument {
    /// Creates an empty document with default options.
    pub fn new() -> Self {
        Self::with_options(DocumentOptions::default())
    }

    /// Creates an empty document: a catalog and a root branch with count zero.
    pub fn with_options(options: DocumentOptions) -> Self {
        let store = ObjectStore::new();
        let pages_root = store.register(PDFObject::Dictionary(dict! {
            "Type" => PDFObject::name("Pages"),
            "Kids" => PDFObject::Array(Vec::new()),
            "Count" => 0i64,
        }));
        let catalog = store.register(PDFObject::Dictionary(dict! {
            "Type" => PDFObject::name("Catalog"),
            "Pages" => pages_root,
        }));

        PDFDocument {
            store,
            catalog,
            pages_root,
            info: None,
            defaults: options.defaults(),
            options,
        }
    }

    /// Opens a PDF document from a byte array.
    ///
    /// Only the cross-reference table and trailer are parsed up front; objects
    /// are loaded from `data` the first time they are resolved.
    ///
    /// # Example
    /// ```no_run
    /// use pdf_x_dom::core::PDFDocument;
    ///
    /// let pdf_data = std::fs::read("document.pdf").unwrap();
    /// let doc = PDFDocument::open(pdf_data).unwrap();
    /// ```
    pub fn open(data: Vec<u8>) -> PDFResult<Self> {
        Self::open_with_options(data, DocumentOptions::default())
    }

    pub fn open_with_options(data: Vec<u8>, options: DocumentOptions) -> PDFResult<Self> {
        let size = data.len();
        let xref = XRef::load(data)?;

        let catalog = match xref.trailer().get("Root") {
            Some(PDFObject::Ref(r)) => *r,
            _ => return Err(PDFError::Generic("trailer has no /Root reference".into())),
        };
        let info = xref.trailer().get("Info").and_then(PDFObject::as_reference);
        let store = ObjectStore::with_source(xref);

        let pages_root = match store.get(catalog)?.get("Pages") {
            Some(PDFObject::Ref(r)) => *r,
            Some(other) => {
                return Err(PDFError::type_mismatch(
                    catalog,
                    "/Pages reference",
                    other.type_name(),
                ));
            }
            None => {
                return Err(PDFError::type_mismatch(catalog, "catalog with /Pages", "none"));
            }
        };

        let doc = PDFDocument {
            store,
            catalog,
            pages_root,
            info,
            defaults: options.defaults(),
            options,
        };

        let repaired = if doc.options.recount_on_load {
            doc.page_tree().recount()?
        } else {
            0
        };
        info!(
            bytes = size,
            objects = doc.store.len(),
            pages = doc.page_count()?,
            repaired,
            "opened document"
        );
        Ok(doc)
    }

    /// Reads and opens the file at `path`.
    pub fn open_file(path: impl AsRef<Path>) -> PDFResult<Self> {
        Self::open(std::fs::read(path)?)
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn catalog_ref(&self) -> Ref {
        self.catalog
    }

    /// Root branch of the page tree.
    pub fn pages_root(&self) -> Ref {
        self.pages_root
    }

    pub fn info_ref(&self) -> Option<Ref> {
        self.info
    }

    /// Sets or clears the document information dictionary.
    pub fn set_info(&mut self, info: Option<Dict>) {
        self.info = info.map(|dict| self.store.register(PDFObject::Dictionary(dict)));
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    pub fn default_attributes(&self) -> &DefaultAttributes {
        &self.defaults
    }

    pub fn default_attributes_mut(&mut self) -> &mut DefaultAttributes {
        &mut self.defaults
    }

    /// Page-tree index over this document.
    pub fn page_tree(&self) -> PageTree<'_> {
        PageTree::new(&self.store, self.pages_root).with_max_depth(self.options.max_tree_depth)
    }

    /// Attribute resolver that falls back to this document's defaults.
    pub fn inherited(&self) -> InheritedAttributes<'_> {
        InheritedAttributes::new(&self.store, self.pages_root)
            .with_defaults(&self.defaults)
            .with_max_depth(self.options.max_tree_depth)
    }

    /// Effective value of an inheritable attribute of `page`.
    pub fn inherited_attribute(&self, page: &Page, key: &str) -> PDFResult<Option<PDFObject>> {
        self.inherited().resolve(page.reference(), key)
    }

    pub fn page_count(&self) -> PDFResult<usize> {
        self.page_tree().count()
    }

    pub fn get_page(&self, index: usize) -> PDFResult<Page> {
        self.page_tree().get(index)
    }

    /// Every page in document order.
    pub fn pages(&self) -> PageIter<'_> {
        self.page_tree().iter()
    }

    pub fn index_of(&self, page: &Page) -> PDFResult<usize> {
        self.page_tree().index_of(page)
    }

    /// Creates a detached page. Its dictionary carries only `/Type` and, when
    /// `size` is given, an explicit `/MediaBox`.
    pub fn create_page(&self, size: Option<[f64; 4]>) -> PDFResult<Page> {
        let mut page = dict! { "Type" => PDFObject::name("Page") };
        if let Some(media_box) = size {
            page.insert("MediaBox".to_string(), PDFObject::number_array(&media_box));
        }
        Page::load(&self.store, self.store.register(PDFObject::Dictionary(page)))
    }

    /// Creates a detached, empty branch for use with [`PageTree::attach`].
    pub fn create_pages_node(&self) -> Ref {
        self.store.register(PDFObject::Dictionary(dict! {
            "Type" => PDFObject::name("Pages"),
            "Kids" => PDFObject::Array(Vec::new()),
            "Count" => 0i64,
        }))
    }

    pub fn insert_page(&self, index: usize, page: &Page) -> PDFResult<()> {
        self.page_tree().insert(index, page)
    }

    pub fn append_page(&self, page: &Page) -> PDFResult<()> {
        self.page_tree().append(page)
    }

    pub fn remove_page(&self, page: &Page) -> PDFResult<()> {
        self.page_tree().remove(page)
    }

    /// Registers a content stream, Flate-compressed when `compress` is set.
    pub fn create_stream(&self, data: &[u8], compress: bool) -> PDFResult<Ref> {
        let (dict, data) = if compress {
            let encoded = encode_flate(data)?;
            (
                dict! {
                    "Length" => encoded.len() as i64,
                    "Filter" => PDFObject::name("FlateDecode"),
                },
                encoded,
            )
        } else {
            (dict! { "Length" => data.len() as i64 }, data.to_vec())
        };
        Ok(self.store.register(PDFObject::Stream { dict, data }))
    }

    /// Serializes the whole document as a new file.
    pub fn save(&self) -> PDFResult<Vec<u8>> {
        let bytes = PDFWriter::write_document(&self.store, self.catalog, self.info)?;
        info!(bytes = bytes.len(), pages = self.page_count()?, "saved document");
        Ok(bytes)
    }

    /// Serializes the document to `path`.
    pub fn save_to(&self, path: impl AsRef<Path>) -> PDFResult<()> {
        let bytes = self.save()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl Default for PDFDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_is_empty() {
        let doc = PDFDocument::new();
        assert_eq!(doc.page_count().unwrap(), 0);
        let root = doc.store().get(doc.pages_root()).unwrap();
        assert_eq!(root.get("Parent"), None);
        assert_eq!(root.get("Count"), Some(&PDFObject::Number(0.0)));
        assert_eq!(
            doc.store().get(doc.catalog_ref()).unwrap().get("Pages"),
            Some(&PDFObject::Ref(doc.pages_root()))
        );
    }

    #[test]
    fn test_create_page_is_detached() {
        let doc = PDFDocument::new();
        let page = doc.create_page(Some([0.0, 0.0, 100.0, 100.0])).unwrap();
        assert_eq!(page.parent().unwrap(), None);
        assert_eq!(doc.page_count().unwrap(), 0);
        assert_eq!(
            page.get("MediaBox"),
            Some(PDFObject::number_array(&[0.0, 0.0, 100.0, 100.0]))
        );
        assert_eq!(
            doc.inherited_attribute(&page, "MediaBox"),
            Err(PDFError::UnattachedNode(page.reference()))
        );
    }

    #[test]
    fn test_defaults_from_options() {
        let options = DocumentOptions::default()
            .with_default_media_box([0.0, 0.0, 595.0, 842.0])
            .with_default_resources(dict! { "ProcSet" => PDFObject::Array(vec![PDFObject::name("PDF")]) });
        let mut doc = PDFDocument::with_options(options);
        let page = doc.create_page(None).unwrap();
        doc.append_page(&page).unwrap();

        assert_eq!(page.media_box(&doc.inherited()).unwrap(), [0.0, 0.0, 595.0, 842.0]);
        assert!(page.resources(&doc.inherited()).unwrap().is_some());

        doc.default_attributes_mut().media_box = [0.0, 0.0, 300.0, 300.0];
        assert_eq!(page.media_box(&doc.inherited()).unwrap(), [0.0, 0.0, 300.0, 300.0]);
    }

    #[test]
    fn test_create_stream() {
        let doc = PDFDocument::new();
        let raw = doc.create_stream(b"BT ET", false).unwrap();
        let packed = doc.create_stream(b"BT ET", true).unwrap();

        let page = doc.create_page(None).unwrap();
        page.set("Contents", PDFObject::Ref(packed)).unwrap();
        assert_eq!(page.content_data(doc.store()).unwrap(), b"BT ET");
        page.set("Contents", PDFObject::Ref(raw)).unwrap();
        assert_eq!(page.content_data(doc.store()).unwrap(), b"BT ET");
    }
}
