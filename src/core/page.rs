use super::decode::decode_stream;
use super::error::{PDFError, PDFResult};
use super::inherit::{InheritedAttributes, LETTER_MEDIA_BOX};
use super::node::TreeNode;
use super::primitives::{Dict, PDFObject, Ref, resolve_rect};
use super::store::ObjectStore;

/// A single page in a PDF document.
///
/// A page is a leaf of the page tree. It holds the shared page record, so
/// attributes set through one `Page` are visible through every other handle
/// to the same page.
///
/// A page dictionary contains properties like:
/// - MediaBox: The visible area of the page (inheritable)
/// - Resources: Fonts, images, and other resources used by the page (inheritable)
/// - Contents: The content stream(s) that draw the page
/// - Parent: Reference to the parent Pages node
#[derive(Debug, Clone)]
pub struct Page {
    node: TreeNode,
}

impl Page {
    /// Resolves `reference`, which must be a page.
    pub fn load(store: &ObjectStore, reference: Ref) -> PDFResult<Self> {
        TreeNode::load_leaf(store, reference).map(Self::from_node)
    }

    pub(crate) fn from_node(node: TreeNode) -> Self {
        Page { node }
    }

    /// The page's indirect reference.
    pub fn reference(&self) -> Ref {
        self.node.reference()
    }

    pub fn node(&self) -> &TreeNode {
        &self.node
    }

    /// Gets an entry of the page's own dictionary, without inheritance.
    pub fn get(&self, key: &str) -> Option<PDFObject> {
        self.node.get(key)
    }

    /// Sets an entry of the page's own dictionary.
    ///
    /// Page-tree keys (`/Parent`, `/Kids`, `/Count`) are refused.
    pub fn set(&self, key: &str, value: PDFObject) -> PDFResult<()> {
        self.node.set(key, value)
    }

    /// Removes an entry of the page's own dictionary, so that the inherited
    /// value (if any) shows through.
    pub fn remove(&self, key: &str) -> PDFResult<Option<PDFObject>> {
        self.node.remove(key)
    }

    /// The parent branch, `None` while the page is detached.
    pub fn parent(&self) -> PDFResult<Option<Ref>> {
        self.node.parent()
    }

    pub fn is_attached(&self) -> PDFResult<bool> {
        Ok(self.parent()?.is_some())
    }

    /// Gets the Contents for this page.
    ///
    /// Contents can be either a single stream or an array of streams.
    pub fn contents(&self) -> Option<PDFObject> {
        self.get("Contents")
    }

    /// Effective `/MediaBox`, normalized. Falls back to US Letter when neither
    /// the tree nor the document defaults provide a usable rectangle.
    pub fn media_box(&self, attrs: &InheritedAttributes<'_>) -> PDFResult<[f64; 4]> {
        Ok(attrs
            .resolve(self.reference(), "MediaBox")?
            .as_ref()
            .and_then(resolve_rect)
            .unwrap_or(LETTER_MEDIA_BOX))
    }

    /// Effective `/CropBox`, defaulting to the media box.
    pub fn crop_box(&self, attrs: &InheritedAttributes<'_>) -> PDFResult<[f64; 4]> {
        match attrs
            .resolve(self.reference(), "CropBox")?
            .as_ref()
            .and_then(resolve_rect)
        {
            Some(rect) => Ok(rect),
            None => self.media_box(attrs),
        }
    }

    /// The visible area: the crop box clipped to the media box, or the media
    /// box alone if the intersection is empty.
    pub fn view_box(&self, attrs: &InheritedAttributes<'_>) -> PDFResult<[f64; 4]> {
        let media_box = self.media_box(attrs)?;
        let crop_box = self.crop_box(attrs)?;

        let intersect = [
            media_box[0].max(crop_box[0]),
            media_box[1].max(crop_box[1]),
            media_box[2].min(crop_box[2]),
            media_box[3].min(crop_box[3]),
        ];

        if intersect[2] - intersect[0] > 0.0 && intersect[3] - intersect[1] > 0.0 {
            Ok(intersect)
        } else {
            Ok(media_box)
        }
    }

    /// Effective `/Rotate` in degrees: 0, 90, 180 or 270. Values that are not
    /// multiples of 90 count as 0.
    pub fn rotate(&self, attrs: &InheritedAttributes<'_>) -> PDFResult<i32> {
        let rotate = attrs
            .resolve(self.reference(), "Rotate")?
            .and_then(|value| value.as_number())
            .map_or(0, |n| n as i32);

        if rotate % 90 != 0 {
            return Ok(0);
        }
        Ok(rotate.rem_euclid(360))
    }

    /// Effective `/Resources` dictionary, if any.
    pub fn resources(&self, attrs: &InheritedAttributes<'_>) -> PDFResult<Option<Dict>> {
        Ok(attrs
            .resolve(self.reference(), "Resources")?
            .and_then(|value| value.as_dict().cloned()))
    }

    /// The decoded content of every `/Contents` stream, concatenated in order
    /// with a newline between streams.
    pub fn content_data(&self, store: &ObjectStore) -> PDFResult<Vec<u8>> {
        let streams = match self.contents() {
            None | Some(PDFObject::Null) => return Ok(Vec::new()),
            Some(PDFObject::Array(items)) => items,
            Some(single) => vec![single],
        };

        let mut out = Vec::new();
        for (i, item) in streams.iter().enumerate() {
            match store.fetch_if_ref(item)? {
                PDFObject::Stream { dict, data } => {
                    if i > 0 {
                        out.push(b'\n');
                    }
                    out.extend_from_slice(&decode_stream(&dict, &data)?);
                }
                PDFObject::Null => {}
                other => {
                    return Err(PDFError::type_mismatch(
                        self.reference(),
                        "content stream",
                        other.type_name(),
                    ));
                }
            }
        }
        Ok(out)
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.reference() == other.reference()
    }
}

impl Eq for Page {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::decode::encode_flate;
    use crate::core::inherit::DefaultAttributes;
    use crate::dict;

    fn attached_page(store: &ObjectStore, root_extra: Dict, page_extra: Dict) -> (Ref, Page) {
        let mut root_dict = dict! { "Type" => PDFObject::name("Pages") };
        root_dict.extend(root_extra);
        let root = store.register(PDFObject::Dictionary(root_dict));
        let mut page_dict = dict! { "Type" => PDFObject::name("Page"), "Parent" => root };
        page_dict.extend(page_extra);
        let page = store.register(PDFObject::Dictionary(page_dict));
        (root, Page::load(store, page).unwrap())
    }

    #[test]
    fn test_media_box_fallbacks() {
        let store = ObjectStore::new();
        let (root, page) = attached_page(&store, Dict::new(), Dict::new());
        let attrs = InheritedAttributes::new(&store, root);
        assert_eq!(page.media_box(&attrs).unwrap(), LETTER_MEDIA_BOX);

        let defaults = DefaultAttributes {
            media_box: [0.0, 0.0, 595.0, 842.0],
            resources: None,
        };
        let attrs = attrs.with_defaults(&defaults);
        assert_eq!(page.media_box(&attrs).unwrap(), [0.0, 0.0, 595.0, 842.0]);
        assert_eq!(page.crop_box(&attrs).unwrap(), [0.0, 0.0, 595.0, 842.0]);
    }

    #[test]
    fn test_view_box_intersection() {
        let store = ObjectStore::new();
        let (root, page) = attached_page(
            &store,
            dict! { "MediaBox" => PDFObject::number_array(&[0.0, 0.0, 200.0, 200.0]) },
            dict! { "CropBox" => PDFObject::number_array(&[150.0, 150.0, 50.0, 300.0]) },
        );
        let attrs = InheritedAttributes::new(&store, root);
        assert_eq!(page.view_box(&attrs).unwrap(), [50.0, 150.0, 150.0, 200.0]);

        page.set("CropBox", PDFObject::number_array(&[300.0, 300.0, 400.0, 400.0]))
            .unwrap();
        assert_eq!(page.view_box(&attrs).unwrap(), [0.0, 0.0, 200.0, 200.0]);
    }

    #[test]
    fn test_rotate_normalization() {
        let store = ObjectStore::new();
        let (root, page) = attached_page(&store, dict! { "Rotate" => -90i64 }, Dict::new());
        let attrs = InheritedAttributes::new(&store, root);
        assert_eq!(page.rotate(&attrs).unwrap(), 270);

        page.set("Rotate", PDFObject::Number(450.0)).unwrap();
        assert_eq!(page.rotate(&attrs).unwrap(), 90);
        page.set("Rotate", PDFObject::Number(45.0)).unwrap();
        assert_eq!(page.rotate(&attrs).unwrap(), 0);
        page.remove("Rotate").unwrap();
        assert_eq!(page.rotate(&attrs).unwrap(), 270);
    }

    #[test]
    fn test_parent_is_not_settable() {
        let store = ObjectStore::new();
        let (root, page) = attached_page(&store, Dict::new(), Dict::new());
        assert!(page.set("Parent", PDFObject::Null).is_err());
        assert!(page.remove("Parent").is_err());
        assert_eq!(page.parent().unwrap(), Some(root));
        assert!(page.is_attached().unwrap());
    }

    #[test]
    fn test_content_data_concatenates_streams() {
        let store = ObjectStore::new();
        let first = store.register(PDFObject::Stream {
            dict: dict! { "Filter" => PDFObject::name("FlateDecode") },
            data: encode_flate(b"q").unwrap(),
        });
        let second = store.register(PDFObject::Stream {
            dict: Dict::new(),
            data: b"Q".to_vec(),
        });
        let (_, page) = attached_page(
            &store,
            Dict::new(),
            dict! { "Contents" => PDFObject::Array(vec![PDFObject::Ref(first), PDFObject::Ref(second)]) },
        );
        assert_eq!(page.content_data(&store).unwrap(), b"q\nQ");
    }
}
