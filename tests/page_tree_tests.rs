//! Page-tree index tests: indexed access, mutation and count maintenance.


use pdf_x_dom::core::*;
use test_utils::*;

// ============================================================================
// Flat tree
// ============================================================================

#[test]
fn test_append_three_pages() {
    let (doc, pages) = document_with_pages(3);
    let refs: Vec<Ref> = pages.iter().map(Page::reference).collect();

    assert_eq!(doc.page_count().unwrap(), 3);
    assert_eq!(doc.get_page(1).unwrap(), pages[1]);
    assert_order(&doc, &refs);
}

#[test]
fn test_remove_middle_page() {
    let (doc, pages) = document_with_pages(3);
    doc.remove_page(&pages[1]).unwrap();

    assert_eq!(doc.page_count().unwrap(), 2);
    assert_eq!(doc.get_page(1).unwrap(), pages[2]);
    assert_eq!(doc.index_of(&pages[2]).unwrap(), 1);
    assert_order(&doc, &[pages[0].reference(), pages[2].reference()]);

    // The removed page is detached but still resolvable
    assert_eq!(pages[1].parent().unwrap(), None);
    assert!(doc.store().contains(pages[1].reference()));
    assert_eq!(
        doc.index_of(&pages[1]),
        Err(PDFError::UnattachedNode(pages[1].reference()))
    );
}

#[test]
fn test_insert_between() {
    let (doc, pages) = document_with_pages(3);
    doc.remove_page(&pages[1]).unwrap();
    let d = doc.create_page(None).unwrap();
    doc.insert_page(1, &d).unwrap();

    assert_order(
        &doc,
        &[pages[0].reference(), d.reference(), pages[2].reference()],
    );
}

#[test]
fn test_insert_at_front_and_end() {
    let (doc, pages) = document_with_pages(2);
    let front = doc.create_page(None).unwrap();
    let back = doc.create_page(None).unwrap();
    doc.insert_page(0, &front).unwrap();
    doc.insert_page(3, &back).unwrap();

    assert_order(
        &doc,
        &[
            front.reference(),
            pages[0].reference(),
            pages[1].reference(),
            back.reference(),
        ],
    );
}

#[test]
fn test_reinsert_removed_page() {
    let (doc, pages) = document_with_pages(3);
    doc.remove_page(&pages[0]).unwrap();
    doc.append_page(&pages[0]).unwrap();
    assert_order(
        &doc,
        &[pages[1].reference(), pages[2].reference(), pages[0].reference()],
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_out_of_range() {
    let (doc, _) = document_with_pages(2);
    assert_eq!(
        doc.get_page(2),
        Err(PDFError::IndexOutOfRange { index: 2, count: 2 })
    );
    let page = doc.create_page(None).unwrap();
    assert_eq!(
        doc.insert_page(3, &page),
        Err(PDFError::IndexOutOfRange { index: 3, count: 2 })
    );
    // Failed insertion leaves the page detached
    assert_eq!(page.parent().unwrap(), None);
    assert_eq!(doc.page_count().unwrap(), 2);
}

#[test]
fn test_double_insert_is_rejected() {
    let (doc, pages) = document_with_pages(1);
    assert_eq!(
        doc.insert_page(0, &pages[0]),
        Err(PDFError::AlreadyAttached(pages[0].reference()))
    );
    assert_eq!(doc.page_count().unwrap(), 1);
}

#[test]
fn test_remove_detached_page() {
    let doc = PDFDocument::new();
    let page = doc.create_page(None).unwrap();
    assert_eq!(
        doc.remove_page(&page),
        Err(PDFError::UnattachedNode(page.reference()))
    );
}

#[test]
fn test_branch_is_not_a_page() {
    let doc = PDFDocument::new();
    let branch = doc.create_pages_node();
    assert!(matches!(
        Page::load(doc.store(), branch),
        Err(PDFError::TypeMismatch { .. })
    ));
    let stream = doc.create_stream(b"", false).unwrap();
    assert!(matches!(
        Page::load(doc.store(), stream),
        Err(PDFError::TypeMismatch { .. })
    ));
}

// ============================================================================
// Multi-level trees
// ============================================================================

/// root -> [left(a, b), c, right(d)]
fn multi_level() -> (PDFDocument, Vec<Page>, Ref, Ref) {
    let doc = PDFDocument::new();
    let tree = doc.page_tree();
    let root = doc.pages_root();
    let left = doc.create_pages_node();
    let right = doc.create_pages_node();
    let pages: Vec<Page> = (0..4).map(|_| doc.create_page(None).unwrap()).collect();

    tree.attach(root, 0, left).unwrap();
    tree.attach(left, 0, pages[0].reference()).unwrap();
    tree.attach(left, 1, pages[1].reference()).unwrap();
    tree.attach(root, 1, pages[2].reference()).unwrap();
    tree.attach(root, 2, right).unwrap();
    tree.attach(right, 0, pages[3].reference()).unwrap();
    (doc, pages, left, right)
}

#[test]
fn test_multi_level_order_and_counts() {
    let (doc, pages, left, right) = multi_level();
    let refs: Vec<Ref> = pages.iter().map(Page::reference).collect();
    assert_order(&doc, &refs);

    let count = |r: Ref| TreeNode::load(doc.store(), r).unwrap().cached_count();
    assert_eq!(count(doc.pages_root()), 4);
    assert_eq!(count(left), 2);
    assert_eq!(count(right), 1);
}

#[test]
fn test_multi_level_insert_updates_every_ancestor() {
    let (doc, pages, left, _) = multi_level();
    let e = doc.create_page(None).unwrap();
    doc.insert_page(1, &e).unwrap();

    assert_eq!(e.parent().unwrap(), Some(left));
    assert_eq!(TreeNode::load(doc.store(), left).unwrap().cached_count(), 3);
    assert_order(
        &doc,
        &[
            pages[0].reference(),
            e.reference(),
            pages[1].reference(),
            pages[2].reference(),
            pages[3].reference(),
        ],
    );
}

#[test]
fn test_multi_level_remove_and_empty_branch() {
    let (doc, pages, _, right) = multi_level();
    doc.remove_page(&pages[3]).unwrap();

    // The emptied branch stays in place and contributes nothing
    assert_eq!(TreeNode::load(doc.store(), right).unwrap().cached_count(), 0);
    assert_order(
        &doc,
        &[pages[0].reference(), pages[1].reference(), pages[2].reference()],
    );

    // Appending descends into the last branch child
    let f = doc.create_page(None).unwrap();
    doc.append_page(&f).unwrap();
    assert_eq!(f.parent().unwrap(), Some(right));
    assert_eq!(doc.index_of(&f).unwrap(), 3);
}

#[test]
fn test_detach_and_reattach_branch() {
    let (doc, pages, left, right) = multi_level();
    let tree = doc.page_tree();
    tree.detach(left).unwrap();
    assert_order(&doc, &[pages[2].reference(), pages[3].reference()]);

    tree.attach(right, 1, left).unwrap();
    assert_order(
        &doc,
        &[
            pages[2].reference(),
            pages[3].reference(),
            pages[0].reference(),
            pages[1].reference(),
        ],
    );
    assert_eq!(TreeNode::load(doc.store(), right).unwrap().cached_count(), 3);
}

#[test]
fn test_attach_to_detached_branch_is_unattached() {
    let doc = PDFDocument::new();
    let loose = doc.create_pages_node();
    let page = doc.create_page(None).unwrap();
    assert_eq!(
        doc.page_tree().attach(loose, 0, page.reference()),
        Err(PDFError::UnattachedNode(loose))
    );
    assert_eq!(page.parent().unwrap(), None);
}

#[test]
fn test_root_cannot_move() {
    let doc = PDFDocument::new();
    let tree = doc.page_tree();
    let branch = doc.create_pages_node();
    tree.attach(doc.pages_root(), 0, branch).unwrap();
    assert!(matches!(
        tree.attach(branch, 0, doc.pages_root()),
        Err(PDFError::CorruptPageTree(_))
    ));
    assert!(matches!(
        tree.detach(doc.pages_root()),
        Err(PDFError::CorruptPageTree(_))
    ));
}

// ============================================================================
// Enumeration
// ============================================================================

#[test]
fn test_iterator_is_fused_and_single_pass() {
    let (doc, pages, _, _) = multi_level();
    let mut iter = doc.pages();
    for page in &pages {
        assert_eq!(iter.next().unwrap().unwrap(), *page);
    }
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());

    // A fresh iterator starts over
    assert_eq!(doc.pages().count(), 4);
}

#[test]
fn test_iterator_on_loaded_file() {
    let doc = PDFDocument::open(nested_tree_pdf()).unwrap();
    assert_eq!(
        page_refs(&doc),
        vec![Ref::new(4, 0), Ref::new(5, 0), Ref::new(6, 0)]
    );
}

// ============================================================================
// Inheritance
// ============================================================================

#[test]
fn test_rotate_inherits_from_root() {
    let (doc, pages) = document_with_pages(2);
    doc.store()
        .resolve(doc.pages_root())
        .unwrap()
        .borrow_mut()
        .as_dict_mut()
        .unwrap()
        .insert("Rotate".into(), PDFObject::Number(90.0));

    let attrs = doc.inherited();
    assert_eq!(pages[0].rotate(&attrs).unwrap(), 90);

    pages[0].set("Rotate", PDFObject::Number(0.0)).unwrap();
    assert_eq!(pages[0].rotate(&attrs).unwrap(), 0);
    assert_eq!(pages[1].rotate(&attrs).unwrap(), 90);
}

#[test]
fn test_detached_page_attribute_lookup_fails() {
    let doc = PDFDocument::new();
    let page = doc.create_page(None).unwrap();
    assert_eq!(
        page.rotate(&doc.inherited()),
        Err(PDFError::UnattachedNode(page.reference()))
    );
    assert_eq!(
        doc.inherited_attribute(&page, "MediaBox"),
        Err(PDFError::UnattachedNode(page.reference()))
    );
}

#[test]
fn test_nested_inheritance_from_file() {
    let doc = PDFDocument::open(nested_tree_pdf()).unwrap();
    let attrs = doc.inherited();
    let p1 = doc.get_page(0).unwrap();
    let p3 = doc.get_page(2).unwrap();

    assert_eq!(p1.rotate(&attrs).unwrap(), 180);
    assert_eq!(p3.rotate(&attrs).unwrap(), 90);
    assert_eq!(p1.media_box(&attrs).unwrap(), [0.0, 0.0, 612.0, 792.0]);
    assert_eq!(p3.media_box(&attrs).unwrap(), [0.0, 0.0, 100.0, 200.0]);

    let effective = attrs.effective(p1.reference()).unwrap();
    assert_eq!(
        effective.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["MediaBox", "Rotate"]
    );
}
