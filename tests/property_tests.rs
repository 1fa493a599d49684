//! Property-based tests for the page-tree index.
//!
//! These tests use proptest to drive random sequences of structural edits
//! against a plain `Vec` model and check that the tree agrees with it.


use pdf_x_dom::core::*;
use proptest::prelude::*;
use test_utils::*;

#[derive(Debug, Clone)]
enum Op {
    /// Insert a new page at `seed % (len + 1)`
    Insert(usize),
    /// Remove the page at `seed % len`
    Remove(usize),
    /// Move the page at `seed % len` one level down into a new branch, in place
    Wrap(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<usize>().prop_map(Op::Insert),
        1 => any::<usize>().prop_map(Op::Remove),
        1 => any::<usize>().prop_map(Op::Wrap),
    ]
}

fn apply(doc: &PDFDocument, model: &mut Vec<Ref>, op: &Op) -> PDFResult<()> {
    match *op {
        Op::Insert(seed) => {
            let index = seed % (model.len() + 1);
            let page = doc.create_page(None)?;
            doc.insert_page(index, &page)?;
            model.insert(index, page.reference());
        }
        Op::Remove(seed) if !model.is_empty() => {
            let index = seed % model.len();
            let page = doc.get_page(index)?;
            doc.remove_page(&page)?;
            model.remove(index);
        }
        Op::Wrap(seed) if !model.is_empty() => {
            let tree = doc.page_tree();
            let page = doc.get_page(seed % model.len())?;
            let parent = page.parent()?.ok_or(PDFError::UnattachedNode(page.reference()))?;
            let slot = TreeNode::load(doc.store(), parent)?
                .kids()?
                .iter()
                .position(|kid| *kid == page.reference())
                .ok_or_else(|| PDFError::CorruptPageTree("page missing from parent".into()))?;
            let branch = doc.create_pages_node();
            tree.detach(page.reference())?;
            tree.attach(parent, slot, branch)?;
            tree.attach(branch, 0, page.reference())?;
        }
        _ => {}
    }
    Ok(())
}

proptest! {
    /// Property: after any edit sequence the tree matches the model, and
    /// every cached count equals the real number of leaves beneath it
    #[test]
    fn prop_edits_match_model(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let doc = PDFDocument::new();
        let mut model = Vec::new();
        for op in &ops {
            prop_assert!(apply(&doc, &mut model, op).is_ok(), "{:?} failed", op);
        }

        prop_assert_eq!(doc.page_count().unwrap(), model.len());
        prop_assert_eq!(page_refs(&doc), model.clone());
        for (i, r) in model.iter().enumerate() {
            prop_assert_eq!(doc.get_page(i).unwrap().reference(), *r);
            let page = Page::load(doc.store(), *r).unwrap();
            prop_assert_eq!(doc.index_of(&page).unwrap(), i);
        }
        // Nothing to repair when counts were maintained incrementally
        prop_assert_eq!(doc.page_tree().recount().unwrap(), 0);
    }
}

proptest! {
    /// Property: an appended page is always last
    #[test]
    fn prop_append_is_last(n in 0usize..20, wraps in prop::collection::vec(any::<usize>(), 0..5)) {
        let (doc, _) = document_with_pages(n);
        let mut model: Vec<Ref> = page_refs(&doc);
        for seed in wraps {
            apply(&doc, &mut model, &Op::Wrap(seed)).unwrap();
        }

        let page = doc.create_page(None).unwrap();
        doc.append_page(&page).unwrap();
        let count = doc.page_count().unwrap();
        prop_assert_eq!(count, n + 1);
        prop_assert_eq!(doc.get_page(count - 1).unwrap(), page);
    }
}

proptest! {
    /// Property: insert followed by remove of the same page restores order
    #[test]
    fn prop_insert_remove_symmetry(n in 0usize..20, seed in any::<usize>()) {
        let (doc, _) = document_with_pages(n);
        let before = page_refs(&doc);

        let page = doc.create_page(None).unwrap();
        let index = seed % (n + 1);
        doc.insert_page(index, &page).unwrap();
        prop_assert_eq!(doc.index_of(&page).unwrap(), index);
        doc.remove_page(&page).unwrap();

        prop_assert_eq!(page_refs(&doc), before);
        prop_assert_eq!(page.parent().unwrap(), None);
    }
}

proptest! {
    /// Property: the nearest ancestor's value wins
    #[test]
    fn prop_inherits_nearest(depth in 1usize..8, set_at in 0usize..8) {
        let doc = PDFDocument::new();
        let tree = doc.page_tree();
        let mut chain = vec![doc.pages_root()];
        for _ in 1..depth {
            let branch = doc.create_pages_node();
            tree.attach(*chain.last().unwrap(), 0, branch).unwrap();
            chain.push(branch);
        }
        let page = doc.create_page(None).unwrap();
        tree.attach(*chain.last().unwrap(), 0, page.reference()).unwrap();

        // Rotate = 90 * (level + 1) on every level up to `set_at`
        let set_at = set_at % depth;
        for (level, branch) in chain.iter().enumerate().take(set_at + 1) {
            TreeNode::load(doc.store(), *branch)
                .unwrap()
                .set("Rotate", PDFObject::Number(90.0 * (level as f64 + 1.0)))
                .unwrap();
        }

        let expected = (90 * (set_at as i32 + 1)) % 360;
        prop_assert_eq!(page.rotate(&doc.inherited()).unwrap(), expected);
    }
}
