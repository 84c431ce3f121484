#![no_main]

use arbitrary::Arbitrary;
use fundle_dom::{Bindings, Element, Templater, split_selector_list};
use libfuzzer_sys::fuzz_target;

/// Binding keys applied twice over a fixed tree.
#[derive(Debug, Arbitrary)]
struct BindCase {
    keys: Vec<String>,
}

fuzz_target!(|case: BindCase| {
    let root = Element::new("section").with_child(
        Element::new("form")
            .with_child(Element::new("input").with_attr("name", "q"))
            .with_child(Element::new("button").with_attr("class", "go")),
    );

    let mut bindings = Bindings::new();
    for key in &case.keys {
        for part in split_selector_list(key) {
            assert!(!part.trim().is_empty());
        }
        bindings.insert(key.clone(), |_, _| {});
    }

    // Event listeners attach once per node and sub-selector.
    let first = Templater::bind(&root, &bindings);
    let second = Templater::bind(&root, &bindings);
    assert_eq!(second.attached, 0);
    assert_eq!(second.skipped, first.attached + first.skipped);
});
