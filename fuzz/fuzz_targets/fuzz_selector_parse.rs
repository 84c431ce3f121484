#![no_main]

use fundle_dom::{Element, SelectorList};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(list) = input.parse::<SelectorList>() else {
        return;
    };

    // A parsed list must re-parse from its own rendering.
    let rendered = list.to_string();
    let reparsed: SelectorList = rendered
        .parse()
        .unwrap_or_else(|err| panic!("`{rendered}` from `{input}` failed to re-parse: {err}"));
    assert_eq!(reparsed.len(), list.len());

    let root = Element::new("div")
        .with_attr("id", "root")
        .with_child(
            Element::new("ul")
                .with_attr("class", "list")
                .with_child(Element::new("li").with_attr("data-k", "1"))
                .with_child(Element::new("li").with_attr("data-k", "2")),
        )
        .with_child(Element::new("p"));
    for el in root.select_all(&list) {
        assert!(root.contains(&el));
        assert!(list.matches(&el, &root));
    }
});
