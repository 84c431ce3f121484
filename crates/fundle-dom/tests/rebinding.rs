//! Re-render behaviour of the binding engine on a realistic list view.
//!
//! A render pass rebuilds the list rows from data, then re-binds. Rows that
//! survive keep exactly one listener; rows created by the pass get theirs on
//! the same pass.

use std::cell::RefCell;
use std::rc::Rc;

use fundle_dom::{Bindings, DomEvent, Element, Templater};
use pretty_assertions::assert_eq;

// =============================================================================
// Fixture
// =============================================================================

struct ListView {
    root: Element,
    items: Rc<RefCell<Vec<String>>>,
    clicks: Rc<RefCell<Vec<String>>>,
}

impl ListView {
    fn new(items: &[&str]) -> Self {
        let template = Element::new("template").with_attr("id", "row").with_child(
            Element::new("li")
                .with_child(Element::new("span").with_attr("class", "label"))
                .with_child(Element::new("button").with_attr("class", "pick")),
        );
        let root = Element::new("item-list")
            .with_child(template)
            .with_child(Element::new("ul"));
        Self {
            root,
            items: Rc::new(RefCell::new(items.iter().map(|s| (*s).to_owned()).collect())),
            clicks: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn bindings(&self) -> Bindings {
        let items = Rc::clone(&self.items);
        let clicks = Rc::clone(&self.clicks);
        Bindings::new()
            .with(":this > ul", move |ul, _| {
                let wanted = items.borrow().len();
                while ul.child_count() > wanted {
                    if let Some(last) = ul.child(ul.child_count() - 1) {
                        last.remove();
                    }
                }
                let template = ul
                    .parent()
                    .and_then(|host| Templater::clone_template(&host, "#row").ok());
                while ul.child_count() < wanted {
                    if let Some(row) = template.as_ref().map(Element::deep_clone) {
                        ul.append_child(&row);
                    }
                }
                for (row, label) in ul.children().iter().zip(items.borrow().iter()) {
                    if let Ok(Some(span)) = row.query_selector(".label") {
                        span.set_text(label.clone());
                    }
                }
            })
            .with("li .pick::click :this", move |button: &Element, event: Option<&DomEvent>| {
                let label = button
                    .parent()
                    .and_then(|li| li.query_selector(".label").ok().flatten())
                    .map(|span| span.text())
                    .unwrap_or_default();
                clicks
                    .borrow_mut()
                    .push(format!("{}:{label}", event.map_or("", DomEvent::kind)));
            })
    }

    fn render(&self) -> fundle_dom::BindReport {
        Templater::bind(&self.root, &self.bindings())
    }

    fn buttons(&self) -> Vec<Element> {
        self.root.query_selector_all("li .pick").unwrap()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn rows_are_built_from_the_template() {
    let view = ListView::new(&["a", "b"]);
    let report = view.render();
    assert!(report.is_clean(), "{:?}", report.warnings);
    assert_eq!(
        view.root.query_selector("ul").unwrap().unwrap().outer_html(),
        "<ul><li><span class=\"label\">a</span><button class=\"pick\"></button></li>\
         <li><span class=\"label\">b</span><button class=\"pick\"></button></li></ul>"
    );
}

#[test]
fn repeated_renders_keep_one_listener_per_row() {
    let view = ListView::new(&["a", "b", "c"]);
    for _ in 0..4 {
        view.render();
    }
    for button in view.buttons() {
        assert_eq!(button.listener_count("click"), 1);
    }

    view.buttons()[1].emit("click");
    assert_eq!(*view.clicks.borrow(), ["click:b"]);
}

#[test]
fn rows_added_by_a_render_are_bound_in_the_same_pass() {
    let view = ListView::new(&["a"]);
    let first = view.render();
    assert_eq!(first.attached, 1);

    view.items.borrow_mut().push("z".to_owned());
    let second = view.render();
    assert_eq!((second.attached, second.skipped), (1, 1));

    view.buttons()[1].emit("click");
    assert_eq!(*view.clicks.borrow(), ["click:z"]);
}

#[test]
fn labels_follow_data_after_rerender() {
    let view = ListView::new(&["old"]);
    view.render();
    view.items.borrow_mut()[0] = "new".to_owned();
    view.render();

    view.buttons()[0].emit("click");
    assert_eq!(*view.clicks.borrow(), ["click:new"]);
}
