//! In-memory element tree standing in for the host document.
//!
//! An [`Element`] is a shared handle: clones address the same node, and
//! equality is identity. Parents own their children; a child points back at
//! its parent weakly, so dropping the last handle to a detached subtree
//! frees it.
//!
//! # Events
//!
//! Listeners are registered per event kind and identified by a
//! [`ListenerId`]. [`Element::dispatch_event`] runs the target's listeners,
//! then bubbles through each ancestor until a listener calls
//! [`DomEvent::stop_propagation`].
//!
//! # Invariants
//!
//! 1. A node has at most one parent; appending an attached node moves it.
//! 2. Appending a fragment moves the fragment's children, never the fragment.
//! 3. Listeners run in registration order over a per-node snapshot; one
//!    removed while the event is in flight is not invoked afterwards.
//! 4. No `RefCell` borrow is held while a listener runs.
//! 5. [`Element::deep_clone`] copies tag, attributes, text and children,
//!    never listeners or binding marks.
//! 6. Queries never descend into a nested `<template>`; its children are
//!    content to clone, not part of the live tree.
//!
//! # Failure Modes
//!
//! - Appending a node into its own subtree is refused (returns `false`).
//! - Malformed selectors surface as [`SelectorError`] from the query methods.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashSet;

use crate::error::SelectorError;
use crate::selector::SelectorList;

/// Tag of fragment nodes produced by template cloning.
pub const FRAGMENT_TAG: &str = "#fragment";

/// Handle returned by [`Element::add_event_listener`].
pub type ListenerId = u64;

type Handler = Rc<dyn Fn(&DomEvent)>;

struct Listener {
    id: ListenerId,
    kind: String,
    handler: Handler,
}

struct Node {
    tag: String,
    attributes: RefCell<Vec<(String, String)>>,
    text: RefCell<String>,
    children: RefCell<Vec<Element>>,
    parent: RefCell<Weak<Node>>,
    listeners: RefCell<Vec<Listener>>,
    next_listener: Cell<ListenerId>,
    bound: RefCell<AHashSet<(String, String)>>,
}

// ---------------------------------------------------------------------------
// DomEvent
// ---------------------------------------------------------------------------

/// An event travelling through the tree.
pub struct DomEvent {
    kind: String,
    target: RefCell<Option<Element>>,
    current_target: RefCell<Option<Element>>,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl fmt::Debug for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomEvent")
            .field("kind", &self.kind)
            .field("target", &self.target.borrow())
            .field("propagation_stopped", &self.propagation_stopped.get())
            .finish_non_exhaustive()
    }
}

impl DomEvent {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Element the event was dispatched on.
    #[must_use]
    pub fn target(&self) -> Option<Element> {
        self.target.borrow().clone()
    }

    /// Element whose listeners are currently running.
    #[must_use]
    pub fn current_target(&self) -> Option<Element> {
        self.current_target.borrow().clone()
    }

    /// Finish the current node's listeners, then stop bubbling.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    #[must_use]
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    #[must_use]
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// Shared handle to one element.
#[derive(Clone)]
pub struct Element {
    node: Rc<Node>,
}

/// Non-owning handle, for callbacks that must not keep a node alive.
#[derive(Clone, Default)]
pub struct WeakElement {
    node: Weak<Node>,
}

impl WeakElement {
    #[must_use]
    pub fn upgrade(&self) -> Option<Element> {
        self.node.upgrade().map(|node| Element { node })
    }
}

impl fmt::Debug for WeakElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(element) => write!(f, "WeakElement({element:?})"),
            None => f.write_str("WeakElement(<dropped>)"),
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.node.tag)?;
        for (name, value) in self.node.attributes.borrow().iter() {
            write!(f, " {name}=\"{value}\"")?;
        }
        f.write_str(">")
    }
}

impl Element {
    /// New detached element. Tags are case-insensitive and stored lowercase.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self::with_tag(tag.to_ascii_lowercase())
    }

    /// New detached fragment, the container for cloned template content.
    #[must_use]
    pub fn fragment() -> Self {
        Self::with_tag(FRAGMENT_TAG.to_owned())
    }

    fn with_tag(tag: String) -> Self {
        Self {
            node: Rc::new(Node {
                tag,
                attributes: RefCell::new(Vec::new()),
                text: RefCell::new(String::new()),
                children: RefCell::new(Vec::new()),
                parent: RefCell::new(Weak::new()),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(1),
                bound: RefCell::new(AHashSet::new()),
            }),
        }
    }

    #[must_use]
    pub fn with_attr(self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    #[must_use]
    pub fn with_child(self, child: Element) -> Self {
        self.append_child(&child);
        self
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.node.tag
    }

    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.node.tag == FRAGMENT_TAG
    }

    #[must_use]
    pub fn is_template(&self) -> bool {
        self.node.tag == "template"
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            node: Rc::downgrade(&self.node),
        }
    }

    // -- attributes ---------------------------------------------------------

    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.node
            .attributes
            .borrow()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.node.attributes.borrow().iter().any(|(key, _)| key == name)
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut attributes = self.node.attributes.borrow_mut();
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => attributes.push((name.to_owned(), value)),
        }
    }

    pub fn remove_attribute(&self, name: &str) -> bool {
        let mut attributes = self.node.attributes.borrow_mut();
        let before = attributes.len();
        attributes.retain(|(key, _)| key != name);
        attributes.len() != before
    }

    /// Attributes in insertion order.
    #[must_use]
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.node.attributes.borrow().clone()
    }

    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.get_attribute("id")
    }

    #[must_use]
    pub fn classes(&self) -> Vec<String> {
        self.get_attribute("class")
            .map(|list| list.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.node
            .attributes
            .borrow()
            .iter()
            .find(|(key, _)| key == "class")
            .is_some_and(|(_, list)| list.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let mut classes = self.classes();
        classes.push(class.to_owned());
        self.set_attribute("class", classes.join(" "));
    }

    pub fn remove_class(&self, class: &str) -> bool {
        let classes = self.classes();
        if !classes.iter().any(|c| c == class) {
            return false;
        }
        let kept: Vec<String> = classes.into_iter().filter(|c| c != class).collect();
        self.set_attribute("class", kept.join(" "));
        true
    }

    /// Add `class` when `on`, remove it otherwise.
    pub fn toggle_class(&self, class: &str, on: bool) {
        if on {
            self.add_class(class);
        } else {
            self.remove_class(class);
        }
    }

    // -- text ---------------------------------------------------------------

    /// The element's own text, without descendants.
    #[must_use]
    pub fn text(&self) -> String {
        self.node.text.borrow().clone()
    }

    /// Own text followed by every descendant's text, in document order.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = self.text();
        for child in self.children() {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Replace the element's content with `text`. Children are detached.
    pub fn set_text(&self, text: impl Into<String>) {
        self.clear_children();
        *self.node.text.borrow_mut() = text.into();
    }

    // -- tree ---------------------------------------------------------------

    #[must_use]
    pub fn parent(&self) -> Option<Element> {
        self.node.parent.borrow().upgrade().map(|node| Element { node })
    }

    #[must_use]
    pub fn children(&self) -> Vec<Element> {
        self.node.children.borrow().clone()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.node.children.borrow().len()
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Option<Element> {
        self.node.children.borrow().get(index).cloned()
    }

    /// Position among the parent's children.
    #[must_use]
    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let siblings = parent.node.children.borrow();
        siblings.iter().position(|sibling| sibling == self)
    }

    /// Whether `other` is this element or one of its descendants.
    #[must_use]
    pub fn contains(&self, other: &Element) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if &node == self {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Append `child`, moving it from its current parent.
    ///
    /// Returns `false` (and changes nothing) when `child` is this element or
    /// one of its ancestors.
    pub fn append_child(&self, child: &Element) -> bool {
        if child.is_fragment() {
            for grandchild in child.children() {
                self.append_child(&grandchild);
            }
            return true;
        }
        if child.contains(self) {
            tracing::warn!(parent = ?self, child = ?child, "refusing to append an ancestor");
            return false;
        }
        child.remove();
        *child.node.parent.borrow_mut() = Rc::downgrade(&self.node);
        self.node.children.borrow_mut().push(child.clone());
        true
    }

    /// Detach from the parent. Returns `false` if already detached.
    pub fn remove(&self) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };
        parent.node.children.borrow_mut().retain(|sibling| sibling != self);
        *self.node.parent.borrow_mut() = Weak::new();
        true
    }

    /// Detach every child.
    pub fn clear_children(&self) {
        let children = std::mem::take(&mut *self.node.children.borrow_mut());
        for child in children {
            *child.node.parent.borrow_mut() = Weak::new();
        }
    }

    /// Descendants in document order, excluding this element.
    ///
    /// The content of a nested `<template>` is inert and not visited.
    #[must_use]
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack: Vec<Element> = self.children().into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            if !next.is_template() {
                stack.extend(next.children().into_iter().rev());
            }
            out.push(next);
        }
        out
    }

    /// Detached copy of this subtree.
    #[must_use]
    pub fn deep_clone(&self) -> Element {
        let copy = Self::with_tag(self.node.tag.clone());
        *copy.node.attributes.borrow_mut() = self.attributes();
        *copy.node.text.borrow_mut() = self.text();
        for child in self.children() {
            copy.append_child(&child.deep_clone());
        }
        copy
    }

    // -- selectors ----------------------------------------------------------

    /// Every descendant matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_all(&list))
    }

    /// First descendant matching `selector`.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants()
            .into_iter()
            .find(|candidate| list.matches(candidate, self)))
    }

    /// Descendants matching an already parsed selector, with `:scope` bound
    /// to this element.
    #[must_use]
    pub fn select_all(&self, list: &SelectorList) -> Vec<Element> {
        self.descendants()
            .into_iter()
            .filter(|candidate| list.matches(candidate, self))
            .collect()
    }

    /// Whether this element matches `selector` (`:scope` is the element).
    pub fn matches(&self, selector: &str) -> Result<bool, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(list.matches(self, self))
    }

    // -- events -------------------------------------------------------------

    pub fn add_event_listener(
        &self,
        kind: &str,
        handler: impl Fn(&DomEvent) + 'static,
    ) -> ListenerId {
        let id = self.node.next_listener.get();
        self.node.next_listener.set(id + 1);
        self.node.listeners.borrow_mut().push(Listener {
            id,
            kind: kind.to_owned(),
            handler: Rc::new(handler),
        });
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.node.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self, kind: &str) -> usize {
        self.node
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.kind == kind)
            .count()
    }

    fn has_listener(&self, id: ListenerId) -> bool {
        self.node.listeners.borrow().iter().any(|listener| listener.id == id)
    }

    /// Dispatch `event` at this element and bubble it to the root.
    ///
    /// Returns `false` if a listener called [`DomEvent::prevent_default`].
    pub fn dispatch_event(&self, event: &DomEvent) -> bool {
        *event.target.borrow_mut() = Some(self.clone());
        let mut cursor = Some(self.clone());
        while let Some(current) = cursor {
            let snapshot: Vec<(ListenerId, Handler)> = current
                .node
                .listeners
                .borrow()
                .iter()
                .filter(|listener| listener.kind == event.kind)
                .map(|listener| (listener.id, Rc::clone(&listener.handler)))
                .collect();
            if !snapshot.is_empty() {
                *event.current_target.borrow_mut() = Some(current.clone());
                tracing::trace!(kind = %event.kind, node = ?current, listeners = snapshot.len(), "dom dispatch");
            }
            for (id, handler) in snapshot {
                if current.has_listener(id) {
                    handler(event);
                }
            }
            if event.is_propagation_stopped() {
                break;
            }
            cursor = current.parent();
        }
        *event.current_target.borrow_mut() = None;
        !event.is_default_prevented()
    }

    /// Shorthand for dispatching a fresh event of `kind`.
    pub fn emit(&self, kind: &str) -> bool {
        self.dispatch_event(&DomEvent::new(kind))
    }

    // -- binding marks ------------------------------------------------------

    /// Record that sub-selector `part` of binding `key` is attached here.
    /// Returns `false` if it already was.
    pub(crate) fn mark_bound(&self, key: &str, part: &str) -> bool {
        self.node
            .bound
            .borrow_mut()
            .insert((key.to_owned(), part.to_owned()))
    }

    /// Whether sub-selector `part` of binding `key` is attached here.
    #[must_use]
    pub fn is_bound(&self, key: &str, part: &str) -> bool {
        self.node
            .bound
            .borrow()
            .iter()
            .any(|(k, p)| k == key && p == part)
    }

    // -- serialization ------------------------------------------------------

    /// Markup for this subtree. Fragments render only their children.
    #[must_use]
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let fragment = self.is_fragment();
        if !fragment {
            out.push('<');
            out.push_str(&self.node.tag);
            for (name, value) in self.node.attributes.borrow().iter() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_into(value, out);
                out.push('"');
            }
            out.push('>');
        }
        escape_into(&self.node.text.borrow(), out);
        for child in self.children() {
            child.write_html(out);
        }
        if !fragment {
            out.push_str("</");
            out.push_str(&self.node.tag);
            out.push('>');
        }
    }
}

fn escape_into(raw: &str, out: &mut String) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> (Element, Element, Element) {
        let a = Element::new("li").with_attr("id", "a").with_text("A");
        let b = Element::new("li").with_attr("id", "b").with_text("B");
        let ul = Element::new("UL").with_child(a.clone()).with_child(b.clone());
        (ul, a, b)
    }

    #[test]
    fn tags_are_lowercased_and_children_linked() {
        let (ul, a, b) = list();
        assert_eq!(ul.tag(), "ul");
        assert_eq!(a.parent(), Some(ul.clone()));
        assert_eq!(b.index_in_parent(), Some(1));
        assert_eq!(ul.text_content(), "AB");
    }

    #[test]
    fn append_moves_between_parents() {
        let (ul, a, _) = list();
        let other = Element::new("ol");
        other.append_child(&a);
        assert_eq!(ul.child_count(), 1);
        assert_eq!(a.parent(), Some(other));
    }

    #[test]
    fn appending_an_ancestor_is_refused() {
        let (ul, a, _) = list();
        assert!(!a.append_child(&ul));
        assert!(!a.append_child(&a));
        assert_eq!(a.child_count(), 0);
    }

    #[test]
    fn fragment_children_are_moved() {
        let fragment = Element::fragment()
            .with_child(Element::new("p"))
            .with_child(Element::new("span"));
        let host = Element::new("div");
        host.append_child(&fragment);
        assert_eq!(host.child_count(), 2);
        assert_eq!(fragment.child_count(), 0);
        assert_eq!(host.outer_html(), "<div><p></p><span></span></div>");
    }

    #[test]
    fn class_list_helpers() {
        let el = Element::new("div").with_attr("class", "a  b");
        assert!(el.has_class("b"));
        el.add_class("c");
        el.add_class("a");
        assert_eq!(el.classes(), vec!["a", "b", "c"]);
        assert!(el.remove_class("b"));
        el.toggle_class("done", true);
        assert_eq!(el.get_attribute("class").as_deref(), Some("a c done"));
    }

    #[test]
    fn deep_clone_skips_listeners_and_marks() {
        let (ul, a, _) = list();
        a.add_event_listener("click", |_| {});
        a.mark_bound("li::click", "li::click");

        let copy = ul.deep_clone();
        assert_eq!(copy.outer_html(), ul.outer_html());
        let first = copy.child(0).unwrap();
        assert_ne!(first, a);
        assert_eq!(first.listener_count("click"), 0);
        assert!(!first.is_bound("li::click", "li::click"));
        assert!(copy.parent().is_none());
    }

    #[test]
    fn events_bubble_until_stopped() {
        let (ul, a, _) = list();
        let log = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&log);
        a.add_event_listener("click", move |event| {
            sink.borrow_mut().push(format!("a:{:?}", event.current_target()));
        });
        let sink = Rc::clone(&log);
        ul.add_event_listener("click", move |event| {
            sink.borrow_mut().push(format!("ul:{:?}", event.target()));
        });

        a.emit("click");
        assert_eq!(log.borrow().len(), 2);

        let stop = a.add_event_listener("click", |event| event.stop_propagation());
        a.emit("click");
        assert_eq!(log.borrow().len(), 3);

        assert!(a.remove_event_listener(stop));
        a.emit("keydown");
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn listener_removed_mid_dispatch_is_skipped() {
        let el = Element::new("button");
        let hits = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));

        let target = el.clone();
        let pending = Rc::clone(&second);
        el.add_event_listener("click", move |_| {
            target.remove_event_listener(pending.get());
        });
        let h = Rc::clone(&hits);
        second.set(el.add_event_listener("click", move |_| h.set(h.get() + 1)));

        el.emit("click");
        assert_eq!(hits.get(), 0);
        assert_eq!(el.listener_count("click"), 1);
    }

    #[test]
    fn prevent_default_is_reported() {
        let el = Element::new("a");
        el.add_event_listener("click", |event| event.prevent_default());
        assert!(!el.emit("click"));
    }

    #[test]
    fn set_text_detaches_children() {
        let (ul, a, _) = list();
        ul.set_text("empty");
        assert_eq!(ul.child_count(), 0);
        assert!(a.parent().is_none());
        assert_eq!(ul.text_content(), "empty");
    }

    #[test]
    fn html_is_escaped() {
        let el = Element::new("p").with_attr("title", "\"q\"").with_text("a < b & c");
        assert_eq!(
            el.outer_html(),
            "<p title=\"&quot;q&quot;\">a &lt; b &amp; c</p>"
        );
    }

    #[test]
    fn template_content_is_not_queried() {
        let root = Element::new("div")
            .with_child(Element::new("template").with_child(Element::new("li")))
            .with_child(Element::new("li"));
        assert_eq!(root.descendants().len(), 2);
        let template = root.child(0).unwrap();
        assert_eq!(template.descendants().len(), 1);
    }

    #[test]
    fn weak_handle_does_not_keep_node_alive() {
        let el = Element::new("div");
        let weak = el.downgrade();
        assert_eq!(weak.upgrade(), Some(el.clone()));
        drop(el);
        assert!(weak.upgrade().is_none());
    }
}
