//! Session history the router reads and writes.
//!
//! In a browser this is `window.history`; [`MemoryHistory`] is the
//! in-process implementation used for embedding and tests.

use std::cell::{Cell, RefCell};

/// Location stack owned by the host.
pub trait History {
    /// Path (with query) of the current entry.
    fn current_path(&self) -> String;

    /// Add an entry for `path` and make it current.
    fn push(&self, path: &str);

    /// Overwrite the current entry with `path`.
    fn replace(&self, path: &str);
}

/// In-memory history stack with back/forward traversal.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: RefCell<Vec<String>>,
    index: Cell<usize>,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

impl MemoryHistory {
    #[must_use]
    pub fn new(initial: &str) -> Self {
        Self {
            entries: RefCell::new(vec![initial.to_owned()]),
            index: Cell::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Always `false`: the stack holds at least its initial entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Position of the current entry.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index.get()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Step back one entry. Returns the new current path, or `None` at the
    /// start of the stack.
    pub fn back(&self) -> Option<String> {
        let index = self.index.get().checked_sub(1)?;
        self.index.set(index);
        Some(self.current_path())
    }

    /// Step forward one entry. Returns the new current path, or `None` at
    /// the end of the stack.
    pub fn forward(&self) -> Option<String> {
        let index = self.index.get() + 1;
        if index >= self.len() {
            return None;
        }
        self.index.set(index);
        Some(self.current_path())
    }
}

impl History for MemoryHistory {
    fn current_path(&self) -> String {
        self.entries
            .borrow()
            .get(self.index.get())
            .cloned()
            .unwrap_or_default()
    }

    fn push(&self, path: &str) {
        let mut entries = self.entries.borrow_mut();
        entries.truncate(self.index.get() + 1);
        entries.push(path.to_owned());
        self.index.set(entries.len() - 1);
    }

    fn replace(&self, path: &str) {
        let mut entries = self.entries.borrow_mut();
        if let Some(slot) = entries.get_mut(self.index.get()) {
            *slot = path.to_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_truncates_forward_entries() {
        let history = MemoryHistory::new("/a");
        history.push("/b");
        history.push("/c");
        assert_eq!(history.back().as_deref(), Some("/b"));
        history.push("/d");
        assert_eq!(history.entries(), ["/a", "/b", "/d"]);
        assert_eq!(history.forward(), None);
    }

    #[test]
    fn replace_keeps_length() {
        let history = MemoryHistory::default();
        history.push("/x");
        history.replace("/y");
        assert_eq!(history.len(), 2);
        assert_eq!(history.current_path(), "/y");
        assert_eq!(history.back().as_deref(), Some("/"));
        assert_eq!(history.back(), None);
        assert_eq!(history.forward().as_deref(), Some("/y"));
    }
}
