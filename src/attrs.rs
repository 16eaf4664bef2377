use crate::proto::{ATTR_NAME_MAX, ATTR_VALUE_MAX};
use crate::result::Error;

/// Ordered attribute map scoped to one session.
///
/// Keys are unique; a repeated `set` overwrites the value in place, keeping
/// the position of first insertion. `first`/`next` iterate insertion order
/// through a single cursor per store. Iteration is not reentrant, and any
/// mutation (`set`, `sort`, `flush`) invalidates the cursor, after which
/// `next` returns `None` until `first` is called again.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AttributeStore {
    entries: Vec<(String, String)>,
    cursor: Option<usize>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an attribute. Names are capped at 64 bytes and
    /// values at 255; empty names or values are rejected. On failure the
    /// store is left unchanged.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if name.is_empty() || name.len() > ATTR_NAME_MAX {
            return Err(Error::InvalidArgument);
        }
        if value.is_empty() || value.len() > ATTR_VALUE_MAX {
            return Err(Error::InvalidArgument);
        }
        self.cursor = None;
        match self.entries.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.to_owned(),
            None => self.entries.push((name.to_owned(), value.to_owned())),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Reset the cursor to the head and return the first key, if any.
    pub fn first(&mut self) -> Option<&str> {
        self.cursor = if self.entries.is_empty() { None } else { Some(0) };
        self.cursor.map(|i| self.entries[i].0.as_str())
    }

    /// Advance the cursor and return the next key. Returns `None` once the
    /// end is reached or after the store was mutated since `first`.
    pub fn next(&mut self) -> Option<&str> {
        let next = self.cursor?.checked_add(1)?;
        if next >= self.entries.len() {
            return None;
        }
        self.cursor = Some(next);
        Some(self.entries[next].0.as_str())
    }

    /// Reorder entries by key for deterministic external transmission.
    pub fn sort(&mut self) {
        self.cursor = None;
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
    }

    /// Drop all entries and reset the cursor.
    pub fn flush(&mut self) {
        self.cursor = None;
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cursor-free iteration in the store's current order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_rejects_out_of_bounds_and_leaves_store_unchanged() {
        let mut attrs = AttributeStore::new();
        attrs.set("sess.id", "abc").unwrap();

        let long_name = "n".repeat(65);
        let long_value = "v".repeat(256);
        assert_eq!(attrs.set(&long_name, "x"), Err(Error::InvalidArgument));
        assert_eq!(attrs.set("user.id", &long_value), Err(Error::InvalidArgument));
        assert_eq!(attrs.set("", "x"), Err(Error::InvalidArgument));
        assert_eq!(attrs.set("user.id", ""), Err(Error::InvalidArgument));

        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("sess.id"), Some("abc"));

        // boundary lengths are accepted
        attrs.set(&"n".repeat(64), &"v".repeat(255)).unwrap();
    }

    #[test]
    fn overwrite_keeps_first_insertion_order() {
        let mut attrs = AttributeStore::new();
        attrs.set("a", "1").unwrap();
        attrs.set("b", "2").unwrap();
        attrs.set("a", "3").unwrap();

        let order: Vec<_> = attrs.iter().collect();
        assert_eq!(order, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn cursor_walks_insertion_order() {
        let mut attrs = AttributeStore::new();
        attrs.set("b", "2").unwrap();
        attrs.set("a", "1").unwrap();
        attrs.set("c", "3").unwrap();

        assert_eq!(attrs.first(), Some("b"));
        assert_eq!(attrs.next(), Some("a"));
        assert_eq!(attrs.next(), Some("c"));
        assert_eq!(attrs.next(), None);

        assert_eq!(attrs.first(), Some("b"));
    }

    #[test]
    fn empty_store_cursor() {
        let mut attrs = AttributeStore::new();
        assert_eq!(attrs.first(), None);
        assert_eq!(attrs.next(), None);
    }

    #[test]
    fn mutation_invalidates_cursor() {
        let mut attrs = AttributeStore::new();
        attrs.set("a", "1").unwrap();
        attrs.set("b", "2").unwrap();

        assert_eq!(attrs.first(), Some("a"));
        attrs.set("c", "3").unwrap();
        // documented behavior: cursor is dead until first() is called again
        assert_eq!(attrs.next(), None);

        assert_eq!(attrs.first(), Some("a"));
        attrs.flush();
        assert_eq!(attrs.next(), None);
    }

    #[test]
    fn sort_orders_by_key() {
        let mut attrs = AttributeStore::new();
        attrs.set("c", "3").unwrap();
        attrs.set("a", "1").unwrap();
        attrs.set("b", "2").unwrap();
        attrs.sort();

        let order: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn flush_clears_for_reuse() {
        let mut attrs = AttributeStore::new();
        attrs.set("a", "1").unwrap();
        attrs.flush();
        assert!(attrs.is_empty());
        assert_eq!(attrs.get("a"), None);
        attrs.set("b", "2").unwrap();
        assert_eq!(attrs.first(), Some("b"));
    }
}
