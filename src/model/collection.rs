//! Generic collection abstraction shared by every metadata kind
//!
//! Tables, Columns, Partitions, Measures, Relationships, Cultures and Roles are all
//! stored in a `Collection<T>`. This mirrors the original library's `PyObjects` base
//! class, made generic instead of duplicated per object kind.

use std::ops::{AddAssign, Index};

/// Anything that can be looked up by name inside a `Collection`
pub trait Named {
    fn name(&self) -> &str;
}

/// Ordered, name-addressable container over one metadata kind
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Named> Collection<T> {
    /// Exact, case-sensitive name lookup. Ties (which should not occur, per the
    /// sibling-uniqueness invariant) break to the last-inserted match.
    pub fn by_name(&self, name: &str) -> Option<&T> {
        self.items.iter().rev().find(|item| item.name() == name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name(name).is_some()
    }

    /// Mutable counterpart to [`Collection::by_name`]; same last-inserted tie-break.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut T> {
        self.items.iter_mut().rev().find(|item| item.name() == name)
    }

    /// Removes and returns the last-inserted element named `name`, if any.
    pub fn remove(&mut self, name: &str) -> Option<T> {
        let index = self.items.iter().rposition(|item| item.name() == name)?;
        Some(self.items.remove(index))
    }
}

impl<T: Named + Clone> Collection<T> {
    /// Case-insensitive substring search, returning a new collection of the same kind.
    pub fn find(&self, substring: &str) -> Collection<T> {
        let needle = substring.to_lowercase();
        let matches = self
            .items
            .iter()
            .filter(|item| item.name().to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Collection::from_vec(matches)
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for Collection<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Clone> AddAssign<&Collection<T>> for Collection<T> {
    /// `A += B`: merges B's elements into A preserving order. This is a view
    /// construction helper — it never mutates the server-side model.
    fn add_assign(&mut self, rhs: &Collection<T>) {
        self.items.extend(rhs.items.iter().cloned());
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Collection::from_vec(iter.into_iter().collect())
    }
}
