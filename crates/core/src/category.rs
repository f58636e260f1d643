use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of spending categories every probability vector covers.
pub const CATEGORY_COUNT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub u8);

impl CategoryId {
    /// Catch-all category used when nothing more specific is recognised.
    pub const OTHERS: CategoryId = CategoryId(15);

    /// Builds an id from a zero-based vector index.
    pub fn from_index(index: usize) -> Option<Self> {
        if index < CATEGORY_COUNT {
            Some(CategoryId(index as u8 + 1))
        } else {
            None
        }
    }

    /// Zero-based position of this category in a probability vector,
    /// `None` outside 1..=15.
    pub fn index(self) -> Option<usize> {
        self.is_valid().then(|| usize::from(self.0) - 1)
    }

    pub fn is_valid(self) -> bool {
        (1..=CATEGORY_COUNT as u8).contains(&self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

pub const DEFAULT_CATEGORIES: &[(u8, &str)] = &[
    (1, "Food & Dining"),
    (2, "Groceries"),
    (3, "Transportation"),
    (4, "Shopping"),
    (5, "Entertainment"),
    (6, "Healthcare"),
    (7, "Bills & Utilities"),
    (8, "Travel"),
    (9, "Education"),
    (10, "Investments"),
    (11, "Insurance"),
    (12, "Subscriptions"),
    (13, "Fuel"),
    (14, "Gifts & Donations"),
    (15, "Others"),
];

/// Read-only table of the spending categories, indexed by `id - 1`.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        let categories = DEFAULT_CATEGORIES
            .iter()
            .map(|(id, name)| Category {
                id: CategoryId(*id),
                name: name.to_string(),
            })
            .collect();
        Self { categories }
    }
}

impl CategoryCatalog {
    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        id.index().and_then(|i| self.categories.get(i))
    }

    /// Display name for `id`, or an empty string for ids outside the catalog.
    pub fn name(&self, id: CategoryId) -> &str {
        self.get(id).map(|c| c.name.as_str()).unwrap_or("")
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_fifteen_categories_in_id_order() {
        let catalog = CategoryCatalog::default();
        assert_eq!(catalog.len(), CATEGORY_COUNT);
        for (i, c) in catalog.iter().enumerate() {
            assert_eq!(c.id.index(), Some(i));
        }
    }

    #[test]
    fn lookup_by_id() {
        let catalog = CategoryCatalog::default();
        assert_eq!(catalog.name(CategoryId(1)), "Food & Dining");
        assert_eq!(catalog.name(CategoryId(7)), "Bills & Utilities");
        assert_eq!(catalog.name(CategoryId::OTHERS), "Others");
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        let catalog = CategoryCatalog::default();
        assert!(catalog.get(CategoryId(0)).is_none());
        assert!(catalog.get(CategoryId(16)).is_none());
        assert_eq!(catalog.name(CategoryId(0)), "");
    }

    #[test]
    fn index_conversion() {
        assert_eq!(CategoryId::from_index(0), Some(CategoryId(1)));
        assert_eq!(CategoryId::from_index(14), Some(CategoryId::OTHERS));
        assert_eq!(CategoryId::from_index(15), None);
        assert_eq!(CategoryId(3).index(), Some(2));
        assert_eq!(CategoryId(0).index(), None);
        assert_eq!(CategoryId(16).index(), None);
    }

    #[test]
    fn category_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&CategoryId(4)).unwrap();
        assert_eq!(json, "4");
    }
}
