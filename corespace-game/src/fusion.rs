//! Order-independent fusion recipe lookup.
//!
//! The resolver only answers "what would these two produce"; it never touches
//! the grid or the placed-item list.

use std::collections::HashMap;

use crate::catalog::{Catalog, Item};
use crate::error::ActionError;
use crate::inventory::PlacedItem;

/// Symmetric key for a pair of catalog ids.
#[must_use]
pub fn fusion_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}+{b}")
    } else {
        format!("{b}+{a}")
    }
}

/// Precomputed map from unordered input pairs to outputs.
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    outputs: HashMap<String, Item>,
}

impl RecipeBook {
    /// Register a recipe, returning the previous output for the same pair.
    pub fn insert(&mut self, a: &str, b: &str, output: Item) -> Option<Item> {
        self.outputs.insert(fusion_key(a, b), output)
    }

    #[must_use]
    pub fn find(&self, a: &str, b: &str) -> Option<&Item> {
        self.outputs.get(&fusion_key(a, b))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Iterate `(key, output)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.outputs.iter().map(|(key, item)| (key.as_str(), item))
    }
}

/// Output produced by fusing two catalog ids, if a recipe exists.
#[must_use]
pub fn find_recipe<'c>(catalog: &'c Catalog, a: &str, b: &str) -> Option<&'c Item> {
    catalog.recipes().find(a, b)
}

/// Resolve the output for fusing two placements.
///
/// Two distinct instances of the same catalog item may fuse when an `id+id`
/// recipe exists; only fusing an instance with itself is refused.
///
/// # Errors
///
/// Returns [`ActionError::SameInstance`] or [`ActionError::NoRecipe`].
pub fn can_fuse<'c>(
    catalog: &'c Catalog,
    source: &PlacedItem,
    target: &PlacedItem,
) -> Result<&'c Item, ActionError> {
    if source.instance_id == target.instance_id {
        return Err(ActionError::SameInstance);
    }
    find_recipe(catalog, &source.item.id, &target.item.id).ok_or_else(|| ActionError::NoRecipe {
        a: source.item.id.clone(),
        b: target.item.id.clone(),
    })
}
