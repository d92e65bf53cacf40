//! Static item catalog and fusion recipe definitions.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hasher;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use twox_hash::XxHash64;

use crate::fusion::{RecipeBook, fusion_key};

/// Item categories placed on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Task,
    Resource,
    Buff,
    Parasite,
}

impl ItemKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Resource => "resource",
            Self::Buff => "buff",
            Self::Parasite => "parasite",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rarity tier, which also drives aura strength for buffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Common,
    Improved,
    Rare,
    Unique,
}

/// Effect applied when an item is consumed, resolved, or active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ItemEffect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<u32>,
    #[serde(default)]
    pub description: String,
}

impl ItemEffect {
    /// Whether the effect lowers focus.
    #[must_use]
    pub fn drains_focus(&self) -> bool {
        self.focus.is_some_and(|focus| focus < 0)
    }
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub width: u8,
    pub height: u8,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub effect: ItemEffect,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default)]
    pub craftable: bool,
    /// Energy deducted from the user when the item is placed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_cost: Option<i32>,
}

impl Item {
    /// Build a minimal item, mostly useful for tests and fixtures.
    #[must_use]
    pub fn new(id: &str, kind: ItemKind, width: u8, height: u8) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            width,
            height,
            rarity: Rarity::Common,
            effect: ItemEffect::default(),
            stackable: false,
            craftable: false,
            energy_cost: None,
        }
    }

    #[must_use]
    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    /// Energy required to place the item, zero when it carries no cost.
    #[must_use]
    pub fn placement_cost(&self) -> i32 {
        self.energy_cost.unwrap_or(0).max(0)
    }
}

/// Recipe output as written in catalog data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipeOutput {
    /// Output is an existing catalog item.
    Existing(String),
    /// Output is a synthetic variant derived from a catalog item.
    Variant(VariantDef),
}

/// Synthetic item derived from a base catalog entry with overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDef {
    pub base: String,
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rarity: Option<Rarity>,
    #[serde(default)]
    pub effect: Option<ItemEffect>,
}

/// Unordered pair of inputs mapped to one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDef {
    pub inputs: [String; 2],
    pub output: RecipeOutput,
}

/// Raw catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CatalogData {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub recipes: Vec<RecipeDef>,
}

/// Errors raised when catalog data is malformed.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON is invalid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("item id {id} is declared more than once")]
    DuplicateItem { id: String },
    #[error("item {id} must be at least 1x1 (got {width}x{height})")]
    EmptyFootprint { id: String, width: u8, height: u8 },
    #[error("recipe references unknown input {id}")]
    UnknownRecipeInput { id: String },
    #[error("recipe references unknown output {id}")]
    UnknownRecipeOutput { id: String },
    #[error("recipe {key} is declared more than once")]
    DuplicateRecipe { key: String },
    #[error("variant id {id} collides with a catalog item")]
    VariantCollision { id: String },
}

/// Validated, indexed catalog. Read-only once built.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<Item>,
    index: HashMap<String, usize>,
    variants: HashMap<String, Item>,
    recipes: RecipeBook,
    fingerprint: u64,
}

impl Catalog {
    /// Parse and validate a catalog document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or violates catalog invariants.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_str(json)?;
        Self::from_data(data)
    }

    /// Validate and index pre-parsed catalog data.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate ids, empty footprints, or dangling recipe references.
    pub fn from_data(data: CatalogData) -> Result<Self, CatalogError> {
        let fingerprint = fingerprint_of(&data);
        let mut index = HashMap::with_capacity(data.items.len());
        for (pos, item) in data.items.iter().enumerate() {
            if item.width == 0 || item.height == 0 {
                return Err(CatalogError::EmptyFootprint {
                    id: item.id.clone(),
                    width: item.width,
                    height: item.height,
                });
            }
            if index.insert(item.id.clone(), pos).is_some() {
                return Err(CatalogError::DuplicateItem {
                    id: item.id.clone(),
                });
            }
        }

        let mut variants = HashMap::new();
        let mut recipes = RecipeBook::default();
        for recipe in &data.recipes {
            for input in &recipe.inputs {
                if !index.contains_key(input) && !variants.contains_key(input) {
                    return Err(CatalogError::UnknownRecipeInput { id: input.clone() });
                }
            }
            let output = match &recipe.output {
                RecipeOutput::Existing(id) => index
                    .get(id)
                    .map(|&pos| data.items[pos].clone())
                    .ok_or_else(|| CatalogError::UnknownRecipeOutput { id: id.clone() })?,
                RecipeOutput::Variant(def) => {
                    let variant = build_variant(&data.items, &index, def)?;
                    variants.insert(variant.id.clone(), variant.clone());
                    variant
                }
            };
            let [a, b] = &recipe.inputs;
            if recipes.insert(a, b, output).is_some() {
                return Err(CatalogError::DuplicateRecipe {
                    key: fusion_key(a, b),
                });
            }
        }

        Ok(Self {
            items: data.items,
            index,
            variants,
            recipes,
            fingerprint,
        })
    }

    /// Built-in catalog shipped with the crate.
    ///
    /// # Panics
    ///
    /// Panics if the embedded catalog asset is corrupt, which is a build defect.
    #[must_use]
    pub fn builtin() -> Arc<Self> {
        static CATALOG: OnceLock<Arc<Catalog>> = OnceLock::new();
        CATALOG
            .get_or_init(|| {
                Arc::new(
                    Self::from_json(include_str!("../data/catalog.json"))
                        .expect("valid built-in catalog"),
                )
            })
            .clone()
    }

    /// Empty catalog (useful for tests)
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            variants: HashMap::new(),
            recipes: RecipeBook::default(),
            fingerprint: fingerprint_of(&CatalogData::default()),
        }
    }

    /// Look up an item or synthetic recipe variant by id.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.index
            .get(id)
            .map(|&pos| &self.items[pos])
            .or_else(|| self.variants.get(id))
    }

    /// Catalog entries in declaration order (variants excluded).
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Catalog entries of the given kind, in declaration order.
    pub fn items_of_kind(&self, kind: ItemKind) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(move |item| item.kind == kind)
    }

    #[must_use]
    pub const fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    /// Stable hash of the source document, used to detect catalog changes.
    #[must_use]
    pub const fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn build_variant(
    items: &[Item],
    index: &HashMap<String, usize>,
    def: &VariantDef,
) -> Result<Item, CatalogError> {
    if index.contains_key(&def.id) {
        return Err(CatalogError::VariantCollision { id: def.id.clone() });
    }
    let base = index
        .get(&def.base)
        .map(|&pos| &items[pos])
        .ok_or_else(|| CatalogError::UnknownRecipeOutput {
            id: def.base.clone(),
        })?;
    let mut variant = base.clone();
    variant.id.clone_from(&def.id);
    if let Some(name) = &def.name {
        variant.name.clone_from(name);
    }
    if let Some(rarity) = def.rarity {
        variant.rarity = rarity;
    }
    if let Some(effect) = &def.effect {
        variant.effect = effect.clone();
    }
    Ok(variant)
}

fn fingerprint_of(data: &CatalogData) -> u64 {
    let bytes = serde_json::to_vec(data).unwrap_or_default();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&bytes);
    hasher.finish()
}
