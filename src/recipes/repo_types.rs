use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// The two simple owned-list resources; both are a bare `name` per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Tag,
    Ingredient,
}

impl CatalogKind {
    pub fn table(self) -> &'static str {
        match self {
            CatalogKind::Tag => "tags",
            CatalogKind::Ingredient => "ingredients",
        }
    }

    /// Join table linking recipes to this kind, and its foreign key column.
    pub fn link(self) -> (&'static str, &'static str) {
        match self {
            CatalogKind::Tag => ("recipe_tags", "tag_id"),
            CatalogKind::Ingredient => ("recipe_ingredients", "ingredient_id"),
        }
    }

    /// Field name used in recipe payloads.
    pub fn field(self) -> &'static str {
        match self {
            CatalogKind::Tag => "tags",
            CatalogKind::Ingredient => "ingredients",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CatalogItem {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
}

pub type Tag = CatalogItem;
pub type Ingredient = CatalogItem;

impl fmt::Display for CatalogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Recipe plus the ids it references.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRefs {
    pub recipe: Recipe,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
}

/// Recipe plus the referenced rows themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<Ingredient>,
}

/// Fully validated recipe fields, used for both insert and update.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
}

impl RecipeDraft {
    pub fn from_refs(r: &RecipeRefs) -> Self {
        Self {
            title: r.recipe.title.clone(),
            time_minutes: r.recipe.time_minutes,
            price: r.recipe.price,
            link: r.recipe.link.clone(),
            tags: r.tags.clone(),
            ingredients: r.ingredients.clone(),
        }
    }
}
