use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::extract::{Fields, FromFields};
use crate::recipes::repo_types::{Ingredient, RecipeDetail, RecipeRefs, Tag};

#[derive(Debug)]
pub struct CreateItemRequest {
    pub name: Option<String>,
}

/// Body of POST/PUT/PATCH on recipes. PATCH may omit anything.
#[derive(Debug, Default)]
pub struct RecipeRequest {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<Uuid>>,
}

impl FromFields for CreateItemRequest {
    fn from_fields(f: &mut Fields) -> Self {
        Self {
            name: f.string("name"),
        }
    }
}

impl FromFields for RecipeRequest {
    fn from_fields(f: &mut Fields) -> Self {
        Self {
            title: f.string("title"),
            time_minutes: f.integer("time_minutes"),
            price: f.decimal("price"),
            link: f.string("link"),
            tags: f.id_list("tags"),
            ingredients: f.id_list("ingredients"),
        }
    }
}

/// Flat form: related objects as id lists.
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: Uuid,
    pub title: String,
    pub ingredients: Vec<Uuid>,
    pub tags: Vec<Uuid>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
}

impl From<RecipeRefs> for RecipeResponse {
    fn from(r: RecipeRefs) -> Self {
        Self {
            id: r.recipe.id,
            title: r.recipe.title,
            ingredients: r.ingredients,
            tags: r.tags,
            time_minutes: r.recipe.time_minutes,
            price: r.recipe.price,
            link: r.recipe.link,
        }
    }
}

/// Detail form: related objects nested.
#[derive(Debug, Serialize)]
pub struct RecipeDetailResponse {
    pub id: Uuid,
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub tags: Vec<Tag>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
}

impl From<RecipeDetail> for RecipeDetailResponse {
    fn from(d: RecipeDetail) -> Self {
        Self {
            id: d.recipe.id,
            title: d.recipe.title,
            ingredients: d.ingredients,
            tags: d.tags,
            time_minutes: d.recipe.time_minutes,
            price: d.recipe.price,
            link: d.recipe.link,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: Uuid,
    pub image: Option<String>,
}
