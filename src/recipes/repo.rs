use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::PgRepo;
use crate::recipes::repo_types::{
    CatalogItem, CatalogKind, Recipe, RecipeDetail, RecipeDraft, RecipeRefs,
};

const RECIPE_COLUMNS: &str = "id, user_id, title, time_minutes, price, link, image, created_at";

/// Owner-scoped persistence for tags, ingredients and recipes. Every method
/// takes the caller's id and never touches rows owned by someone else.
#[async_trait]
pub trait RecipeRepo: Send + Sync {
    /// Caller's items, name descending.
    async fn list_items(&self, kind: CatalogKind, user_id: Uuid) -> anyhow::Result<Vec<CatalogItem>>;
    async fn create_item(
        &self,
        kind: CatalogKind,
        user_id: Uuid,
        name: &str,
    ) -> anyhow::Result<CatalogItem>;
    /// The subset of `ids` that exists and belongs to `user_id`.
    async fn owned_item_ids(
        &self,
        kind: CatalogKind,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> anyhow::Result<Vec<Uuid>>;

    async fn list_recipes(&self, user_id: Uuid) -> anyhow::Result<Vec<RecipeRefs>>;
    async fn get_recipe(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<RecipeRefs>>;
    async fn get_recipe_detail(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<RecipeDetail>>;
    async fn insert_recipe(&self, user_id: Uuid, draft: &RecipeDraft) -> anyhow::Result<RecipeRefs>;
    async fn update_recipe(
        &self,
        user_id: Uuid,
        id: Uuid,
        draft: &RecipeDraft,
    ) -> anyhow::Result<Option<RecipeRefs>>;
    /// Returns the deleted row.
    async fn delete_recipe(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    async fn set_recipe_image(
        &self,
        user_id: Uuid,
        id: Uuid,
        image: Option<&str>,
    ) -> anyhow::Result<Option<Recipe>>;
}

impl PgRepo {
    async fn links(
        &self,
        kind: CatalogKind,
        recipe_ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, Vec<Uuid>>> {
        let (table, column) = kind.link();
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(&format!(
            "SELECT recipe_id, {column} FROM {table} WHERE recipe_id = ANY($1)"
        ))
        .bind(recipe_ids)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("load {table}"))?;

        let mut by_recipe: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (recipe_id, item_id) in rows {
            by_recipe.entry(recipe_id).or_default().push(item_id);
        }
        Ok(by_recipe)
    }

    async fn with_refs(&self, recipes: Vec<Recipe>) -> anyhow::Result<Vec<RecipeRefs>> {
        let ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
        let mut tags = self.links(CatalogKind::Tag, &ids).await?;
        let mut ingredients = self.links(CatalogKind::Ingredient, &ids).await?;
        Ok(recipes
            .into_iter()
            .map(|recipe| RecipeRefs {
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                recipe,
            })
            .collect())
    }

    async fn linked_items(
        &self,
        kind: CatalogKind,
        recipe_id: Uuid,
    ) -> anyhow::Result<Vec<CatalogItem>> {
        let (link, column) = kind.link();
        let items = sqlx::query_as::<_, CatalogItem>(&format!(
            r#"
            SELECT i.id, i.user_id, i.name
              FROM {table} i
              JOIN {link} l ON l.{column} = i.id
             WHERE l.recipe_id = $1
             ORDER BY i.name ASC
            "#,
            table = kind.table(),
        ))
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("load {} of recipe", kind.table()))?;
        Ok(items)
    }
}

async fn replace_links_tx(
    tx: &mut Transaction<'_, Postgres>,
    kind: CatalogKind,
    recipe_id: Uuid,
    ids: &[Uuid],
) -> anyhow::Result<()> {
    let (table, column) = kind.link();
    sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("clear {table}"))?;

    if ids.is_empty() {
        return Ok(());
    }

    sqlx::query(&format!(
        r#"
        INSERT INTO {table} (recipe_id, {column})
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT DO NOTHING
        "#
    ))
    .bind(recipe_id)
    .bind(ids)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("insert {table}"))?;
    Ok(())
}

#[async_trait]
impl RecipeRepo for PgRepo {
    async fn list_items(&self, kind: CatalogKind, user_id: Uuid) -> anyhow::Result<Vec<CatalogItem>> {
        let items = sqlx::query_as::<_, CatalogItem>(&format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = $1 ORDER BY name DESC",
            kind.table()
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("list {}", kind.table()))?;
        Ok(items)
    }

    async fn create_item(
        &self,
        kind: CatalogKind,
        user_id: Uuid,
        name: &str,
    ) -> anyhow::Result<CatalogItem> {
        let item = sqlx::query_as::<_, CatalogItem>(&format!(
            "INSERT INTO {} (id, user_id, name) VALUES ($1, $2, $3) RETURNING id, user_id, name",
            kind.table()
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("insert into {}", kind.table()))?;
        Ok(item)
    }

    async fn owned_item_ids(
        &self,
        kind: CatalogKind,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> anyhow::Result<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let owned = sqlx::query_scalar::<_, Uuid>(&format!(
            "SELECT id FROM {} WHERE user_id = $1 AND id = ANY($2)",
            kind.table()
        ))
        .bind(user_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("check {} ownership", kind.table()))?;
        Ok(owned)
    }

    async fn list_recipes(&self, user_id: Uuid) -> anyhow::Result<Vec<RecipeRefs>> {
        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("list recipes")?;
        self.with_refs(recipes).await
    }

    async fn get_recipe(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<RecipeRefs>> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("get recipe")?;

        match recipe {
            Some(recipe) => Ok(self.with_refs(vec![recipe]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_recipe_detail(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<RecipeDetail>> {
        let Some(recipe) = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("get recipe detail")?
        else {
            return Ok(None);
        };

        let tags = self.linked_items(CatalogKind::Tag, recipe.id).await?;
        let ingredients = self.linked_items(CatalogKind::Ingredient, recipe.id).await?;
        Ok(Some(RecipeDetail {
            recipe,
            tags,
            ingredients,
        }))
    }

    async fn insert_recipe(&self, user_id: Uuid, draft: &RecipeDraft) -> anyhow::Result<RecipeRefs> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            INSERT INTO recipes (id, user_id, title, time_minutes, price, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&draft.title)
        .bind(draft.time_minutes)
        .bind(draft.price)
        .bind(&draft.link)
        .fetch_one(&mut *tx)
        .await
        .context("insert recipe")?;

        replace_links_tx(&mut tx, CatalogKind::Tag, recipe.id, &draft.tags).await?;
        replace_links_tx(&mut tx, CatalogKind::Ingredient, recipe.id, &draft.ingredients).await?;
        tx.commit().await.context("commit tx")?;

        Ok(RecipeRefs {
            recipe,
            tags: dedup(&draft.tags),
            ingredients: dedup(&draft.ingredients),
        })
    }

    async fn update_recipe(
        &self,
        user_id: Uuid,
        id: Uuid,
        draft: &RecipeDraft,
    ) -> anyhow::Result<Option<RecipeRefs>> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let Some(recipe) = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            UPDATE recipes
               SET title = $3, time_minutes = $4, price = $5, link = $6
             WHERE id = $1 AND user_id = $2
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&draft.title)
        .bind(draft.time_minutes)
        .bind(draft.price)
        .bind(&draft.link)
        .fetch_optional(&mut *tx)
        .await
        .context("update recipe")?
        else {
            return Ok(None);
        };

        replace_links_tx(&mut tx, CatalogKind::Tag, recipe.id, &draft.tags).await?;
        replace_links_tx(&mut tx, CatalogKind::Ingredient, recipe.id, &draft.ingredients).await?;
        tx.commit().await.context("commit tx")?;

        Ok(Some(RecipeRefs {
            recipe,
            tags: dedup(&draft.tags),
            ingredients: dedup(&draft.ingredients),
        }))
    }

    async fn delete_recipe(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let deleted = sqlx::query_as::<_, Recipe>(&format!(
            "DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING {RECIPE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("delete recipe")?;
        Ok(deleted)
    }

    async fn set_recipe_image(
        &self,
        user_id: Uuid,
        id: Uuid,
        image: Option<&str>,
    ) -> anyhow::Result<Option<Recipe>> {
        let updated = sqlx::query_as::<_, Recipe>(&format!(
            "UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2 RETURNING {RECIPE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(image)
        .fetch_optional(&self.pool)
        .await
        .context("set recipe image")?;
        Ok(updated)
    }
}

/// Keeps first occurrences, matching what `ON CONFLICT DO NOTHING` stores.
pub(crate) fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}
