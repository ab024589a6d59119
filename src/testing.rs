//! Test doubles: an in-memory repository and a router harness.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::FromRef,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;
use uuid::Uuid;

use crate::app::build_app;
use crate::auth::jwt::JwtKeys;
use crate::auth::password::UNUSABLE_PASSWORD;
use crate::auth::repo::{DuplicateEmail, UserRepo};
use crate::auth::repo_types::{NewUser, User, UserChanges};
use crate::recipes::repo::RecipeRepo;
use crate::recipes::repo_types::{
    CatalogItem, CatalogKind, Recipe, RecipeDetail, RecipeDraft, RecipeRefs,
};
use crate::state::AppState;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tags: Vec<CatalogItem>,
    ingredients: Vec<CatalogItem>,
    recipes: Vec<Recipe>,
    recipe_tags: Vec<(Uuid, Uuid)>,
    recipe_ingredients: Vec<(Uuid, Uuid)>,
}

impl Tables {
    fn items(&self, kind: CatalogKind) -> &Vec<CatalogItem> {
        match kind {
            CatalogKind::Tag => &self.tags,
            CatalogKind::Ingredient => &self.ingredients,
        }
    }

    fn items_mut(&mut self, kind: CatalogKind) -> &mut Vec<CatalogItem> {
        match kind {
            CatalogKind::Tag => &mut self.tags,
            CatalogKind::Ingredient => &mut self.ingredients,
        }
    }

    fn links(&self, kind: CatalogKind) -> &Vec<(Uuid, Uuid)> {
        match kind {
            CatalogKind::Tag => &self.recipe_tags,
            CatalogKind::Ingredient => &self.recipe_ingredients,
        }
    }

    fn links_mut(&mut self, kind: CatalogKind) -> &mut Vec<(Uuid, Uuid)> {
        match kind {
            CatalogKind::Tag => &mut self.recipe_tags,
            CatalogKind::Ingredient => &mut self.recipe_ingredients,
        }
    }

    fn linked_ids(&self, kind: CatalogKind, recipe_id: Uuid) -> Vec<Uuid> {
        self.links(kind)
            .iter()
            .filter(|(r, _)| *r == recipe_id)
            .map(|(_, item)| *item)
            .collect()
    }

    fn refs(&self, recipe: &Recipe) -> RecipeRefs {
        RecipeRefs {
            recipe: recipe.clone(),
            tags: self.linked_ids(CatalogKind::Tag, recipe.id),
            ingredients: self.linked_ids(CatalogKind::Ingredient, recipe.id),
        }
    }

    fn replace_links(&mut self, recipe_id: Uuid, draft: &RecipeDraft) {
        for (kind, ids) in [
            (CatalogKind::Tag, &draft.tags),
            (CatalogKind::Ingredient, &draft.ingredients),
        ] {
            let links = self.links_mut(kind);
            links.retain(|(r, _)| *r != recipe_id);
            for id in ids {
                if !links.contains(&(recipe_id, *id)) {
                    links.push((recipe_id, *id));
                }
            }
        }
    }

    fn recipe_mut(&mut self, user_id: Uuid, id: Uuid) -> Option<&mut Recipe> {
        self.recipes
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id)
    }
}

/// Same contract as `PgRepo`, kept in a lock.
#[derive(Default)]
pub struct MemoryRepo {
    tables: RwLock<Tables>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn set_active(&self, id: Uuid, active: bool) {
        let mut t = self.tables.write().await;
        if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
            user.is_active = active;
        }
    }

    pub async fn remove_user(&self, id: Uuid) {
        self.tables.write().await.users.retain(|u| u.id != id);
    }
}

#[async_trait]
impl UserRepo for MemoryRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<User> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(DuplicateEmail(user.email).into());
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            is_active: true,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.write().await;
        if let Some(email) = changes.email.as_deref() {
            if t.users.iter().any(|u| u.email == email && u.id != id) {
                return Err(DuplicateEmail(email.to_string()).into());
            }
        }
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl RecipeRepo for MemoryRepo {
    async fn list_items(&self, kind: CatalogKind, user_id: Uuid) -> anyhow::Result<Vec<CatalogItem>> {
        let t = self.tables.read().await;
        let mut items: Vec<CatalogItem> = t
            .items(kind)
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(items)
    }

    async fn create_item(
        &self,
        kind: CatalogKind,
        user_id: Uuid,
        name: &str,
    ) -> anyhow::Result<CatalogItem> {
        let item = CatalogItem {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
        };
        self.tables.write().await.items_mut(kind).push(item.clone());
        Ok(item)
    }

    async fn owned_item_ids(
        &self,
        kind: CatalogKind,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> anyhow::Result<Vec<Uuid>> {
        let t = self.tables.read().await;
        Ok(t.items(kind)
            .iter()
            .filter(|i| i.user_id == user_id && ids.contains(&i.id))
            .map(|i| i.id)
            .collect())
    }

    async fn list_recipes(&self, user_id: Uuid) -> anyhow::Result<Vec<RecipeRefs>> {
        let t = self.tables.read().await;
        Ok(t.recipes
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| t.refs(r))
            .collect())
    }

    async fn get_recipe(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<RecipeRefs>> {
        let t = self.tables.read().await;
        Ok(t.recipes
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .map(|r| t.refs(r)))
    }

    async fn get_recipe_detail(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<RecipeDetail>> {
        let t = self.tables.read().await;
        let Some(recipe) = t.recipes.iter().find(|r| r.id == id && r.user_id == user_id) else {
            return Ok(None);
        };
        let nested = |kind: CatalogKind| {
            let ids = t.linked_ids(kind, recipe.id);
            let mut items: Vec<CatalogItem> = t
                .items(kind)
                .iter()
                .filter(|i| ids.contains(&i.id))
                .cloned()
                .collect();
            items.sort_by(|a, b| a.name.cmp(&b.name));
            items
        };
        Ok(Some(RecipeDetail {
            recipe: recipe.clone(),
            tags: nested(CatalogKind::Tag),
            ingredients: nested(CatalogKind::Ingredient),
        }))
    }

    async fn insert_recipe(&self, user_id: Uuid, draft: &RecipeDraft) -> anyhow::Result<RecipeRefs> {
        let mut t = self.tables.write().await;
        let recipe = Recipe {
            id: Uuid::new_v4(),
            user_id,
            title: draft.title.clone(),
            time_minutes: draft.time_minutes,
            price: draft.price,
            link: draft.link.clone(),
            image: None,
            created_at: OffsetDateTime::now_utc(),
        };
        t.recipes.push(recipe.clone());
        t.replace_links(recipe.id, draft);
        Ok(t.refs(&recipe))
    }

    async fn update_recipe(
        &self,
        user_id: Uuid,
        id: Uuid,
        draft: &RecipeDraft,
    ) -> anyhow::Result<Option<RecipeRefs>> {
        let mut t = self.tables.write().await;
        let Some(recipe) = t.recipe_mut(user_id, id) else {
            return Ok(None);
        };
        recipe.title = draft.title.clone();
        recipe.time_minutes = draft.time_minutes;
        recipe.price = draft.price;
        recipe.link = draft.link.clone();
        let recipe = recipe.clone();
        t.replace_links(id, draft);
        Ok(Some(t.refs(&recipe)))
    }

    async fn delete_recipe(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let mut t = self.tables.write().await;
        let Some(pos) = t
            .recipes
            .iter()
            .position(|r| r.id == id && r.user_id == user_id)
        else {
            return Ok(None);
        };
        let removed = t.recipes.remove(pos);
        t.recipe_tags.retain(|(r, _)| *r != id);
        t.recipe_ingredients.retain(|(r, _)| *r != id);
        Ok(Some(removed))
    }

    async fn set_recipe_image(
        &self,
        user_id: Uuid,
        id: Uuid,
        image: Option<&str>,
    ) -> anyhow::Result<Option<Recipe>> {
        let mut t = self.tables.write().await;
        Ok(t.recipe_mut(user_id, id).map(|recipe| {
            recipe.image = image.map(str::to_string);
            recipe.clone()
        }))
    }
}

/// The full app over in-memory state, plus request helpers.
pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<MemoryRepo>,
    router: NormalizePath<Router>,
}

impl TestApp {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryRepo::new());
        let state = AppState::fake_with(repo.clone());
        let router = build_app(state.clone());
        Self {
            state,
            repo,
            router,
        }
    }

    /// Signs a token for `user_id` without touching the user table.
    pub fn token_for(&self, user_id: Uuid) -> String {
        JwtKeys::from_ref(&self.state)
            .sign(user_id)
            .expect("sign token")
    }

    /// Stores a user without a usable password and returns its id and a
    /// bearer token.
    pub async fn user(&self, email: &str) -> (Uuid, String) {
        let user = self
            .state
            .users
            .insert(NewUser {
                email: email.to_string(),
                name: "tester".into(),
                password_hash: UNUSABLE_PASSWORD.into(),
                is_staff: false,
                is_superuser: false,
            })
            .await
            .expect("insert user");
        (user.id, self.token_for(user.id))
    }

    /// Registers through the HTTP endpoint, so the password is really hashed.
    pub async fn register(&self, email: &str, password: &str) {
        let (status, body) = self
            .request(
                Method::POST,
                "/user/create",
                None,
                Some(serde_json::json!({ "email": email, "name": "tester", "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.expect("infallible")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let res = self.send(req).await;
        let status = res.status();
        (status, read_json(res).await)
    }
}

/// Body as JSON; `Null` when empty, a string when not JSON.
pub async fn read_json(res: Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}
