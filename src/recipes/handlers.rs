use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Extension, Multipart, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    extract::{Payload, RecordId},
    images::services::{presign_image, store_recipe_image, UploadItem},
    recipes::{
        dto::{
            CreateItemRequest, RecipeDetailResponse, RecipeImageResponse, RecipeRequest,
            RecipeResponse,
        },
        repo_types::{CatalogItem, CatalogKind, RecipeDraft},
        services::{build_draft, check_references, validate_item_name},
    },
    state::AppState,
};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

// --- routers ---

/// Tags and ingredients share one pair of handlers; the kind travels as an
/// extension set per route.
pub fn catalog_routes() -> Router<AppState> {
    let tags = Router::new()
        .route("/recipe/tags", get(list_items).post(create_item))
        .layer(Extension(CatalogKind::Tag));
    let ingredients = Router::new()
        .route("/recipe/ingredients", get(list_items).post(create_item))
        .layer(Extension(CatalogKind::Ingredient));
    tags.merge(ingredients)
}

pub fn recipe_routes() -> Router<AppState> {
    let upload = Router::new()
        .route("/recipe/recipes/:id/upload-image", post(upload_image))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES));

    Router::new()
        .route("/recipe/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipe/recipes/:id",
            get(get_recipe)
                .put(update_recipe)
                .patch(partial_update_recipe)
                .delete(delete_recipe),
        )
        .route("/recipe/recipes/:id/image", get(get_image))
        .merge(upload)
}

// --- tags / ingredients ---

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<CatalogItem>>> {
    let items = state.recipes.list_items(kind, user_id).await?;
    Ok(Json(items))
}

#[instrument(skip(state, payload))]
pub async fn create_item(
    State(state): State<AppState>,
    Extension(kind): Extension<CatalogKind>,
    AuthUser(user_id): AuthUser,
    Payload(payload): Payload<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<CatalogItem>)> {
    let name = validate_item_name(payload.name.as_deref())?;
    let item = state.recipes.create_item(kind, user_id, &name).await?;
    info!(%user_id, item_id = %item.id, table = kind.table(), "item created");
    Ok((StatusCode::CREATED, Json(item)))
}

// --- recipes ---

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<RecipeResponse>>> {
    let recipes = state.recipes.list_recipes(user_id).await?;
    Ok(Json(recipes.into_iter().map(RecipeResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    RecordId(id): RecordId,
) -> AppResult<Json<RecipeDetailResponse>> {
    let detail = state
        .recipes
        .get_recipe_detail(user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(detail.into()))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Payload(payload): Payload<RecipeRequest>,
) -> AppResult<(StatusCode, Json<RecipeResponse>)> {
    let draft = build_draft(payload, None)?;
    check_references(state.recipes.as_ref(), user_id, &draft).await?;

    let created = state.recipes.insert_recipe(user_id, &draft).await?;
    info!(%user_id, recipe_id = %created.recipe.id, "recipe created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    RecordId(id): RecordId,
    Payload(payload): Payload<RecipeRequest>,
) -> AppResult<Json<RecipeResponse>> {
    state
        .recipes
        .get_recipe(user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let draft = build_draft(payload, None)?;
    save_recipe(&state, user_id, id, draft).await
}

#[instrument(skip(state, payload))]
pub async fn partial_update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    RecordId(id): RecordId,
    Payload(payload): Payload<RecipeRequest>,
) -> AppResult<Json<RecipeResponse>> {
    let current = state
        .recipes
        .get_recipe(user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let draft = build_draft(payload, Some(&RecipeDraft::from_refs(&current)))?;
    save_recipe(&state, user_id, id, draft).await
}

async fn save_recipe(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    draft: RecipeDraft,
) -> AppResult<Json<RecipeResponse>> {
    check_references(state.recipes.as_ref(), user_id, &draft).await?;
    let updated = state
        .recipes
        .update_recipe(user_id, id, &draft)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(%user_id, recipe_id = %id, "recipe updated");
    Ok(Json(updated.into()))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    RecordId(id): RecordId,
) -> AppResult<StatusCode> {
    let deleted = state
        .recipes
        .delete_recipe(user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(key) = deleted.image.as_deref() {
        if let Err(e) = state.storage.delete_object(key).await {
            warn!(error = %e, %key, "failed to delete recipe image");
        }
    }
    info!(%user_id, recipe_id = %id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST multipart with an `image` file field.
#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    RecordId(id): RecordId,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<RecipeImageResponse>> {
    let current = state
        .recipes
        .get_recipe(user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        upload = Some((filename, content_type, body));
        break;
    }

    let Some((filename, content_type, body)) = upload else {
        return Err(AppError::field("image", "No file was submitted."));
    };
    if body.is_empty() {
        return Err(AppError::field("image", "The submitted file is empty."));
    }

    let key = store_recipe_image(
        &state,
        UploadItem {
            body,
            filename: filename.as_deref(),
            content_type: &content_type,
        },
    )
    .await?;

    let updated = state
        .recipes
        .set_recipe_image(user_id, id, Some(&key))
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(old) = current.recipe.image.as_deref() {
        if let Err(e) = state.storage.delete_object(old).await {
            warn!(error = %e, key = %old, "failed to delete replaced recipe image");
        }
    }

    info!(%user_id, recipe_id = %id, %key, "recipe image uploaded");
    Ok(Json(RecipeImageResponse {
        id: updated.id,
        image: updated.image,
    }))
}

/// 307 to a presigned url of the stored image.
#[instrument(skip(state))]
pub async fn get_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    RecordId(id): RecordId,
) -> AppResult<Redirect> {
    let recipe = state
        .recipes
        .get_recipe(user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let key = recipe.recipe.image.ok_or(AppError::NotFound)?;
    let url = presign_image(&state, &key).await?;
    Ok(Redirect::temporary(&url))
}
