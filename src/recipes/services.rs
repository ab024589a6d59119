use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::{AppResult, FieldErrors},
    recipes::{
        dto::RecipeRequest,
        repo::{dedup, RecipeRepo},
        repo_types::{CatalogKind, RecipeDraft},
    },
};

pub const MAX_TEXT_LEN: usize = 255;
const REQUIRED: &str = "This field is required.";
// NUMERIC(5, 2)
const PRICE_DECIMAL_PLACES: u32 = 2;
const PRICE_MAX_WHOLE_DIGITS: u32 = 3;

fn check_text(errors: &mut FieldErrors, field: &str, value: &str, allow_blank: bool) {
    if !allow_blank && value.trim().is_empty() {
        errors.add(field, "This field may not be blank.");
    } else if value.chars().count() > MAX_TEXT_LEN {
        errors.add(
            field,
            format!("Ensure this field has no more than {MAX_TEXT_LEN} characters."),
        );
    }
}

fn check_price(errors: &mut FieldErrors, price: Decimal) {
    if price.normalize().scale() > PRICE_DECIMAL_PLACES {
        errors.add(
            "price",
            format!("Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."),
        );
    } else if price.abs() >= Decimal::from(10_i64.pow(PRICE_MAX_WHOLE_DIGITS)) {
        errors.add(
            "price",
            format!(
                "Ensure that there are no more than {PRICE_MAX_WHOLE_DIGITS} digits before the decimal point."
            ),
        );
    }
}

fn with_cents(price: Decimal) -> Decimal {
    let mut price = price;
    price.rescale(PRICE_DECIMAL_PLACES);
    price
}

/// Validated, trimmed name for a new tag or ingredient.
pub fn validate_item_name(name: Option<&str>) -> AppResult<String> {
    let mut errors = FieldErrors::new();
    match name {
        Some(name) => check_text(&mut errors, "name", name, false),
        None => errors.add("name", REQUIRED),
    }
    errors.into_result()?;
    Ok(name.unwrap_or_default().trim().to_string())
}

/// Turns a request into a complete draft. Without `base` every required
/// field must be present (create, PUT); with `base` missing fields are
/// taken from it (PATCH).
pub fn build_draft(req: RecipeRequest, base: Option<&RecipeDraft>) -> AppResult<RecipeDraft> {
    let mut errors = FieldErrors::new();

    if let Some(title) = req.title.as_deref() {
        check_text(&mut errors, "title", title, false);
    }
    if let Some(minutes) = req.time_minutes {
        if minutes < 0 {
            errors.add("time_minutes", "Ensure this value is greater than or equal to 0.");
        }
    }
    if let Some(price) = req.price {
        check_price(&mut errors, price);
    }
    if let Some(link) = req.link.as_deref() {
        check_text(&mut errors, "link", link, true);
    }

    if base.is_none() {
        let present = [
            ("title", req.title.is_some()),
            ("time_minutes", req.time_minutes.is_some()),
            ("price", req.price.is_some()),
            ("tags", req.tags.is_some()),
            ("ingredients", req.ingredients.is_some()),
        ];
        for (field, is_present) in present {
            if !is_present {
                errors.add(field, REQUIRED);
            }
        }
    }
    errors.into_result()?;

    let draft = match base {
        Some(base) => RecipeDraft {
            title: req
                .title
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| base.title.clone()),
            time_minutes: req.time_minutes.unwrap_or(base.time_minutes),
            price: req.price.map(with_cents).unwrap_or(base.price),
            link: req.link.unwrap_or_else(|| base.link.clone()),
            tags: req.tags.unwrap_or_else(|| base.tags.clone()),
            ingredients: req.ingredients.unwrap_or_else(|| base.ingredients.clone()),
        },
        None => RecipeDraft {
            title: req.title.unwrap_or_default().trim().to_string(),
            time_minutes: req.time_minutes.unwrap_or_default(),
            price: with_cents(req.price.unwrap_or_default()),
            link: req.link.unwrap_or_default(),
            tags: req.tags.unwrap_or_default(),
            ingredients: req.ingredients.unwrap_or_default(),
        },
    };
    Ok(RecipeDraft {
        tags: dedup(&draft.tags),
        ingredients: dedup(&draft.ingredients),
        ..draft
    })
}

/// Every referenced tag and ingredient must belong to `user_id`.
pub async fn check_references(
    repo: &dyn RecipeRepo,
    user_id: Uuid,
    draft: &RecipeDraft,
) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    for (kind, ids) in [
        (CatalogKind::Tag, &draft.tags),
        (CatalogKind::Ingredient, &draft.ingredients),
    ] {
        let owned = repo.owned_item_ids(kind, user_id, ids).await?;
        for id in ids.iter().filter(|id| !owned.contains(*id)) {
            errors.add(
                kind.field(),
                format!("Invalid pk \"{id}\" - object does not exist."),
            );
        }
    }
    errors.into_result()
}
