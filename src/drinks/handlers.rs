use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use super::{
    dto::{DeletedResponse, DrinkBody, DrinksResponse, UpdatedResponse},
    model::{parse_recipe, Drink, DrinkError, DrinkPatch, LongDrink, NewDrink, ShortDrink},
};
use crate::{auth::AuthClaims, error::ApiError, state::AppState};

fn body_or_bad_request(body: Result<Json<DrinkBody>, JsonRejection>) -> Result<DrinkBody, ApiError> {
    body.map(|Json(b)| b).map_err(|e| {
        warn!(error = %e, "rejected request body");
        ApiError::BadRequest
    })
}

/// Non-integer ids never match a drink.
fn drink_id(id: Result<Path<i32>, PathRejection>) -> Result<i32, ApiError> {
    id.map(|Path(id)| id).map_err(|_| ApiError::NotFound)
}

fn project<T>(drinks: &[Drink], f: fn(&Drink) -> Result<T, DrinkError>) -> Result<Vec<T>, ApiError> {
    drinks
        .iter()
        .map(f)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::from)
}

/// Any model failure on a listing is unprocessable, including a missing row.
fn unprocessable(err: DrinkError) -> ApiError {
    match ApiError::from(err) {
        ApiError::NotFound => ApiError::Unprocessable,
        other => other,
    }
}

#[instrument(skip(state))]
pub async fn list_drinks(
    State(state): State<AppState>,
) -> Result<Json<DrinksResponse<ShortDrink>>, ApiError> {
    let drinks = state.drinks.list().await.map_err(unprocessable)?;
    Ok(Json(DrinksResponse {
        success: true,
        drinks: project(&drinks, Drink::short)?,
    }))
}

#[instrument(skip(state, claims), fields(sub = %claims.sub))]
pub async fn list_drinks_detail(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
) -> Result<Json<DrinksResponse<LongDrink>>, ApiError> {
    let drinks = state.drinks.list().await.map_err(unprocessable)?;
    Ok(Json(DrinksResponse {
        success: true,
        drinks: project(&drinks, Drink::long)?,
    }))
}

#[instrument(skip(state, claims, body), fields(sub = %claims.sub))]
pub async fn create_drink(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    body: Result<Json<DrinkBody>, JsonRejection>,
) -> Result<Json<DrinksResponse<LongDrink>>, ApiError> {
    let body = body_or_bad_request(body)?;
    if body.is_empty() {
        warn!("create without title and recipe");
        return Err(ApiError::BadRequest);
    }

    let recipe = match body.recipe {
        Some(value) => parse_recipe(value).map_err(unprocessable)?,
        None => return Err(unprocessable(DrinkError::MissingRecipe)),
    };
    let new = NewDrink {
        title: body.title.unwrap_or_default(),
        recipe,
    };

    let drink = state.drinks.insert(new).await.map_err(unprocessable)?;
    info!(id = drink.id, title = %drink.title, "drink created");
    Ok(Json(DrinksResponse {
        success: true,
        drinks: vec![drink.long().map_err(unprocessable)?],
    }))
}

#[instrument(skip(state, claims, body), fields(sub = %claims.sub))]
pub async fn update_drink(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    id: Result<Path<i32>, PathRejection>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let id = drink_id(id)?;
    let fields = body.map(|Json(fields)| fields).map_err(|e| {
        warn!(error = %e, "rejected request body");
        ApiError::BadRequest
    })?;
    // only `{}` is refused; unknown keys alone leave the drink unchanged
    if fields.is_empty() {
        warn!(id, "update with empty body");
        return Err(ApiError::BadRequest);
    }
    let body: DrinkBody = serde_json::from_value(Value::Object(fields)).map_err(|e| {
        warn!(id, error = %e, "update fields have the wrong shape");
        ApiError::BadRequest
    })?;

    let patch = DrinkPatch {
        title: body.title().map(str::to_string),
        recipe: body
            .recipe()
            .cloned()
            .map(parse_recipe)
            .transpose()
            .map_err(unprocessable)?,
    };

    let drink = state.drinks.update(id, patch).await?;
    info!(id, "drink updated");
    Ok(Json(UpdatedResponse {
        success: true,
        drink: vec![drink.long().map_err(unprocessable)?],
    }))
}

#[instrument(skip(state, claims), fields(sub = %claims.sub))]
pub async fn delete_drink(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = drink_id(id)?;
    if id == 0 {
        return Err(ApiError::BadRequest);
    }

    let drink = state.drinks.get(id).await?;
    let deleted = state.drinks.delete(drink.id).await?;
    info!(id = deleted, title = %drink.title, "drink deleted");
    Ok(Json(DeletedResponse {
        success: true,
        delete: deleted,
    }))
}
