mod dto;
mod handlers;
mod model;
pub mod repo;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

pub use model::{DrinkError, NewDrink};
pub use repo::{DrinkRepository, MemoryDrinks, PgDrinks};

use self::handlers::{create_drink, delete_drink, list_drinks, list_drinks_detail, update_drink};
use crate::{auth::middleware::require, state::AppState};

/// The public menu plus the permission-gated staff routes.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/drinks",
            get(list_drinks).merge(require(state, "post:drinks", post(create_drink))),
        )
        .route(
            "/drinks-detail",
            require(state, "get:drinks-detail", get(list_drinks_detail)),
        )
        .route(
            "/drinks/:id",
            require(state, "patch:drinks", patch(update_drink))
                .merge(require(state, "delete:drinks", delete(delete_drink))),
        )
}
