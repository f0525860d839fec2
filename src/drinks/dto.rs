use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::LongDrink;

/// Body of `POST /drinks` and `PATCH /drinks/:id`. Both fields are optional
/// here so that "nothing given" can be answered with 400 by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct DrinkBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<Value>,
}

impl DrinkBody {
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }

    /// The recipe value unless it is null, `[]` or `{}`.
    pub fn recipe(&self) -> Option<&Value> {
        self.recipe.as_ref().filter(|v| match v {
            Value::Null => false,
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title().is_none() && self.recipe().is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct DrinksResponse<T> {
    pub success: bool,
    pub drinks: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub success: bool,
    pub drink: Vec<LongDrink>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub delete: i32,
}
