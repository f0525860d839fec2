use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrinkError {
    #[error("drink {0} not found")]
    NotFound(i32),
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("recipe must contain at least one ingredient")]
    MissingRecipe,
    #[error("a drink titled {0:?} already exists")]
    DuplicateTitle(String),
    #[error("invalid recipe: {0}")]
    InvalidRecipe(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Relative quantity of an ingredient: any positive JSON number. The number
/// is kept as written, so `1` reads back as `1` and `0.5` as `0.5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parts(Number);

impl Parts {
    pub fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or(f64::NAN)
    }

    pub fn is_positive(&self) -> bool {
        let parts = self.as_f64();
        parts > 0.0 && parts.is_finite()
    }
}

impl From<u32> for Parts {
    fn from(n: u32) -> Self {
        Parts(n.into())
    }
}

/// One line of a recipe. `color` is what the menu UI paints for this layer
/// of the cup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub color: String,
    pub parts: Parts,
}

/// Ingredient as shown on the public menu: no name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortIngredient {
    pub color: String,
    pub parts: Parts,
}

/// Stored row. The recipe stays serialized until a projection is rendered.
#[derive(Debug, Clone, FromRow)]
pub struct Drink {
    pub id: i32,
    pub title: String,
    pub recipe: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortDrink {
    pub id: i32,
    pub title: String,
    pub recipe: Vec<ShortIngredient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongDrink {
    pub id: i32,
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

impl Drink {
    pub fn ingredients(&self) -> Result<Vec<Ingredient>, DrinkError> {
        serde_json::from_str(&self.recipe).map_err(|e| DrinkError::InvalidRecipe(e.to_string()))
    }

    pub fn short(&self) -> Result<ShortDrink, DrinkError> {
        let recipe = self
            .ingredients()?
            .into_iter()
            .map(|i| ShortIngredient {
                color: i.color,
                parts: i.parts,
            })
            .collect();
        Ok(ShortDrink {
            id: self.id,
            title: self.title.clone(),
            recipe,
        })
    }

    pub fn long(&self) -> Result<LongDrink, DrinkError> {
        Ok(LongDrink {
            id: self.id,
            title: self.title.clone(),
            recipe: self.ingredients()?,
        })
    }
}

/// Accepts either a list of ingredients or a single ingredient object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecipeInput {
    Many(Vec<Ingredient>),
    One(Ingredient),
}

/// Parse a recipe from a request body value and check every ingredient.
pub fn parse_recipe(value: Value) -> Result<Vec<Ingredient>, DrinkError> {
    let recipe = match serde_json::from_value::<RecipeInput>(value) {
        Ok(RecipeInput::Many(list)) => list,
        Ok(RecipeInput::One(single)) => vec![single],
        Err(_) => {
            return Err(DrinkError::InvalidRecipe(
                "expected an ingredient or a list of {name, color, parts}".into(),
            ))
        }
    };
    validate_recipe(&recipe)?;
    Ok(recipe)
}

fn validate_recipe(recipe: &[Ingredient]) -> Result<(), DrinkError> {
    if recipe.is_empty() {
        return Err(DrinkError::MissingRecipe);
    }
    if let Some(bad) = recipe.iter().find(|i| !i.parts.is_positive()) {
        return Err(DrinkError::InvalidRecipe(format!(
            "{:?} must have a positive number of parts",
            bad.name
        )));
    }
    Ok(())
}

pub(crate) fn encode_recipe(recipe: &[Ingredient]) -> Result<String, DrinkError> {
    serde_json::to_string(recipe).map_err(|e| DrinkError::InvalidRecipe(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct NewDrink {
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

impl NewDrink {
    pub fn validate(&self) -> Result<(), DrinkError> {
        if self.title.trim().is_empty() {
            return Err(DrinkError::EmptyTitle);
        }
        validate_recipe(&self.recipe)
    }

    /// The drink a freshly reset database starts with.
    pub fn water() -> Self {
        Self {
            title: "water".into(),
            recipe: vec![Ingredient {
                name: "water".into(),
                color: "blue".into(),
                parts: Parts::from(1),
            }],
        }
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct DrinkPatch {
    pub title: Option<String>,
    pub recipe: Option<Vec<Ingredient>>,
}

impl DrinkPatch {
    pub fn validate(&self) -> Result<(), DrinkError> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(DrinkError::EmptyTitle);
        }
        match &self.recipe {
            Some(recipe) => validate_recipe(recipe),
            None => Ok(()),
        }
    }
}
