use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::debug;

use super::model::{encode_recipe, Drink, DrinkError, DrinkPatch, NewDrink};

#[async_trait]
pub trait DrinkRepository: Send + Sync {
    /// All drinks, ascending by id.
    async fn list(&self) -> Result<Vec<Drink>, DrinkError>;
    async fn get(&self, id: i32) -> Result<Drink, DrinkError>;
    async fn insert(&self, new: NewDrink) -> Result<Drink, DrinkError>;
    async fn update(&self, id: i32, patch: DrinkPatch) -> Result<Drink, DrinkError>;
    /// Returns the id that was removed.
    async fn delete(&self, id: i32) -> Result<i32, DrinkError>;
}

/// Drinks stored in PostgreSQL.
#[derive(Clone)]
pub struct PgDrinks {
    db: PgPool,
}

impl PgDrinks {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn unique_violation(err: sqlx::Error, title: &str) -> DrinkError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DrinkError::DuplicateTitle(title.to_string())
        }
        _ => DrinkError::Database(err),
    }
}

#[async_trait]
impl DrinkRepository for PgDrinks {
    async fn list(&self) -> Result<Vec<Drink>, DrinkError> {
        let rows = sqlx::query_as::<_, Drink>(
            r#"
            SELECT id, title, recipe
            FROM drinks
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: i32) -> Result<Drink, DrinkError> {
        sqlx::query_as::<_, Drink>(r#"SELECT id, title, recipe FROM drinks WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(DrinkError::NotFound(id))
    }

    async fn insert(&self, new: NewDrink) -> Result<Drink, DrinkError> {
        new.validate()?;
        let recipe = encode_recipe(&new.recipe)?;
        let drink = sqlx::query_as::<_, Drink>(
            r#"
            INSERT INTO drinks (title, recipe)
            VALUES ($1, $2)
            RETURNING id, title, recipe
            "#,
        )
        .bind(&new.title)
        .bind(&recipe)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_violation(e, &new.title))?;
        debug!(id = drink.id, title = %drink.title, "drink inserted");
        Ok(drink)
    }

    async fn update(&self, id: i32, patch: DrinkPatch) -> Result<Drink, DrinkError> {
        patch.validate()?;
        let recipe = patch.recipe.as_deref().map(encode_recipe).transpose()?;
        let drink = sqlx::query_as::<_, Drink>(
            r#"
            UPDATE drinks
               SET title = COALESCE($2, title),
                   recipe = COALESCE($3, recipe)
             WHERE id = $1
            RETURNING id, title, recipe
            "#,
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(recipe.as_deref())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| unique_violation(e, patch.title.as_deref().unwrap_or_default()))?
        .ok_or(DrinkError::NotFound(id))?;
        debug!(id, "drink updated");
        Ok(drink)
    }

    async fn delete(&self, id: i32) -> Result<i32, DrinkError> {
        let deleted = sqlx::query_scalar::<_, i32>(r#"DELETE FROM drinks WHERE id = $1 RETURNING id"#)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(DrinkError::NotFound(id))?;
        debug!(id = deleted, "drink deleted");
        Ok(deleted)
    }
}

/// Process-local store used by tests and `STORAGE=memory` runs.
#[derive(Default)]
pub struct MemoryDrinks {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    last_id: i32,
    rows: BTreeMap<i32, Drink>,
}

impl MemoryInner {
    fn title_taken(&self, title: &str, except: Option<i32>) -> bool {
        self.rows
            .values()
            .any(|d| d.title == title && Some(d.id) != except)
    }
}

impl MemoryDrinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row without validating it, as a hand-edited table would hold.
    #[cfg(test)]
    pub async fn insert_raw(&self, title: &str, recipe: &str) -> Drink {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;
        let drink = Drink {
            id: inner.last_id,
            title: title.to_string(),
            recipe: recipe.to_string(),
        };
        inner.rows.insert(drink.id, drink.clone());
        drink
    }
}

#[async_trait]
impl DrinkRepository for MemoryDrinks {
    async fn list(&self) -> Result<Vec<Drink>, DrinkError> {
        Ok(self.inner.lock().await.rows.values().cloned().collect())
    }

    async fn get(&self, id: i32) -> Result<Drink, DrinkError> {
        self.inner
            .lock()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or(DrinkError::NotFound(id))
    }

    async fn insert(&self, new: NewDrink) -> Result<Drink, DrinkError> {
        new.validate()?;
        let recipe = encode_recipe(&new.recipe)?;
        let mut inner = self.inner.lock().await;
        if inner.title_taken(&new.title, None) {
            return Err(DrinkError::DuplicateTitle(new.title));
        }
        inner.last_id += 1;
        let drink = Drink {
            id: inner.last_id,
            title: new.title,
            recipe,
        };
        inner.rows.insert(drink.id, drink.clone());
        Ok(drink)
    }

    async fn update(&self, id: i32, patch: DrinkPatch) -> Result<Drink, DrinkError> {
        patch.validate()?;
        let recipe = patch.recipe.as_deref().map(encode_recipe).transpose()?;
        let mut inner = self.inner.lock().await;
        if !inner.rows.contains_key(&id) {
            return Err(DrinkError::NotFound(id));
        }
        if let Some(title) = &patch.title {
            if inner.title_taken(title, Some(id)) {
                return Err(DrinkError::DuplicateTitle(title.clone()));
            }
        }
        let drink = inner.rows.get_mut(&id).ok_or(DrinkError::NotFound(id))?;
        if let Some(title) = patch.title {
            drink.title = title;
        }
        if let Some(recipe) = recipe {
            drink.recipe = recipe;
        }
        Ok(drink.clone())
    }

    async fn delete(&self, id: i32) -> Result<i32, DrinkError> {
        self.inner
            .lock()
            .await
            .rows
            .remove(&id)
            .map(|d| d.id)
            .ok_or(DrinkError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drinks::model::{Ingredient, Parts};

    fn latte() -> NewDrink {
        NewDrink {
            title: "Latte".into(),
            recipe: vec![
                Ingredient { name: "Milk".into(), color: "white".into(), parts: Parts::from(2) },
                Ingredient { name: "Espresso".into(), color: "brown".into(), parts: Parts::from(1) },
            ],
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let repo = MemoryDrinks::new();
        let water = repo.insert(NewDrink::water()).await.unwrap();
        let latte = repo.insert(latte()).await.unwrap();
        assert!(latte.id > water.id);

        let all = repo.list().await.unwrap();
        assert_eq!(all.iter().map(|d| d.id).collect::<Vec<_>>(), vec![water.id, latte.id]);
        assert!(all.iter().any(|d| d.title == "Latte"));
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let repo = MemoryDrinks::new();
        let first = repo.insert(NewDrink::water()).await.unwrap();
        repo.delete(first.id).await.unwrap();
        let second = repo.insert(latte()).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn duplicate_title_is_rejected() {
        let repo = MemoryDrinks::new();
        repo.insert(latte()).await.unwrap();
        let err = repo.insert(latte()).await.unwrap_err();
        assert!(matches!(err, DrinkError::DuplicateTitle(t) if t == "Latte"));
    }

    #[tokio::test]
    async fn update_title_keeps_recipe() {
        let repo = MemoryDrinks::new();
        let drink = repo.insert(latte()).await.unwrap();
        let patch = DrinkPatch { title: Some("Flat White".into()), recipe: None };
        let updated = repo.update(drink.id, patch).await.unwrap();
        assert_eq!(updated.title, "Flat White");
        assert_eq!(updated.recipe, drink.recipe);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let repo = MemoryDrinks::new();
        let patch = DrinkPatch { title: Some("X".into()), recipe: None };
        assert!(matches!(repo.update(42, patch).await, Err(DrinkError::NotFound(42))));
    }

    #[tokio::test]
    async fn delete_returns_id_and_removes_row() {
        let repo = MemoryDrinks::new();
        let drink = repo.insert(latte()).await.unwrap();
        assert_eq!(repo.delete(drink.id).await.unwrap(), drink.id);
        assert!(repo.list().await.unwrap().is_empty());
        assert!(matches!(repo.delete(drink.id).await, Err(DrinkError::NotFound(_))));
    }
}
