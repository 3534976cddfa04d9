use uuid::Uuid;

use super::{Storage, StorageError, StorageResult};
use crate::domain::aggregates::{Category, CategoryInput};

impl Storage {
    pub async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        let cats = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY sort_order, name")
            .fetch_all(&self.pool)
            .await?;
        Ok(cats)
    }

    pub async fn get_category(&self, id: Uuid) -> StorageResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("category"))
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> StorageResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("category"))
    }

    pub async fn create_category(&self, input: &CategoryInput) -> StorageResult<Category> {
        let c = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, name_ar, slug, description, image_url, sort_order, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&input.name)
        .bind(&input.name_ar)
        .bind(input.slug().as_str())
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.sort_order)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(category_id = %c.id, slug = %c.slug, "category created");
        Ok(c)
    }

    pub async fn update_category(&self, id: Uuid, input: &CategoryInput) -> StorageResult<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, name_ar = $3, slug = COALESCE($4, slug), description = $5, image_url = $6, sort_order = $7 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.name_ar)
        .bind(input.requested_slug().map(|s| s.as_str().to_string()))
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.sort_order)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound("category"))
    }

    /// Products in the category keep existing with no category.
    pub async fn delete_category(&self, id: Uuid) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound("category"));
        }
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }
}
