use uuid::Uuid;

use super::{Storage, StorageError, StorageResult};
use crate::domain::aggregates::{merged_quantity, Cart, CartError, CartLine, Product};
use crate::domain::value_objects::{CartSessionId, Quantity};

pub(super) const CART_LINES_SQL: &str = "SELECT ci.id AS item_id, ci.quantity, p.* FROM cart_items ci \
     JOIN products p ON p.id = ci.product_id WHERE ci.session_id = $1 ORDER BY ci.created_at, ci.id";

impl Storage {
    pub async fn get_cart(&self, session: &CartSessionId) -> StorageResult<Cart> {
        let lines = sqlx::query_as::<_, CartLine>(CART_LINES_SQL)
            .bind(session.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(Cart::new(session.as_str(), lines))
    }

    /// Adds units of a product, merging with an existing line for the same product.
    pub async fn add_to_cart(&self, session: &CartSessionId, product_id: Uuid, quantity: Quantity) -> StorageResult<Cart> {
        let mut tx = self.pool.begin().await?;
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR SHARE")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound("product"))?;
        let existing: Option<i32> = sqlx::query_scalar("SELECT quantity FROM cart_items WHERE session_id = $1 AND product_id = $2")
            .bind(session.as_str())
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        let total = merged_quantity(existing, quantity, &product)?;
        sqlx::query(
            "INSERT INTO cart_items (id, session_id, product_id, quantity, created_at, updated_at) VALUES ($1, $2, $3, $4, NOW(), NOW()) \
             ON CONFLICT (session_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()",
        )
        .bind(Uuid::now_v7())
        .bind(session.as_str())
        .bind(product_id)
        .bind(i32::try_from(total.value()).unwrap_or(i32::MAX))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::debug!(session = %session, product_id = %product_id, quantity = total.value(), "cart line saved");
        self.get_cart(session).await
    }

    /// Sets a line's quantity; zero removes the line.
    pub async fn update_cart_item(&self, session: &CartSessionId, item_id: Uuid, quantity: u32) -> StorageResult<Cart> {
        if quantity == 0 {
            return self.remove_cart_item(session, item_id).await;
        }
        let quantity = Quantity::new(quantity).map_err(CartError::from)?;
        let line = sqlx::query_as::<_, CartLine>(
            "SELECT ci.id AS item_id, ci.quantity, p.* FROM cart_items ci JOIN products p ON p.id = ci.product_id \
             WHERE ci.session_id = $1 AND ci.id = $2",
        )
        .bind(session.as_str())
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CartError::ItemNotFound)?;
        if !line.product.is_purchasable(quantity.value()) {
            return Err(CartError::InsufficientStock { product: line.product.name_ar, available: line.product.stock.max(0) }.into());
        }
        sqlx::query("UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE session_id = $1 AND id = $2")
            .bind(session.as_str())
            .bind(item_id)
            .bind(i32::try_from(quantity.value()).unwrap_or(i32::MAX))
            .execute(&self.pool)
            .await?;
        self.get_cart(session).await
    }

    pub async fn remove_cart_item(&self, session: &CartSessionId, item_id: Uuid) -> StorageResult<Cart> {
        let result = sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND id = $2")
            .bind(session.as_str())
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CartError::ItemNotFound.into());
        }
        self.get_cart(session).await
    }

    pub async fn clear_cart(&self, session: &CartSessionId) -> StorageResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(session.as_str()).execute(&self.pool).await?;
        Ok(())
    }
}
