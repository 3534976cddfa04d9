use sqlx::{Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::cart::CART_LINES_SQL;
use super::{like_pattern, paginate, Page, Storage, StorageError, StorageResult};
use crate::domain::aggregates::{
    Cart, CartLine, CheckoutRequest, Order, OrderDraft, OrderError, OrderFilter, OrderItem, OrderStatus, OrderWithItems, Product,
    ShippingPolicy, LOW_STOCK_THRESHOLD,
};
use crate::domain::aggregates::order::generate_order_number;
use crate::domain::value_objects::Phone;

const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: OrderWithItems,
    /// Products whose stock fell to the low-stock threshold because of this order.
    pub low_stock: Vec<Product>,
}

impl OrderFilter {
    fn push_conditions<'a>(&'a self, qb: &mut QueryBuilder<'a, Postgres>) {
        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(term);
            qb.push(" AND (order_number ILIKE ").push_bind(pattern.clone());
            qb.push(" OR customer_name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR customer_phone ILIKE ").push_bind(pattern);
            qb.push(")");
        }
    }
}

impl Storage {
    /// Turns the session's cart into an order in a single transaction.
    ///
    /// Product rows are locked while stock is checked and decremented, the
    /// customer record is upserted, an `order` activity is logged and the cart
    /// is emptied. Any failure rolls everything back.
    pub async fn place_order(&self, request: &CheckoutRequest, policy: &ShippingPolicy) -> StorageResult<PlacedOrder> {
        let mut tx = self.pool.begin().await?;

        // Always lock products in id order.
        sqlx::query(
            "SELECT id FROM products WHERE id IN (SELECT product_id FROM cart_items WHERE session_id = $1) \
             ORDER BY id FOR UPDATE",
        )
        .bind(&request.session_id)
        .execute(&mut *tx)
        .await?;

        let lines = sqlx::query_as::<_, CartLine>(CART_LINES_SQL)
            .bind(&request.session_id)
            .fetch_all(&mut *tx)
            .await?;
        let cart = Cart::new(request.session_id.as_str(), lines);
        let mut draft = OrderDraft::from_cart(&cart, request, policy)?;

        let mut inserted = None;
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            inserted = sqlx::query_as::<_, Order>(
                "INSERT INTO orders (id, order_number, session_id, customer_name, customer_phone, customer_email, city, address, notes, \
                 payment_method, status, subtotal, shipping_cost, total, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11, $12, $13, NOW(), NOW()) \
                 ON CONFLICT (order_number) DO NOTHING RETURNING *",
            )
            .bind(Uuid::now_v7())
            .bind(&draft.order_number)
            .bind(&draft.session_id)
            .bind(&draft.customer_name)
            .bind(draft.customer_phone.as_str())
            .bind(&draft.customer_email)
            .bind(&draft.city)
            .bind(&draft.address)
            .bind(&draft.notes)
            .bind(draft.payment_method)
            .bind(draft.subtotal)
            .bind(draft.shipping_cost)
            .bind(draft.total)
            .fetch_optional(&mut *tx)
            .await?;
            if inserted.is_some() {
                break;
            }
            tracing::warn!(order_number = %draft.order_number, "order number collision, retrying");
            draft.order_number = generate_order_number();
        }
        let order = inserted.ok_or_else(|| StorageError::Conflict("orders_order_number_key".to_string()))?;

        let mut items = Vec::with_capacity(draft.items.len());
        let mut low_stock = Vec::new();
        for line in &draft.items {
            let item = sqlx::query_as::<_, OrderItem>(
                "INSERT INTO order_items (id, order_id, product_id, product_name, product_name_ar, unit_price, quantity, total) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
            )
            .bind(Uuid::now_v7())
            .bind(order.id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(&line.product_name_ar)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(line.total)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);

            let product = sqlx::query_as::<_, Product>(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .fetch_one(&mut *tx)
            .await?;
            if product.stock <= LOW_STOCK_THRESHOLD {
                low_stock.push(product);
            }
        }

        sqlx::query(
            "INSERT INTO customers (id, name, phone, email, city, orders_count, total_spent, last_order_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, 1, $6, NOW(), NOW()) \
             ON CONFLICT (phone) DO UPDATE SET name = EXCLUDED.name, email = COALESCE(EXCLUDED.email, customers.email), \
             city = EXCLUDED.city, orders_count = customers.orders_count + 1, \
             total_spent = customers.total_spent + EXCLUDED.total_spent, last_order_at = NOW()",
        )
        .bind(Uuid::now_v7())
        .bind(&draft.customer_name)
        .bind(draft.customer_phone.as_str())
        .bind(&draft.customer_email)
        .bind(&draft.city)
        .bind(draft.total)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO customer_activity (id, session_id, activity_type, product_id, metadata, created_at) \
             VALUES ($1, $2, 'order', NULL, $3, NOW())",
        )
        .bind(Uuid::now_v7())
        .bind(&draft.session_id)
        .bind(serde_json::json!({ "order_number": order.order_number, "total": order.total }))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(&draft.session_id).execute(&mut *tx).await?;

        tx.commit().await?;
        tracing::info!(order_number = %order.order_number, total = %order.total, items = items.len(), "order placed");
        Ok(PlacedOrder { order: OrderWithItems { order, items }, low_stock })
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> StorageResult<Page<Order>> {
        let (page, per_page, offset) = paginate(filter.page, filter.per_page);

        let mut select = QueryBuilder::new("SELECT * FROM orders WHERE TRUE");
        filter.push_conditions(&mut select);
        select.push(" ORDER BY created_at DESC LIMIT ").push_bind(i64::from(per_page));
        select.push(" OFFSET ").push_bind(offset);
        let orders = select.build_query_as::<Order>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE TRUE");
        filter.push_conditions(&mut count);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok(Page::new(orders, total, page, per_page))
    }

    async fn order_items(&self, order_id: Uuid) -> StorageResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn get_order(&self, id: Uuid) -> StorageResult<OrderWithItems> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("order"))?;
        let items = self.order_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Public tracking lookup; the phone must match the one used at checkout.
    pub async fn find_order_for_tracking(&self, order_number: &str, phone: &Phone) -> StorageResult<OrderWithItems> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = $1 AND customer_phone = $2")
            .bind(order_number.trim().to_uppercase())
            .bind(phone.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("order"))?;
        let items = self.order_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Moves an order to `next`, returning the updated order and its previous status.
    /// Cancelling puts the ordered units back in stock.
    pub async fn update_order_status(&self, id: Uuid, next: OrderStatus) -> StorageResult<(OrderWithItems, OrderStatus)> {
        let mut tx = self.pool.begin().await?;
        let current: OrderStatus = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound("order"))?;
        if !current.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: current, to: next }.into());
        }

        let order = sqlx::query_as::<_, Order>("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(next)
            .fetch_one(&mut *tx)
            .await?;

        if next == OrderStatus::Cancelled {
            release_order(&mut tx, &order).await?;
        }

        tx.commit().await?;
        tracing::info!(order_number = %order.order_number, from = current.as_str(), to = next.as_str(), "order status changed");
        let items = self.order_items(order.id).await?;
        Ok((OrderWithItems { order, items }, current))
    }

    /// Deletes an order. Orders that still hold stock (not cancelled or delivered)
    /// give it back and are removed from the customer's totals first.
    pub async fn delete_order(&self, id: Uuid) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound("order"))?;

        if !matches!(order.status, OrderStatus::Cancelled | OrderStatus::Delivered) {
            release_order(&mut tx, &order).await?;
        }
        sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&mut *tx).await?;

        tx.commit().await?;
        tracing::info!(order_number = %order.order_number, status = order.status.as_str(), "order deleted");
        Ok(())
    }
}

/// Returns an order's units to stock and takes it off the customer's totals.
async fn release_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> StorageResult<()> {
    let restocked = sqlx::query(
        "UPDATE products p SET stock = p.stock + oi.quantity, updated_at = NOW() \
         FROM order_items oi WHERE oi.order_id = $1 AND oi.product_id = p.id",
    )
    .bind(order.id)
    .execute(&mut **tx)
    .await?;
    sqlx::query(
        "UPDATE customers SET total_spent = GREATEST(total_spent - $2, 0), orders_count = GREATEST(orders_count - 1, 0) \
         WHERE phone = $1",
    )
    .bind(&order.customer_phone)
    .bind(order.total)
    .execute(&mut **tx)
    .await?;
    tracing::info!(order_number = %order.order_number, products = restocked.rows_affected(), "stock restored");
    Ok(())
}
