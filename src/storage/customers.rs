use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, paginate, Page, Storage, StorageError, StorageResult};
use crate::domain::aggregates::Order;

/// Buyer aggregated from checkouts, keyed by normalized phone number.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub city: Option<String>,
    pub orders_count: i32,
    pub total_spent: Decimal,
    pub last_order_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerWithOrders {
    #[serde(flatten)]
    pub customer: Customer,
    pub orders: Vec<Order>,
}

fn push_search<'a>(qb: &mut QueryBuilder<'a, Postgres>, search: Option<&str>) {
    if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR phone ILIKE ").push_bind(pattern.clone());
        qb.push(" OR email ILIKE ").push_bind(pattern);
        qb.push(")");
    }
}

impl Storage {
    pub async fn list_customers(&self, search: Option<&str>, page: Option<u32>, per_page: Option<u32>) -> StorageResult<Page<Customer>> {
        let (page, per_page, offset) = paginate(page, per_page);

        let mut select = QueryBuilder::new("SELECT * FROM customers WHERE TRUE");
        push_search(&mut select, search);
        select.push(" ORDER BY last_order_at DESC NULLS LAST, created_at DESC LIMIT ").push_bind(i64::from(per_page));
        select.push(" OFFSET ").push_bind(offset);
        let customers = select.build_query_as::<Customer>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM customers WHERE TRUE");
        push_search(&mut count, search);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok(Page::new(customers, total, page, per_page))
    }

    pub async fn get_customer_with_orders(&self, id: Uuid) -> StorageResult<CustomerWithOrders> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("customer"))?;
        let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE customer_phone = $1 ORDER BY created_at DESC")
            .bind(&customer.phone)
            .fetch_all(&self.pool)
            .await?;
        Ok(CustomerWithOrders { customer, orders })
    }
}
