use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{Storage, StorageResult};
use crate::domain::aggregates::{OrderStatus, LOW_STOCK_THRESHOLD};
use crate::domain::value_objects::CartSessionId;

const TOP_PRODUCTS_LIMIT: i64 = 10;
const MAX_ACTIVITY_LIMIT: i64 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    View,
    AddToCart,
    Order,
}

fn validate_session(session: &str) -> Result<(), ValidationError> {
    CartSessionId::parse(session).map(|_| ()).map_err(|_| ValidationError::new("session_id"))
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewActivity {
    #[validate(custom = "validate_session")]
    pub session_id: String,
    pub activity_type: ActivityType,
    pub product_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewVisit {
    #[validate(custom = "validate_session")]
    pub session_id: String,
    #[validate(length(min = 1, max = 512))]
    pub path: String,
    #[validate(length(max = 1024))]
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub session_id: String,
    pub activity_type: ActivityType,
    pub product_id: Option<Uuid>,
    pub product_name_ar: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Totals {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub orders_today: i64,
    pub total_revenue: Decimal,
    pub revenue_today: Decimal,
    pub total_products: i64,
    pub low_stock_products: i64,
    pub total_customers: i64,
    pub visitors_today: i64,
    pub page_views_today: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub name_ar: String,
    pub views: i64,
    pub add_to_cart: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub totals: Totals,
    pub orders_by_status: Vec<StatusCount>,
    pub revenue_last_7_days: Vec<DailyRevenue>,
    pub top_products: Vec<TopProduct>,
}

impl Storage {
    pub async fn record_activity(&self, activity: &NewActivity) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO customer_activity (id, session_id, activity_type, product_id, metadata, created_at) \
             VALUES ($1, $2, $3, (SELECT id FROM products WHERE id = $4), $5, NOW())",
        )
        .bind(Uuid::now_v7())
        .bind(&activity.session_id)
        .bind(activity.activity_type)
        .bind(activity.product_id)
        .bind(activity.metadata.clone().unwrap_or_else(|| serde_json::json!({})))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_visit(&self, visit: &NewVisit, user_agent: Option<&str>) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO page_visits (id, session_id, path, referrer, user_agent, created_at) VALUES ($1, $2, $3, $4, $5, NOW())",
        )
        .bind(Uuid::now_v7())
        .bind(&visit.session_id)
        .bind(&visit.path)
        .bind(&visit.referrer)
        .bind(user_agent.map(|ua| ua.chars().take(512).collect::<String>()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_activity(&self, session: Option<&str>, limit: i64) -> StorageResult<Vec<ActivityRecord>> {
        let rows = sqlx::query_as::<_, ActivityRecord>(
            "SELECT a.id, a.session_id, a.activity_type, a.product_id, p.name_ar AS product_name_ar, a.metadata, a.created_at \
             FROM customer_activity a LEFT JOIN products p ON p.id = a.product_id \
             WHERE ($1::text IS NULL OR a.session_id = $1) ORDER BY a.created_at DESC LIMIT $2",
        )
        .bind(session)
        .bind(limit.clamp(1, MAX_ACTIVITY_LIMIT))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn dashboard_stats(&self) -> StorageResult<DashboardStats> {
        let totals = sqlx::query_as::<_, Totals>(
            "SELECT \
               (SELECT COUNT(*) FROM orders) AS total_orders, \
               (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders, \
               (SELECT COUNT(*) FROM orders WHERE created_at >= date_trunc('day', NOW())) AS orders_today, \
               (SELECT COALESCE(SUM(total), 0) FROM orders WHERE status <> 'cancelled') AS total_revenue, \
               (SELECT COALESCE(SUM(total), 0) FROM orders WHERE status <> 'cancelled' AND created_at >= date_trunc('day', NOW())) AS revenue_today, \
               (SELECT COUNT(*) FROM products) AS total_products, \
               (SELECT COUNT(*) FROM products WHERE is_active AND stock <= $1) AS low_stock_products, \
               (SELECT COUNT(*) FROM customers) AS total_customers, \
               (SELECT COUNT(DISTINCT session_id) FROM page_visits WHERE created_at >= date_trunc('day', NOW())) AS visitors_today, \
               (SELECT COUNT(*) FROM page_visits WHERE created_at >= date_trunc('day', NOW())) AS page_views_today",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_one(&self.pool)
        .await?;

        let orders_by_status = sqlx::query_as::<_, StatusCount>("SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status")
            .fetch_all(&self.pool)
            .await?;

        let revenue_last_7_days = sqlx::query_as::<_, DailyRevenue>(
            "SELECT d::date AS day, COUNT(o.id) AS orders, COALESCE(SUM(o.total), 0) AS revenue \
             FROM generate_series(date_trunc('day', NOW()) - INTERVAL '6 days', date_trunc('day', NOW()), INTERVAL '1 day') AS d \
             LEFT JOIN orders o ON o.created_at >= d AND o.created_at < d + INTERVAL '1 day' AND o.status <> 'cancelled' \
             GROUP BY d ORDER BY d",
        )
        .fetch_all(&self.pool)
        .await?;

        let top_products = sqlx::query_as::<_, TopProduct>(
            "SELECT p.id AS product_id, p.name, p.name_ar, \
               COUNT(*) FILTER (WHERE a.activity_type = 'view') AS views, \
               COUNT(*) FILTER (WHERE a.activity_type = 'add_to_cart') AS add_to_cart \
             FROM customer_activity a JOIN products p ON p.id = a.product_id \
             WHERE a.created_at >= NOW() - INTERVAL '30 days' \
             GROUP BY p.id, p.name, p.name_ar ORDER BY views DESC, add_to_cart DESC LIMIT $1",
        )
        .bind(TOP_PRODUCTS_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(DashboardStats { totals, orders_by_status, revenue_last_7_days, top_products })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_payload() {
        let a: NewActivity = serde_json::from_value(serde_json::json!({
            "session_id": "sess-0001-abcd", "activity_type": "add_to_cart"
        }))
        .unwrap();
        assert_eq!(a.activity_type, ActivityType::AddToCart);
        assert!(a.validate().is_ok());

        let bad: NewActivity = serde_json::from_value(serde_json::json!({
            "session_id": "x", "activity_type": "view"
        }))
        .unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_unknown_activity_type_rejected() {
        let r = serde_json::from_value::<NewActivity>(serde_json::json!({
            "session_id": "sess-0001-abcd", "activity_type": "purchase"
        }));
        assert!(r.is_err());
    }
}
