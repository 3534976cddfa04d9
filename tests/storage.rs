//! Storage tests against a real Postgres.
//!
//! `sqlx::test` creates a fresh database per test from `DATABASE_URL` and
//! applies `migrations/`, including the default store settings.

use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use souq_storefront::domain::aggregates::{
    CartError, CategoryInput, CheckoutRequest, OrderStatus, Product, ProductInput,
};
use souq_storefront::domain::value_objects::{CartSessionId, Phone, Quantity, QuantityError};
use souq_storefront::storage::{ActivityType, PlacedOrder, ProductFilter, StorageError};
use souq_storefront::Storage;

async fn product(storage: &Storage, name: &str, price: &str, stock: i32) -> Product {
    let input: ProductInput = serde_json::from_value(json!({
        "name": name,
        "name_ar": format!("ساعة {name}"),
        "price": price,
        "stock": stock,
        "brand": "Casio",
        "gender": "men",
    }))
    .unwrap();
    storage.create_product(&input).await.unwrap()
}

fn session(id: &str) -> CartSessionId {
    CartSessionId::parse(id).unwrap()
}

fn checkout(session_id: &str, phone: &str) -> CheckoutRequest {
    serde_json::from_value(json!({
        "session_id": session_id,
        "customer_name": "سارة أحمد",
        "customer_phone": phone,
        "customer_email": "",
        "city": "الرياض",
        "address": "حي العليا، طريق الملك فهد",
    }))
    .unwrap()
}

async fn stock_of(storage: &Storage, id: Uuid) -> i32 {
    storage.get_product(id).await.unwrap().stock
}

async fn place(storage: &Storage, session_id: &str, phone: &str) -> PlacedOrder {
    let policy = storage.shipping_policy().await.unwrap();
    storage.place_order(&checkout(session_id, phone), &policy).await.unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn test_place_order_commits_everything(pool: PgPool) {
    let storage = Storage::new(pool);
    let watch = product(&storage, "G-Shock", "450.00", 10).await;
    let cart = session("sess-checkout-01");
    storage.add_to_cart(&cart, watch.id, Quantity::new(2).unwrap()).await.unwrap();

    let placed = place(&storage, "sess-checkout-01", "+966 55 123 4567").await;
    let order = &placed.order.order;

    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.customer_email, None);
    assert_eq!(order.subtotal, Decimal::new(90000, 2));
    // 900 is above the default free-shipping threshold of 500
    assert_eq!(order.shipping_cost, Decimal::ZERO);
    assert_eq!(placed.order.items.len(), 1);
    assert_eq!(stock_of(&storage, watch.id).await, 8);

    assert!(storage.get_cart(&cart).await.unwrap().lines.is_empty());

    let customers = storage.list_customers(None, None, None).await.unwrap();
    assert_eq!(customers.total, 1);
    assert_eq!(customers.data[0].phone, "+966551234567");
    assert_eq!(customers.data[0].orders_count, 1);
    assert_eq!(customers.data[0].total_spent, order.total);

    let activity = storage.recent_activity(Some("sess-checkout-01"), 10).await.unwrap();
    assert!(activity.iter().any(|a| a.activity_type == ActivityType::Order));

    let tracked = storage
        .find_order_for_tracking(&order.order_number, &Phone::parse("+966551234567").unwrap())
        .await
        .unwrap();
    assert_eq!(tracked.order.id, order.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_checkout_rejects_empty_cart_and_short_stock(pool: PgPool) {
    let storage = Storage::new(pool.clone());
    let policy = storage.shipping_policy().await.unwrap();
    let err = storage.place_order(&checkout("sess-empty-0001", "0550000000"), &policy).await.unwrap_err();
    assert!(matches!(err, StorageError::Order(_)), "{err:?}");

    let watch = product(&storage, "Tissot", "1200.00", 3).await;
    let cart = session("sess-short-0001");
    storage.add_to_cart(&cart, watch.id, Quantity::new(3).unwrap()).await.unwrap();
    sqlx::query("UPDATE products SET stock = 1 WHERE id = $1").bind(watch.id).execute(&pool).await.unwrap();

    assert!(storage.place_order(&checkout("sess-short-0001", "0550000000"), &policy).await.is_err());
    assert_eq!(stock_of(&storage, watch.id).await, 1);
    assert_eq!(storage.get_cart(&cart).await.unwrap().lines.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_add_to_cart_merges_and_caps(pool: PgPool) {
    let storage = Storage::new(pool);
    let perfume = product(&storage, "Oud Wood", "320.00", 200).await;
    let cart = session("sess-merge-0001");

    storage.add_to_cart(&cart, perfume.id, Quantity::new(40).unwrap()).await.unwrap();
    let merged = storage.add_to_cart(&cart, perfume.id, Quantity::new(50).unwrap()).await.unwrap();
    assert_eq!(merged.lines.len(), 1);
    assert_eq!(merged.lines[0].quantity, 90);

    let err = storage.add_to_cart(&cart, perfume.id, Quantity::new(10).unwrap()).await.unwrap_err();
    assert!(matches!(err, StorageError::Cart(CartError::Quantity(QuantityError::TooLarge(99)))), "{err:?}");

    let scarce = product(&storage, "Amber", "150.00", 2).await;
    let err = storage.add_to_cart(&cart, scarce.id, Quantity::new(3).unwrap()).await.unwrap_err();
    assert!(matches!(err, StorageError::Cart(CartError::InsufficientStock { available: 2, .. })), "{err:?}");

    let cart_now = storage.get_cart(&cart).await.unwrap();
    let item = cart_now.lines[0].item_id;
    let updated = storage.update_cart_item(&cart, item, 0).await.unwrap();
    assert!(updated.lines.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_cancel_restocks_and_reverses_customer(pool: PgPool) {
    let storage = Storage::new(pool);
    let watch = product(&storage, "Seiko 5", "450.00", 10).await;
    storage.add_to_cart(&session("sess-cancel-001"), watch.id, Quantity::new(4).unwrap()).await.unwrap();
    let placed = place(&storage, "sess-cancel-001", "0551112222").await;
    assert_eq!(stock_of(&storage, watch.id).await, 6);

    let id = placed.order.order.id;
    let (order, previous) = storage.update_order_status(id, OrderStatus::Confirmed).await.unwrap();
    assert_eq!((previous, order.order.status), (OrderStatus::Pending, OrderStatus::Confirmed));
    assert_eq!(stock_of(&storage, watch.id).await, 6);

    storage.update_order_status(id, OrderStatus::Cancelled).await.unwrap();
    assert_eq!(stock_of(&storage, watch.id).await, 10);
    let customer = &storage.list_customers(None, None, None).await.unwrap().data[0];
    assert_eq!(customer.orders_count, 0);
    assert_eq!(customer.total_spent, Decimal::ZERO);

    let err = storage.update_order_status(id, OrderStatus::Shipped).await.unwrap_err();
    assert!(matches!(err, StorageError::Order(_)), "{err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_deleting_live_order_returns_stock(pool: PgPool) {
    let storage = Storage::new(pool);
    let watch = product(&storage, "Orient", "700.00", 10).await;
    storage.add_to_cart(&session("sess-delete-001"), watch.id, Quantity::new(2).unwrap()).await.unwrap();
    let placed = place(&storage, "sess-delete-001", "0553334444").await;
    assert_eq!(stock_of(&storage, watch.id).await, 8);

    storage.delete_order(placed.order.order.id).await.unwrap();
    assert_eq!(stock_of(&storage, watch.id).await, 10);
    let customer = &storage.list_customers(None, None, None).await.unwrap().data[0];
    assert_eq!(customer.orders_count, 0);
    assert_eq!(customer.total_spent, Decimal::ZERO);

    let err = storage.delete_order(placed.order.order.id).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound("order")));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_deleting_closed_orders_keeps_stock(pool: PgPool) {
    let storage = Storage::new(pool);
    let watch = product(&storage, "Citizen", "900.00", 10).await;

    storage.add_to_cart(&session("sess-deliver-01"), watch.id, Quantity::new(1).unwrap()).await.unwrap();
    let delivered = place(&storage, "sess-deliver-01", "0555556666").await.order.order.id;
    for status in [OrderStatus::Confirmed, OrderStatus::Shipped, OrderStatus::Delivered] {
        storage.update_order_status(delivered, status).await.unwrap();
    }

    storage.add_to_cart(&session("sess-cancel-002"), watch.id, Quantity::new(3).unwrap()).await.unwrap();
    let cancelled = place(&storage, "sess-cancel-002", "0555556666").await.order.order.id;
    storage.update_order_status(cancelled, OrderStatus::Cancelled).await.unwrap();
    assert_eq!(stock_of(&storage, watch.id).await, 9);

    storage.delete_order(delivered).await.unwrap();
    storage.delete_order(cancelled).await.unwrap();
    assert_eq!(stock_of(&storage, watch.id).await, 9);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_concurrent_checkouts_with_crossed_carts(pool: PgPool) {
    let storage = Storage::new(pool.clone());
    let a = product(&storage, "Rado", "2500.00", 10).await;
    let b = product(&storage, "Longines", "3100.00", 10).await;
    let (first, second) = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };

    storage.add_to_cart(&session("sess-cross-aaaa"), first, Quantity::new(1).unwrap()).await.unwrap();
    storage.add_to_cart(&session("sess-cross-aaaa"), second, Quantity::new(1).unwrap()).await.unwrap();
    storage.add_to_cart(&session("sess-cross-bbbb"), second, Quantity::new(1).unwrap()).await.unwrap();
    storage.add_to_cart(&session("sess-cross-bbbb"), first, Quantity::new(1).unwrap()).await.unwrap();
    let policy = storage.shipping_policy().await.unwrap();

    // Hold one product so both checkouts queue up before either proceeds.
    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE").bind(first).execute(&mut *holder).await.unwrap();

    let req_a = checkout("sess-cross-aaaa", "0551000001");
    let req_b = checkout("sess-cross-bbbb", "0551000002");
    let (ra, rb, _) = tokio::join!(storage.place_order(&req_a, &policy), storage.place_order(&req_b, &policy), async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        holder.commit().await.unwrap();
    });

    assert!(ra.is_ok(), "{ra:?}");
    assert!(rb.is_ok(), "{rb:?}");
    assert_eq!(stock_of(&storage, first).await, 8);
    assert_eq!(stock_of(&storage, second).await, 8);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_list_products_filters(pool: PgPool) {
    let storage = Storage::new(pool);
    let category: CategoryInput =
        serde_json::from_value(json!({ "name": "Perfumes", "name_ar": "عطور", "slug": "perfumes" })).unwrap();
    let category = storage.create_category(&category).await.unwrap();

    product(&storage, "Casio Edifice", "450.00", 3).await;
    let sold_out = product(&storage, "Casio Vintage", "120.00", 0).await;
    let perfume: ProductInput = serde_json::from_value(json!({
        "name": "Musk Tahara", "name_ar": "مسك الطهارة", "price": "85.00", "stock": 40,
        "brand": "Lattafa", "gender": "unisex", "category_id": category.id, "is_featured": true,
    }))
    .unwrap();
    storage.create_product(&perfume).await.unwrap();
    let hidden: ProductInput = serde_json::from_value(json!({
        "name": "Old Stock", "name_ar": "مخزون قديم", "price": "10.00", "stock": 5, "is_active": false,
    }))
    .unwrap();
    storage.create_product(&hidden).await.unwrap();

    let all = storage.list_products(&ProductFilter::default()).await.unwrap();
    assert_eq!(all.total, 3);

    let casio = storage.list_products(&ProductFilter { brand: Some("casio".into()), ..Default::default() }).await.unwrap();
    assert_eq!(casio.total, 2);

    let in_stock = storage.list_products(&ProductFilter { in_stock: Some(true), ..Default::default() }).await.unwrap();
    assert!(in_stock.data.iter().all(|p| p.id != sold_out.id));

    let in_category = storage.list_products(&ProductFilter { category: Some("perfumes".into()), ..Default::default() }).await.unwrap();
    assert_eq!(in_category.total, 1);

    let search = storage.list_products(&ProductFilter { search: Some("مسك".into()), ..Default::default() }).await.unwrap();
    assert_eq!(search.data[0].name, "Musk Tahara");

    let cheap = storage
        .list_products(&ProductFilter { max_price: Some(Decimal::from(100)), featured: Some(true), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(cheap.total, 1);

    let admin = storage.list_products(&ProductFilter { include_inactive: true, ..Default::default() }).await.unwrap();
    assert_eq!(admin.total, 4);

    let paged = storage.list_products(&ProductFilter { per_page: Some(2), page: Some(2), ..Default::default() }).await.unwrap();
    assert_eq!((paged.data.len(), paged.total_pages), (1, 2));

    assert_eq!(storage.list_brands().await.unwrap(), vec!["Casio".to_string(), "Lattafa".to_string()]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_replace_without_slug_keeps_slug(pool: PgPool) {
    let storage = Storage::new(pool);
    let input: ProductInput =
        serde_json::from_value(json!({ "name": "ساعة فاخرة", "name_ar": "ساعة فاخرة", "price": "999.00", "stock": 2 })).unwrap();
    let created = storage.create_product(&input).await.unwrap();

    let mut replacement = input.clone();
    replacement.price = Decimal::new(89900, 2);
    let updated = storage.update_product(created.id, &replacement).await.unwrap();
    assert_eq!(updated.slug, created.slug);
    assert_eq!(updated.price, Decimal::new(89900, 2));

    replacement.slug = Some("luxury-watch".into());
    assert_eq!(storage.update_product(created.id, &replacement).await.unwrap().slug, "luxury-watch");

    let category_input: CategoryInput = serde_json::from_value(json!({ "name": "ساعات", "name_ar": "ساعات" })).unwrap();
    let category = storage.create_category(&category_input).await.unwrap();
    let renamed = storage.update_category(category.id, &category_input).await.unwrap();
    assert_eq!(renamed.slug, category.slug);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_dashboard_stats(pool: PgPool) {
    let storage = Storage::new(pool);
    let watch = product(&storage, "Swatch", "300.00", 6).await;
    storage.add_to_cart(&session("sess-stats-0001"), watch.id, Quantity::new(2).unwrap()).await.unwrap();
    let kept = place(&storage, "sess-stats-0001", "0557778888").await.order.order;
    storage.add_to_cart(&session("sess-stats-0002"), watch.id, Quantity::new(1).unwrap()).await.unwrap();
    let dropped = place(&storage, "sess-stats-0002", "0557779999").await.order.order;
    storage.update_order_status(dropped.id, OrderStatus::Cancelled).await.unwrap();

    let stats = storage.dashboard_stats().await.unwrap();
    assert_eq!(stats.totals.total_orders, 2);
    assert_eq!(stats.totals.pending_orders, 1);
    assert_eq!(stats.totals.total_revenue, kept.total);
    assert_eq!(stats.totals.total_products, 1);
    // 6 - 2 leaves 4, under the low-stock threshold
    assert_eq!(stats.totals.low_stock_products, 1);
    assert_eq!(stats.totals.total_customers, 2);
    assert!(stats.orders_by_status.iter().any(|s| s.status == OrderStatus::Cancelled));
}
