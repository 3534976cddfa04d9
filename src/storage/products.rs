use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, paginate, Page, Storage, StorageError, StorageResult};
use crate::domain::aggregates::{Product, ProductInput};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Rating,
}

impl ProductSort {
    fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC, p.id",
            Self::PriceAsc => " ORDER BY p.price ASC, p.created_at DESC",
            Self::PriceDesc => " ORDER BY p.price DESC, p.created_at DESC",
            Self::Name => " ORDER BY p.name_ar ASC, p.name ASC",
            Self::Rating => " ORDER BY p.rating DESC, p.created_at DESC",
        }
    }
}

/// Catalog listing filters, deserialized straight from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    pub search: Option<String>,
    pub brand: Option<String>,
    pub gender: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub is_new: Option<bool>,
    pub in_stock: Option<bool>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Only settable by admin routes.
    #[serde(skip)]
    pub include_inactive: bool,
}

impl ProductFilter {
    fn push_conditions<'a>(&'a self, qb: &mut QueryBuilder<'a, Postgres>) {
        if !self.include_inactive {
            qb.push(" AND p.is_active");
        }
        if let Some(slug) = self.category.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND c.slug = ").push_bind(slug);
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(term);
            qb.push(" AND (p.name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR p.name_ar ILIKE ").push_bind(pattern.clone());
            qb.push(" OR p.brand ILIKE ").push_bind(pattern.clone());
            qb.push(" OR p.description ILIKE ").push_bind(pattern.clone());
            qb.push(" OR p.description_ar ILIKE ").push_bind(pattern);
            qb.push(")");
        }
        if let Some(brand) = self.brand.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND LOWER(p.brand) = LOWER(").push_bind(brand).push(")");
        }
        if let Some(gender) = self.gender.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND p.gender = ").push_bind(gender);
        }
        if let Some(min) = self.min_price {
            qb.push(" AND p.price >= ").push_bind(min);
        }
        if let Some(max) = self.max_price {
            qb.push(" AND p.price <= ").push_bind(max);
        }
        if let Some(featured) = self.featured {
            qb.push(" AND p.is_featured = ").push_bind(featured);
        }
        if let Some(is_new) = self.is_new {
            qb.push(" AND p.is_new = ").push_bind(is_new);
        }
        match self.in_stock {
            Some(true) => { qb.push(" AND p.stock > 0"); }
            Some(false) => { qb.push(" AND p.stock = 0"); }
            None => {}
        }
    }

    pub(crate) fn count_query(&self) -> QueryBuilder<'_, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id WHERE TRUE");
        self.push_conditions(&mut qb);
        qb
    }

    pub(crate) fn select_query(&self, per_page: u32, offset: i64) -> QueryBuilder<'_, Postgres> {
        let mut qb = QueryBuilder::new("SELECT p.* FROM products p LEFT JOIN categories c ON c.id = p.category_id WHERE TRUE");
        self.push_conditions(&mut qb);
        qb.push(self.sort.unwrap_or_default().order_by());
        qb.push(" LIMIT ").push_bind(i64::from(per_page));
        qb.push(" OFFSET ").push_bind(offset);
        qb
    }
}

impl Storage {
    pub async fn list_products(&self, filter: &ProductFilter) -> StorageResult<Page<Product>> {
        let (page, per_page, offset) = paginate(filter.page, filter.per_page);
        let mut select = filter.select_query(per_page, offset);
        let products = select.build_query_as::<Product>().fetch_all(&self.pool).await?;
        let mut count = filter.count_query();
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;
        Ok(Page::new(products, total, page, per_page))
    }

    pub async fn get_product(&self, id: Uuid) -> StorageResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("product"))
    }

    pub async fn get_product_by_slug(&self, slug: &str) -> StorageResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE slug = $1 AND is_active")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("product"))
    }

    /// Active products from the same category, or the same brand when uncategorized.
    pub async fn related_products(&self, product: &Product, limit: i64) -> StorageResult<Vec<Product>> {
        let related = sqlx::query_as::<_, Product>(
            "SELECT * FROM products \
             WHERE is_active AND id <> $1 \
               AND (($2::uuid IS NOT NULL AND category_id = $2) OR ($2::uuid IS NULL AND brand = $3)) \
             ORDER BY is_featured DESC, created_at DESC LIMIT $4",
        )
        .bind(product.id)
        .bind(product.category_id)
        .bind(&product.brand)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(related)
    }

    pub async fn list_brands(&self) -> StorageResult<Vec<String>> {
        let brands = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT brand FROM products WHERE is_active AND brand IS NOT NULL AND brand <> '' ORDER BY brand",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(brands)
    }

    pub async fn create_product(&self, input: &ProductInput) -> StorageResult<Product> {
        let p = sqlx::query_as::<_, Product>(
            "INSERT INTO products (id, name, name_ar, slug, description, description_ar, price, compare_at_price, \
             category_id, brand, gender, images, stock, is_featured, is_new, is_active, specifications, rating, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&input.name)
        .bind(&input.name_ar)
        .bind(input.slug().as_str())
        .bind(&input.description)
        .bind(&input.description_ar)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.category_id)
        .bind(&input.brand)
        .bind(&input.gender)
        .bind(&input.images)
        .bind(input.stock)
        .bind(input.is_featured)
        .bind(input.is_new)
        .bind(input.is_active)
        .bind(input.specifications.clone().unwrap_or_else(|| serde_json::json!({})))
        .bind(input.rating.unwrap_or_default())
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(product_id = %p.id, slug = %p.slug, "product created");
        Ok(p)
    }

    pub async fn update_product(&self, id: Uuid, input: &ProductInput) -> StorageResult<Product> {
        sqlx::query_as::<_, Product>(
            "UPDATE products SET name = $2, name_ar = $3, slug = COALESCE($4, slug), description = $5, description_ar = $6, price = $7, \
             compare_at_price = $8, category_id = $9, brand = $10, gender = $11, images = $12, stock = $13, \
             is_featured = $14, is_new = $15, is_active = $16, specifications = $17, rating = $18, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.name_ar)
        .bind(input.requested_slug().map(|s| s.as_str().to_string()))
        .bind(&input.description)
        .bind(&input.description_ar)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.category_id)
        .bind(&input.brand)
        .bind(&input.gender)
        .bind(&input.images)
        .bind(input.stock)
        .bind(input.is_featured)
        .bind(input.is_new)
        .bind(input.is_active)
        .bind(input.specifications.clone().unwrap_or_else(|| serde_json::json!({})))
        .bind(input.rating.unwrap_or_default())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound("product"))
    }

    /// Cart rows go with the product; order lines keep their snapshot.
    pub async fn delete_product(&self, id: Uuid) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound("product"));
        }
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}
