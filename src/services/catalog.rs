use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, Result},
    models::{Category, ProductListing},
};

pub const PAGE_SIZE: i64 = 12;

const LISTING_SELECT: &str = r#"
    SELECT
        p.id, p.category_id, c.name AS category_name, p.name, p.sku, p.description,
        p.price, p.stock_quantity, p.image_url, p.is_active
    FROM products p
    JOIN categories c ON c.id = p.category_id
"#;

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub q: String,
    pub page: Option<i64>,
}

impl CatalogQuery {
    pub fn category(&self) -> Option<Uuid> {
        Uuid::parse_str(self.category_id.trim()).ok()
    }

    pub fn search(&self) -> Option<&str> {
        let q = self.q.trim();
        (!q.is_empty()).then_some(q)
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Escapes LIKE wildcards so a search for "50%" matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &CatalogQuery, shop_view: bool) {
    builder.push(" WHERE TRUE");
    if shop_view {
        builder.push(" AND p.is_active = true AND c.is_active = true");
    }
    if let Some(category_id) = query.category() {
        builder.push(" AND p.category_id = ").push_bind(category_id);
    }
    if let Some(search) = query.search() {
        let pattern = like_pattern(search);
        builder
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.sku ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub struct CatalogPage {
    pub products: Vec<ProductListing>,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
}

/// One page of products. Shoppers only see active products in active categories.
pub async fn list_products(db: &Database, query: &CatalogQuery, shop_view: bool) -> Result<CatalogPage> {
    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM products p JOIN categories c ON c.id = p.category_id",
    );
    push_filters(&mut count, query, shop_view);
    let total: i64 = count.build_query_scalar().fetch_one(db).await?;

    let total_pages = ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1);
    let page = query.page().min(total_pages);

    let mut listing = QueryBuilder::<Postgres>::new(LISTING_SELECT);
    push_filters(&mut listing, query, shop_view);
    listing
        .push(" ORDER BY p.name LIMIT ")
        .push_bind(PAGE_SIZE)
        .push(" OFFSET ")
        .push_bind((page - 1) * PAGE_SIZE);

    let products = listing
        .build_query_as::<ProductListing>()
        .fetch_all(db)
        .await?;

    Ok(CatalogPage {
        products,
        page,
        total_pages,
        total,
    })
}

pub async fn find_listing(db: &Database, product_id: Uuid, shop_view: bool) -> Result<ProductListing> {
    let mut builder = QueryBuilder::<Postgres>::new(LISTING_SELECT);
    builder.push(" WHERE p.id = ").push_bind(product_id);
    if shop_view {
        builder.push(" AND p.is_active = true AND c.is_active = true");
    }

    builder
        .build_query_as::<ProductListing>()
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))
}

pub async fn list_categories(db: &Database, active_only: bool) -> Result<Vec<Category>> {
    let sql = if active_only {
        "SELECT * FROM categories WHERE is_active = true ORDER BY name"
    } else {
        "SELECT * FROM categories ORDER BY name"
    };
    let categories = sqlx::query_as::<_, Category>(sql).fetch_all(db).await?;
    Ok(categories)
}

pub async fn find_category(db: &Database, category_id: Uuid) -> Result<Category> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(like_pattern("mug"), "%mug%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn ignores_blank_filters() {
        let query = CatalogQuery {
            category_id: "".to_string(),
            q: "   ".to_string(),
            page: Some(0),
        };
        assert_eq!(query.category(), None);
        assert_eq!(query.search(), None);
        assert_eq!(query.page(), 1);
    }

    #[test]
    fn shop_view_filters_inactive_rows() {
        let query = CatalogQuery {
            category_id: Uuid::nil().to_string(),
            q: "lamp".to_string(),
            page: None,
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p");
        push_filters(&mut builder, &query, true);
        let sql = builder.sql();
        assert!(sql.contains("p.is_active = true AND c.is_active = true"));
        assert!(sql.contains("p.category_id = $1"));
        assert!(sql.contains("p.name ILIKE $2 OR p.sku ILIKE $3"));
    }
}
