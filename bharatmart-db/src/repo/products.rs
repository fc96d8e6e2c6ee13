use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{record, RepoError, RepoResult};
use crate::adapter::DatabaseAdapter;
use crate::error::DbResult;
use crate::models::{from_record, Product};
use crate::types::{Record, SelectOptions};

const TABLE: &str = "products";
const SORTABLE: &[&str] = &["name", "price", "stock", "created_at", "category"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
}

impl ProductQuery {
    pub fn to_select(&self) -> RepoResult<SelectOptions> {
        let mut opts = SelectOptions::new();
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            opts = opts.filter("category", category);
        }
        let column = self.sort.as_deref().unwrap_or("created_at");
        if !SORTABLE.contains(&column) {
            return Err(RepoError::Invalid(format!("cannot sort by {}", column)));
        }
        let ascending = !matches!(self.order.as_deref(), Some("desc" | "DESC"));
        opts = opts.order_by(column, ascending);
        if let Some(limit) = self.limit {
            opts = opts.limit(limit.min(100));
        }
        if let Some(offset) = self.offset {
            opts = opts.offset(offset);
        }
        Ok(opts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn check_price_and_stock(price: Option<f64>, stock: Option<i64>) -> RepoResult<()> {
    if let Some(p) = price {
        if !p.is_finite() || p < 0.0 {
            return Err(RepoError::Invalid("price must be a non-negative number".into()));
        }
    }
    if matches!(stock, Some(s) if s < 0) {
        return Err(RepoError::Invalid("stock must not be negative".into()));
    }
    Ok(())
}

pub async fn list(db: &dyn DatabaseAdapter, query: &ProductQuery) -> RepoResult<Vec<Product>> {
    let rows = db.select(TABLE, &query.to_select()?).await?;
    Ok(rows
        .into_iter()
        .map(from_record)
        .collect::<DbResult<Vec<Product>>>()?)
}

pub async fn get(db: &dyn DatabaseAdapter, id: &str) -> DbResult<Option<Product>> {
    let rows = db
        .select(TABLE, &SelectOptions::new().filter("id", id).limit(1))
        .await?;
    rows.into_iter().next().map(from_record).transpose()
}

pub async fn create(db: &dyn DatabaseAdapter, new: NewProduct) -> RepoResult<Product> {
    if new.name.trim().is_empty() {
        return Err(RepoError::Invalid("name is required".into()));
    }
    check_price_and_stock(Some(new.price), Some(new.stock))?;
    let row = db.insert(TABLE, record(json!(new))).await?;
    Ok(from_record(
        row.ok_or_else(|| RepoError::NotFound("product".into()))?,
    )?)
}

pub async fn update(
    db: &dyn DatabaseAdapter,
    id: &str,
    patch: ProductPatch,
) -> RepoResult<Option<Product>> {
    check_price_and_stock(patch.price, patch.stock)?;
    if matches!(patch.name.as_deref(), Some(n) if n.trim().is_empty()) {
        return Err(RepoError::Invalid("name must not be empty".into()));
    }
    let values: Record = record(json!(patch));
    if values.is_empty() {
        return Ok(get(db, id).await?);
    }
    Ok(db.update(TABLE, id, values).await?.map(from_record).transpose()?)
}

pub async fn delete(db: &dyn DatabaseAdapter, id: &str) -> DbResult<Option<Product>> {
    db.delete(TABLE, id).await?.map(from_record).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_support::memory_db;

    fn phone(price: f64) -> NewProduct {
        NewProduct {
            name: "Phone".into(),
            description: None,
            price,
            category: Some("electronics".into()),
            stock: 3,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn create_validates_and_round_trips() {
        let db = memory_db().await;
        assert!(matches!(
            create(db.as_ref(), phone(-1.0)).await,
            Err(RepoError::Invalid(_))
        ));
        let p = create(db.as_ref(), phone(299.0)).await.unwrap();
        assert_eq!(get(db.as_ref(), &p.id).await.unwrap().unwrap().price, 299.0);
    }

    #[tokio::test]
    async fn list_by_category_sorted() {
        let db = memory_db().await;
        for price in [30.0, 10.0, 20.0] {
            create(db.as_ref(), phone(price)).await.unwrap();
        }
        let query = ProductQuery {
            category: Some("electronics".into()),
            sort: Some("price".into()),
            order: Some("desc".into()),
            limit: Some(2),
            ..Default::default()
        };
        let rows = list(db.as_ref(), &query).await.unwrap();
        let prices: Vec<f64> = rows.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![30.0, 20.0]);

        let bad = ProductQuery {
            sort: Some("password".into()),
            ..Default::default()
        };
        assert!(matches!(bad.to_select(), Err(RepoError::Invalid(_))));
    }

    #[tokio::test]
    async fn update_and_delete() {
        let db = memory_db().await;
        let p = create(db.as_ref(), phone(10.0)).await.unwrap();
        let patched = update(
            db.as_ref(),
            &p.id,
            ProductPatch {
                stock: Some(9),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(patched.stock, 9);
        assert_eq!(patched.price, 10.0);

        assert!(delete(db.as_ref(), &p.id).await.unwrap().is_some());
        assert!(get(db.as_ref(), &p.id).await.unwrap().is_none());
    }
}
