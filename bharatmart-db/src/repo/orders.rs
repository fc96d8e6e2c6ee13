use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{products, record, RepoError, RepoResult};
use crate::adapter::DatabaseAdapter;
use crate::error::DbResult;
use crate::models::{from_record, Order, OrderItem, OrderStatus, PaymentStatus, Product};
use crate::types::{Record, SelectOptions};

const ORDERS: &str = "orders";
const ITEMS: &str = "order_items";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub lines: Vec<OrderLine>,
    pub shipping_address: Option<String>,
}

/// Merge duplicate product lines and reject non-positive quantities.
fn merge_lines(lines: &[OrderLine]) -> RepoResult<Vec<OrderLine>> {
    if lines.is_empty() {
        return Err(RepoError::Invalid("order must contain at least one item".into()));
    }
    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(RepoError::Invalid(format!(
                "quantity for {} must be positive",
                line.product_id
            )));
        }
        match merged.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line.clone()),
        }
    }
    Ok(merged)
}

/// Place an order. Item prices are snapshotted from the current product
/// price and `total_amount` is their sum. Stock is reserved in the same
/// unit of work on backends that have one.
pub async fn create_with_items(db: &dyn DatabaseAdapter, new: NewOrder) -> RepoResult<Order> {
    let lines = merge_lines(&new.lines)?;

    let mut catalog: HashMap<String, Product> = HashMap::with_capacity(lines.len());
    for line in &lines {
        let product = products::get(db, &line.product_id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("product {}", line.product_id)))?;
        if product.stock < line.quantity {
            return Err(RepoError::Invalid(format!(
                "insufficient stock for {}",
                product.name
            )));
        }
        catalog.insert(product.id.clone(), product);
    }

    let total_amount: f64 = lines
        .iter()
        .map(|l| catalog[&l.product_id].price * l.quantity as f64)
        .sum();
    let order_id = uuid::Uuid::new_v4().to_string();
    let order_values = record(json!({
        "id": order_id,
        "user_id": new.user_id,
        "status": OrderStatus::Pending,
        "total_amount": total_amount,
        "payment_status": PaymentStatus::Pending,
        "shipping_address": new.shipping_address,
    }));
    let item_values: Vec<Record> = lines
        .iter()
        .map(|l| {
            record(json!({
                "order_id": order_id,
                "product_id": l.product_id,
                "quantity": l.quantity,
                "price": catalog[&l.product_id].price,
            }))
        })
        .collect();

    let (order_row, item_rows) = if db.kind().supports_transactions() {
        let mut uow = db.begin().await?;
        let order_row = uow.insert(ORDERS, order_values).await?;
        let mut item_rows = Vec::with_capacity(item_values.len());
        for item in item_values {
            item_rows.push(uow.insert(ITEMS, item).await?);
        }
        for line in &lines {
            let reserved = uow
                .execute(
                    "UPDATE products SET stock = stock - ? WHERE id = ? AND stock >= ?",
                    &[
                        Value::from(line.quantity),
                        Value::from(line.product_id.as_str()),
                        Value::from(line.quantity),
                    ],
                )
                .await?;
            if reserved == 0 {
                uow.rollback().await?;
                return Err(RepoError::Invalid(format!(
                    "insufficient stock for {}",
                    catalog[&line.product_id].name
                )));
            }
        }
        uow.commit().await?;
        (order_row, item_rows)
    } else {
        warn!(backend = %db.kind(), "placing order without a transaction");
        let order_row = db.insert(ORDERS, order_values).await?;
        let mut item_rows = Vec::with_capacity(item_values.len());
        for item in item_values {
            item_rows.push(db.insert(ITEMS, item).await?);
        }
        for line in &lines {
            let remaining = catalog[&line.product_id].stock - line.quantity;
            let mut patch = Record::new();
            patch.insert("stock".into(), remaining.into());
            db.update("products", &line.product_id, patch).await?;
        }
        (order_row, item_rows)
    };

    let mut order: Order =
        from_record(order_row.ok_or_else(|| RepoError::NotFound("order".into()))?)?;
    order.items = item_rows
        .into_iter()
        .flatten()
        .map(from_record)
        .collect::<DbResult<Vec<OrderItem>>>()?;
    info!(order_id = %order.id, user_id = %order.user_id, total = order.total_amount, items = order.items.len(), "order placed");
    Ok(order)
}

pub async fn items_for(db: &dyn DatabaseAdapter, order_id: &str) -> DbResult<Vec<OrderItem>> {
    db.select(
        ITEMS,
        &SelectOptions::new()
            .filter("order_id", order_id)
            .order_by("created_at", true),
    )
    .await?
    .into_iter()
    .map(from_record)
    .collect()
}

/// Fetch an order together with its items.
pub async fn get(db: &dyn DatabaseAdapter, id: &str) -> DbResult<Option<Order>> {
    let rows = db
        .select(ORDERS, &SelectOptions::new().filter("id", id).limit(1))
        .await?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    let mut order: Order = from_record(row)?;
    order.items = items_for(db, id).await?;
    Ok(Some(order))
}

/// Newest first. `user_id = None` lists every order.
pub async fn list(
    db: &dyn DatabaseAdapter,
    user_id: Option<&str>,
    limit: u64,
    offset: u64,
) -> DbResult<Vec<Order>> {
    let mut opts = SelectOptions::new()
        .order_by("created_at", false)
        .limit(limit)
        .offset(offset);
    if let Some(user_id) = user_id {
        opts = opts.filter("user_id", user_id);
    }
    db.select(ORDERS, &opts)
        .await?
        .into_iter()
        .map(from_record)
        .collect()
}

pub async fn set_status(
    db: &dyn DatabaseAdapter,
    id: &str,
    status: OrderStatus,
) -> DbResult<Option<Order>> {
    let mut patch = Record::new();
    patch.insert("status".into(), status.as_str().into());
    db.update(ORDERS, id, patch).await?.map(from_record).transpose()
}

pub async fn set_payment_status(
    db: &dyn DatabaseAdapter,
    id: &str,
    status: PaymentStatus,
) -> DbResult<Option<Order>> {
    let mut patch = Record::new();
    patch.insert("payment_status".into(), status.as_str().into());
    db.update(ORDERS, id, patch).await?.map(from_record).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repo::products::{self, NewProduct};
    use crate::repo::test_support::memory_db;
    use crate::repo::users::{self, NewUser};

    async fn seed(db: &dyn DatabaseAdapter) -> (String, String, String) {
        let user = users::create(
            db,
            NewUser {
                email: "buyer@example.com".into(),
                password_hash: "x".into(),
                role: Role::Customer,
                full_name: None,
                phone: None,
                address: None,
            },
        )
        .await
        .unwrap();
        let mut ids = Vec::new();
        for (name, price) in [("Tea", 50.0), ("Cup", 12.5)] {
            let p = products::create(
                db,
                NewProduct {
                    name: name.into(),
                    description: None,
                    price,
                    category: Some("kitchen".into()),
                    stock: 5,
                    image_url: None,
                },
            )
            .await
            .unwrap();
            ids.push(p.id);
        }
        (user.id, ids.remove(0), ids.remove(0))
    }

    #[tokio::test]
    async fn total_matches_item_snapshots() {
        let db = memory_db().await;
        let (user_id, tea, cup) = seed(db.as_ref()).await;
        let order = create_with_items(
            db.as_ref(),
            NewOrder {
                user_id: user_id.clone(),
                lines: vec![
                    OrderLine { product_id: tea.clone(), quantity: 2 },
                    OrderLine { product_id: cup.clone(), quantity: 1 },
                    OrderLine { product_id: cup.clone(), quantity: 1 },
                ],
                shipping_address: Some("MG Road, Bengaluru".into()),
            },
        )
        .await
        .unwrap();

        let sum: f64 = order.items.iter().map(|i| i.price * i.quantity as f64).sum();
        assert_eq!(order.total_amount, sum);
        assert_eq!(order.total_amount, 125.0);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.status, OrderStatus::Pending);

        // Later price changes do not touch the snapshot.
        products::update(
            db.as_ref(),
            &tea,
            products::ProductPatch { price: Some(80.0), ..Default::default() },
        )
        .await
        .unwrap();
        let reloaded = get(db.as_ref(), &order.id).await.unwrap().unwrap();
        let tea_item = reloaded.items.iter().find(|i| i.product_id == tea).unwrap();
        assert_eq!(tea_item.price, 50.0);
        assert_eq!(products::get(db.as_ref(), &tea).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn rejects_unknown_products_and_bad_quantities() {
        let db = memory_db().await;
        let (user_id, tea, _) = seed(db.as_ref()).await;
        let missing = create_with_items(
            db.as_ref(),
            NewOrder {
                user_id: user_id.clone(),
                lines: vec![OrderLine { product_id: "ghost".into(), quantity: 1 }],
                shipping_address: None,
            },
        )
        .await;
        assert!(matches!(missing, Err(RepoError::NotFound(_))));

        let zero = create_with_items(
            db.as_ref(),
            NewOrder {
                user_id: user_id.clone(),
                lines: vec![OrderLine { product_id: tea.clone(), quantity: 0 }],
                shipping_address: None,
            },
        )
        .await;
        assert!(matches!(zero, Err(RepoError::Invalid(_))));

        let too_many = create_with_items(
            db.as_ref(),
            NewOrder {
                user_id,
                lines: vec![OrderLine { product_id: tea, quantity: 50 }],
                shipping_address: None,
            },
        )
        .await;
        assert!(matches!(too_many, Err(RepoError::Invalid(_))));
        assert!(list(db.as_ref(), None, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_transitions_and_listing() {
        let db = memory_db().await;
        let (user_id, tea, _) = seed(db.as_ref()).await;
        let order = create_with_items(
            db.as_ref(),
            NewOrder {
                user_id: user_id.clone(),
                lines: vec![OrderLine { product_id: tea, quantity: 1 }],
                shipping_address: None,
            },
        )
        .await
        .unwrap();
        let confirmed = set_status(db.as_ref(), &order.id, OrderStatus::Confirmed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        let paid = set_payment_status(db.as_ref(), &order.id, PaymentStatus::Completed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Completed);

        assert_eq!(list(db.as_ref(), Some(&user_id), 10, 0).await.unwrap().len(), 1);
        assert!(list(db.as_ref(), Some("someone-else"), 10, 0).await.unwrap().is_empty());
    }
}
