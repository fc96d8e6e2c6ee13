use serde_json::json;
use tracing::info;

use super::{orders, record, RepoError, RepoResult};
use crate::adapter::DatabaseAdapter;
use crate::error::DbResult;
use crate::models::{from_record, Payment, PaymentStatus};
use crate::types::{Record, SelectOptions};

const TABLE: &str = "payments";

/// Record a pending payment against an existing order.
pub async fn create(
    db: &dyn DatabaseAdapter,
    order_id: &str,
    amount: f64,
    payment_method: Option<String>,
) -> RepoResult<Payment> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(RepoError::Invalid("amount must be positive".into()));
    }
    if orders::get(db, order_id).await?.is_none() {
        return Err(RepoError::NotFound(format!("order {}", order_id)));
    }
    let row = db
        .insert(
            TABLE,
            record(json!({
                "order_id": order_id,
                "amount": amount,
                "status": PaymentStatus::Pending,
                "payment_method": payment_method,
            })),
        )
        .await?;
    let payment: Payment = from_record(row.ok_or_else(|| RepoError::NotFound("payment".into()))?)?;
    info!(payment_id = %payment.id, order_id, amount, "payment recorded");
    Ok(payment)
}

pub async fn get(db: &dyn DatabaseAdapter, id: &str) -> DbResult<Option<Payment>> {
    let rows = db
        .select(TABLE, &SelectOptions::new().filter("id", id).limit(1))
        .await?;
    rows.into_iter().next().map(from_record).transpose()
}

pub async fn list_for_order(db: &dyn DatabaseAdapter, order_id: &str) -> DbResult<Vec<Payment>> {
    db.select(
        TABLE,
        &SelectOptions::new()
            .filter("order_id", order_id)
            .order_by("created_at", false),
    )
    .await?
    .into_iter()
    .map(from_record)
    .collect()
}

pub async fn list(db: &dyn DatabaseAdapter, limit: u64, offset: u64) -> DbResult<Vec<Payment>> {
    db.select(
        TABLE,
        &SelectOptions::new()
            .order_by("created_at", false)
            .limit(limit)
            .offset(offset),
    )
    .await?
    .into_iter()
    .map(from_record)
    .collect()
}

/// Settle a payment and mirror the outcome onto the order's `payment_status`.
pub async fn mark(
    db: &dyn DatabaseAdapter,
    id: &str,
    status: PaymentStatus,
    transaction_id: Option<&str>,
) -> DbResult<Option<Payment>> {
    let mut patch = Record::new();
    patch.insert("status".into(), status.as_str().into());
    if let Some(tx) = transaction_id {
        patch.insert("transaction_id".into(), tx.into());
    }
    let Some(row) = db.update(TABLE, id, patch).await? else {
        return Ok(None);
    };
    let payment: Payment = from_record(row)?;
    orders::set_payment_status(db, &payment.order_id, status).await?;
    info!(payment_id = %payment.id, order_id = %payment.order_id, status = %status, "payment settled");
    Ok(Some(payment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repo::orders::{NewOrder, OrderLine};
    use crate::repo::products::NewProduct;
    use crate::repo::test_support::memory_db;
    use crate::repo::{products, users};

    #[tokio::test]
    async fn settle_updates_order_payment_status() {
        let db = memory_db().await;
        let user = users::create(
            db.as_ref(),
            users::NewUser {
                email: "p@example.com".into(),
                password_hash: "x".into(),
                role: Role::Customer,
                full_name: None,
                phone: None,
                address: None,
            },
        )
        .await
        .unwrap();
        let product = products::create(
            db.as_ref(),
            NewProduct {
                name: "Saree".into(),
                description: None,
                price: 1500.0,
                category: None,
                stock: 1,
                image_url: None,
            },
        )
        .await
        .unwrap();
        let order = orders::create_with_items(
            db.as_ref(),
            NewOrder {
                user_id: user.id,
                lines: vec![OrderLine { product_id: product.id, quantity: 1 }],
                shipping_address: None,
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            create(db.as_ref(), "missing", 10.0, None).await,
            Err(RepoError::NotFound(_))
        ));
        let payment = create(db.as_ref(), &order.id, order.total_amount, Some("upi".into()))
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);

        let settled = mark(db.as_ref(), &payment.id, PaymentStatus::Completed, Some("txn_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settled.transaction_id.as_deref(), Some("txn_1"));
        let order = orders::get(db.as_ref(), &order.id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(list_for_order(db.as_ref(), &order.id).await.unwrap().len(), 1);
    }
}
