//! Typed job payloads. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderJobItem {
    pub product_id: String,
    pub quantity: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProcessingJob {
    pub order_id: String,
    pub user_id: String,
    pub total_amount: f64,
    pub items: Vec<OrderJobItem>,
}

impl OrderProcessingJob {
    /// Build the job payload for a freshly placed order.
    pub fn from_order(order: &bharatmart_db::models::Order) -> Self {
        Self {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            total_amount: order.total_amount,
            items: order
                .items
                .iter()
                .map(|i| OrderJobItem {
                    product_id: i.product_id.clone(),
                    quantity: i.quantity,
                    price: i.price,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    OrderConfirmation,
    PaymentSuccess,
    PaymentFailed,
}

impl EmailType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderConfirmation => "order_confirmation",
            Self::PaymentSuccess => "payment_success",
            Self::PaymentFailed => "payment_failed",
        }
    }

    /// Queue priority for this kind of email; failures go out first.
    pub const fn priority(self) -> u32 {
        match self {
            Self::PaymentFailed => 2,
            _ => 3,
        }
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotificationJob {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(rename = "type")]
    pub email_type: EmailType,
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessingJob {
    pub order_id: String,
    pub amount: f64,
    pub payment_method: String,
    pub user_id: String,
}
