use bharatmart_db::repo::orders::OrderLine;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateOrderItem {
    #[serde(alias = "productId")]
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    #[serde(default)]
    pub items: Vec<CreateOrderItem>,
    #[serde(default, alias = "shippingAddress")]
    pub shipping_address: Option<String>,
}

impl CreateOrder {
    pub fn lines(&self) -> Vec<OrderLine> {
        self.items
            .iter()
            .map(|i| OrderLine {
                product_id: i.product_id.clone(),
                quantity: i.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_camel_and_snake_case() {
        let dto: CreateOrder = serde_json::from_value(serde_json::json!({
            "items": [
                { "productId": "p1", "quantity": 2 },
                { "product_id": "p2", "quantity": 1 }
            ],
            "shippingAddress": "12 Park Street, Kolkata"
        }))
        .unwrap();
        let lines = dto.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id, "p1");
        assert_eq!(dto.shipping_address.as_deref(), Some("12 Park Street, Kolkata"));
    }
}
