//! Order assembly from a resolved cart

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::cart::Cart;
use crate::domain::aggregates::catalog::Catalog;
use crate::domain::value_objects::round_money;

/// One order line as submitted to order placement. Lines carry no prices;
/// the amount is always recomputed against the catalog at placement time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(rename = "product")]
    pub product_id: String,
    pub quantity: u32,
    pub size: Option<String>,
}

/// Request body for both COD and online order creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderLine>,
    pub address: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentType {
    Cod,
    Online,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cod => "COD",
            PaymentType::Online => "ONLINE",
        }
    }
}

/// Order lines verified against a catalog, with the recomputed amount.
#[derive(Clone, Debug, PartialEq)]
pub struct PricedOrder {
    pub lines: Vec<OrderLine>,
    pub amount: Decimal,
}

/// Build order lines from the cart. Entries that do not resolve against
/// the catalog are left out: omitting an item beats charging a price
/// nobody can verify.
pub fn order_lines(cart: &Cart, catalog: &Catalog) -> Vec<OrderLine> {
    cart.rows(catalog)
        .into_iter()
        .map(|row| OrderLine {
            product_id: row.product_id,
            quantity: row.quantity,
            size: row.size,
        })
        .collect()
}

/// Price submitted order lines against the catalog: size price when the
/// line's size matches a variant, offer price otherwise. Lines referencing
/// unknown products are dropped.
pub fn price_order(items: Vec<OrderLine>, catalog: &Catalog) -> PricedOrder {
    let mut amount = Decimal::ZERO;
    let mut lines = Vec::with_capacity(items.len());
    for line in items {
        let Some(product) = catalog.get(&line.product_id) else {
            tracing::debug!(product_id = %line.product_id, "dropping order line for unknown product");
            continue;
        };
        let unit = product.unit_price_for(line.size.as_deref());
        amount += unit * Decimal::from(line.quantity);
        lines.push(line);
    }
    PricedOrder {
        lines,
        amount: round_money(amount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::catalog::{Product, SizeVariant};

    fn product(id: &str, offer: i64, sizes: Vec<(&str, i64)>) -> Product {
        Product {
            id: id.to_string(),
            name: id.to_string(),
            description: vec![],
            category: "Mens-Clothing".into(),
            price: Decimal::from(offer + 50),
            offer_price: Decimal::from(offer),
            image: vec!["https://cdn.example/p.jpg".into()],
            in_stock: true,
            sizes: sizes
                .into_iter()
                .map(|(name, price)| SizeVariant {
                    name: name.to_string(),
                    price: Some(Decimal::from(price)),
                    mrp_price: None,
                    in_stock: None,
                    sku: None,
                })
                .collect(),
            colors: vec![],
        }
    }

    #[test]
    fn order_lines_mirror_resolvable_rows() {
        let catalog = Catalog::new([product("p1", 100, vec![("M", 120)])]);
        let cart: Cart = serde_json::from_value(serde_json::json!({
            "p1-M": {"qty": 2, "productId": "p1", "size": "M", "sizePrice": 120.0, "color": null},
            "gone": 4
        }))
        .unwrap();

        let lines = order_lines(&cart, &catalog);
        assert_eq!(
            lines,
            vec![OrderLine {
                product_id: "p1".into(),
                quantity: 2,
                size: Some("M".into()),
            }]
        );
    }

    #[test]
    fn price_order_uses_size_price_else_offer() {
        let catalog = Catalog::new([
            product("p1", 100, vec![("M", 120)]),
            product("p2", 40, vec![]),
        ]);
        let priced = price_order(
            vec![
                OrderLine {
                    product_id: "p1".into(),
                    quantity: 2,
                    size: Some("M".into()),
                },
                OrderLine {
                    product_id: "p2".into(),
                    quantity: 3,
                    size: None,
                },
            ],
            &catalog,
        );
        assert_eq!(priced.lines.len(), 2);
        assert_eq!(priced.amount, Decimal::from(360));
    }

    #[test]
    fn price_order_drops_unknown_products() {
        let catalog = Catalog::new([product("p1", 100, vec![])]);
        let priced = price_order(
            vec![
                OrderLine {
                    product_id: "p1".into(),
                    quantity: 1,
                    size: None,
                },
                OrderLine {
                    product_id: "ghost".into(),
                    quantity: 5,
                    size: None,
                },
            ],
            &catalog,
        );
        assert_eq!(priced.lines.len(), 1);
        assert_eq!(priced.amount, Decimal::from(100));
    }

    #[test]
    fn place_order_request_wire_shape() {
        let req: PlaceOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [{"product": "p1", "quantity": 2, "size": "M"}],
            "address": "addr-1"
        }))
        .unwrap();
        assert_eq!(req.items[0].product_id, "p1");
        assert_eq!(req.items[0].quantity, 2);
        assert_eq!(req.address, "addr-1");
    }

    #[test]
    fn order_line_wire_field_is_product() {
        let line = OrderLine {
            product_id: "p1".into(),
            quantity: 1,
            size: None,
        };
        let wire = serde_json::to_value(&line).unwrap();
        assert_eq!(wire["product"], serde_json::json!("p1"));
    }
}
