//! Catalog aggregate: products, variants, selection pricing

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::value_objects::SizeName;

/// Categories in which a size must be chosen before an item can be carted.
pub const VARIANT_CATEGORIES: [&str; 3] = ["Mens-Clothing", "Womens-Clothing", "Kids-Clothing"];

pub fn is_variant_category(category: &str) -> bool {
    VARIANT_CATEGORIES.contains(&category)
}

/// Catalog product record.
///
/// `price` is the MRP (struck-through reference price); `offer_price` is the
/// standing unit price absent any size-specific override.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Vec<String>,
    pub category: String,
    pub price: Decimal,
    pub offer_price: Decimal,
    pub image: Vec<String>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default)]
    pub sizes: Vec<SizeVariant>,
    #[serde(default)]
    pub colors: Vec<ColorVariant>,
}

fn default_in_stock() -> bool {
    true
}

/// Size variant of a product. `price`/`mrp_price` default to the product's
/// own offer price/MRP when absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeVariant {
    pub name: String,
    pub price: Option<Decimal>,
    pub mrp_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub sku: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorVariant {
    pub name: String,
    pub image: Option<String>,
}

/// The authoritative pricing for a validated size/color selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricedSelection {
    pub unit_price: Decimal,
    pub mrp: Decimal,
}

/// User-correctable selection errors, surfaced inline before any cart
/// mutation happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Please select Size to continue")]
    MissingSizeSelection,
    #[error("Please select Color to continue")]
    MissingColorSelection,
}

impl Product {
    /// Whether a size choice is mandatory for this product.
    pub fn requires_size(&self) -> bool {
        is_variant_category(&self.category) && !self.sizes.is_empty()
    }

    /// First size variant matching `name` under normalization.
    pub fn size_named(&self, name: &str) -> Option<&SizeVariant> {
        let wanted = SizeName::new(name).ok()?;
        self.sizes
            .iter()
            .find(|s| SizeName::new(&s.name).ok().as_ref() == Some(&wanted))
    }

    /// Size variants de-duplicated by first occurrence of the normalized
    /// name, in list order. Display uses this; the stored list is kept
    /// as-is.
    pub fn size_options(&self) -> Vec<&SizeVariant> {
        let mut seen = Vec::new();
        let mut options = Vec::new();
        for size in &self.sizes {
            let Ok(name) = SizeName::new(&size.name) else {
                continue;
            };
            if !seen.contains(&name) {
                seen.push(name);
                options.push(size);
            }
        }
        options
    }

    /// Unit price for an optional size: the size's own price when it is a
    /// known variant with one, else the offer price.
    pub fn unit_price_for(&self, size: Option<&str>) -> Decimal {
        size.and_then(|s| self.size_named(s))
            .and_then(|s| s.price)
            .unwrap_or(self.offer_price)
    }

    /// Validate a size/color selection and produce its pricing.
    ///
    /// Must be called before the cart is touched; a failure means the UI
    /// shows the message and nothing mutates.
    pub fn resolve_selection(
        &self,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Result<PricedSelection, SelectionError> {
        if !self.colors.is_empty() && color.is_none() {
            return Err(SelectionError::MissingColorSelection);
        }
        if self.requires_size() && size.is_none() {
            return Err(SelectionError::MissingSizeSelection);
        }

        let selected = size.and_then(|s| self.size_named(s));
        Ok(PricedSelection {
            unit_price: selected.and_then(|s| s.price).unwrap_or(self.offer_price),
            mrp: selected.and_then(|s| s.mrp_price).unwrap_or(self.price),
        })
    }
}

/// Point-in-time, read-only catalog snapshot with an id index.
///
/// Built once per refresh so cart totals and display rows stay O(cart size)
/// instead of scanning the product list per entry. Staleness is resolved by
/// the caller refreshing the snapshot, never in here.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: HashMap<String, Product>,
}

impl Catalog {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id)
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.products.contains_key(product_id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(name: &str, price: Option<i64>, mrp: Option<i64>) -> SizeVariant {
        SizeVariant {
            name: name.to_string(),
            price: price.map(Decimal::from),
            mrp_price: mrp.map(Decimal::from),
            in_stock: None,
            sku: None,
        }
    }

    fn shirt() -> Product {
        Product {
            id: "p1".into(),
            name: "Oxford Shirt".into(),
            description: vec!["Cotton".into()],
            category: "Mens-Clothing".into(),
            price: Decimal::from(150),
            offer_price: Decimal::from(100),
            image: vec!["https://cdn.example/shirt.jpg".into()],
            in_stock: true,
            sizes: vec![size("M", Some(120), Some(160)), size("L", None, None)],
            colors: vec![],
        }
    }

    #[test]
    fn selection_requires_size_for_clothing() {
        let err = shirt().resolve_selection(None, None).unwrap_err();
        assert_eq!(err, SelectionError::MissingSizeSelection);
    }

    #[test]
    fn selection_requires_color_before_size() {
        let mut p = shirt();
        p.colors.push(ColorVariant {
            name: "Blue".into(),
            image: None,
        });
        assert_eq!(
            p.resolve_selection(None, None).unwrap_err(),
            SelectionError::MissingColorSelection
        );
        assert_eq!(
            p.resolve_selection(None, Some("Blue")).unwrap_err(),
            SelectionError::MissingSizeSelection
        );
    }

    #[test]
    fn sized_selection_uses_size_price_and_mrp() {
        let priced = shirt().resolve_selection(Some("M"), None).unwrap();
        assert_eq!(priced.unit_price, Decimal::from(120));
        assert_eq!(priced.mrp, Decimal::from(160));
    }

    #[test]
    fn unpriced_size_falls_back_to_product_pricing() {
        let priced = shirt().resolve_selection(Some("L"), None).unwrap();
        assert_eq!(priced.unit_price, Decimal::from(100));
        assert_eq!(priced.mrp, Decimal::from(150));
    }

    #[test]
    fn empty_size_list_permits_sizeless_add_in_variant_category() {
        let mut p = shirt();
        p.sizes.clear();
        let priced = p.resolve_selection(None, None).unwrap();
        assert_eq!(priced.unit_price, Decimal::from(100));
        assert_eq!(priced.mrp, Decimal::from(150));
    }

    #[test]
    fn grocery_products_never_require_size() {
        let mut p = shirt();
        p.category = "Vegetables".into();
        assert!(!p.requires_size());
        let priced = p.resolve_selection(None, None).unwrap();
        assert_eq!(priced.unit_price, Decimal::from(100));
    }

    #[test]
    fn size_named_matches_normalized() {
        let mut p = shirt();
        p.sizes.push(size("UK 6", Some(90), None));
        assert_eq!(p.size_named("uk 6").unwrap().name, "UK 6");
        assert_eq!(p.size_named("UK_6").unwrap().name, "UK 6");
        assert!(p.size_named("XL").is_none());
    }

    #[test]
    fn size_options_dedup_by_first_occurrence() {
        let mut p = shirt();
        p.sizes.push(size("m", Some(999), None));
        let options = p.size_options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].price, Some(Decimal::from(120)));
    }

    #[test]
    fn catalog_indexes_by_id() {
        let catalog = Catalog::new([shirt()]);
        assert!(catalog.contains("p1"));
        assert!(catalog.get("p2").is_none());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn product_wire_names_are_camel_case() {
        let p: Product = serde_json::from_value(serde_json::json!({
            "id": "p9",
            "name": "Socks",
            "category": "Mens-Clothing",
            "price": 80,
            "offerPrice": 60,
            "image": ["https://cdn.example/socks.jpg"],
            "sizes": [{"name": "UK_6", "price": 55, "mrpPrice": 75}],
            "colors": [{"name": "Black", "image": null}]
        }))
        .unwrap();
        assert_eq!(p.offer_price, Decimal::from(60));
        assert!(p.in_stock);
        assert_eq!(p.sizes[0].mrp_price, Some(Decimal::from(75)));
    }
}
