//! Value objects for the storefront domain

use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

/// Normalized size token, e.g. "UK 6" -> "UK_6".
///
/// Size names are free-form at intake; they are stored uppercased with
/// whitespace runs collapsed to underscores so that catalog variants and
/// cart entries compare reliably.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SizeName(String);

impl SizeName {
    pub fn new(value: impl AsRef<str>) -> Result<Self, SizeNameError> {
        let normalized = value
            .as_ref()
            .trim()
            .to_uppercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        if normalized.is_empty() {
            return Err(SizeNameError::Empty);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-facing form, underscores back to spaces ("UK_6" -> "UK 6").
    pub fn label(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl fmt::Display for SizeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum SizeNameError {
    Empty,
}
impl std::error::Error for SizeNameError {}
impl fmt::Display for SizeNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Size name empty")
    }
}

/// Composite key addressing one selected variant within a cart.
///
/// New writes always build a `CartKey` from structured parts; the hyphen
/// wire form exists because persisted carts already use it. Hyphens inside
/// product ids are not escaped, so decoding stored keys is best-effort
/// (see [`CartKey::decode`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartKey {
    product_id: String,
    size: Option<SizeName>,
    color: Option<String>,
}

/// Product id and size recovered from a stored wire key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedKey {
    pub product_id: String,
    pub size: Option<String>,
}

impl CartKey {
    /// Build a key from a selection. An empty or whitespace-only size is
    /// treated as no size at all.
    pub fn new(product_id: impl Into<String>, size: Option<&str>, color: Option<&str>) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.and_then(|s| SizeName::new(s).ok()),
            color: color
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn size(&self) -> Option<&SizeName> {
        self.size.as_ref()
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Wire form: `productId`, `productId-size`, or `productId-size-color`.
    pub fn encode(&self) -> String {
        let mut key = self.product_id.clone();
        if let Some(size) = &self.size {
            key.push('-');
            key.push_str(size.as_str());
        }
        if let Some(color) = &self.color {
            key.push('-');
            key.push_str(color);
        }
        key
    }

    /// Best-effort parse of a stored wire key.
    ///
    /// Tries everything except the last hyphen segment as a product id
    /// first, then the whole key, then progressively shorter prefixes so
    /// that keys carrying a trailing color still recover their product and
    /// size. A key that matches nothing is returned whole; callers treat
    /// such entries as unresolvable rather than failing the whole cart.
    pub fn decode(key: &str, is_known_product: impl Fn(&str) -> bool) -> DecodedKey {
        let parts: Vec<&str> = key.split('-').collect();
        if parts.len() > 1 {
            let candidate = parts[..parts.len() - 1].join("-");
            if is_known_product(&candidate) {
                return DecodedKey {
                    product_id: candidate,
                    size: parts.last().map(|s| (*s).to_string()),
                };
            }
            if is_known_product(key) {
                return DecodedKey {
                    product_id: key.to_string(),
                    size: None,
                };
            }
            for take in (1..parts.len() - 1).rev() {
                let candidate = parts[..take].join("-");
                if is_known_product(&candidate) {
                    return DecodedKey {
                        product_id: candidate,
                        size: Some(parts[take].to_string()),
                    };
                }
            }
        }
        DecodedKey {
            product_id: key.to_string(),
            size: None,
        }
    }
}

impl fmt::Display for CartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Round a money amount to 2 places, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_name_normalizes() {
        let size = SizeName::new("UK 6").unwrap();
        assert_eq!(size.as_str(), "UK_6");
        assert_eq!(size.label(), "UK 6");
        assert_eq!(SizeName::new("  m ").unwrap().as_str(), "M");
    }

    #[test]
    fn size_name_rejects_empty() {
        assert!(SizeName::new("   ").is_err());
    }

    #[test]
    fn encode_appends_present_components_only() {
        assert_eq!(CartKey::new("p1", None, None).encode(), "p1");
        assert_eq!(CartKey::new("p1", Some("M"), None).encode(), "p1-M");
        assert_eq!(
            CartKey::new("p1", Some("M"), Some("Red")).encode(),
            "p1-M-Red"
        );
        assert_eq!(CartKey::new("p1", Some("  "), None).encode(), "p1");
    }

    #[test]
    fn decode_round_trips_known_products() {
        let known = ["prod-001", "prod-002", "plain"];
        let is_known = |id: &str| known.contains(&id);

        let decoded =
            CartKey::decode(&CartKey::new("prod-001", Some("UK 6"), None).encode(), is_known);
        assert_eq!(decoded.product_id, "prod-001");
        assert_eq!(decoded.size.as_deref(), Some("UK_6"));

        let decoded = CartKey::decode(&CartKey::new("plain", None, None).encode(), is_known);
        assert_eq!(decoded.product_id, "plain");
        assert_eq!(decoded.size, None);
    }

    #[test]
    fn decode_prefers_prefix_over_full_key() {
        // Hyphenated product id with a size appended: the prefix wins.
        let is_known = |id: &str| id == "prod-001";
        let decoded = CartKey::decode("prod-001-M", is_known);
        assert_eq!(decoded.product_id, "prod-001");
        assert_eq!(decoded.size.as_deref(), Some("M"));
    }

    #[test]
    fn decode_recovers_size_from_color_bearing_keys() {
        let is_known = |id: &str| id == "p1";
        let decoded = CartKey::decode(&CartKey::new("p1", Some("M"), Some("Red")).encode(), is_known);
        assert_eq!(decoded.product_id, "p1");
        assert_eq!(decoded.size.as_deref(), Some("M"));
    }

    #[test]
    fn decode_prefers_full_key_over_short_prefixes() {
        // "combo" products whose id embeds a hyphen are not split apart.
        let known = ["veg", "veg-box-large"];
        let decoded = CartKey::decode("veg-box-large", |id| known.contains(&id));
        assert_eq!(decoded.product_id, "veg-box-large");
        assert_eq!(decoded.size, None);
    }

    #[test]
    fn decode_falls_back_to_whole_key_for_orphans() {
        let decoded = CartKey::decode("gone-XL", |_| false);
        assert_eq!(decoded.product_id, "gone-XL");
        assert_eq!(decoded.size, None);
    }

    #[test]
    fn round_money_is_standard_rounding() {
        assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2)); // 12.345 -> 12.35
        assert_eq!(round_money(Decimal::new(150, 0)), Decimal::new(150, 0));
    }
}
