//! Cart aggregate
//!
//! The cart is a mapping from wire key to entry, owned by one session.
//! Two physical entry forms coexist in persisted carts: a bare quantity
//! written by older clients, and an object carrying the variant fields and
//! a unit-price snapshot. Both are read; only the object form is written.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::aggregates::catalog::{Catalog, Product, SelectionError};
use crate::domain::value_objects::{round_money, CartKey};

/// One persisted cart entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CartEntry {
    /// Bare quantity from older clients; size and color live only in the
    /// wire key and are recovered best-effort at read time.
    Legacy(u32),
    /// Entry carrying its own variant fields and price snapshot.
    Item(ItemEntry),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEntry {
    #[serde(default)]
    pub qty: u32,
    #[serde(default)]
    pub product_id: String,
    pub size: Option<String>,
    /// Unit price captured when the entry was first added. Preferred over
    /// any live catalog price when present.
    pub size_price: Option<Decimal>,
    pub color: Option<String>,
}

impl CartEntry {
    pub fn quantity(&self) -> u32 {
        match self {
            CartEntry::Legacy(qty) => *qty,
            CartEntry::Item(item) => item.qty,
        }
    }

    pub fn price_snapshot(&self) -> Option<Decimal> {
        match self {
            CartEntry::Legacy(_) => None,
            CartEntry::Item(item) => item.size_price,
        }
    }

    fn set_quantity(&mut self, quantity: u32) {
        match self {
            CartEntry::Legacy(qty) => *qty = quantity,
            CartEntry::Item(item) => item.qty = quantity,
        }
    }
}

/// Display row for one resolvable cart entry.
#[derive(Clone, Debug, PartialEq)]
pub struct CartRow {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub image: Vec<String>,
    pub cart_key: String,
    pub size: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// The session cart. Serializes transparently as the persisted mapping;
/// every mutation is an in-memory overwrite and the whole snapshot is what
/// gets persisted afterwards (last write wins across devices).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    entries: BTreeMap<String, CartEntry>,
}

struct ResolvedEntry<'a> {
    product: &'a Product,
    size: Option<String>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct entries (not total quantity).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, wire_key: &str) -> Option<&CartEntry> {
        self.entries.get(wire_key)
    }

    /// Validated add: the selection is resolved against the product first,
    /// and a failed validation leaves the cart untouched.
    pub fn add_item(
        &mut self,
        product: &Product,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Result<(), SelectionError> {
        let priced = product.resolve_selection(size, color)?;
        self.add(
            CartKey::new(product.id.clone(), size, color),
            Some(priced.unit_price),
        );
        Ok(())
    }

    /// Engine primitive behind [`Cart::add_item`], for callers that already
    /// resolved pricing. Increments an existing entry (upgrading the legacy
    /// form to the object form, without inventing a snapshot it never had)
    /// or inserts a fresh one with quantity 1.
    pub fn add(&mut self, key: CartKey, unit_price: Option<Decimal>) {
        let wire = key.encode();
        let entry = match self.entries.remove(&wire) {
            Some(CartEntry::Legacy(qty)) => CartEntry::Item(ItemEntry {
                qty: qty + 1,
                product_id: key.product_id().to_string(),
                size: key.size().map(|s| s.as_str().to_string()),
                size_price: None,
                color: key.color().map(str::to_string),
            }),
            Some(CartEntry::Item(mut item)) => {
                item.qty += 1;
                CartEntry::Item(item)
            }
            None => CartEntry::Item(ItemEntry {
                qty: 1,
                product_id: key.product_id().to_string(),
                size: key.size().map(|s| s.as_str().to_string()),
                size_price: unit_price,
                color: key.color().map(str::to_string),
            }),
        };
        self.entries.insert(wire, entry);
    }

    /// Overwrite an entry's quantity, preserving its form and snapshot.
    /// Quantity 0 removes the entry; an unknown key is a no-op.
    pub fn set_quantity(&mut self, wire_key: &str, quantity: u32) {
        if quantity == 0 {
            self.entries.remove(wire_key);
            return;
        }
        if let Some(entry) = self.entries.get_mut(wire_key) {
            entry.set_quantity(quantity);
        }
    }

    /// Decrement an entry by one, deleting it when the quantity reaches
    /// zero. An unknown key is a no-op; stale keys appear after catalog
    /// changes and must not error.
    pub fn remove_one(&mut self, wire_key: &str) {
        let delete = match self.entries.get_mut(wire_key) {
            Some(entry) => {
                let qty = entry.quantity();
                if qty <= 1 {
                    true
                } else {
                    entry.set_quantity(qty - 1);
                    false
                }
            }
            None => return,
        };
        if delete {
            self.entries.remove(wire_key);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Total quantity across all entries, mixed forms included. Needs no
    /// catalog: stale entries still count until explicitly removed.
    pub fn count(&self) -> u32 {
        self.entries.values().map(CartEntry::quantity).sum()
    }

    /// Cart total against a catalog snapshot, rounded to 2 places.
    ///
    /// Unit price precedence per entry: its own snapshot, else the matching
    /// size's price, else the product offer price. Entries that resolve to
    /// no catalog product are skipped, not errors.
    pub fn total(&self, catalog: &Catalog) -> Decimal {
        let mut sum = Decimal::ZERO;
        for (key, entry) in &self.entries {
            let quantity = entry.quantity();
            if quantity == 0 {
                continue;
            }
            let Some(resolved) = self.resolve_against(key, entry, catalog) else {
                continue;
            };
            let unit = entry_unit_price(entry, resolved.product, resolved.size.as_deref());
            sum += unit * Decimal::from(quantity);
        }
        round_money(sum)
    }

    /// One display row per resolvable entry. Iteration order carries no
    /// meaning beyond being stable for a given cart.
    pub fn rows(&self, catalog: &Catalog) -> Vec<CartRow> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| {
                let resolved = self.resolve_against(key, entry, catalog)?;
                let quantity = entry.quantity();
                let unit_price =
                    entry_unit_price(entry, resolved.product, resolved.size.as_deref());
                Some(CartRow {
                    product_id: resolved.product.id.clone(),
                    name: resolved.product.name.clone(),
                    category: resolved.product.category.clone(),
                    image: resolved.product.image.clone(),
                    cart_key: key.clone(),
                    size: resolved.size,
                    quantity,
                    unit_price,
                    line_total: round_money(unit_price * Decimal::from(quantity)),
                })
            })
            .collect()
    }

    /// Object entries resolve through their own product id; legacy entries
    /// go through the wire-key decoder. A miss on both is an unresolvable
    /// entry: excluded from totals and rows, kept in the mapping.
    fn resolve_against<'a>(
        &self,
        wire_key: &str,
        entry: &CartEntry,
        catalog: &'a Catalog,
    ) -> Option<ResolvedEntry<'a>> {
        if let CartEntry::Item(item) = entry {
            if !item.product_id.is_empty() {
                let found = catalog.get(&item.product_id).map(|product| ResolvedEntry {
                    product,
                    size: item.size.clone(),
                });
                if found.is_none() {
                    tracing::debug!(cart_key = %wire_key, product_id = %item.product_id, "cart entry references unknown product");
                }
                return found;
            }
        }
        let decoded = CartKey::decode(wire_key, |id| catalog.contains(id));
        let found = catalog.get(&decoded.product_id).map(|product| ResolvedEntry {
            product,
            size: decoded.size,
        });
        if found.is_none() {
            tracing::debug!(cart_key = %wire_key, "cart key does not decode to a known product");
        }
        found
    }
}

fn entry_unit_price(entry: &CartEntry, product: &Product, size: Option<&str>) -> Decimal {
    entry
        .price_snapshot()
        .unwrap_or_else(|| product.unit_price_for(size))
}
