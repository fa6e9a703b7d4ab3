//! Greengrocer - Self-hosted Grocery Storefront
//!
//! Domain core for a browser-rendered storefront backed by a REST API.
//!
//! ## Features
//! - Product catalog with size/color variant pricing
//! - Session cart with legacy and object entry forms
//! - Variant selection validation before any cart mutation
//! - Catalog-verified order assembly (COD and online)
//! - Promotional hero-banner management

pub mod domain;

pub use domain::aggregates::cart::{Cart, CartEntry, CartRow, ItemEntry};
pub use domain::aggregates::catalog::{
    is_variant_category, Catalog, ColorVariant, PricedSelection, Product, SelectionError,
    SizeVariant, VARIANT_CATEGORIES,
};
pub use domain::aggregates::order::{
    order_lines, price_order, OrderLine, PaymentType, PlaceOrderRequest, PricedOrder,
};
pub use domain::events::{DomainEvent, OrderEvent, ProductEvent};
pub use domain::value_objects::{round_money, CartKey, DecodedKey, SizeName};
