//! Greengrocer - Self-hosted Grocery Storefront API

use anyhow::Result;
use axum::{extract::{Path, State}, http::StatusCode, routing::{get, patch, post, put}, Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json as DbJson;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use greengrocer::{
    price_order, Cart, Catalog, ColorVariant, DomainEvent, OrderEvent, OrderLine, PaymentType,
    PlaceOrderRequest, Product, ProductEvent, SizeName, SizeVariant,
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid, pub name: String, pub description: Vec<String>, pub category: String,
    pub price: Decimal, pub offer_price: Decimal, pub image: Vec<String>, pub in_stock: bool,
    pub sizes: DbJson<Vec<SizeVariant>>, pub colors: DbJson<Vec<ColorVariant>>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Product {
        Product {
            id: self.id.to_string(), name: self.name, description: self.description,
            category: self.category, price: self.price, offer_price: self.offer_price,
            image: self.image, in_stock: self.in_stock, sizes: self.sizes.0, colors: self.colors.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: Uuid, pub name: String, pub email: String, pub role: String,
    pub cart_items: DbJson<Cart>, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AddressRow {
    pub id: Uuid, pub user_id: Uuid, pub street: String, pub city: String, pub state: String,
    pub country: String, pub zipcode: String, pub phone: String, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub id: Uuid, pub order_number: String, pub user_id: Uuid,
    pub items: DbJson<Vec<OrderLine>>, pub amount: Decimal, pub address_id: Uuid,
    pub payment_type: String, pub is_paid: bool, pub status: String, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HeroBannerRow {
    pub id: Uuid, pub desktop_image_url: Option<String>, pub mobile_image_url: Option<String>,
    pub is_active: bool, pub sort_order: i32, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Clone)] pub struct AppState { pub db: sqlx::PgPool, pub nats: Option<async_nats::Client> }

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let db = PgPoolOptions::new().max_connections(10).connect(&std::env::var("DATABASE_URL")?).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let nats = match std::env::var("NATS_URL") { Ok(url) => async_nats::connect(&url).await.ok(), Err(_) => None };
    let state = AppState { db, nats };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "greengrocer"})) }))
        .route("/api/product/list", get(list_products))
        .route("/api/product", post(create_product))
        .route("/api/product/:id", get(get_product).delete(delete_product))
        .route("/api/product/:id/stock", patch(change_stock))
        .route("/api/user", post(upsert_user))
        .route("/api/user/:id", get(get_user))
        .route("/api/cart/:user_id", get(get_cart).patch(update_cart))
        .route("/api/address/:user_id", get(list_addresses).post(add_address))
        .route("/api/orders/:user_id", get(list_orders))
        .route("/api/orders/:user_id/cod", post(place_cod))
        .route("/api/orders/:user_id/online", post(place_online))
        .route("/api/hero-banners", get(list_active_banners).post(create_banner))
        .route("/api/hero-banners/all", get(list_all_banners))
        .route("/api/hero-banners/:id", put(update_banner).delete(delete_banner))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8084".to_string());
    tracing::info!("🚀 Greengrocer listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}

async fn publish(state: &AppState, event: DomainEvent) {
    if let Some(nats) = &state.nats {
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
                    tracing::warn!("failed to publish {}: {}", event.subject(), e);
                }
            }
            Err(e) => tracing::warn!("failed to encode {}: {}", event.subject(), e),
        }
    }
}

async fn list_products(State(s): State<AppState>) -> Result<Json<Vec<Product>>, (StatusCode, String)> {
    let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products ORDER BY created_at DESC")
        .fetch_all(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(rows.into_iter().map(ProductRow::into_product).collect()))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>, (StatusCode, String)> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&s.db).await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map(|row| Json(row.into_product())).ok_or((StatusCode::NOT_FOUND, "Product not found".to_string()))
}

/// Sizes come in either as bare names or as full variants; both get their
/// names normalized before storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SizeInput { Name(String), Variant(SizeVariant) }

impl SizeInput {
    fn into_variant(self) -> Option<SizeVariant> {
        match self {
            SizeInput::Name(name) => Some(SizeVariant {
                name: SizeName::new(&name).ok()?.as_str().to_string(),
                price: None, mrp_price: None, in_stock: None, sku: None,
            }),
            SizeInput::Variant(mut v) => {
                v.name = SizeName::new(&v.name).ok()?.as_str().to_string();
                Some(v)
            }
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub description: Vec<String>,
    #[validate(length(min = 1))]
    pub category: String,
    #[validate(custom = "positive_price")]
    pub price: Decimal,
    #[validate(custom = "positive_price")]
    pub offer_price: Decimal,
    #[validate(length(min = 1))]
    pub image: Vec<String>,
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub sizes: Vec<SizeInput>,
    #[serde(default)]
    pub colors: Vec<ColorVariant>,
}

fn positive_price(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO { Ok(()) } else { Err(ValidationError::new("positive")) }
}

async fn create_product(State(s): State<AppState>, Json(r): Json<CreateProductRequest>) -> Result<(StatusCode, Json<Product>), (StatusCode, String)> {
    r.validate().map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let sizes: Vec<SizeVariant> = r.sizes.into_iter().filter_map(SizeInput::into_variant).collect();
    let row = sqlx::query_as::<_, ProductRow>("INSERT INTO products (id, name, description, category, price, offer_price, image, in_stock, sizes, colors, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(&r.name).bind(&r.description).bind(&r.category).bind(r.price).bind(r.offer_price).bind(&r.image).bind(r.in_stock.unwrap_or(true)).bind(DbJson(&sizes)).bind(DbJson(&r.colors))
        .fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(row.into_product())))
}

#[derive(Debug, Deserialize)] pub struct ChangeStockRequest { #[serde(rename = "inStock")] pub in_stock: bool }

async fn change_stock(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ChangeStockRequest>) -> Result<Json<Product>, (StatusCode, String)> {
    let row = sqlx::query_as::<_, ProductRow>("UPDATE products SET in_stock = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(r.in_stock).fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Product not found".to_string()))?;
    publish(&s, DomainEvent::Product(ProductEvent::StockChanged { product_id: id, in_stock: r.in_stock })).await;
    Ok(Json(row.into_product()))
}

async fn delete_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, (StatusCode, String)> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if result.rows_affected() == 0 { return Err((StatusCode::NOT_FOUND, "Product not found".to_string())); }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)] pub struct UpsertUserRequest { pub name: String, pub email: String, pub role: Option<String> }

/// The auth collaborator verifies identity out-of-band and syncs the user
/// record here on first login.
async fn upsert_user(State(s): State<AppState>, Json(r): Json<UpsertUserRequest>) -> Result<(StatusCode, Json<UserRow>), (StatusCode, String)> {
    let user = sqlx::query_as::<_, UserRow>("INSERT INTO users (id, name, email, role, cart_items, created_at, updated_at) VALUES ($1, $2, lower($3), $4, '{}'::jsonb, NOW(), NOW()) ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW() RETURNING *")
        .bind(Uuid::now_v7()).bind(&r.name).bind(&r.email).bind(r.role.as_deref().unwrap_or("user"))
        .fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<UserRow>, (StatusCode, String)> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&s.db).await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map(Json).ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))
}

async fn get_cart(State(s): State<AppState>, Path(user_id): Path<Uuid>) -> Result<Json<Cart>, (StatusCode, String)> {
    let row: Option<(DbJson<Cart>,)> = sqlx::query_as("SELECT cart_items FROM users WHERE id = $1").bind(user_id).fetch_optional(&s.db).await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    row.map(|(cart,)| Json(cart.0)).ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))
}

#[derive(Debug, Deserialize)] pub struct UpdateCartRequest { #[serde(rename = "cartItems")] pub cart_items: Cart }

/// Whole-snapshot replace of the persisted cart. Clients send the full
/// mapping after each mutation; the last write wins across devices.
async fn update_cart(State(s): State<AppState>, Path(user_id): Path<Uuid>, Json(r): Json<UpdateCartRequest>) -> Result<Json<Cart>, (StatusCode, String)> {
    let result = sqlx::query("UPDATE users SET cart_items = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id).bind(DbJson(&r.cart_items)).execute(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if result.rows_affected() == 0 { return Err((StatusCode::NOT_FOUND, "User not found".to_string())); }
    Ok(Json(r.cart_items))
}

async fn list_addresses(State(s): State<AppState>, Path(user_id): Path<Uuid>) -> Result<Json<Vec<AddressRow>>, (StatusCode, String)> {
    let addresses = sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id).fetch_all(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(addresses))
}

#[derive(Debug, Deserialize)]
pub struct AddAddressRequest { pub street: String, pub city: String, pub state: String, pub country: String, pub zipcode: String, pub phone: String }

async fn add_address(State(s): State<AppState>, Path(user_id): Path<Uuid>, Json(r): Json<AddAddressRequest>) -> Result<(StatusCode, Json<AddressRow>), (StatusCode, String)> {
    let address = sqlx::query_as::<_, AddressRow>("INSERT INTO addresses (id, user_id, street, city, state, country, zipcode, phone, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(user_id).bind(&r.street).bind(&r.city).bind(&r.state).bind(&r.country).bind(&r.zipcode).bind(&r.phone)
        .fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(address)))
}

async fn list_orders(State(s): State<AppState>, Path(user_id): Path<Uuid>) -> Result<Json<Vec<OrderRow>>, (StatusCode, String)> {
    let orders = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id).fetch_all(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(orders))
}

/// Shared placement path: verify the address, reprice the lines against the
/// current catalog, store the order, clear the persisted cart, publish.
async fn place_order(s: &AppState, user_id: Uuid, req: PlaceOrderRequest, payment: PaymentType) -> Result<OrderRow, (StatusCode, String)> {
    if req.items.is_empty() { return Err((StatusCode::BAD_REQUEST, "No items to order".to_string())); }
    let address_id = Uuid::parse_str(&req.address).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid address id".to_string()))?;
    let address: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(address_id).bind(user_id).fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if address.is_none() { return Err((StatusCode::NOT_FOUND, "Address not found".to_string())); }

    let products = sqlx::query_as::<_, ProductRow>("SELECT * FROM products").fetch_all(&s.db).await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let catalog = Catalog::new(products.into_iter().map(ProductRow::into_product));
    let priced = price_order(req.items, &catalog);
    if priced.lines.is_empty() { return Err((StatusCode::BAD_REQUEST, "No purchasable items in order".to_string())); }

    let order_number = format!("ORD-{:08}", rand::random::<u32>());
    let order = sqlx::query_as::<_, OrderRow>("INSERT INTO orders (id, order_number, user_id, items, amount, address_id, payment_type, is_paid, status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, false, 'pending', NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(&order_number).bind(user_id).bind(DbJson(&priced.lines)).bind(priced.amount).bind(address_id).bind(payment.as_str())
        .fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    sqlx::query("UPDATE users SET cart_items = '{}'::jsonb, updated_at = NOW() WHERE id = $1")
        .bind(user_id).execute(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    publish(s, DomainEvent::Order(OrderEvent::Placed {
        order_id: order.id, order_number: order.order_number.clone(), user_id,
        amount: order.amount, payment_type: payment.as_str().to_string(),
    })).await;
    Ok(order)
}

async fn place_cod(State(s): State<AppState>, Path(user_id): Path<Uuid>, Json(req): Json<PlaceOrderRequest>) -> Result<(StatusCode, Json<OrderRow>), (StatusCode, String)> {
    let order = place_order(&s, user_id, req, PaymentType::Cod).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn place_online(State(s): State<AppState>, Path(user_id): Path<Uuid>, Json(req): Json<PlaceOrderRequest>) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, String)> {
    let order = place_order(&s, user_id, req, PaymentType::Online).await?;
    let base = std::env::var("PAYMENT_PAGE_URL").unwrap_or_else(|_| "/pay".to_string());
    Ok((StatusCode::CREATED, Json(serde_json::json!({"url": format!("{}/{}", base, order.id), "order": order}))))
}

async fn list_active_banners(State(s): State<AppState>) -> Result<Json<Vec<HeroBannerRow>>, (StatusCode, String)> {
    let banners = sqlx::query_as::<_, HeroBannerRow>("SELECT * FROM hero_banners WHERE is_active ORDER BY sort_order ASC, created_at DESC")
        .fetch_all(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(banners))
}

async fn list_all_banners(State(s): State<AppState>) -> Result<Json<Vec<HeroBannerRow>>, (StatusCode, String)> {
    let banners = sqlx::query_as::<_, HeroBannerRow>("SELECT * FROM hero_banners ORDER BY created_at DESC")
        .fetch_all(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(banners))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBannerRequest {
    pub desktop_image_url: Option<String>,
    pub mobile_image_url: Option<String>,
    pub is_active: Option<bool>,
    #[serde(rename = "order")]
    pub sort_order: Option<i32>,
}

async fn create_banner(State(s): State<AppState>, Json(r): Json<CreateBannerRequest>) -> Result<(StatusCode, Json<HeroBannerRow>), (StatusCode, String)> {
    if r.desktop_image_url.is_none() && r.mobile_image_url.is_none() {
        return Err((StatusCode::BAD_REQUEST, "Upload desktop or mobile image".to_string()));
    }
    let banner = sqlx::query_as::<_, HeroBannerRow>("INSERT INTO hero_banners (id, desktop_image_url, mobile_image_url, is_active, sort_order, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(&r.desktop_image_url).bind(&r.mobile_image_url).bind(r.is_active.unwrap_or(true)).bind(r.sort_order.unwrap_or(0))
        .fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(banner)))
}

async fn update_banner(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<CreateBannerRequest>) -> Result<Json<HeroBannerRow>, (StatusCode, String)> {
    sqlx::query_as::<_, HeroBannerRow>("UPDATE hero_banners SET desktop_image_url = COALESCE($2, desktop_image_url), mobile_image_url = COALESCE($3, mobile_image_url), is_active = COALESCE($4, is_active), sort_order = COALESCE($5, sort_order), updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(&r.desktop_image_url).bind(&r.mobile_image_url).bind(r.is_active).bind(r.sort_order)
        .fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map(Json).ok_or((StatusCode::NOT_FOUND, "Banner not found".to_string()))
}

async fn delete_banner(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, (StatusCode, String)> {
    let result = sqlx::query("DELETE FROM hero_banners WHERE id = $1").bind(id).execute(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if result.rows_affected() == 0 { return Err((StatusCode::NOT_FOUND, "Banner not found".to_string())); }
    Ok(StatusCode::NO_CONTENT)
}
