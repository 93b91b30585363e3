//! In-memory stand-in for the rental backend.
//!
//! Implements the auth, product, rental and notification endpoints with
//! bearer-token checks so client code can be exercised over real HTTP.
//! Errors are returned as `{"message": ...}` with the matching status.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub price_per_day: f64,
    pub quantity: u32,
    pub is_rentable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rental {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub start_date: String,
    pub end_date: String,
    pub total_amount: f64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub read: bool,
}

#[derive(Deserialize)]
pub struct Signup {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct Signin {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_per_day: f64,
    pub quantity: u32,
    #[serde(default = "default_true")]
    pub is_rentable: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_per_day: Option<f64>,
    pub quantity: Option<u32>,
    pub is_rentable: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRental {
    pub product_id: String,
    pub quantity: u32,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

/// Product list filters. `available` matches rentable products with stock
/// left; the price bounds are inclusive and apply to `pricePerDay`.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub available: Option<bool>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl ProductQuery {
    fn matches(&self, product: &Product) -> bool {
        let in_stock = product.is_rentable && product.quantity > 0;
        self.category.as_ref().map_or(true, |c| product.category.as_ref() == Some(c))
            && self
                .search
                .as_ref()
                .map_or(true, |s| product.name.to_lowercase().contains(&s.to_lowercase()))
            && self.available.map_or(true, |wanted| in_stock == wanted)
            && self.min_price.map_or(true, |min| product.price_per_day >= min)
            && self.max_price.map_or(true, |max| product.price_per_day <= max)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Store {
    users: HashMap<String, (User, String)>,
    tokens: HashMap<String, String>,
    products: HashMap<String, Product>,
    rentals: HashMap<String, Rental>,
    notifications: HashMap<String, Notification>,
}

pub type Db = Arc<RwLock<Store>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Admin access required")
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, AppError>;

/// The user behind the request's bearer token.
pub struct AuthUser(pub User);

impl AuthUser {
    fn require_admin(&self) -> ApiResult<()> {
        if self.0.role == "ADMIN" {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }
}

impl FromRequestParts<Db> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, db: &Db) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(AppError::unauthorized)?;

        let store = db.read().await;
        let user_id = store.tokens.get(token).ok_or_else(AppError::unauthorized)?;
        let (user, _) = store.users.get(user_id).ok_or_else(AppError::unauthorized)?;
        Ok(AuthUser(user.clone()))
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/me", get(me))
        .route("/auth/check-user", get(check_user))
        .route("/auth/users", get(list_users))
        .route("/product", get(list_products).post(create_product))
        .route(
            "/product/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/rental", get(list_rentals).post(create_rental))
        .route("/rental/my", get(my_rentals))
        .route("/rental/{id}/status", put(update_rental_status))
        .route("/rental/{id}", axum::routing::delete(delete_rental))
        .route("/notification", post(create_notification))
        .route("/notification/my", get(my_notifications))
        .route("/notification/{id}/read", put(mark_notification_read))
        .route("/notification/{id}", axum::routing::delete(delete_notification))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock rental backend listening");
    }
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// auth
// ---------------------------------------------------------------------------

fn issue_token(store: &mut Store, user_id: &str) -> String {
    let token = Uuid::new_v4().to_string();
    store.tokens.insert(token.clone(), user_id.to_string());
    token
}

async fn signup(State(db): State<Db>, Json(input): Json<Signup>) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let mut store = db.write().await;
    if store.users.values().any(|(user, _)| user.email == input.email) {
        return Err(AppError::new(StatusCode::CONFLICT, "Email already registered"));
    }
    let role = if input.email.contains("admin") { "ADMIN" } else { "USER" };
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        email: input.email,
        role: role.to_string(),
    };
    store.users.insert(user.id.clone(), (user.clone(), input.password));
    let token = issue_token(&mut store, &user.id);
    debug!(user_id = %user.id, "user signed up");
    Ok((StatusCode::CREATED, Json(json!({ "token": token, "user": user }))))
}

async fn signin(State(db): State<Db>, Json(input): Json<Signin>) -> ApiResult<Json<serde_json::Value>> {
    let mut store = db.write().await;
    let user = store
        .users
        .values()
        .find(|(user, password)| user.email == input.email && *password == input.password)
        .map(|(user, _)| user.clone())
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "Invalid email or password"))?;
    let token = issue_token(&mut store, &user.id);
    Ok(Json(json!({ "token": token, "user": user })))
}

async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

async fn check_user(State(db): State<Db>, Query(query): Query<EmailQuery>) -> Json<serde_json::Value> {
    let store = db.read().await;
    let exists = store.users.values().any(|(user, _)| user.email == query.email);
    Json(json!({ "exists": exists }))
}

async fn list_users(State(db): State<Db>, auth: AuthUser) -> ApiResult<Json<Vec<User>>> {
    auth.require_admin()?;
    let store = db.read().await;
    Ok(Json(store.users.values().map(|(user, _)| user.clone()).collect()))
}

// ---------------------------------------------------------------------------
// product
// ---------------------------------------------------------------------------

async fn list_products(State(db): State<Db>, Query(query): Query<ProductQuery>) -> Json<Vec<Product>> {
    let store = db.read().await;
    Json(
        store
            .products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect(),
    )
}

async fn create_product(
    State(db): State<Db>,
    auth: AuthUser,
    Json(input): Json<CreateProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    auth.require_admin()?;
    let product = Product {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        description: input.description,
        category: input.category,
        price_per_day: input.price_per_day,
        quantity: input.quantity,
        is_rentable: input.is_rentable,
    };
    db.write().await.products.insert(product.id.clone(), product.clone());
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(State(db): State<Db>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    let store = db.read().await;
    store
        .products
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::not_found("Product"))
}

async fn update_product(
    State(db): State<Db>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateProduct>,
) -> ApiResult<Json<Product>> {
    auth.require_admin()?;
    let mut store = db.write().await;
    let product = store.products.get_mut(&id).ok_or_else(|| AppError::not_found("Product"))?;
    if let Some(name) = input.name {
        product.name = name;
    }
    if let Some(description) = input.description {
        product.description = Some(description);
    }
    if let Some(category) = input.category {
        product.category = Some(category);
    }
    if let Some(price) = input.price_per_day {
        product.price_per_day = price;
    }
    if let Some(quantity) = input.quantity {
        product.quantity = quantity;
    }
    if let Some(rentable) = input.is_rentable {
        product.is_rentable = rentable;
    }
    Ok(Json(product.clone()))
}

async fn delete_product(State(db): State<Db>, auth: AuthUser, Path(id): Path<String>) -> ApiResult<StatusCode> {
    auth.require_admin()?;
    db.write()
        .await
        .products
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| AppError::not_found("Product"))
}

// ---------------------------------------------------------------------------
// rental
// ---------------------------------------------------------------------------

/// Rentals are charged a flat one-day rate per unit.
async fn create_rental(
    State(db): State<Db>,
    AuthUser(user): AuthUser,
    Json(input): Json<CreateRental>,
) -> ApiResult<(StatusCode, Json<Rental>)> {
    let mut store = db.write().await;
    let product = store
        .products
        .get(&input.product_id)
        .cloned()
        .ok_or_else(|| AppError::not_found("Product"))?;
    if !product.is_rentable || input.quantity > product.quantity {
        return Err(AppError::new(StatusCode::BAD_REQUEST, "Product not available"));
    }
    let rental = Rental {
        id: Uuid::new_v4().to_string(),
        user_id: user.id,
        product_id: product.id.clone(),
        quantity: input.quantity,
        start_date: input.start_date,
        end_date: input.end_date,
        total_amount: product.price_per_day * f64::from(input.quantity),
        status: "PENDING".to_string(),
        product: Some(product),
    };
    store.rentals.insert(rental.id.clone(), rental.clone());
    Ok((StatusCode::CREATED, Json(rental)))
}

async fn list_rentals(State(db): State<Db>, auth: AuthUser) -> ApiResult<Json<Vec<Rental>>> {
    auth.require_admin()?;
    Ok(Json(db.read().await.rentals.values().cloned().collect()))
}

async fn my_rentals(State(db): State<Db>, AuthUser(user): AuthUser) -> Json<Vec<Rental>> {
    let store = db.read().await;
    Json(
        store
            .rentals
            .values()
            .filter(|r| r.user_id == user.id)
            .cloned()
            .collect(),
    )
}

/// Any status string is stored as given.
async fn update_rental_status(
    State(db): State<Db>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<StatusUpdate>,
) -> ApiResult<Json<Rental>> {
    auth.require_admin()?;
    let mut store = db.write().await;
    let rental = store.rentals.get_mut(&id).ok_or_else(|| AppError::not_found("Rental"))?;
    rental.status = input.status;
    Ok(Json(rental.clone()))
}

async fn delete_rental(
    State(db): State<Db>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut store = db.write().await;
    let owner = store
        .rentals
        .get(&id)
        .map(|r| r.user_id.clone())
        .ok_or_else(|| AppError::not_found("Rental"))?;
    if owner != user.id && user.role != "ADMIN" {
        return Err(AppError::forbidden());
    }
    store.rentals.remove(&id);
    Ok(Json(json!({ "message": "Rental deleted" })))
}

// ---------------------------------------------------------------------------
// notification
// ---------------------------------------------------------------------------

async fn create_notification(
    State(db): State<Db>,
    _auth: AuthUser,
    Json(input): Json<CreateNotification>,
) -> (StatusCode, Json<Notification>) {
    let notification = Notification {
        id: Uuid::new_v4().to_string(),
        user_id: input.user_id,
        title: input.title,
        message: input.message,
        kind: input.kind,
        read: false,
    };
    db.write()
        .await
        .notifications
        .insert(notification.id.clone(), notification.clone());
    (StatusCode::CREATED, Json(notification))
}

async fn my_notifications(State(db): State<Db>, AuthUser(user): AuthUser) -> Json<Vec<Notification>> {
    let store = db.read().await;
    Json(
        store
            .notifications
            .values()
            .filter(|n| n.user_id == user.id)
            .cloned()
            .collect(),
    )
}

async fn mark_notification_read(
    State(db): State<Db>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    let mut store = db.write().await;
    let notification = store
        .notifications
        .get_mut(&id)
        .filter(|n| n.user_id == user.id)
        .ok_or_else(|| AppError::not_found("Notification"))?;
    notification.read = true;
    Ok(Json(notification.clone()))
}

async fn delete_notification(
    State(db): State<Db>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut store = db.write().await;
    let owned = store.notifications.get(&id).is_some_and(|n| n.user_id == user.id);
    if !owned {
        return Err(AppError::not_found("Notification"));
    }
    store.notifications.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}
