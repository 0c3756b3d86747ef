//! Supplier, product, and customer registration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ProductId, UserId};
use domain::{Customer, NewCustomer, NewProduct, NewSupplier, Product, Supplier};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::parse_id;
use crate::{AppState, Store};

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    #[serde(flatten)]
    pub product: NewProduct,
    #[serde(default)]
    pub added_by: Option<UserId>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub low_on_stock: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            low_on_stock: product.is_low_on_stock(),
            product,
        }
    }
}

// -- Handlers --

/// POST /suppliers: register a supplier.
#[tracing::instrument(skip_all)]
pub async fn create_supplier<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<NewSupplier>,
) -> Result<(StatusCode, Json<Supplier>), ApiError> {
    let supplier = state.catalog.register_supplier(req).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

/// POST /products: register a product under an existing supplier.
#[tracing::instrument(skip_all)]
pub async fn create_product<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .catalog
        .register_product(req.product, req.added_by)
        .await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/:id: load a product with its current stock.
#[tracing::instrument(skip(state))]
pub async fn get_product<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    let product = state.catalog.get_product(product_id).await?;
    Ok(Json(product.into()))
}

/// POST /customers: register a customer.
#[tracing::instrument(skip_all)]
pub async fn create_customer<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state.catalog.register_customer(req).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}
