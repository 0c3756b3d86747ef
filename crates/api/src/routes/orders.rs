//! Order placement and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, UserId};
use domain::{AuditEntry, Order};
use fulfillment::{AuditStatus, OrderOutcome, PlaceOrderRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::parse_id;
use crate::{AppState, Store};

// -- Request types --

#[derive(Deserialize, Default)]
pub struct ConfirmOrderRequest {
    #[serde(default)]
    pub confirmed_by: Option<UserId>,
}

#[derive(Deserialize, Default)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub cancelled_by: Option<UserId>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub customer_id: String,
    pub status: String,
    pub total_cents: i64,
    pub placed_at: String,
    pub lines: Vec<OrderLineResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditStatus>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub line_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id().to_string(),
            customer_id: order.customer_id().to_string(),
            status: order.status().to_string(),
            total_cents: order.total().cents(),
            placed_at: order.placed_at().to_rfc3339(),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderLineResponse {
                    line_id: line.id().to_string(),
                    product_id: line.product_id().to_string(),
                    quantity: line.quantity(),
                    unit_price_cents: line.unit_price().cents(),
                    line_total_cents: line.line_total().cents(),
                })
                .collect(),
            audit: None,
        }
    }
}

impl From<OrderOutcome> for OrderResponse {
    fn from(outcome: OrderOutcome) -> Self {
        Self {
            audit: Some(outcome.audit),
            ..Self::from(&outcome.order)
        }
    }
}

// -- Handlers --

/// POST /orders: place an order at current catalog prices.
#[tracing::instrument(skip_all)]
pub async fn place<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let placed = state.core.place_order(req).await?;
    Ok((StatusCode::CREATED, Json(placed.into())))
}

/// GET /orders/:id: load an order with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.core.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/confirm: confirm a created order. The body is optional.
#[tracing::instrument(skip(state, req))]
pub async fn confirm<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    req: Option<Json<ConfirmOrderRequest>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let outcome = state.core.confirm_order(order_id, req.confirmed_by).await?;
    Ok(Json(outcome.into()))
}

/// POST /orders/:id/cancel: cancel an order and put its stock back. The body is
/// optional.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    req: Option<Json<CancelOrderRequest>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let outcome = state
        .core
        .cancel_order(order_id, &req.reason, req.cancelled_by)
        .await?;
    Ok(Json(outcome.into()))
}

/// GET /orders/:id/history: list the audit entries for an order.
#[tracing::instrument(skip(state))]
pub async fn history<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    Ok(Json(state.core.order_history(order_id).await?))
}
