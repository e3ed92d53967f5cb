//! Vehicle catalog endpoints. Reads are public, writes are admin-only.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{AdminOnly, Auth, authentication_gate, authorization_gate};
use crate::db::{Database, NewVehicle, UserRole, Vehicle, VehicleUpdate};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

const MAX_TEXT_LEN: usize = 64;
const MIN_YEAR: i64 = 1886;
const MAX_YEAR: i64 = 2100;

#[derive(Clone)]
pub struct VehiclesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(VehiclesState);

pub fn router(state: VehiclesState) -> Router {
    let public_router = Router::new()
        .route("/", get(list_vehicles))
        .route("/{id}", get(get_vehicle))
        .with_state(state.clone());

    // Layers wrap outside-in: authentication runs first, then the role check
    let admin_router = Router::new()
        .route("/", post(create_vehicle))
        .route("/{id}", axum::routing::put(update_vehicle).delete(delete_vehicle))
        .route_layer(middleware::from_fn_with_state(
            UserRole::Admin,
            authorization_gate,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            authentication_gate::<VehiclesState>,
        ))
        .with_state(state);

    Router::new().merge(public_router).merge(admin_router)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VehicleResponse {
    id: String,
    make: String,
    model: String,
    year: i64,
    #[serde(rename = "type")]
    vehicle_type: String,
    price_per_day: f64,
    is_available: bool,
    created_at: String,
    updated_at: String,
}

impl From<Vehicle> for VehicleResponse {
    fn from(v: Vehicle) -> Self {
        Self {
            id: v.uuid,
            make: v.make,
            model: v.model,
            year: v.year,
            vehicle_type: v.vehicle_type,
            price_per_day: v.price_per_day,
            is_available: v.is_available,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

fn default_available() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateVehicleRequest {
    make: String,
    model: String,
    year: i64,
    #[serde(rename = "type")]
    vehicle_type: String,
    price_per_day: f64,
    #[serde(default = "default_available")]
    is_available: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateVehicleRequest {
    make: Option<String>,
    model: Option<String>,
    year: Option<i64>,
    #[serde(rename = "type")]
    vehicle_type: Option<String>,
    price_per_day: Option<f64>,
    is_available: Option<bool>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Trimmed, non-empty, at most 64 characters.
fn validate_text(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{} cannot be empty", field)));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::bad_request(format!(
            "{} cannot be longer than {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(value.to_string())
}

fn validate_year(year: i64) -> Result<i64, ApiError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ApiError::bad_request(format!(
            "year must be between {} and {}",
            MIN_YEAR, MAX_YEAR
        )));
    }
    Ok(year)
}

fn validate_price(price: f64) -> Result<f64, ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::bad_request(
            "pricePerDay must be a non-negative number",
        ));
    }
    Ok(price)
}

impl CreateVehicleRequest {
    fn validate(self) -> Result<NewVehicle, ApiError> {
        Ok(NewVehicle {
            make: validate_text("make", &self.make)?,
            model: validate_text("model", &self.model)?,
            year: validate_year(self.year)?,
            vehicle_type: validate_text("type", &self.vehicle_type)?,
            price_per_day: validate_price(self.price_per_day)?,
            is_available: self.is_available,
        })
    }
}

impl UpdateVehicleRequest {
    fn validate(self) -> Result<VehicleUpdate, ApiError> {
        Ok(VehicleUpdate {
            make: self
                .make
                .map(|v| validate_text("make", &v))
                .transpose()?,
            model: self
                .model
                .map(|v| validate_text("model", &v))
                .transpose()?,
            year: self.year.map(validate_year).transpose()?,
            vehicle_type: self
                .vehicle_type
                .map(|v| validate_text("type", &v))
                .transpose()?,
            price_per_day: self.price_per_day.map(validate_price).transpose()?,
            is_available: self.is_available,
        })
    }
}

async fn list_vehicles(
    State(state): State<VehiclesState>,
) -> Result<Json<Vec<VehicleResponse>>, ApiError> {
    let vehicles = state
        .db
        .vehicles()
        .list()
        .await
        .db_err("Failed to list vehicles")?;

    Ok(Json(vehicles.into_iter().map(VehicleResponse::from).collect()))
}

async fn get_vehicle(
    State(state): State<VehiclesState>,
    Path(id): Path<String>,
) -> Result<Json<VehicleResponse>, ApiError> {
    validate_uuid(&id)?;

    let vehicle = state
        .db
        .vehicles()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get vehicle")?
        .ok_or_else(|| ApiError::not_found("Vehicle not found"))?;

    Ok(Json(vehicle.into()))
}

async fn create_vehicle(
    State(state): State<VehiclesState>,
    auth: Auth<AdminOnly>,
    payload: Result<Json<CreateVehicleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let new_vehicle = payload.validate()?;

    let vehicles = state.db.vehicles();
    let id = vehicles
        .create(&new_vehicle)
        .await
        .db_err("Failed to create vehicle")?;

    let vehicle = vehicles
        .get_by_uuid(&id)
        .await
        .db_err("Failed to load created vehicle")?
        .ok_or_else(|| ApiError::internal("Created vehicle disappeared"))?;

    info!(
        vehicle = %id,
        admin = %auth.identity.user_id,
        "Vehicle created"
    );

    Ok((StatusCode::CREATED, Json(VehicleResponse::from(vehicle))))
}

async fn update_vehicle(
    State(state): State<VehiclesState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateVehicleRequest>, JsonRejection>,
) -> Result<Json<VehicleResponse>, ApiError> {
    validate_uuid(&id)?;
    let Json(payload) = payload?;
    let update = payload.validate()?;

    let vehicle = state
        .db
        .vehicles()
        .update(&id, &update)
        .await
        .db_err("Failed to update vehicle")?
        .ok_or_else(|| ApiError::not_found("Vehicle not found"))?;

    Ok(Json(vehicle.into()))
}

async fn delete_vehicle(
    State(state): State<VehiclesState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_uuid(&id)?;

    let deleted = state
        .db
        .vehicles()
        .delete(&id)
        .await
        .db_err("Failed to delete vehicle")?;

    if !deleted {
        return Err(ApiError::not_found("Vehicle not found"));
    }

    info!(vehicle = %id, "Vehicle deleted");

    Ok(Json(MessageResponse {
        message: "Vehicle deleted",
    }))
}
