use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    engine::InferenceContext,
    error::ApiError,
    reconcile::{self, Payload, SensorPayload},
    types::{CropPrediction, ModelKind, SensorReading, SoilPrediction},
};

// ---------- Response types ----------

#[derive(Serialize)]
struct StatusOut {
    status: &'static str,
    endpoints: Endpoints,
    models: ModelStatus,
}

#[derive(Serialize)]
struct Endpoints {
    crop_prediction: &'static str,
    soil_prediction: &'static str,
    combined_prediction: &'static str,
    sensor_data: &'static str,
}

#[derive(Serialize)]
struct ModelStatus {
    crop: bool,
    soil: bool,
}

#[derive(Serialize)]
struct PredictionOut<P> {
    success: bool,
    prediction: P,
    input_data: Payload,
}

#[derive(Serialize)]
struct CombinedOut {
    success: bool,
    crop_prediction: CropPrediction,
    soil_prediction: SoilPrediction,
    input_data: Payload,
}

#[derive(Serialize)]
struct SensorOut {
    success: bool,
    sensor_data: Payload,
    recommendations: Recommendations,
    processed_values: SensorReading,
}

#[derive(Serialize)]
struct Recommendations {
    crop: CropPrediction,
    soil_fertility: SoilPrediction,
}

// ---------- Server state ----------

#[derive(Clone)]
struct AppState {
    ctx: Arc<InferenceContext>,
}

pub fn router(ctx: Arc<InferenceContext>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/predict/crop", post(predict_crop))
        .route("/predict/soil", post(predict_soil))
        .route("/predict/combined", post(predict_combined))
        .route("/sensor-data", post(sensor_data))
        .with_state(AppState { ctx })
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// ---------- Handlers ----------

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    Json(StatusOut {
        status: "API is running",
        endpoints: Endpoints {
            crop_prediction: "/predict/crop",
            soil_prediction: "/predict/soil",
            combined_prediction: "/predict/combined",
            sensor_data: "/sensor-data",
        },
        models: ModelStatus {
            crop: state.ctx.is_loaded(ModelKind::Crop),
            soil: state.ctx.is_loaded(ModelKind::Soil),
        },
    })
}

async fn predict_crop(
    State(state): State<AppState>,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<PredictionOut<CropPrediction>>, ApiError> {
    let Json(payload) = body?;
    let features = reconcile::crop_features(&payload)?;
    let result = state.ctx.predict(&features)?;
    Ok(Json(PredictionOut {
        success: true,
        prediction: result.into(),
        input_data: payload,
    }))
}

async fn predict_soil(
    State(state): State<AppState>,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<PredictionOut<SoilPrediction>>, ApiError> {
    let Json(payload) = body?;
    let features = reconcile::soil_features(&payload)?;
    let result = state.ctx.predict(&features)?;
    Ok(Json(PredictionOut {
        success: true,
        prediction: result.into(),
        input_data: payload,
    }))
}

async fn predict_combined(
    State(state): State<AppState>,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<CombinedOut>, ApiError> {
    let Json(mut payload) = body?;
    let (crop, soil) = reconcile::combined_features(&mut payload)?;
    let crop = state.ctx.predict(&crop)?;
    let soil = state.ctx.predict(&soil)?;
    Ok(Json(CombinedOut {
        success: true,
        crop_prediction: crop.into(),
        soil_prediction: soil.into(),
        input_data: payload,
    }))
}

async fn sensor_data(
    State(state): State<AppState>,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<SensorOut>, ApiError> {
    let Json(payload) = body?;
    let reading = SensorPayload::from_payload(&payload)?.reading();
    let (crop, soil) = reconcile::sensor_features(&reading);
    let crop = state.ctx.predict(&crop)?;
    let soil = state.ctx.predict(&soil)?;
    tracing::info!(
        crop = crop.label,
        fertility = soil.label,
        ph = reading.ph_soil,
        "sensor reading processed"
    );
    Ok(Json(SensorOut {
        success: true,
        sensor_data: payload,
        recommendations: Recommendations {
            crop: crop.into(),
            soil_fertility: soil.into(),
        },
        processed_values: reading,
    }))
}
