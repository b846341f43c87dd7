//! Scorecard handlers: CRUD for scorecards, characteristics and attributes,
//! plus scoring, metrics and binning helpers.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use creditflow_core::scorecard::binning::{BinningMethod, auto_bin_woe, propose_bins};
use creditflow_types::scorecard::{
    Attribute, BinProposal, Characteristic, CharacteristicMetrics, CreateAttributeRequest,
    CreateCharacteristicRequest, CreateScorecardRequest, Sample, ScoreResult, Scorecard,
    UpdateScorecardRequest,
};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /scorecards/{id}/calculate`.
#[derive(Debug, Deserialize)]
pub struct CalculateBody {
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Characteristic name -> input field. Identity when omitted.
    #[serde(default)]
    pub field_mapping: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BinningStrategy {
    EqualWidth,
    EqualFrequency,
    /// Equal-frequency bins annotated with WOE/IV from labelled samples.
    Woe,
}

/// Body of `POST /scorecards/binning`.
#[derive(Debug, Deserialize)]
pub struct BinningBody {
    pub method: BinningStrategy,
    #[serde(default = "default_n_bins")]
    pub n_bins: usize,
    /// Raw values for `equal_width` / `equal_frequency`.
    #[serde(default)]
    pub values: Vec<f64>,
    /// Labelled samples for `woe`.
    #[serde(default)]
    pub samples: Vec<Sample>,
}

fn default_n_bins() -> usize {
    10
}

impl BinningBody {
    pub fn propose(&self) -> Result<Vec<BinProposal>, AppError> {
        let bins = match self.method {
            BinningStrategy::EqualWidth => {
                propose_bins(&self.values, self.n_bins, BinningMethod::EqualWidth)?
            }
            BinningStrategy::EqualFrequency => {
                propose_bins(&self.values, self.n_bins, BinningMethod::EqualFrequency)?
            }
            BinningStrategy::Woe => {
                if self.samples.is_empty() {
                    return Err(AppError::Validation(
                        "woe binning needs at least one labelled sample".to_string(),
                    ));
                }
                auto_bin_woe(&self.samples, self.n_bins)?
            }
        };
        Ok(bins)
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn scorecard_routes() -> Router<AppState> {
    Router::new()
        .route("/scorecards", post(create_scorecard).get(list_scorecards))
        .route("/scorecards/binning", post(binning))
        .route(
            "/scorecards/{id}",
            get(get_scorecard).put(update_scorecard).delete(delete_scorecard),
        )
        .route("/scorecards/{id}/characteristics", post(add_characteristic))
        .route("/scorecards/{id}/calculate", post(calculate))
        .route("/scorecards/{id}/metrics", get(metrics))
        .route("/characteristics/{id}", put(update_characteristic))
        .route("/characteristics/{id}", delete(delete_characteristic))
        .route("/characteristics/{id}/attributes", post(add_attribute))
        .route("/attributes/{id}", delete(delete_attribute))
}

// ---------------------------------------------------------------------------
// Scorecards
// ---------------------------------------------------------------------------

pub async fn create_scorecard(
    State(state): State<AppState>,
    Json(body): Json<CreateScorecardRequest>,
) -> Result<Json<ApiResponse<Scorecard>>, AppError> {
    let timer = RequestTimer::start();
    let scorecard = state.scorecard_service.create_scorecard(body).await?;
    let link = format!("/api/v1/scorecards/{}", scorecard.id);
    Ok(Json(timer.finish(scorecard).with_link("self", &link)))
}

pub async fn list_scorecards(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Scorecard>>>, AppError> {
    let timer = RequestTimer::start();
    let scorecards = state.scorecard_service.list_scorecards().await?;
    Ok(Json(timer.finish(scorecards)))
}

/// GET /api/v1/scorecards/{id} - Full tree with characteristics and attributes.
pub async fn get_scorecard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Scorecard>>, AppError> {
    let timer = RequestTimer::start();
    let scorecard = state.scorecard_service.get_scorecard(&id).await?;
    Ok(Json(
        timer
            .finish(scorecard)
            .with_link("metrics", &format!("/api/v1/scorecards/{id}/metrics")),
    ))
}

pub async fn update_scorecard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateScorecardRequest>,
) -> Result<Json<ApiResponse<Scorecard>>, AppError> {
    let timer = RequestTimer::start();
    let scorecard = state.scorecard_service.update_scorecard(&id, body).await?;
    Ok(Json(timer.finish(scorecard)))
}

pub async fn delete_scorecard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let timer = RequestTimer::start();
    state.scorecard_service.delete_scorecard(&id).await?;
    Ok(Json(timer.finish(serde_json::json!({ "deleted": true, "id": id }))))
}

// ---------------------------------------------------------------------------
// Characteristics and attributes
// ---------------------------------------------------------------------------

pub async fn add_characteristic(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateCharacteristicRequest>,
) -> Result<Json<ApiResponse<Characteristic>>, AppError> {
    let timer = RequestTimer::start();
    let characteristic = state.scorecard_service.add_characteristic(&id, body).await?;
    Ok(Json(timer.finish(characteristic)))
}

pub async fn update_characteristic(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateCharacteristicRequest>,
) -> Result<Json<ApiResponse<Characteristic>>, AppError> {
    let timer = RequestTimer::start();
    let characteristic = state
        .scorecard_service
        .update_characteristic(&id, body)
        .await?;
    Ok(Json(timer.finish(characteristic)))
}

/// DELETE /api/v1/characteristics/{id} - Removes its attributes too.
pub async fn delete_characteristic(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let timer = RequestTimer::start();
    state.scorecard_service.delete_characteristic(&id).await?;
    Ok(Json(timer.finish(serde_json::json!({ "deleted": true, "id": id }))))
}

pub async fn add_attribute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateAttributeRequest>,
) -> Result<Json<ApiResponse<Attribute>>, AppError> {
    let timer = RequestTimer::start();
    let attribute = state.scorecard_service.add_attribute(&id, body).await?;
    Ok(Json(timer.finish(attribute)))
}

pub async fn delete_attribute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let timer = RequestTimer::start();
    state.scorecard_service.delete_attribute(&id).await?;
    Ok(Json(timer.finish(serde_json::json!({ "deleted": true, "id": id }))))
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// POST /api/v1/scorecards/{id}/calculate - Score `input` without persisting.
pub async fn calculate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CalculateBody>,
) -> Result<Json<ApiResponse<ScoreResult>>, AppError> {
    let timer = RequestTimer::start();
    let result = match &body.field_mapping {
        Some(mapping) => {
            state
                .scorecard_service
                .calculate_mapped(&id, &body.input, mapping)
                .await?
        }
        None => state.scorecard_service.calculate(&id, &body.input).await?,
    };
    Ok(Json(timer.finish(result)))
}

/// GET /api/v1/scorecards/{id}/metrics - WOE, IV and points per attribute.
pub async fn metrics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<CharacteristicMetrics>>>, AppError> {
    let timer = RequestTimer::start();
    let metrics = state.scorecard_service.metrics(&id).await?;
    Ok(Json(timer.finish(metrics)))
}

/// POST /api/v1/scorecards/binning - Propose attribute bins from sample data.
pub async fn binning(
    Json(body): Json<BinningBody>,
) -> Result<Json<ApiResponse<Vec<BinProposal>>>, AppError> {
    let timer = RequestTimer::start();
    let bins = body.propose()?;
    Ok(Json(timer.finish(bins)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binning_body_equal_width() {
        let body: BinningBody = serde_json::from_value(json!({
            "method": "equal_width",
            "n_bins": 2,
            "values": [0.0, 5.0, 10.0]
        }))
        .unwrap();
        let bins = body.propose().unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].label, "Bin 1");
        assert_eq!(bins[0].min_value, 0.0);
        assert_eq!(bins[1].min_value, 5.0);
        assert!(bins[1].max_value > 10.0);
    }

    #[test]
    fn test_binning_body_defaults_to_ten_bins() {
        let body: BinningBody = serde_json::from_value(json!({
            "method": "equal_frequency",
            "values": [1.0, 2.0, 3.0]
        }))
        .unwrap();
        assert_eq!(body.n_bins, 10);
        // Never more bins than distinct values.
        assert_eq!(body.propose().unwrap().len(), 3);
    }

    #[test]
    fn test_binning_body_rejects_huge_bin_count() {
        let body: BinningBody = serde_json::from_value(json!({
            "method": "equal_width",
            "n_bins": 1u64 << 40,
            "values": [0.0, 1.0]
        }))
        .unwrap();
        let err = body.propose().unwrap_err();
        assert_eq!(err.parts().status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_woe_binning_requires_samples() {
        let body: BinningBody = serde_json::from_value(json!({"method": "woe"})).unwrap();
        assert!(matches!(body.propose(), Err(AppError::Validation(_))));

        let body: BinningBody = serde_json::from_value(json!({
            "method": "woe",
            "n_bins": 2,
            "samples": [
                {"value": 1.0, "is_good": false},
                {"value": 2.0, "is_good": true},
                {"value": 3.0, "is_good": true},
                {"value": 4.0, "is_good": true}
            ]
        }))
        .unwrap();
        let bins = body.propose().unwrap();
        assert_eq!(bins.len(), 2);
        assert!(bins.iter().all(|b| b.counts.is_some() && b.woe.is_some()));
    }

    #[test]
    fn test_zero_bins_is_rejected() {
        let body: BinningBody = serde_json::from_value(json!({
            "method": "equal_width",
            "n_bins": 0,
            "values": [1.0]
        }))
        .unwrap();
        let err = body.propose().unwrap_err();
        assert_eq!(err.parts().status, axum::http::StatusCode::BAD_REQUEST);
    }
}
