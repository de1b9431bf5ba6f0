/// HTTP endpoint for severity predictions
///
/// Provides a small JSON API so dashboards and scripts can run the pipeline
/// without linking the crate.
///
/// Endpoints:
/// - POST /predict - Runs one prediction request
/// - GET /health - Service health check
///
/// Requests are served one at a time on the calling thread.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;

use crate::labels::AccidentType;
use crate::model::{AccidentQuery, GeoPoint, PipelineError, PredictionReport};
use crate::pipeline::Predictor;

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub lat: f64,
    pub lon: f64,
    /// `YYYY-MM-DD`
    pub date: NaiveDate,
    pub hour: u32,
    /// Code (`at2`) or description
    pub accident_type: String,
    #[serde(default)]
    pub pedestrian: bool,
    #[serde(default)]
    pub bicycle: bool,
    #[serde(default)]
    pub motorcycle: bool,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    1
}

impl PredictRequest {
    pub fn to_query(&self) -> Result<AccidentQuery, PipelineError> {
        let accident_type = AccidentType::parse(&self.accident_type).ok_or_else(|| {
            PipelineError::InvalidInput(format!("unknown accident type {:?}", self.accident_type))
        })?;

        Ok(AccidentQuery::new(
            GeoPoint::new(self.lon, self.lat),
            self.date,
            self.hour,
            accident_type,
        )?
        .with_involvements(self.pedestrian, self.bicycle, self.motorcycle))
    }
}

/// Prediction report plus label counts
#[derive(Debug, Serialize)]
pub struct PredictResponse<'a> {
    #[serde(flatten)]
    pub report: &'a PredictionReport,
    pub severe: usize,
    pub minor: usize,
}

/// HTTP status for a failed request.
pub fn status_for(err: &PipelineError) -> u16 {
    match err {
        PipelineError::InvalidInput(_) => 400,
        PipelineError::RateLimited { .. } => 429,
        PipelineError::Upstream(_) | PipelineError::Http(_) => 502,
        _ => 500,
    }
}

fn error_body(err: &PipelineError) -> serde_json::Value {
    let kind = match err {
        PipelineError::InvalidInput(_) => "invalid_input",
        PipelineError::RateLimited { .. } => "rate_limited",
        PipelineError::Upstream(_) | PipelineError::Http(_) => "upstream",
        _ => "internal",
    };
    serde_json::json!({ "error": err.to_string(), "kind": kind })
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Routes one request and returns the status code and JSON body.
pub fn handle_request(predictor: &Predictor, method: &str, url: &str, body: &str) -> (u16, serde_json::Value) {
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        ("GET", "/health") => (200, handle_health()),
        ("POST", "/predict") => handle_predict(predictor, body),
        (_, "/health") | (_, "/predict") => (
            405,
            serde_json::json!({ "error": format!("{} not allowed on {}", method, path) }),
        ),
        _ => (
            404,
            serde_json::json!({
                "error": "Not found",
                "available_endpoints": ["GET /health", "POST /predict"]
            }),
        ),
    }
}

/// Handle /health endpoint
fn handle_health() -> serde_json::Value {
    serde_json::json!({
        "status": "ok",
        "service": "wreckognizer",
        "version": env!("CARGO_PKG_VERSION")
    })
}

/// Handle /predict endpoint
fn handle_predict(predictor: &Predictor, body: &str) -> (u16, serde_json::Value) {
    let request: PredictRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => {
            let err = PipelineError::InvalidInput(format!("malformed request body: {}", e));
            return (400, error_body(&err));
        }
    };

    let result = request
        .to_query()
        .and_then(|query| predictor.predict(&query, request.count));

    match result {
        Ok(report) => {
            let response = PredictResponse {
                severe: report.severe_count(),
                minor: report.minor_count(),
                report: &report,
            };
            match serde_json::to_value(&response) {
                Ok(json) => (200, json),
                Err(e) => {
                    let err = PipelineError::Json(e);
                    log::error!("Failed to encode prediction: {}", err);
                    (500, error_body(&err))
                }
            }
        }
        Err(err) => {
            let status = status_for(&err);
            if status >= 500 {
                log::error!("Prediction failed: {}", err);
            } else {
                log::warn!("Prediction rejected: {}", err);
            }
            (status, error_body(&err))
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start HTTP endpoint server on the specified port
pub fn start_endpoint_server(port: u16, predictor: Arc<Predictor>) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    log::info!("HTTP endpoint listening on http://0.0.0.0:{}", port);
    log::info!("  POST /predict - Run a severity prediction");
    log::info!("  GET /health - Service health check");

    for mut request in server.incoming_requests() {
        let method = request.method().to_string();
        let url = request.url().to_string();

        let mut body = String::new();
        let (status, json) = match request.as_reader().read_to_string(&mut body) {
            Ok(_) => handle_request(&predictor, &method, &url, &body),
            Err(e) => {
                let err = PipelineError::InvalidInput(format!("unreadable request body: {}", e));
                (400, error_body(&err))
            }
        };
        log::debug!("{} {} -> {}", method, url, status);

        if let Err(e) = request.respond(create_response(status, &json)) {
            log::warn!("Failed to send response: {}", e);
        }
    }

    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &serde_json::Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());
    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
