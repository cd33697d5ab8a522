//! Servidor web Axum para segmentação, treino e detecção de erros de OCR,
//! com WebSocket para acompanhar a detecção passo a passo.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use ocrrect_core::{
    pipeline::{Detection, DetectionEvent, Detector},
    segmenter::{segment_with_mode, SegmenterMode},
    window::{build_words, Word},
    DetectError, DetectorConfig,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Estado compartilhado da aplicação
struct AppState {
    detector: RwLock<Detector>,
}

#[derive(Deserialize)]
struct SegmentRequest {
    text: String,
    #[serde(default)]
    segmenter: Option<SegmenterMode>,
}

#[derive(Serialize)]
struct SegmentResponse {
    words: Vec<Word>,
    total_words: usize,
}

#[derive(Deserialize)]
struct TrainRequest {
    text: String,
    labels: Vec<bool>,
}

#[derive(Serialize)]
struct TrainResponse {
    trained_words: usize,
}

#[derive(Deserialize)]
struct DetectRequest {
    text: String,
}

#[derive(Serialize)]
struct DetectResponse {
    detections: Vec<Detection>,
    total_words: usize,
    processing_ms: u64,
}

/// Erro de handler convertido em `{"error": ...}`.
enum ApiError {
    Detect(DetectError),
    Internal(String),
}

impl From<DetectError> for ApiError {
    fn from(err: DetectError) -> Self {
        ApiError::Detect(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Detect(err) if err.is_client_error() => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Detect(err) => {
                error!(error = %err, "detection request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn poisoned<T>(_: T) -> ApiError {
    ApiError::Internal("detector lock poisoned".into())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("OCRRECT_CONFIG") {
        Ok(path) => {
            info!(%path, "loading detector configuration");
            DetectorConfig::from_json_file(&path)
        }
        Err(_) => Ok(DetectorConfig::default()),
    };
    let detector = match config.and_then(|config| Detector::from_config(&config)) {
        Ok(detector) => detector,
        Err(err) => {
            error!(error = %err, "failed to build detector");
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        detector: RwLock::new(detector),
    });

    let addr = std::env::var("OCRRECT_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    info!("Servidor de detecção OCR iniciado em http://{addr}");
    axum::serve(listener, app(state)).await.unwrap();
}

fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/segment", post(segment_handler))
        .route("/train", post(train_handler))
        .route("/detect", post(detect_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Segmenta e monta as janelas de contexto, sem classificar
async fn segment_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SegmentRequest>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let words = match req.segmenter {
        Some(mode) => build_words(&segment_with_mode(&req.text, mode)?),
        None => state.detector.read().map_err(poisoned)?.words(&req.text)?,
    };
    Ok(Json(SegmentResponse {
        total_words: words.len(),
        words,
    }))
}

/// Treina o detector compartilhado (um rótulo por palavra segmentada)
async fn train_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainRequest>,
) -> Result<Json<TrainResponse>, ApiError> {
    // O treino pode chamar um processo externo: roda fora do runtime
    let trained_words = tokio::task::spawn_blocking(move || {
        let mut detector = state.detector.write().map_err(poisoned)?;
        detector.train_text(&req.text, &req.labels).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(trained_words, "detector trained");
    Ok(Json(TrainResponse { trained_words }))
}

async fn detect_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let start = Instant::now();
    let detections = tokio::task::spawn_blocking(move || {
        let detector = state.detector.read().map_err(poisoned)?;
        detector.detect(&req.text).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(DetectResponse {
        total_words: detections.len(),
        detections,
        processing_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Lógica do WebSocket: recebe texto, executa a detecção e envia os eventos de cada etapa
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                // Aceita {"text": ...} ou o texto puro
                let text = serde_json::from_str::<DetectRequest>(&text)
                    .map(|req| req.text)
                    .unwrap_or(text);
                if text.trim().is_empty() {
                    continue;
                }

                let (tx, rx) = std::sync::mpsc::channel::<DetectionEvent>();
                let state = Arc::clone(&state);
                let handle = tokio::task::spawn_blocking(move || match state.detector.read() {
                    Ok(detector) => {
                        let _ = detector.detect_streaming(&text, tx);
                    }
                    Err(_) => {
                        let _ = tx.send(DetectionEvent::Error {
                            message: "detector lock poisoned".into(),
                        });
                    }
                });
                handle.await.ok();

                let events: Vec<DetectionEvent> = rx.try_iter().collect();
                for event in &events {
                    if let Ok(json) = serde_json::to_string(event) {
                        if socket.send(Message::Text(json)).await.is_err() {
                            return; // cliente desconectou
                        }
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}
