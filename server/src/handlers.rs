use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderName, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use common::{ConfigResponse, ServerMessage};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::control;
use crate::state::AppState;
use crate::telemetry;

const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/config", get(get_config).options(config_preflight))
        .route("/ws/simulation", get(simulation_ws))
        .route("/ws", get(simulation_ws))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// Defaults y rangos válidos de cada campo
async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let body = ConfigResponse::from_defaults(state.engine.defaults().clone());
    (StatusCode::OK, CORS_HEADERS, Json(body))
}

// Preflight CORS
async fn config_preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, CORS_HEADERS)
}

/* ---------------- websocket de control ---------------- */

async fn simulation_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn send_json(socket: &mut WebSocket, msg: &ServerMessage) -> bool {
    let text = match serde_json::to_string(msg) {
        Ok(t) => t,
        Err(e) => {
            warn!("no se pudo serializar {:?}: {}", msg, e);
            return true;
        }
    };
    socket.send(Message::Text(text)).await.is_ok()
}

/// Una conexión: comandos entrantes y telemetría saliente en el mismo loop.
async fn handle_socket(state: AppState, mut socket: WebSocket) {
    let conn_id = Uuid::new_v4();
    let mut rx = state.engine.subscribe();
    info!("observador {} conectado", conn_id);

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        debug!("observador {} envió: {}", conn_id, text);
                        if let Some(reply) = control::handle_text(&state.engine, &text) {
                            if !send_json(&mut socket, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // ping/pong los maneja axum; binarios se ignoran
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("error en el socket de {}: {}", conn_id, e);
                        break;
                    }
                }
            }
            outgoing = telemetry::next_message(&mut rx) => {
                match outgoing {
                    Some(msg) => {
                        if !send_json(&mut socket, &msg).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    info!("observador {} desconectado", conn_id);
}
