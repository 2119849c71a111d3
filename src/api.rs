//! Thin HTTP/WS demo surface over [`Engine`], giving the market maker
//! and strategy feeder something real to submit orders against.
//!
//! One instrument per process — no per-pair routing in the URL space.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        FromRequest, Path, Request, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    engine::Engine,
    errors::EngineError,
    orderbook::Level,
    orders::{Order, OrderType, Side},
    state::AppState,
    trade::Trade,
};

type ApiErr = (StatusCode, Json<serde_json::Value>);
fn err(status: StatusCode, msg: &str) -> ApiErr {
    (status, Json(json!({ "error": msg })))
}

impl From<EngineError> for ApiErr {
    fn from(e: EngineError) -> Self {
        err(StatusCode::BAD_REQUEST, &e.to_string())
    }
}

/// A `Json<T>` extractor that logs the request body on deserialization
/// failure instead of silently 422-ing.
pub struct LoggedJson<T>(pub T);

impl<S, T> FromRequest<S> for LoggedJson<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned,
{
    type Rejection = ApiErr;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| err(StatusCode::BAD_REQUEST, &e.to_string()))?;

        match serde_json::from_slice::<T>(&bytes) {
            Ok(val) => Ok(LoggedJson(val)),
            Err(e) => {
                let preview = String::from_utf8_lossy(&bytes);
                let cut = (0..=preview.len().min(4096))
                    .rev()
                    .find(|&i| preview.is_char_boundary(i))
                    .unwrap_or(0);
                let preview = &preview[..cut];
                warn!(error = %e, %method, %uri, body_preview = %preview, "order rejected: bad JSON");
                Err(err(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))
            }
        }
    }
}

/// Request payload for `POST /orders`.
#[derive(Deserialize)]
pub struct NewOrder {
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<crate::price::Price>,
    pub quantity: u64,
}

/// Response for `POST /orders`: the assigned order id plus any trades
/// the submission produced.
#[derive(Serialize)]
pub struct OrderAck {
    pub order_id: u64,
    pub trades: Vec<Trade>,
}

/// A JSON snapshot of both sides of the book.
#[derive(Serialize, Clone)]
pub struct BookSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl BookSnapshot {
    async fn capture(engine: &tokio::sync::Mutex<Engine>) -> Self {
        let mut engine = engine.lock().await;
        BookSnapshot {
            bids: engine.snapshot(Side::Buy),
            asks: engine.snapshot(Side::Sell),
        }
    }
}

/// A websocket frame, tagged so a subscriber can tell book updates from
/// trade prints apart: `{"type": "BookSnapshot", "data": {...}}`.
#[derive(Serialize, Deserialize, Clone)]
#[serde(tag = "type", content = "data")]
pub enum WsFrame {
    BookSnapshot(BookSnapshot),
    Trade(Trade),
}

/// `GET /trades` — every trade produced so far, in production order.
pub async fn get_trade_log(State(state): State<AppState>) -> Json<Vec<Trade>> {
    let engine = state.engine.lock().await;
    Json(engine.trades_since(0).to_vec())
}

/// `GET /book` — a JSON snapshot of the current order book.
pub async fn get_order_book(State(state): State<AppState>) -> impl IntoResponse {
    Json(BookSnapshot::capture(&state.engine).await)
}

/// `POST /orders` — submits a new order and returns its id plus any
/// resulting fills.
pub async fn create_order(
    State(state): State<AppState>,
    LoggedJson(payload): LoggedJson<NewOrder>,
) -> Result<Json<OrderAck>, ApiErr> {
    let order_id = Uuid::new_v4().as_u128() as u64;
    let order = Order {
        id: order_id,
        side: payload.side,
        order_type: payload.order_type,
        price: payload.price,
        quantity: payload.quantity,
        ts_ns: 0,
    };

    let (_result, trades) = {
        let mut engine = state.engine.lock().await;
        engine.add_order(order)?
    };

    for trade in &trades {
        let _ = state.trade_tx.send(trade.clone());
    }
    let _ = state.book_tx.send(());

    info!(order_id, fills = trades.len(), "order accepted");
    Ok(Json(OrderAck { order_id, trades }))
}

/// `DELETE /orders/{id}` — cancels a resting order. Unknown ids are not
/// an error, matching `Engine::cancel_order`.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<u64>,
) -> impl IntoResponse {
    let mut engine = state.engine.lock().await;
    engine.cancel_order(order_id);
    drop(engine);
    let _ = state.book_tx.send(());
    (StatusCode::OK, Json(json!({"status": "cancelled"})))
}

/// `GET /ws` — upgrades to a WebSocket and streams book snapshots and
/// trade prints to the client.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

pub async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut trade_rx = state.trade_tx.subscribe();
    let mut book_rx = state.book_tx.subscribe();

    let initial = BookSnapshot::capture(&state.engine).await;
    if let Err(e) = socket
        .send(Message::Text(
            serde_json::to_string(&WsFrame::BookSnapshot(initial))
                .unwrap()
                .into(),
        ))
        .await
    {
        error!(error = ?e, "failed to send initial snapshot");
        return;
    }

    loop {
        tokio::select! {
            Ok(trade) = trade_rx.recv() => {
                let frame = WsFrame::Trade(trade);
                if let Err(e) = socket.send(Message::Text(serde_json::to_string(&frame).unwrap().into())).await {
                    error!(error = ?e, "ws send (trade) failed");
                    break;
                }
            }
            Ok(()) = book_rx.recv() => {
                let snap = BookSnapshot::capture(&state.engine).await;
                let frame = WsFrame::BookSnapshot(snap);
                if let Err(e) = socket.send(Message::Text(serde_json::to_string(&frame).unwrap().into())).await {
                    error!(error = ?e, "ws send (snapshot) failed");
                    break;
                }
            }
            else => break,
        }
    }
}

/// Builds the application's `Router` with all routes and shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", delete(cancel_order))
        .route("/trades", get(get_trade_log))
        .route("/book", get(get_order_book))
        .route("/ws", get(ws_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(false)
                        .level(tracing::Level::TRACE),
                )
                .on_response(DefaultOnResponse::new().level(tracing::Level::TRACE)),
        )
        .with_state(state)
}
