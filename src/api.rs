use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::relay::{RelayError, RelayService};
use crate::store::BetStore;
use crate::types::{ErrorResponse, NewBet, RelayParams, RelayResponse};

/// Everything a request handler can reach: the relay pipeline and the
/// bet history. Constructed once by the composition root.
#[derive(Clone)]
pub struct AppState {
    /// The relay authorization pipeline
    pub relay: RelayService,
    /// Settled-bet history
    pub bets: Arc<BetStore>,
}

/// The full application router.
///
/// Routes are mounted both bare and under `/api`: the hosted deployment
/// strips the prefix at the edge, local development does not.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/relay", post(relay_bet))
        .route("/bets", post(save_bet).get(list_bets));

    Router::new()
        .nest("/api", routes.clone())
        .merge(routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = if self.is_rejection() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %self, "relay failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, error_body(self.to_string())).into_response()
    }
}

fn error_body(error: String) -> Json<ErrorResponse> {
    Json(ErrorResponse { error })
}

/// `POST /relay`: validate and conditionally submit one bet.
async fn relay_bet(
    State(state): State<AppState>,
    payload: Result<Json<RelayParams>, JsonRejection>,
) -> Result<Json<RelayResponse>, Response> {
    let Json(params) = payload.map_err(bad_body)?;
    match state.relay.relay(&params).await {
        Ok(tx_hash) => Ok(Json(RelayResponse { tx_hash })),
        Err(err) => Err(err.into_response()),
    }
}

/// `POST /bets`: record a settled bet; conflicts on a repeated tx hash.
async fn save_bet(
    State(state): State<AppState>,
    payload: Result<Json<NewBet>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(bet) = payload.map_err(bad_body)?;
    match state.bets.insert(bet) {
        Ok(record) => Ok((StatusCode::CREATED, Json(record)).into_response()),
        Err(dup) => Err((StatusCode::CONFLICT, error_body(dup.to_string())).into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct BetsQuery {
    limit: Option<usize>,
    player: Option<String>,
}

/// `GET /bets`: recent bets, newest first, optionally for one player.
async fn list_bets(
    State(state): State<AppState>,
    Query(query): Query<BetsQuery>,
) -> Response {
    let player = match query.player.as_deref() {
        Some(raw) => match raw.parse() {
            Ok(addr) => Some(addr),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    error_body("Invalid player address".to_owned()),
                )
                    .into_response()
            }
        },
        None => None,
    };

    let limit = query.limit.unwrap_or(50);
    Json(state.bets.recent(limit, player)).into_response()
}

fn bad_body(rejection: JsonRejection) -> Response {
    (StatusCode::BAD_REQUEST, error_body(rejection.body_text())).into_response()
}
