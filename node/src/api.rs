//! # Mint HTTP API
//!
//! The axum router in front of a [`Mint`]. Every handler shares state
//! through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path       | Description                              |
//! |--------|------------|------------------------------------------|
//! | GET    | `/health`  | Liveness probe                           |
//! | GET    | `/info`    | Name, protocol version, keyset id        |
//! | GET    | `/keys`    | Public keyset                            |
//! | POST   | `/sign`    | Blind-sign one `BlindedMessage`          |
//! | POST   | `/redeem`  | Spend every proof of a token             |
//! | POST   | `/split`   | Spend proofs, sign balanced outputs      |
//! | POST   | `/combine` | Same as `/split`                         |
//! | POST   | `/check`   | Spent state of each proof                |
//!
//! Refusals come back with the status from
//! [`MintRejection::status_code`] and an [`ErrorResponse`] body.

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ecash_protocol::config::{
    PATH_CHECK, PATH_COMBINE, PATH_KEYS, PATH_REDEEM, PATH_SIGN, PATH_SPLIT,
};
use ecash_protocol::mint::wire::{
    CheckRequest, CheckResponse, ErrorResponse, RedeemResponse, SwapRequest, SwapResponse,
};
use ecash_protocol::mint::{Mint, MintRejection};
use ecash_protocol::token::{BlindedMessage, Token};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub mint: Arc<Mint>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route(PATH_KEYS, get(keys_handler))
        .route(PATH_SIGN, post(sign_handler))
        .route(PATH_REDEEM, post(redeem_handler))
        .route(PATH_SPLIT, post(split_handler))
        .route(PATH_COMBINE, post(combine_handler))
        .route(PATH_CHECK, post(check_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Turns a rejection into its HTTP response and counts it.
fn reject(state: &AppState, rejection: MintRejection) -> Response {
    state
        .metrics
        .rejections_total
        .with_label_values(&[rejection.code()])
        .inc();
    tracing::debug!(code = rejection.code(), %rejection, "request rejected");

    let status =
        StatusCode::from_u16(rejection.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse {
        error: rejection.to_string(),
        code: rejection.code().to_string(),
    };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`. Liveness only.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.mint.info())
}

async fn keys_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.mint.keys().clone())
}

/// `POST /sign`: `C_ = k_amount * B_` plus a DLEQ proof.
async fn sign_handler(
    State(state): State<AppState>,
    Json(message): Json<BlindedMessage>,
) -> Response {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&["sign"])
        .start_timer();

    match state.mint.sign(&message) {
        Ok(signature) => {
            state.metrics.signatures_issued_total.inc();
            (StatusCode::OK, Json(signature)).into_response()
        }
        Err(rejection) => reject(&state, rejection),
    }
}

/// `POST /redeem`: all-or-nothing spend of a token's proofs.
async fn redeem_handler(State(state): State<AppState>, Json(token): Json<Token>) -> Response {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&["redeem"])
        .start_timer();

    match state.mint.redeem(&token.proofs) {
        Ok(redeemed) => {
            state.metrics.proofs_redeemed_total.inc_by(redeemed as u64);
            (StatusCode::OK, Json(RedeemResponse { redeemed })).into_response()
        }
        Err(rejection) => reject(&state, rejection),
    }
}

async fn split_handler(State(state): State<AppState>, Json(req): Json<SwapRequest>) -> Response {
    swap(&state, "split", req)
}

async fn combine_handler(
    State(state): State<AppState>,
    Json(req): Json<SwapRequest>,
) -> Response {
    swap(&state, "combine", req)
}

fn swap(state: &AppState, endpoint: &str, req: SwapRequest) -> Response {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&[endpoint])
        .start_timer();

    match state.mint.swap(&req.proofs, &req.outputs) {
        Ok(signatures) => {
            state
                .metrics
                .proofs_redeemed_total
                .inc_by(req.proofs.len() as u64);
            state
                .metrics
                .signatures_issued_total
                .inc_by(signatures.len() as u64);
            (StatusCode::OK, Json(SwapResponse { signatures })).into_response()
        }
        Err(rejection) => reject(state, rejection),
    }
}

async fn check_handler(State(state): State<AppState>, Json(req): Json<CheckRequest>) -> Response {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&["check"])
        .start_timer();

    match state.mint.check(&req.proofs) {
        Ok(states) => (StatusCode::OK, Json(CheckResponse { states })).into_response(),
        Err(rejection) => reject(&state, rejection),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ecash_protocol::config::MintClientConfig;
    use ecash_protocol::crypto::MintKeys;
    use ecash_protocol::mint::wire::MintInfo;
    use ecash_protocol::mint::{HttpMintClient, MintClient, MintError};
    use ecash_protocol::token::{
        construct, verify, BlindSignature, PreparedOutput, Proof, ProofState, TokenComposer,
    };
    use ecash_protocol::wallet::{HttpConnector, SledLedger, Wallet};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::metrics::MintMetrics;

    fn test_app_state() -> AppState {
        AppState {
            mint: Arc::new(Mint::temporary(&[9u8; 32]).expect("temp mint")),
            metrics: Arc::new(MintMetrics::new().expect("metrics")),
        }
    }

    /// Sends a GET request and returns (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with a JSON body and returns (status, body_bytes).
    async fn post_json<T: serde::Serialize>(
        router: &Router,
        path: &str,
        body: &T,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Issues one proof of `amount` through the router.
    async fn issue_via(router: &Router, keys: &MintKeys, amount: u64) -> Proof {
        let output = PreparedOutput::new(amount).unwrap();
        let (status, body) = post_json(router, PATH_SIGN, output.message()).await;
        assert_eq!(status, StatusCode::OK);
        let sig: BlindSignature = serde_json::from_slice(&body).unwrap();
        construct(output, &sig, keys).unwrap()
    }

    /// Serves the router on an ephemeral port and returns its base URL.
    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    // -- oneshot ------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn info_and_keys_agree() {
        let state = test_app_state();
        let router = create_router(state.clone());

        let (_, body) = get(&router, "/info").await;
        let info: MintInfo = serde_json::from_slice(&body).unwrap();
        let (status, body) = get(&router, PATH_KEYS).await;
        assert_eq!(status, StatusCode::OK);
        let keys: MintKeys = serde_json::from_slice(&body).unwrap();

        assert_eq!(info.keyset_id, keys.id);
        assert!(keys.is_consistent());
        assert_eq!(&keys, state.mint.keys());
    }

    #[tokio::test]
    async fn sign_returns_verifiable_signature() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let proof = issue_via(&router, state.mint.keys(), 16).await;

        assert!(verify(&proof, state.mint.keys()));
        assert_eq!(state.metrics.signatures_issued_total.get(), 1);
    }

    #[tokio::test]
    async fn sign_rejects_unknown_denomination() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let mut message = PreparedOutput::new(4).unwrap().message().clone();
        message.amount = 3;

        let (status, body) = post_json(&router, PATH_SIGN, &message).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, "unknown_denomination");
        assert_eq!(
            state
                .metrics
                .rejections_total
                .with_label_values(&["unknown_denomination"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn sign_rejects_malformed_json() {
        let router = create_router(test_app_state());
        let body = serde_json::json!({ "amount": 1, "B_": "zz", "id": "x" });
        let (status, _) = post_json(&router, PATH_SIGN, &body).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn redeem_then_double_spend_is_409() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let proof = issue_via(&router, state.mint.keys(), 2).await;
        let token = Token::new("http://test", vec![proof]);

        let (status, body) = post_json(&router, PATH_REDEEM, &token).await;
        assert_eq!(status, StatusCode::OK);
        let resp: RedeemResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.redeemed, 1);

        let (status, body) = post_json(&router, PATH_REDEEM, &token).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, "already_spent");
        assert_eq!(state.metrics.proofs_redeemed_total.get(), 1);
    }

    #[tokio::test]
    async fn redeem_forged_proof_is_403() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let mut proof = issue_via(&router, state.mint.keys(), 8).await;
        proof.signature = proof.signature + proof.commitment;

        let token = Token::new("http://test", vec![proof]);
        let (status, body) = post_json(&router, PATH_REDEEM, &token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, "unauthorized");
        assert_eq!(state.mint.spent_count(), 0);
    }

    #[tokio::test]
    async fn split_rejects_unbalanced_outputs() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let proof = issue_via(&router, state.mint.keys(), 4).await;

        let req = SwapRequest {
            proofs: vec![proof.clone()],
            outputs: vec![PreparedOutput::new(8).unwrap().message().clone()],
        };
        let (status, body) = post_json(&router, PATH_SPLIT, &req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, "unbalanced_swap");

        // Nothing was spent.
        let (_, body) = post_json(&router, PATH_CHECK, &CheckRequest { proofs: vec![proof] }).await;
        let resp: CheckResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.states, vec![ProofState::Spendable]);
    }

    #[tokio::test]
    async fn combine_spends_and_signs() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let keys = state.mint.keys().clone();
        let a = issue_via(&router, &keys, 1).await;
        let b = issue_via(&router, &keys, 2).await;

        let outputs = PreparedOutput::for_amount(3).unwrap();
        let req = SwapRequest {
            proofs: vec![a.clone(), b.clone()],
            outputs: outputs.iter().map(|o| o.message().clone()).collect(),
        };
        let (status, body) = post_json(&router, PATH_COMBINE, &req).await;
        assert_eq!(status, StatusCode::OK);
        let resp: SwapResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.signatures.len(), 2);

        let (_, body) = post_json(&router, PATH_CHECK, &CheckRequest { proofs: vec![a, b] }).await;
        let resp: CheckResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.states, vec![ProofState::Spent, ProofState::Spent]);
    }

    // -- over HTTP ----------------------------------------------------------

    #[tokio::test]
    async fn http_client_issue_split_redeem() {
        let state = test_app_state();
        let url = serve(state.clone()).await;
        let client = Arc::new(HttpMintClient::new(url, MintClientConfig::default()).unwrap());
        let composer = TokenComposer::connect(client.clone()).await.unwrap();

        let token = composer.issue(100).await.unwrap();
        let (thirty, seventy) = composer.split(&token, 30).await.unwrap();
        assert_eq!(thirty.value() + seventy.value(), 100);

        assert!(client.submit_redeem(&thirty).await.unwrap());
        // Already spent: a 409 is a refusal, not an error.
        assert!(!client.submit_redeem(&thirty).await.unwrap());
        // The original token was consumed by the split.
        let err = composer.split(&token, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ecash_protocol::token::TokenError::Mint(MintError::Rejected { code: 409, .. })
        ));

        let states = client.submit_verify(&seventy.proofs).await.unwrap();
        assert!(states.iter().all(|s| *s == ProofState::Spendable));
    }

    #[tokio::test]
    async fn http_redeem_403_returns_false() {
        let state = test_app_state();
        let url = serve(state.clone()).await;
        let client = HttpMintClient::new(url.clone(), MintClientConfig::default()).unwrap();
        let keys = client.keys().await.unwrap();

        let output = PreparedOutput::new(2).unwrap();
        let sig = client.request_signature(output.message()).await.unwrap();
        let mut proof = construct(output, &sig, &keys).unwrap();
        proof.signature = proof.signature + proof.commitment;

        let token = Token::new(url, vec![proof]);
        assert!(!client.submit_redeem(&token).await.unwrap());
        assert_eq!(state.mint.spent_count(), 0);
    }

    #[tokio::test]
    async fn wallet_over_http() {
        let state = test_app_state();
        let url = serve(state).await;
        let connector = Arc::new(HttpConnector::new(MintClientConfig::default()));

        let alice = Wallet::new(SledLedger::open_temporary().unwrap(), connector.clone());
        let bob = Wallet::new(SledLedger::open_temporary().unwrap(), connector);
        alice.add_mint(&url, "Test", true).unwrap();

        alice.mint_tokens(100).await.unwrap();
        let sent = alice.send(30, None).await.unwrap();
        assert_eq!(bob.receive(&sent.encode().unwrap()).await.unwrap(), 30);
        let back = bob.send(30, None).await.unwrap();
        alice.receive(&back.encode().unwrap()).await.unwrap();

        assert_eq!(alice.spendable_balance().unwrap(), 100);
        assert_eq!(bob.spendable_balance().unwrap(), 0);
    }
}
