use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use super::access::{AccessGate, MembershipGate};
use super::db::DbHandle;
use super::engine::RelocationEngine;
use super::models::{ActivityAction, Card, CardUpdate, NewCard, RelocationRequest};
use super::notifier::BoardNotifier;
use super::ws::{EventSender, WsMessage, broadcast_message};
use crate::errors::{BoardError, RelocationError};

/// Header carrying the already-authenticated actor id.
pub const ACTOR_HEADER: &str = "x-actor-id";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub engine: RelocationEngine,
    pub gate: Arc<dyn AccessGate>,
    pub notifier: BoardNotifier,
    pub events: EventSender,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the membership gate, the activity/event notifier and the engine
    /// over one database.
    pub fn new(db: DbHandle, events: EventSender) -> Self {
        let gate: Arc<dyn AccessGate> = Arc::new(MembershipGate::new(db.clone()));
        let notifier = BoardNotifier::new(db.clone(), events.clone());
        let engine = RelocationEngine::new(db.clone(), Arc::clone(&gate), Arc::new(notifier.clone()));
        Self {
            db,
            engine,
            gate,
            notifier,
            events,
        }
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateEnvironmentRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCardRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub position: Option<i32>,
}

#[derive(Deserialize)]
pub struct UpdateCardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `null` clears the due date; an absent field leaves it alone.
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<String>>,
    pub completed: Option<bool>,
}

#[derive(Deserialize)]
pub struct MoveCardRequest {
    pub target_board_id: Uuid,
    pub new_position: i32,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<RelocationError> for ApiError {
    fn from(err: RelocationError) -> Self {
        match err {
            RelocationError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            RelocationError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            RelocationError::Internal(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::EnvironmentNotFound { .. }
            | BoardError::BoardNotFound { .. }
            | BoardError::CardNotFound { .. } => ApiError::NotFound(err.to_string()),
            BoardError::BadRequest(msg) => ApiError::BadRequest(msg),
            BoardError::Relocation(inner) => inner.into(),
            BoardError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                ApiError::Internal(format!("Database error: {e}"))
            }
        }
    }
}

// ── Actor extraction ──────────────────────────────────────────────────

/// The acting user, read from [`ACTOR_HEADER`].
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {ACTOR_HEADER} header")))?;
        Uuid::parse_str(raw.trim())
            .map(Actor)
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {ACTOR_HEADER} header")))
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/environments", post(create_environment))
        .route(
            "/api/environments/{id}/boards",
            get(list_boards).post(create_board),
        )
        .route("/api/boards/{id}/cards", get(list_cards).post(create_card))
        .route(
            "/api/cards/{id}",
            get(get_card).patch(update_card).delete(delete_card),
        )
        .route("/api/cards/{id}/move", patch(move_card))
        .route("/api/cards/{id}/activity", get(list_activity))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

fn normalize_title(title: &str) -> Result<String, BoardError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BoardError::BadRequest("Title must not be empty".into()));
    }
    Ok(title.to_string())
}

/// Accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates.
fn validate_due_date(raw: &str) -> Result<String, BoardError> {
    let raw = raw.trim();
    let valid = chrono::DateTime::parse_from_rfc3339(raw).is_ok()
        || chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok();
    if valid {
        Ok(raw.to_string())
    } else {
        Err(BoardError::BadRequest(format!("Invalid due date: {raw}")))
    }
}

/// Deny-as-not-found board check.
async fn authorize_board(state: &AppState, actor: Uuid, board_id: Uuid) -> Result<(), BoardError> {
    let allowed = state
        .gate
        .can_access_board(actor, board_id)
        .await
        .map_err(BoardError::Database)?;
    if allowed {
        Ok(())
    } else {
        Err(BoardError::BoardNotFound { id: board_id })
    }
}

/// Load a card the actor may see.
async fn visible_card(state: &AppState, actor: Uuid, id: Uuid) -> Result<Card, BoardError> {
    let card = state
        .db
        .call(move |db| db.get_card(id))
        .await
        .map_err(BoardError::Database)?
        .ok_or(BoardError::CardNotFound { id })?;
    authorize_board(state, actor, card.board_id)
        .await
        .map_err(|e| match e {
            BoardError::BoardNotFound { .. } => BoardError::CardNotFound { id },
            other => other,
        })?;
    Ok(card)
}

async fn board_environment(state: &AppState, board_id: Uuid) -> Result<Uuid, BoardError> {
    state
        .db
        .call(move |db| db.board_environment(board_id))
        .await
        .map_err(BoardError::Database)?
        .ok_or(BoardError::BoardNotFound { id: board_id })
}

/// Record an activity entry without holding up the response.
fn spawn_activity(
    state: &AppState,
    card_id: Uuid,
    actor: Uuid,
    action: ActivityAction,
    details: Option<String>,
) {
    let notifier = state.notifier.clone();
    state.engine.side_effects().spawn(async move {
        if let Err(e) = notifier
            .record_activity(card_id, actor, action, details)
            .await
        {
            tracing::warn!(error = %e, %card_id, "failed to record activity");
        }
    });
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn create_environment(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(req): Json<CreateEnvironmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name must not be empty".into()));
    }
    let env = state
        .db
        .call(move |db| db.create_environment(&name, actor))
        .await
        .map_err(BoardError::Database)?;
    Ok((StatusCode::CREATED, Json(env)))
}

async fn list_boards(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(env_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let boards = state
        .db
        .call(move |db| {
            if !db.can_access_environment(actor, env_id)? {
                return Ok(None);
            }
            db.list_boards(env_id).map(Some)
        })
        .await
        .map_err(BoardError::Database)?
        .ok_or(BoardError::EnvironmentNotFound { id: env_id })?;
    Ok(Json(boards))
}

async fn create_board(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(env_id): Path<Uuid>,
    Json(req): Json<CreateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = normalize_title(&req.name)
        .map_err(|_| BoardError::BadRequest("Name must not be empty".into()))?;
    let description = req.description;
    let board = state
        .db
        .call(move |db| {
            if !db.can_access_environment(actor, env_id)? {
                return Ok(None);
            }
            db.create_board(env_id, &name, description.as_deref()).map(Some)
        })
        .await
        .map_err(BoardError::Database)?
        .ok_or(BoardError::EnvironmentNotFound { id: env_id })?;
    broadcast_message(
        &state.events,
        env_id,
        &WsMessage::BoardCreated {
            board: board.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(board)))
}

async fn list_cards(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(board_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_board(&state, actor, board_id).await?;
    let cards = state
        .db
        .call(move |db| db.list_cards(board_id))
        .await
        .map_err(BoardError::Database)?;
    Ok(Json(cards))
}

async fn create_card(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(board_id): Path<Uuid>,
    Json(req): Json<CreateCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_card = NewCard {
        title: normalize_title(&req.title)?,
        description: req.description,
        due_date: req.due_date.as_deref().map(validate_due_date).transpose()?,
        position: req.position,
    };
    authorize_board(&state, actor, board_id).await?;
    let env_id = board_environment(&state, board_id).await?;

    let card = state
        .db
        .call(move |db| db.create_card(board_id, &new_card))
        .await
        .map_err(BoardError::Database)?;
    tracing::info!(card_id = %card.id, %board_id, position = card.position, "card created");

    broadcast_message(
        &state.events,
        env_id,
        &WsMessage::CardCreated {
            card: card.clone(),
            actor_id: actor,
        },
    );
    spawn_activity(&state, card.id, actor, ActivityAction::Created, None);
    Ok((StatusCode::CREATED, Json(card)))
}

async fn get_card(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(visible_card(&state, actor, id).await?))
}

async fn update_card(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = CardUpdate {
        title: req.title.as_deref().map(normalize_title).transpose()?,
        description: req.description,
        due_date: match req.due_date {
            Some(Some(raw)) => Some(Some(validate_due_date(&raw)?)),
            other => other,
        },
        completed: req.completed,
    };
    let existing = visible_card(&state, actor, id).await?;
    let env_id = board_environment(&state, existing.board_id).await?;

    let card = state
        .db
        .call(move |db| db.update_card(id, &update))
        .await
        .map_err(BoardError::Database)?
        .ok_or(BoardError::CardNotFound { id })?;

    broadcast_message(
        &state.events,
        env_id,
        &WsMessage::CardUpdated {
            card: card.clone(),
            actor_id: actor,
        },
    );
    spawn_activity(&state, id, actor, ActivityAction::Updated, None);
    Ok(Json(card))
}

async fn delete_card(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = visible_card(&state, actor, id).await?;
    let env_id = board_environment(&state, existing.board_id).await?;

    let deleted = state
        .db
        .call(move |db| db.delete_card(id))
        .await
        .map_err(BoardError::Database)?
        .ok_or(BoardError::CardNotFound { id })?;
    tracing::info!(card_id = %id, board_id = %deleted.board_id, "card deleted");

    broadcast_message(
        &state.events,
        env_id,
        &WsMessage::CardDeleted {
            card_id: id,
            board_id: deleted.board_id,
            actor_id: actor,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn move_card(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let placement = state
        .engine
        .relocate(RelocationRequest {
            card_id: id,
            actor_id: actor,
            target_board_id: req.target_board_id,
            new_position: req.new_position,
        })
        .await?;
    Ok(Json(placement))
}

async fn list_activity(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    visible_card(&state, actor, id).await?;
    let entries = state
        .db
        .call(move |db| db.list_activity(id))
        .await
        .map_err(BoardError::Database)?;
    Ok(Json(entries))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::db::DEFAULT_BUSY_TIMEOUT;
    use crate::board::models::{Board, Environment, Placement};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        state: SharedState,
        owner: Uuid,
    }

    impl TestApp {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let db = DbHandle::open(&dir.path().join("api.db"), DEFAULT_BUSY_TIMEOUT).unwrap();
            let (events, _) = broadcast::channel(16);
            Self {
                _dir: dir,
                state: Arc::new(AppState::new(db, events)),
                owner: Uuid::new_v4(),
            }
        }

        fn router(&self) -> Router {
            api_router().with_state(Arc::clone(&self.state))
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            actor: Option<Uuid>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(actor) = actor {
                builder = builder.header(ACTOR_HEADER, actor.to_string());
            }
            let body = match body {
                Some(json) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };
            let resp = self
                .router()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = resp.status();
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn environment(&self) -> Environment {
            let (status, body) = self
                .send(
                    "POST",
                    "/api/environments",
                    Some(self.owner),
                    Some(json!({"name": "Acme"})),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            serde_json::from_value(body).unwrap()
        }

        async fn board(&self, env: Uuid, name: &str) -> Board {
            let (status, body) = self
                .send(
                    "POST",
                    &format!("/api/environments/{env}/boards"),
                    Some(self.owner),
                    Some(json!({"name": name})),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            serde_json::from_value(body).unwrap()
        }

        async fn card(&self, board: Uuid, title: &str) -> Card {
            let (status, body) = self
                .send(
                    "POST",
                    &format!("/api/boards/{board}/cards"),
                    Some(self.owner),
                    Some(json!({"title": title})),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            serde_json::from_value(body).unwrap()
        }

        async fn titles(&self, board: Uuid) -> Vec<(String, i32)> {
            let (status, body) = self
                .send("GET", &format!("/api/boards/{board}/cards"), Some(self.owner), None)
                .await;
            assert_eq!(status, StatusCode::OK);
            let cards: Vec<Card> = serde_json::from_value(body).unwrap();
            cards.into_iter().map(|c| (c.title, c.position)).collect()
        }
    }

    fn expect(pairs: &[(&str, i32)]) -> Vec<(String, i32)> {
        pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = TestApp::new();
        let (status, body) = app.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_actor_is_unauthorized() {
        let app = TestApp::new();
        let (status, body) = app
            .send("POST", "/api/environments", None, Some(json!({"name": "x"})))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains(ACTOR_HEADER));
    }

    #[tokio::test]
    async fn test_invalid_actor_is_unauthorized() {
        let app = TestApp::new();
        let resp = app
            .router()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/cards/{}", Uuid::new_v4()))
                    .header(ACTOR_HEADER, "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_cards_append_in_order() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        for title in ["A", "B", "C"] {
            app.card(board.id, title).await;
        }
        assert_eq!(
            app.titles(board.id).await,
            expect(&[("A", 0), ("B", 1), ("C", 2)])
        );
    }

    #[tokio::test]
    async fn test_create_card_at_position_opens_slot() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        app.card(board.id, "A").await;
        app.card(board.id, "B").await;

        let (status, body) = app
            .send(
                "POST",
                &format!("/api/boards/{}/cards", board.id),
                Some(app.owner),
                Some(json!({"title": "  First  ", "position": 0})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "First");
        assert_eq!(
            app.titles(board.id).await,
            expect(&[("First", 0), ("A", 1), ("B", 2)])
        );
    }

    #[tokio::test]
    async fn test_create_card_rejects_blank_title_and_bad_due_date() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        let uri = format!("/api/boards/{}/cards", board.id);

        let (status, _) = app
            .send("POST", &uri, Some(app.owner), Some(json!({"title": "   "})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(
                "POST",
                &uri,
                Some(app.owner),
                Some(json!({"title": "x", "due_date": "next tuesday"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("due date"));

        let (status, body) = app
            .send(
                "POST",
                &uri,
                Some(app.owner),
                Some(json!({"title": "x", "due_date": "2026-03-01"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["due_date"], "2026-03-01");
    }

    #[tokio::test]
    async fn test_move_card_reorders_board() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        let a = app.card(board.id, "A").await;
        for title in ["B", "C", "D"] {
            app.card(board.id, title).await;
        }

        let (status, body) = app
            .send(
                "PATCH",
                &format!("/api/cards/{}/move", a.id),
                Some(app.owner),
                Some(json!({"target_board_id": board.id, "new_position": 2})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let placement: Placement = serde_json::from_value(body).unwrap();
        assert_eq!(
            placement,
            Placement {
                id: a.id,
                board_id: board.id,
                position: 2
            }
        );
        assert_eq!(
            app.titles(board.id).await,
            expect(&[("B", 0), ("C", 1), ("A", 2), ("D", 3)])
        );
    }

    #[tokio::test]
    async fn test_move_card_across_boards_records_activity() {
        let app = TestApp::new();
        let env = app.environment().await;
        let todo = app.board(env.id, "Todo").await;
        let done = app.board(env.id, "Done").await;
        let a = app.card(todo.id, "A").await;
        app.card(done.id, "X").await;

        let (status, body) = app
            .send(
                "PATCH",
                &format!("/api/cards/{}/move", a.id),
                Some(app.owner),
                Some(json!({"target_board_id": done.id, "new_position": 9})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["board_id"], done.id.to_string());
        assert_eq!(body["position"], 1);
        assert!(app.titles(todo.id).await.is_empty());

        app.state.engine.shutdown().await;
        let (status, body) = app
            .send("GET", &format!("/api/cards/{}/activity", a.id), Some(app.owner), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let actions: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["action"].as_str().unwrap())
            .collect();
        assert!(actions.contains(&"moved"));
    }

    #[tokio::test]
    async fn test_create_and_update_activity_drained_on_shutdown() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        let a = app.card(board.id, "A").await;
        let (status, _) = app
            .send(
                "PATCH",
                &format!("/api/cards/{}", a.id),
                Some(app.owner),
                Some(json!({"completed": true})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        app.state.engine.shutdown().await;
        let id = a.id;
        let entries = app
            .state
            .db
            .call(move |db| db.list_activity(id))
            .await
            .unwrap();
        let mut actions: Vec<ActivityAction> = entries.into_iter().map(|e| e.action).collect();
        actions.sort_by_key(|a| a.as_str());
        assert_eq!(actions, vec![ActivityAction::Created, ActivityAction::Updated]);
    }

    #[tokio::test]
    async fn test_move_by_stranger_is_not_found() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        let a = app.card(board.id, "A").await;
        app.card(board.id, "B").await;

        let (status, body) = app
            .send(
                "PATCH",
                &format!("/api/cards/{}/move", a.id),
                Some(Uuid::new_v4()),
                Some(json!({"target_board_id": board.id, "new_position": 1})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
        assert_eq!(app.titles(board.id).await, expect(&[("A", 0), ("B", 1)]));
    }

    #[tokio::test]
    async fn test_move_unknown_card_is_not_found() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        let (status, _) = app
            .send(
                "PATCH",
                &format!("/api/cards/{}/move", Uuid::new_v4()),
                Some(app.owner),
                Some(json!({"target_board_id": board.id, "new_position": 0})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_card_leaves_position_alone() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        app.card(board.id, "A").await;
        let b = app.card(board.id, "B").await;

        let (status, body) = app
            .send(
                "PATCH",
                &format!("/api/cards/{}", b.id),
                Some(app.owner),
                Some(json!({"title": "B2", "completed": true, "position": 0})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "B2");
        assert_eq!(body["completed"], true);
        assert_eq!(body["position"], 1);
    }

    #[tokio::test]
    async fn test_update_card_clears_due_date_with_null() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        let (_, body) = app
            .send(
                "POST",
                &format!("/api/boards/{}/cards", board.id),
                Some(app.owner),
                Some(json!({"title": "A", "due_date": "2026-01-02T10:00:00Z"})),
            )
            .await;
        let id = body["id"].as_str().unwrap().to_string();
        let uri = format!("/api/cards/{id}");

        let (_, body) = app
            .send("PATCH", &uri, Some(app.owner), Some(json!({"title": "A1"})))
            .await;
        assert_eq!(body["due_date"], "2026-01-02T10:00:00Z");

        let (_, body) = app
            .send("PATCH", &uri, Some(app.owner), Some(json!({"due_date": null})))
            .await;
        assert!(body["due_date"].is_null());
    }

    #[tokio::test]
    async fn test_delete_card_closes_gap() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        app.card(board.id, "A").await;
        let b = app.card(board.id, "B").await;
        app.card(board.id, "C").await;

        let (status, _) = app
            .send("DELETE", &format!("/api/cards/{}", b.id), Some(app.owner), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(app.titles(board.id).await, expect(&[("A", 0), ("C", 1)]));

        let (status, _) = app
            .send("GET", &format!("/api/cards/{}", b.id), Some(app.owner), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stranger_cannot_see_boards_or_cards() {
        let app = TestApp::new();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        let a = app.card(board.id, "A").await;
        let stranger = Some(Uuid::new_v4());

        let (status, _) = app
            .send("GET", &format!("/api/environments/{}/boards", env.id), stranger, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .send("GET", &format!("/api/boards/{}/cards", board.id), stranger, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .send("GET", &format!("/api/cards/{}", a.id), stranger, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_boards_includes_card_counts() {
        let app = TestApp::new();
        let env = app.environment().await;
        let todo = app.board(env.id, "Todo").await;
        let done = app.board(env.id, "Done").await;
        app.card(todo.id, "A").await;
        app.card(todo.id, "B").await;

        let (status, body) = app
            .send("GET", &format!("/api/environments/{}/boards", env.id), Some(app.owner), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let boards = body.as_array().unwrap();
        assert_eq!(boards.len(), 2);
        assert_eq!(boards[0]["id"], todo.id.to_string());
        assert_eq!(boards[0]["cards_count"], 2);
        assert_eq!(boards[1]["id"], done.id.to_string());
        assert_eq!(boards[1]["position"], 1);
    }

    #[tokio::test]
    async fn test_card_events_reach_environment() {
        let app = TestApp::new();
        let mut rx = app.state.events.subscribe();
        let env = app.environment().await;
        let board = app.board(env.id, "Todo").await;
        app.card(board.id, "A").await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.environment_id, env.id);
        assert!(first.payload.contains("BoardCreated"));
        let second = rx.recv().await.unwrap();
        assert!(second.payload.contains("CardCreated"));
    }

    #[test]
    fn test_relocation_error_status_mapping() {
        let conflict = ApiError::from(RelocationError::Conflict {
            card_id: Uuid::nil(),
            source: anyhow::anyhow!("busy"),
        });
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let internal = ApiError::from(RelocationError::Internal(anyhow::anyhow!("boom")));
        assert_eq!(
            internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
