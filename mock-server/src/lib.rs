use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use uuid::Uuid;

pub const REL_PACK_REGISTRATION: &str = "pack-registration";
pub const REL_TAKE_ACTION: &str = "take-action";
pub const REL_EVENT: &str = "event";
pub const REL_ACTION_RESULT: &str = "actionResult";
pub const REL_HEALTH: &str = "health";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LinksDocument {
    pub links: Vec<Link>,
}

/// Registration payload; unknown fields are echoed back untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub command: String,
    pub input: Value,
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedEvent {
    pub pack: String,
    pub event: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedResult {
    pub action_id: Uuid,
    pub pack: String,
    pub event: Value,
}

#[derive(Default)]
struct Db {
    packs: HashMap<String, Pack>,
    queues: HashMap<String, VecDeque<(String, Value)>>,
    taken: HashMap<Uuid, String>,
    events: Vec<RecordedEvent>,
    results: Vec<RecordedResult>,
    requests: Vec<RecordedRequest>,
}

/// In-memory flyte API. Cloning shares state, so tests keep a handle to
/// inspect what the server saw while the router serves requests.
#[derive(Clone)]
pub struct MockApi {
    base_url: Arc<str>,
    link_failures: Arc<AtomicUsize>,
    db: Arc<Mutex<Db>>,
}

impl MockApi {
    /// `base_url` is the scheme and authority links point at, e.g.
    /// `http://127.0.0.1:8080`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').into(),
            link_failures: Arc::new(AtomicUsize::new(0)),
            db: Arc::new(Mutex::new(Db::default())),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1", get(api_links))
            .route("/v1/health", get(health))
            .route("/v1/packs", post(register_pack))
            .route("/v1/packs/{name}/events", post(publish_event))
            .route("/v1/packs/{name}/actions/take", get(take_action))
            .route("/v1/actions/{id}/result", post(complete_action))
            .layer(middleware::from_fn_with_state(self.clone(), record_request))
            .with_state(self.clone())
    }

    /// Answer the next `count` links-document requests with 503.
    pub fn fail_next_link_fetches(&self, count: usize) {
        self.link_failures.store(count, Ordering::SeqCst);
    }

    /// Queue work for `pack`; handed out by take-action in FIFO order.
    pub fn enqueue_action(&self, pack: &str, command: &str, input: Value) {
        self.db()
            .queues
            .entry(pack.to_string())
            .or_default()
            .push_back((command.to_string(), input));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.db().requests.clone()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.db().events.clone()
    }

    pub fn results(&self) -> Vec<RecordedResult> {
        self.db().results.clone()
    }

    pub fn pack(&self, name: &str) -> Option<Pack> {
        self.db().packs.get(name).cloned()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn db(&self) -> MutexGuard<'_, Db> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn app(base_url: &str) -> Router {
    MockApi::new(base_url).router()
}

pub async fn run(listener: TcpListener, api: MockApi) -> Result<(), std::io::Error> {
    axum::serve(listener, api.router()).await
}

async fn record_request(State(api): State<MockApi>, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        authorization: request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    api.db().requests.push(recorded);
    next.run(request).await
}

async fn api_links(State(api): State<MockApi>) -> Result<Json<LinksDocument>, (StatusCode, String)> {
    let failing = api
        .link_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        tracing::debug!("failing api links request on purpose");
        return Err((StatusCode::SERVICE_UNAVAILABLE, "starting".to_string()));
    }
    Ok(Json(LinksDocument {
        links: vec![
            Link {
                href: api.url("/v1"),
                rel: "self".to_string(),
            },
            Link {
                href: api.url("/v1/health"),
                rel: REL_HEALTH.to_string(),
            },
            Link {
                href: api.url("/v1/packs"),
                rel: REL_PACK_REGISTRATION.to_string(),
            },
        ],
    }))
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn register_pack(State(api): State<MockApi>, Json(mut pack): Json<Pack>) -> (StatusCode, Json<Pack>) {
    pack.id = Some(pack.name.clone());
    pack.links = vec![
        Link {
            href: api.url(&format!("/v1/packs/{}/actions/take", pack.name)),
            rel: REL_TAKE_ACTION.to_string(),
        },
        Link {
            href: api.url(&format!("/v1/packs/{}/events", pack.name)),
            rel: REL_EVENT.to_string(),
        },
    ];
    api.db().packs.insert(pack.name.clone(), pack.clone());
    (StatusCode::CREATED, Json(pack))
}

async fn publish_event(
    State(api): State<MockApi>,
    Path(name): Path<String>,
    Json(event): Json<Value>,
) -> StatusCode {
    let mut db = api.db();
    if !db.packs.contains_key(&name) {
        return StatusCode::NOT_FOUND;
    }
    db.events.push(RecordedEvent { pack: name, event });
    StatusCode::ACCEPTED
}

async fn take_action(
    State(api): State<MockApi>,
    Path(name): Path<String>,
) -> Result<Json<Action>, StatusCode> {
    let mut db = api.db();
    if !db.packs.contains_key(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    let (command, input) = db
        .queues
        .get_mut(&name)
        .and_then(VecDeque::pop_front)
        .ok_or(StatusCode::NOT_FOUND)?;
    let id = Uuid::new_v4();
    db.taken.insert(id, name);
    Ok(Json(Action {
        command,
        input,
        links: vec![Link {
            href: api.url(&format!("/v1/actions/{id}/result")),
            rel: REL_ACTION_RESULT.to_string(),
        }],
    }))
}

async fn complete_action(
    State(api): State<MockApi>,
    Path(id): Path<Uuid>,
    Json(event): Json<Value>,
) -> StatusCode {
    let mut db = api.db();
    let Some(pack) = db.taken.remove(&id) else {
        return StatusCode::NOT_FOUND;
    };
    db.results.push(RecordedResult {
        action_id: id,
        pack,
        event,
    });
    StatusCode::ACCEPTED
}
