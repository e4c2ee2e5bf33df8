//! In-process stand-in for the Supabase REST API.
//!
//! Supports the subset of PostgREST the client uses: `eq.` filters,
//! `on_conflict` upserts, `order=<col>.desc`, `limit`, and embedding
//! `workout_entries(*)` into `workout_sessions`. Embedded rows come back
//! newest-write first unless `workout_entries.order=<col>.asc` is given, so
//! callers cannot lean on insertion order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use gym_tracker::config::Config;
use gym_tracker::db::Database;
use gym_tracker::sync::{StartupPolicy, SupabaseClient};
use gym_tracker::AppState;
use serde_json::{json, Value};

const RESERVED_PARAMS: [&str; 4] = ["select", "order", "limit", "on_conflict"];

#[derive(Default)]
pub struct FakeTables {
    tables: HashMap<String, Vec<Value>>,
    requests: Vec<(Method, String)>,
    failing_tables: HashSet<String>,
}

type Shared = Arc<Mutex<FakeTables>>;

pub struct FakeSupabase {
    pub url: String,
    state: Shared,
}

#[allow(dead_code)]
impl FakeSupabase {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/rest/v1/{table}", get(select_rows).post(write_rows).delete(delete_rows))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake backend crashed");
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn client(&self, device_id: &str) -> SupabaseClient {
        SupabaseClient::new(&self.url, "test-anon-key", device_id)
            .with_timeout(Duration::from_secs(5))
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        state.tables.get(table).cloned().unwrap_or_default()
    }

    pub fn rows_for_device(&self, table: &str, device_id: &str) -> Vec<Value> {
        self.rows(table)
            .into_iter()
            .filter(|row| row["device_id"] == device_id)
            .collect()
    }

    pub fn insert(&self, table: &str, row: Value) {
        let mut state = self.state.lock().unwrap();
        state.tables.entry(table.to_string()).or_default().push(row);
    }

    /// Make every write to `table` answer 500.
    pub fn fail_writes_to(&self, table: &str) {
        self.state.lock().unwrap().failing_tables.insert(table.to_string());
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().failing_tables.clear();
    }

    pub fn request_count(&self, method: Method, table: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .requests
            .iter()
            .filter(|(m, t)| *m == method && t == table)
            .count()
    }

    /// Seed a remote session holding a single entry.
    pub fn seed_session(
        &self,
        device_id: &str,
        id: &str,
        date: &str,
        exercise_id: &str,
        sets: Value,
    ) {
        self.insert(
            "workout_sessions",
            json!({
                "id": id,
                "device_id": device_id,
                "date": date,
                "created_at": format!("{}T09:00:00+00:00", date),
                "updated_at": format!("{}T09:00:00+00:00", date),
            }),
        );
        self.insert(
            "workout_entries",
            json!({
                "id": format!("{}-entry", id),
                "session_id": id,
                "exercise_id": exercise_id,
                "sets": sets,
                "custom_trackers": null,
            }),
        );
    }
}

fn field(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn eq_filters(params: &[(String, String)]) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_str()) && !key.contains('.'))
        .filter_map(|(key, value)| Some((key.clone(), value.strip_prefix("eq.")?.to_string())))
        .collect()
}

fn matches(row: &Value, filters: &[(String, String)]) -> bool {
    filters
        .iter()
        .all(|(key, expected)| field(row, key).as_deref() == Some(expected.as_str()))
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

async fn select_rows(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push((Method::GET, table.clone()));

    let filters = eq_filters(&params);
    let mut rows: Vec<Value> = state
        .tables
        .get(&table)
        .map(|rows| rows.iter().filter(|r| matches(r, &filters)).cloned().collect())
        .unwrap_or_default();

    if param(&params, "select").is_some_and(|s| s.contains("workout_entries(*)")) {
        let entries = state.tables.get("workout_entries").cloned().unwrap_or_default();
        let entry_order =
            param(&params, "workout_entries.order").and_then(|o| o.strip_suffix(".asc"));
        for row in &mut rows {
            let id = field(row, "id");
            let mut embedded: Vec<Value> = entries
                .iter()
                .filter(|e| field(e, "session_id") == id)
                .cloned()
                .collect();
            match entry_order {
                Some(column) => embedded.sort_by_key(|e| field(e, column)),
                None => embedded.reverse(),
            }
            row["workout_entries"] = Value::Array(embedded);
        }
    }

    if let Some(column) = param(&params, "order").and_then(|o| o.strip_suffix(".desc")) {
        rows.sort_by(|a, b| field(b, column).cmp(&field(a, column)));
    }
    if let Some(limit) = param(&params, "limit").and_then(|l| l.parse().ok()) {
        rows.truncate(limit);
    }

    Json(rows).into_response()
}

async fn write_rows(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push((Method::POST, table.clone()));

    if state.failing_tables.contains(&table) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response();
    }

    let incoming = match body {
        Value::Array(rows) => rows,
        row => vec![row],
    };
    let conflict_column = param(&params, "on_conflict").map(str::to_string);
    let rows = state.tables.entry(table).or_default();

    for row in incoming {
        let position = conflict_column.as_deref().and_then(|column| {
            let key = field(&row, column)?;
            rows.iter().position(|r| field(r, column).as_deref() == Some(key.as_str()))
        });
        match position {
            Some(i) => rows[i] = row,
            None => rows.push(row),
        }
    }

    StatusCode::CREATED.into_response()
}

async fn delete_rows(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push((Method::DELETE, table.clone()));

    if state.failing_tables.contains(&table) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response();
    }

    let filters = eq_filters(&params);
    if let Some(rows) = state.tables.get_mut(&table) {
        rows.retain(|row| !matches(row, &filters));
    }

    StatusCode::NO_CONTENT.into_response()
}

/// Full application stack on an in-memory database talking to `url`.
#[allow(dead_code)]
pub async fn test_app(url: &str, debounce: Duration, policy: StartupPolicy) -> AppState {
    let config = Config {
        supabase_url: url.to_string(),
        sync_debounce: debounce,
        http_timeout: Duration::from_secs(2),
        startup_policy: policy,
        ..Config::default()
    };
    let db = Database::in_memory().await.expect("Failed to open in-memory database");
    AppState::with_database(Arc::new(db), &config).await
}
