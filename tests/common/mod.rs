#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use canine_canaan::{
    AppConfig, AppState, auth, create_router,
    entity::{Column, EntityDescriptor},
    models::{Role, User},
    repository::{Repository, RepositoryState},
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
};
use tower::util::ServiceExt;

// --- Database error stand-in ---

/// A driver error carrying a SQLSTATE, for exercising the error classification.
#[derive(Debug)]
pub struct FakeDbError {
    pub code: &'static str,
    pub constraint: Option<&'static str>,
}

impl std::fmt::Display for FakeDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fake database error {}", self.code)
    }
}

impl std::error::Error for FakeDbError {}

impl sqlx::error::DatabaseError for FakeDbError {
    fn message(&self) -> &str {
        "fake database error"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.code))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        self.constraint
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        match self.code {
            "23505" => sqlx::error::ErrorKind::UniqueViolation,
            "23503" => sqlx::error::ErrorKind::ForeignKeyViolation,
            "23514" => sqlx::error::ErrorKind::CheckViolation,
            _ => sqlx::error::ErrorKind::Other,
        }
    }
}

pub fn db_error(code: &'static str, constraint: Option<&'static str>) -> sqlx::Error {
    sqlx::Error::Database(Box::new(FakeDbError { code, constraint }))
}

// --- In-memory Repository ---

/// InMemoryRepo
///
/// Stores users, revocations and entity rows in plain maps. Entity reads return the stored
/// columns plus `id`; the joined display fields of the SQL projections are simply absent.
#[derive(Default)]
pub struct InMemoryRepo {
    users: Mutex<Vec<User>>,
    revoked: Mutex<HashMap<String, DateTime<Utc>>>,
    tables: Mutex<HashMap<&'static str, BTreeMap<i64, Map<String, Value>>>>,
    next_id: AtomicI64,
    /// Makes every blacklist lookup fail.
    pub fail_revocation_lookup: AtomicBool,
    /// Makes logout's blacklist insert fail.
    pub fail_revoke: AtomicBool,
    /// Makes the next entity write fail with this SQLSTATE.
    pub fail_writes_with: Mutex<Option<&'static str>>,
}

impl InMemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.lock().unwrap().len()
    }

    pub fn is_revoked_now(&self, jti: &str) -> bool {
        self.revoked.lock().unwrap().contains_key(jti)
    }

    pub fn revoke_at(&self, jti: &str, expiration: DateTime<Utc>) {
        self.revoked
            .lock()
            .unwrap()
            .insert(jti.to_string(), expiration);
    }

    pub fn row(&self, table: &str, id: i64) -> Option<Map<String, Value>> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .and_then(|rows| rows.get(&id).cloned())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map_or(0, BTreeMap::len)
    }

    /// Inserts a row directly and returns its id.
    pub fn seed(&self, table: &'static str, row: Value) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut row = match row {
            Value::Object(row) => row,
            other => panic!("seed rows must be objects, got {other}"),
        };
        row.insert("id".to_string(), Value::from(id));
        self.tables
            .lock()
            .unwrap()
            .entry(table)
            .or_default()
            .insert(id, row);
        id
    }

    fn injected_write_failure(&self) -> Result<(), sqlx::Error> {
        match self.fail_writes_with.lock().unwrap().take() {
            Some(code) => Err(db_error(code, Some("injected"))),
            None => Ok(()),
        }
    }
}

fn column_map(columns: Vec<Column>) -> Map<String, Value> {
    columns
        .into_iter()
        .map(|column| {
            let value = serde_json::to_value(&column.value).expect("column values serialize");
            (column.name.to_string(), value)
        })
        .collect()
}

#[async_trait]
impl Repository for InMemoryRepo {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<u64, sqlx::Error> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Err(db_error("23505", Some("user_email_key")));
        }
        let id = users.len() as i64 + 1;
        users.push(User {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
        });
        Ok(1)
    }

    async fn revoke_token(&self, jti: &str, expiration: DateTime<Utc>) -> Result<(), sqlx::Error> {
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.revoke_at(jti, expiration);
        Ok(())
    }

    async fn is_token_revoked(&self, jti: &str) -> Result<bool, sqlx::Error> {
        if self.fail_revocation_lookup.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self.is_revoked_now(jti))
    }

    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let mut revoked = self.revoked.lock().unwrap();
        let before = revoked.len();
        revoked.retain(|_, expiration| *expiration >= now);
        Ok((before - revoked.len()) as u64)
    }

    async fn fetch_records(&self, entity: &EntityDescriptor) -> Result<Vec<Value>, sqlx::Error> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(entity.table)
            .map(|rows| rows.values().cloned().map(Value::Object).collect())
            .unwrap_or_default())
    }

    async fn fetch_record(
        &self,
        entity: &EntityDescriptor,
        id: i64,
    ) -> Result<Vec<Value>, sqlx::Error> {
        Ok(self.row(entity.table, id).map(Value::Object).into_iter().collect())
    }

    async fn record_exists(&self, entity: &EntityDescriptor, id: i64) -> Result<bool, sqlx::Error> {
        Ok(self.row(entity.table, id).is_some())
    }

    async fn insert_record(
        &self,
        entity: &EntityDescriptor,
        columns: Vec<Column>,
    ) -> Result<u64, sqlx::Error> {
        self.injected_write_failure()?;
        let table = entity.table;
        self.seed(table, Value::Object(column_map(columns)));
        Ok(1)
    }

    async fn update_record(
        &self,
        entity: &EntityDescriptor,
        id: i64,
        columns: Vec<Column>,
    ) -> Result<u64, sqlx::Error> {
        self.injected_write_failure()?;
        let mut tables = self.tables.lock().unwrap();
        match tables.get_mut(entity.table).and_then(|rows| rows.get_mut(&id)) {
            Some(row) => {
                row.extend(column_map(columns));
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_record(&self, entity: &EntityDescriptor, id: i64) -> Result<u64, sqlx::Error> {
        self.injected_write_failure()?;
        let removed = self
            .tables
            .lock()
            .unwrap()
            .get_mut(entity.table)
            .and_then(|rows| rows.remove(&id));
        Ok(removed.map_or(0, |_| 1))
    }
}

// --- Router helpers ---

pub fn create_test_state(repo: Arc<InMemoryRepo>) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        config: AppConfig::default(),
    }
}

pub fn test_app(repo: Arc<InMemoryRepo>) -> Router {
    create_router(create_test_state(repo))
}

pub fn token_for(role: Role) -> String {
    auth::issue_token(&AppConfig::default(), &format!("{role}@kennel.test"), role)
        .expect("token should sign")
}

/// Sends one request through the full router and returns the status and the parsed body.
/// Non-JSON bodies come back as a JSON string.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

    (status, value)
}
