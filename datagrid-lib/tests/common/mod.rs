//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use datagrid_lib::error::QueryError;
use datagrid_lib::model::Row;
use datagrid_lib::model::RowId;
use datagrid_lib::model::Value;
use datagrid_lib::query::Capabilities;
use datagrid_lib::query::GridQueryRequest;
use datagrid_lib::query::QueryResult;
use datagrid_lib::source::DataSource;
use datagrid_lib::source::LocalDataSource;
use datagrid_lib::source::MutableDataSource;
use simplelog::Config;
use simplelog::LevelFilter;
use simplelog::TestLogger;
use tokio::sync::Notify;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

/// Routes `log` output through the test harness.
pub fn init_logger() {
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}

/// Lets spawned tasks run to their next suspension point.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn people() -> Vec<Row> {
    vec![
        Row::new().set("id", 1i64).set("name", "Bob").set("age", 25i64),
        Row::new().set("id", 2i64).set("name", "Ann").set("age", 31i64),
        Row::new().set("id", 3i64).set("name", "Cy").set("age", 40i64),
    ]
}

pub fn names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|row| row.value("name").to_display_string())
        .collect()
}

/// A request the test answers by hand.
pub struct Call {
    pub request: GridQueryRequest,
    reply: oneshot::Sender<QueryResult>,
}

impl Call {
    pub fn reply(self, result: QueryResult) {
        let _ = self.reply.send(result);
    }
}

/// A source whose responses are released by the test, in any order.
pub struct GatedSource {
    capabilities: Capabilities,
    calls: mpsc::UnboundedSender<Call>,
}

impl GatedSource {
    pub fn new(capabilities: Capabilities) -> (Self, mpsc::UnboundedReceiver<Call>) {
        let (calls, receiver) = mpsc::unbounded_channel();
        (
            Self {
                capabilities,
                calls,
            },
            receiver,
        )
    }
}

#[async_trait]
impl DataSource for GatedSource {
    fn name(&self) -> &str {
        "gated"
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn get_rows(&self, request: GridQueryRequest) -> QueryResult {
        let (reply, response) = oneshot::channel();
        self.calls
            .send(Call { request, reply })
            .map_err(|_| QueryError::new("test dropped the channel"))?;
        response
            .await
            .unwrap_or_else(|_| Err(QueryError::new("test dropped the reply")))
    }
}

/// A local source that records every request and can reject or hold
/// writes.
pub struct RecordingSource {
    pub inner: LocalDataSource,
    pub requests: Mutex<Vec<GridQueryRequest>>,
    pub reject_writes: Mutex<Option<String>>,
    /// When set, writes wait for a notification before persisting.
    pub write_gate: Mutex<Option<Arc<Notify>>>,
    pub writes: Mutex<Vec<(RowId, String, Value)>>,
}

impl RecordingSource {
    pub fn new(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalDataSource::new(rows)
                .with_identity(datagrid_lib::model::RowIdentity::field("id")),
            requests: Mutex::new(Vec::new()),
            reject_writes: Mutex::new(None),
            write_gate: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GridQueryRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Holds writes until the returned handle is notified.
    pub fn hold_writes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.write_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Names in storage order.
    pub fn stored_names(&self) -> Vec<String> {
        names(&self.inner.rows())
    }
}

#[async_trait]
impl DataSource for RecordingSource {
    fn name(&self) -> &str {
        "recording"
    }

    fn capabilities(&self) -> &Capabilities {
        self.inner.capabilities()
    }

    async fn get_rows(&self, request: GridQueryRequest) -> QueryResult {
        self.requests.lock().unwrap().push(request.clone());
        self.inner.get_rows(request).await
    }

    fn as_mutable(&self) -> Option<&dyn MutableDataSource> {
        Some(self)
    }
}

#[async_trait]
impl MutableDataSource for RecordingSource {
    async fn update_row(&self, row_id: &RowId, field: &str, value: Value) -> Result<(), String> {
        let gate = self.write_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let rejection = self.reject_writes.lock().unwrap().clone();
        if let Some(message) = rejection {
            return Err(message);
        }
        self.writes
            .lock()
            .unwrap()
            .push((row_id.clone(), field.to_string(), value.clone()));
        self.inner.update_row(row_id, field, value).await
    }
}

/// A read-only source over fixed rows.
pub struct ReadOnlySource {
    inner: LocalDataSource,
}

impl ReadOnlySource {
    pub fn new(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalDataSource::new(rows),
        })
    }
}

#[async_trait]
impl DataSource for ReadOnlySource {
    fn name(&self) -> &str {
        "read-only"
    }

    fn capabilities(&self) -> &Capabilities {
        self.inner.capabilities()
    }

    async fn get_rows(&self, request: GridQueryRequest) -> QueryResult {
        self.inner.get_rows(request).await
    }
}
