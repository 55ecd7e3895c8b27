//! Core test fixtures: an in-memory document server and remote types.
//!
//! [`MemoryServer`] plays the client library. Every connection it builds
//! shares the same [`ServerState`], so documents survive reconnects the way
//! they would on a real server. Outages are simulated with:
//!
//! - [`MemoryServer::drop_connections`]: every open connection goes dead
//! - [`MemoryServer::fail_next_operations`]: the next `n` operations fail
//! - [`MemoryServer::refuse_next_connections`]: the next `n` builds fail
//!
//! # Usage
//!
//! ```rust,ignore
//! use warden_tests::fixtures::{Harness, Record};
//!
//! let harness = Harness::new(2)?;
//! let records = harness.context.protect::<Record>();
//! harness.server.fail_next_operations(2);
//! let record = records.invoke("create", &["first".into()])?; // succeeds on the third attempt
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use warden_connection::{ConfigDocument, ConnectionManager, EnvironmentConfig};
use warden_core::{
    ClientLibrary, ConnectionHandle, ConnectionOptions, ConnectionRef, ObjectRef, Params,
    RemoteClass, RemoteObject, Value, WardenError,
};
use warden_guard::ProxyContext;

/// Environment name used by every fixture configuration
pub const TEST_ENVIRONMENT: &str = "test";

/// Install a test-friendly tracing subscriber once per process
pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warden_connection=debug,warden_guard=debug"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// How the manager asked for a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildRequest {
    /// `new_single_connection`
    Single {
        /// Server host
        host: String,
        /// Server port
        port: u16,
        /// Options passed through from the configuration
        options: ConnectionOptions,
    },
    /// `new_multi_connection`
    Multi {
        /// Ordered replica-set members
        hosts: Vec<(String, u16)>,
        /// Options passed through from the configuration
        options: ConnectionOptions,
    },
}

/// Data and fault counters shared by every connection of a server
#[derive(Debug, Default)]
pub struct ServerState {
    collections: Mutex<BTreeMap<(String, String), Vec<serde_json::Value>>>,
    failing_operations: AtomicU32,
    operations: AtomicU64,
}

impl ServerState {
    /// Number of operations that reached the server
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failing_operations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// In-memory stand-in for the data-store client library
#[derive(Debug, Default)]
pub struct MemoryServer {
    state: Arc<ServerState>,
    connections: Mutex<Vec<Arc<MemoryConnection>>>,
    builds: Mutex<Vec<BuildRequest>>,
    refused_connections: AtomicU32,
}

impl MemoryServer {
    /// Create a server with no data
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Shared server state
    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Every build request received, including refused ones
    pub fn builds(&self) -> Vec<BuildRequest> {
        self.builds.lock().clone()
    }

    /// Number of build requests received
    pub fn build_count(&self) -> usize {
        self.builds.lock().len()
    }

    /// Connections built so far, oldest first
    pub fn connections(&self) -> Vec<Arc<MemoryConnection>> {
        self.connections.lock().clone()
    }

    /// Kill every open connection
    pub fn drop_connections(&self) {
        for connection in self.connections.lock().iter() {
            connection.dead.store(true, Ordering::SeqCst);
        }
    }

    /// Fail the next `n` operations with a connection failure
    pub fn fail_next_operations(&self, n: u32) {
        self.state.failing_operations.store(n, Ordering::SeqCst);
    }

    /// Refuse the next `n` connection attempts
    pub fn refuse_next_connections(&self, n: u32) {
        self.refused_connections.store(n, Ordering::SeqCst);
    }

    /// Documents stored in `database.collection`
    pub fn documents(&self, database: &str, collection: &str) -> Vec<serde_json::Value> {
        self.state
            .collections
            .lock()
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn accept(&self, request: BuildRequest) -> warden_core::Result<ConnectionRef> {
        self.builds.lock().push(request);
        let refused = self
            .refused_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(WardenError::ConnectionFailure(
                "connection refused".into(),
            ));
        }

        let mut connections = self.connections.lock();
        let connection = Arc::new(MemoryConnection {
            id: connections.len() + 1,
            state: self.state.clone(),
            dead: AtomicBool::new(false),
            auths: Mutex::new(Vec::new()),
            authenticated: AtomicBool::new(false),
        });
        connections.push(connection.clone());
        Ok(connection)
    }
}

impl ClientLibrary for MemoryServer {
    fn new_single_connection(
        &self,
        host: &str,
        port: u16,
        options: &ConnectionOptions,
    ) -> warden_core::Result<ConnectionRef> {
        self.accept(BuildRequest::Single {
            host: host.to_string(),
            port,
            options: options.clone(),
        })
    }

    fn new_multi_connection(
        &self,
        hosts: &[(String, u16)],
        options: &ConnectionOptions,
    ) -> warden_core::Result<ConnectionRef> {
        self.accept(BuildRequest::Multi {
            hosts: hosts.to_vec(),
            options: options.clone(),
        })
    }
}

/// One connection to a [`MemoryServer`]
#[derive(Debug)]
pub struct MemoryConnection {
    /// Sequence number, starting at 1
    pub id: usize,
    state: Arc<ServerState>,
    dead: AtomicBool,
    auths: Mutex<Vec<(String, String, String)>>,
    authenticated: AtomicBool,
}

impl MemoryConnection {
    /// `(database, username, password)` triples recorded by `add_auth`
    pub fn auths(&self) -> Vec<(String, String, String)> {
        self.auths.lock().clone()
    }

    /// Whether saved authentication was applied
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Whether the server dropped this connection
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }
}

impl ConnectionHandle for MemoryConnection {
    fn add_auth(&self, database: &str, username: &str, password: &str) -> warden_core::Result<()> {
        self.auths
            .lock()
            .push((database.into(), username.into(), password.into()));
        Ok(())
    }

    fn apply_saved_authentication(&self) -> warden_core::Result<()> {
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn db(&self, database: &str) -> warden_core::Result<ObjectRef> {
        if self.is_dead() {
            return Err(WardenError::ConnectionFailure("connection closed".into()));
        }
        Ok(Arc::new(Database {
            name: database.to_string(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Check the connection an operation runs against and count the operation
fn session(connection: &ConnectionRef) -> warden_core::Result<&MemoryConnection> {
    let connection = connection.downcast_ref::<MemoryConnection>().ok_or_else(|| {
        WardenError::InvalidArgument("not a memory server connection".into())
    })?;
    if connection.is_dead() {
        return Err(WardenError::ConnectionFailure(format!(
            "connection {} closed by server",
            connection.id
        )));
    }
    if connection.state.take_failure() {
        return Err(WardenError::ConnectionFailure("operation interrupted".into()));
    }
    connection.state.operations.fetch_add(1, Ordering::SeqCst);
    Ok(connection)
}

fn string_arg<'a>(args: &'a [Value], operation: &str) -> warden_core::Result<&'a str> {
    args.first().and_then(Value::as_str).ok_or_else(|| {
        WardenError::InvalidArgument(format!("`{}` expects a string argument", operation))
    })
}

/// Database-scoped handle
#[derive(Debug)]
pub struct Database {
    /// Database name
    pub name: String,
}

impl RemoteObject for Database {
    fn call(
        &self,
        connection: &ConnectionRef,
        operation: &str,
        args: &[Value],
    ) -> warden_core::Result<Value> {
        let session = session(connection)?;
        match operation {
            "name" => Ok(Value::String(self.name.clone())),
            "collection" => Ok(Value::object(Collection {
                database: self.name.clone(),
                name: string_arg(args, operation)?.to_string(),
            })),
            "collection_names" => Ok(Value::Array(
                session
                    .state
                    .collections
                    .lock()
                    .keys()
                    .filter(|(database, _)| *database == self.name)
                    .map(|(_, collection)| Value::String(collection.clone()))
                    .collect(),
            )),
            _ => Err(WardenError::unknown_operation("Database", operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A collection of JSON documents
#[derive(Debug)]
pub struct Collection {
    /// Owning database name
    pub database: String,
    /// Collection name
    pub name: String,
}

impl Collection {
    fn key(&self) -> (String, String) {
        (self.database.clone(), self.name.clone())
    }
}

impl RemoteObject for Collection {
    fn call(
        &self,
        connection: &ConnectionRef,
        operation: &str,
        args: &[Value],
    ) -> warden_core::Result<Value> {
        let session = session(connection)?;
        let mut collections = session.state.collections.lock();
        match operation {
            "name" => Ok(Value::String(self.name.clone())),
            "insert" => {
                let Some(Value::Json(body)) = args.first() else {
                    return Err(WardenError::InvalidArgument(
                        "`insert` expects a JSON document".into(),
                    ));
                };
                let documents = collections.entry(self.key()).or_default();
                documents.push(body.clone());
                Ok(Value::Int64(documents.len() as i64))
            }
            "count" => Ok(Value::Int64(
                collections.get(&self.key()).map_or(0, Vec::len) as i64,
            )),
            "find" => Ok(Value::Array(
                collections
                    .get(&self.key())
                    .into_iter()
                    .flatten()
                    .map(|body| Value::object(Document { body: body.clone() }))
                    .collect(),
            )),
            "find_one" => Ok(collections
                .get(&self.key())
                .and_then(|documents| documents.first())
                .map(|body| Value::object(Document { body: body.clone() }))
                .unwrap_or(Value::Null)),
            "drop" => Ok(Value::Bool(collections.remove(&self.key()).is_some())),
            _ => Err(WardenError::unknown_operation("Collection", operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A fetched document
#[derive(Debug)]
pub struct Document {
    /// Document body
    pub body: serde_json::Value,
}

impl RemoteObject for Document {
    fn call(
        &self,
        connection: &ConnectionRef,
        operation: &str,
        args: &[Value],
    ) -> warden_core::Result<Value> {
        session(connection)?;
        match operation {
            "body" => Ok(Value::Json(self.body.clone())),
            "get" => Ok(self
                .body
                .get(string_arg(args, operation)?)
                .cloned()
                .map(Value::Json)
                .unwrap_or(Value::Null)),
            _ => Err(WardenError::unknown_operation("Document", operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A model type with class-level finders, protected in most scenarios
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Record label
    pub label: String,
}

impl Record {
    /// Create a record with a label
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl RemoteObject for Record {
    fn call(
        &self,
        connection: &ConnectionRef,
        operation: &str,
        args: &[Value],
    ) -> warden_core::Result<Value> {
        session(connection)?;
        match operation {
            "label" => Ok(Value::String(self.label.clone())),
            "sibling" => Ok(Value::object(Record::new(format!("{}-sibling", self.label)))),
            "children" => Ok(Value::Array(
                (1..=args.first().and_then(Value::as_i64).unwrap_or(2))
                    .map(|n| Value::object(Record::new(format!("{}-{}", self.label, n))))
                    .collect(),
            )),
            "greeting" => Ok(Value::String(format!("hi from {}", self.label))),
            _ => Err(WardenError::unknown_operation("Record", operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RemoteClass for Record {
    fn new_default() -> warden_core::Result<Self> {
        Ok(Self::new("orig"))
    }

    fn new_with(params: &Params) -> warden_core::Result<Self> {
        params
            .get("label")
            .and_then(Value::as_str)
            .map(Self::new)
            .ok_or_else(|| WardenError::InvalidArgument("Record needs a `label`".into()))
    }

    fn class_call(
        connection: &ConnectionRef,
        operation: &str,
        args: &[Value],
    ) -> warden_core::Result<Value> {
        session(connection)?;
        match operation {
            "create" => Ok(Value::object(Record::new(string_arg(args, operation)?))),
            "all" => Ok(Value::Array(
                ["a", "b", "c"]
                    .into_iter()
                    .map(|label| Value::object(Record::new(label)))
                    .collect(),
            )),
            "none" => Ok(Value::Array(Vec::new())),
            _ => Err(WardenError::unknown_operation("Record", operation)),
        }
    }
}

/// Configuration used by most scenarios: one local server and two aliases
pub fn test_environment() -> EnvironmentConfig {
    EnvironmentConfig::new()
        .with_server("mongodb://localhost")
        .with_database("main", "app")
        .with_database("audit", "audit_log")
}

/// A configured manager over a fresh [`MemoryServer`], plus a proxy context
pub struct Harness {
    /// The fake client library
    pub server: Arc<MemoryServer>,
    /// Shared connection manager
    pub manager: Arc<ConnectionManager>,
    /// Context whose registry protects [`Database`], [`Collection`] and [`Document`]
    pub context: ProxyContext,
}

impl Harness {
    /// Harness over [`test_environment`] with immediate retries
    pub fn new(max_retries: u32) -> Result<Self> {
        Self::with_environment(test_environment(), max_retries)
    }

    /// Harness over an explicit environment with immediate retries
    pub fn with_environment(config: EnvironmentConfig, max_retries: u32) -> Result<Self> {
        initialize_logging();

        let server = MemoryServer::new();
        let manager = ConnectionManager::new(
            server.clone(),
            ConfigDocument::new().with_environment(TEST_ENVIRONMENT, config),
        );
        manager.configure(TEST_ENVIRONMENT)?;
        manager.set_max_retries(max_retries);
        manager.set_sleep_interval(Duration::ZERO);

        let manager = Arc::new(manager);
        let context = ProxyContext::for_manager(manager.clone());
        let registry = context.registry();
        registry.register::<Database>();
        registry.register::<Collection>();
        registry.register::<Document>();

        Ok(Self {
            server,
            manager,
            context,
        })
    }

    /// Protected handle to a collection of the `main` database
    pub fn collection(&self, name: &str) -> Result<Value> {
        let database = self.context.database("main")?;
        let guarded = database
            .as_guarded()
            .ok_or_else(|| anyhow::anyhow!("database handle was not wrapped"))?;
        Ok(guarded.invoke("collection", &[Value::from(name)])?)
    }
}
