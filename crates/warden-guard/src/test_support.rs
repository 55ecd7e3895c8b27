//! In-memory client and remote types shared by the unit tests of this crate

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use warden_connection::{ConfigDocument, ConnectionManager, EnvironmentConfig};
use warden_core::{
    ClientLibrary, ConnectionHandle, ConnectionOptions, ConnectionRef, ObjectRef, Params,
    RemoteClass, RemoteObject, Result, Value, WardenError,
};

use crate::context::ProxyContext;

#[derive(Debug, Default)]
pub(crate) struct FakeConnection {
    pub dead: AtomicBool,
}

impl ConnectionHandle for FakeConnection {
    fn add_auth(&self, _database: &str, _username: &str, _password: &str) -> Result<()> {
        Ok(())
    }

    fn apply_saved_authentication(&self) -> Result<()> {
        Ok(())
    }

    fn db(&self, database: &str) -> Result<ObjectRef> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(WardenError::ConnectionFailure("connection closed".into()));
        }
        Ok(Arc::new(Ledger {
            name: database.to_string(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fail unless `connection` is a live [`FakeConnection`]
fn ensure_alive(connection: &ConnectionRef) -> Result<()> {
    match connection.downcast_ref::<FakeConnection>() {
        Some(fake) if !fake.dead.load(Ordering::SeqCst) => Ok(()),
        _ => Err(WardenError::ConnectionFailure(
            "connection closed by server".into(),
        )),
    }
}

#[derive(Default)]
pub(crate) struct FakeClient {
    pub connections: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeClient {
    pub fn build_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Drop the most recently built connection
    pub fn kill_current(&self) {
        if let Some(connection) = self.connections.lock().last() {
            connection.dead.store(true, Ordering::SeqCst);
        }
    }

    fn build(&self) -> Result<ConnectionRef> {
        let connection = Arc::new(FakeConnection::default());
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

impl ClientLibrary for FakeClient {
    fn new_single_connection(
        &self,
        _host: &str,
        _port: u16,
        _options: &ConnectionOptions,
    ) -> Result<ConnectionRef> {
        self.build()
    }

    fn new_multi_connection(
        &self,
        _hosts: &[(String, u16)],
        _options: &ConnectionOptions,
    ) -> Result<ConnectionRef> {
        self.build()
    }
}

#[derive(Debug)]
pub(crate) struct Account {
    pub id: i64,
}

impl RemoteObject for Account {
    fn call(&self, connection: &ConnectionRef, operation: &str, args: &[Value]) -> Result<Value> {
        ensure_alive(connection)?;
        match operation {
            "id" => Ok(Value::Int64(self.id)),
            "owner" => Ok(Value::object(Owner {
                name: format!("owner-{}", self.id),
            })),
            "statements" => Ok(Value::Array(
                (1..=3).map(|month| Value::object(Statement { month })).collect(),
            )),
            "tags" => Ok(Value::Array(vec!["gold".into(), "joint".into()])),
            "echo" => Ok(args.first().cloned().unwrap_or(Value::Null)),
            "freeze" => Err(WardenError::Operation("account is closed".into())),
            _ => Err(WardenError::unknown_operation("Account", operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RemoteClass for Account {
    fn new_default() -> Result<Self> {
        Ok(Self { id: 0 })
    }

    fn new_with(params: &Params) -> Result<Self> {
        let id = params
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| WardenError::InvalidArgument("Account needs an integer `id`".into()))?;
        Ok(Self { id })
    }

    fn class_call(connection: &ConnectionRef, operation: &str, args: &[Value]) -> Result<Value> {
        ensure_alive(connection)?;
        match operation {
            "find" => {
                let id = args.first().and_then(Value::as_i64).ok_or_else(|| {
                    WardenError::InvalidArgument("find expects an id".into())
                })?;
                Ok(Value::object(Account { id }))
            }
            "all" => Ok(Value::Array(
                (1..=3).map(|id| Value::object(Account { id })).collect(),
            )),
            "none" => Ok(Value::Array(Vec::new())),
            "count" => Ok(Value::Int64(3)),
            _ => Err(WardenError::unknown_operation("Account", operation)),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Owner {
    pub name: String,
}

impl RemoteObject for Owner {
    fn call(&self, connection: &ConnectionRef, operation: &str, _args: &[Value]) -> Result<Value> {
        ensure_alive(connection)?;
        match operation {
            "name" => Ok(Value::String(self.name.clone())),
            _ => Err(WardenError::unknown_operation("Owner", operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub(crate) struct Statement {
    pub month: i64,
}

impl RemoteObject for Statement {
    fn call(&self, connection: &ConnectionRef, operation: &str, _args: &[Value]) -> Result<Value> {
        ensure_alive(connection)?;
        match operation {
            "month" => Ok(Value::Int64(self.month)),
            _ => Err(WardenError::unknown_operation("Statement", operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub(crate) struct Ledger {
    pub name: String,
}

impl RemoteObject for Ledger {
    fn call(&self, connection: &ConnectionRef, operation: &str, _args: &[Value]) -> Result<Value> {
        ensure_alive(connection)?;
        match operation {
            "name" => Ok(Value::String(self.name.clone())),
            _ => Err(WardenError::unknown_operation("Ledger", operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Configured context over a [`FakeClient`] with an empty registry.
///
/// Retries are immediate and capped at 3.
pub(crate) fn harness() -> (ProxyContext, Arc<FakeClient>) {
    let client = Arc::new(FakeClient::default());
    let manager = ConnectionManager::new(client.clone(), ConfigDocument::new());
    manager
        .configure_with(
            "test",
            EnvironmentConfig::new()
                .with_server("mongodb://localhost")
                .with_database("main", "bank"),
        )
        .unwrap();
    manager.set_max_retries(3);
    manager.set_sleep_interval(Duration::ZERO);
    (ProxyContext::for_manager(Arc::new(manager)), client)
}
