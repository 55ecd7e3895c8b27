//! Recording client library shared by the unit tests of this crate

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;
use warden_core::{
    ClientLibrary, ConnectionHandle, ConnectionOptions, ConnectionRef, ObjectRef, RemoteObject,
    Result, Value, WardenError,
};

/// How a connection was built
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Build {
    Single {
        host: String,
        port: u16,
        options: ConnectionOptions,
    },
    Multi {
        hosts: Vec<(String, u16)>,
        options: ConnectionOptions,
    },
}

#[derive(Debug, Default)]
pub(crate) struct RecordingConnection {
    pub auths: Mutex<Vec<(String, String, String)>>,
    pub authenticated: AtomicBool,
}

impl ConnectionHandle for RecordingConnection {
    fn add_auth(&self, database: &str, username: &str, password: &str) -> Result<()> {
        self.auths
            .lock()
            .push((database.into(), username.into(), password.into()));
        Ok(())
    }

    fn apply_saved_authentication(&self) -> Result<()> {
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn db(&self, database: &str) -> Result<ObjectRef> {
        Ok(Arc::new(DatabaseStub {
            name: database.to_string(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub(crate) struct DatabaseStub {
    pub name: String,
}

impl RemoteObject for DatabaseStub {
    fn call(&self, _connection: &ConnectionRef, operation: &str, _args: &[Value]) -> Result<Value> {
        match operation {
            "name" => Ok(Value::String(self.name.clone())),
            _ => Err(WardenError::unknown_operation("DatabaseStub", operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Client library that records every build
#[derive(Default)]
pub(crate) struct RecordingClient {
    pub builds: Mutex<Vec<Build>>,
    pub connections: Mutex<Vec<Arc<RecordingConnection>>>,
    /// Builds that fail with a connection failure before builds succeed again
    pub failing_builds: AtomicU32,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().len()
    }

    fn record(&self, build: Build) -> Result<ConnectionRef> {
        self.builds.lock().push(build);
        let remaining = self.failing_builds.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_builds.fetch_sub(1, Ordering::SeqCst);
            return Err(WardenError::ConnectionFailure("server unreachable".into()));
        }
        let connection = Arc::new(RecordingConnection::default());
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

impl ClientLibrary for RecordingClient {
    fn new_single_connection(
        &self,
        host: &str,
        port: u16,
        options: &ConnectionOptions,
    ) -> Result<ConnectionRef> {
        self.record(Build::Single {
            host: host.to_string(),
            port,
            options: options.clone(),
        })
    }

    fn new_multi_connection(
        &self,
        hosts: &[(String, u16)],
        options: &ConnectionOptions,
    ) -> Result<ConnectionRef> {
        self.record(Build::Multi {
            hosts: hosts.to_vec(),
            options: options.clone(),
        })
    }
}

/// Identity comparison of two connection handles
pub(crate) fn same_handle(a: &ConnectionRef, b: &ConnectionRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
