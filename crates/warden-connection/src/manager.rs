//! Connection manager owning the live data-store connection
//!
//! The manager is built once, configured for an environment, and then shared
//! by `Arc` with every retry executor and proxy. It holds the only live
//! connection handle; [`ConnectionManager::reconnect`] replaces it wholesale.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use warden_core::{
    ClientLibrary, ConnectionOptions, ConnectionRef, DEFAULT_MAX_RETRIES,
    DEFAULT_SLEEP_BETWEEN_RETRIES, HostDescriptor, ObjectRef, Result, WardenError,
};

use crate::config::{ConfigSource, EnvironmentConfig};

/// Notification hook run on every transient failure.
///
/// Receives the error and the connection handle the failed attempt ran
/// against (`None` when no handle could be obtained).
pub type FailureCallback = Arc<dyn Fn(&WardenError, Option<&ConnectionRef>) + Send + Sync>;

#[derive(Default)]
struct Settings {
    environment: Option<String>,
    config: EnvironmentConfig,
    hosts: Vec<HostDescriptor>,
}

/// The live handle and the generation it was built in
#[derive(Default)]
struct Slot {
    handle: Option<ConnectionRef>,
    generation: u64,
}

/// Owns connection configuration and the live connection handle
pub struct ConnectionManager {
    client: Arc<dyn ClientLibrary>,
    source: Box<dyn ConfigSource>,
    settings: RwLock<Settings>,
    slot: Mutex<Slot>,
    max_retries: AtomicU32,
    /// Pause between retries, in nanoseconds
    sleep_interval: AtomicU64,
    reconnects: AtomicU64,
    on_failure: RwLock<Option<FailureCallback>>,
}

impl ConnectionManager {
    /// Create an unconfigured manager
    pub fn new<C, S>(client: C, source: S) -> Self
    where
        C: ClientLibrary,
        S: ConfigSource + 'static,
    {
        Self {
            client: Arc::new(client),
            source: Box::new(source),
            settings: RwLock::new(Settings::default()),
            slot: Mutex::new(Slot::default()),
            max_retries: AtomicU32::new(DEFAULT_MAX_RETRIES),
            sleep_interval: AtomicU64::new(
                Duration::from_secs_f64(DEFAULT_SLEEP_BETWEEN_RETRIES).as_nanos() as u64,
            ),
            reconnects: AtomicU64::new(0),
            on_failure: RwLock::new(None),
        }
    }

    /// Load the named environment from the configuration source
    #[tracing::instrument(skip(self))]
    pub fn configure(&self, environment: &str) -> Result<()> {
        let config = self.source.environment(environment)?;
        self.configure_with(environment, config)
    }

    /// Apply an environment record directly.
    ///
    /// Resets the live handle to unset and applies the resilience options.
    /// A registered failure callback is kept.
    #[tracing::instrument(skip(self, config))]
    pub fn configure_with(&self, environment: &str, config: EnvironmentConfig) -> Result<()> {
        let hosts = config.hosts()?;
        let sleep_interval = config.resilience_options.sleep_interval()?;
        let max_retries = config.resilience_options.max_retries();

        tracing::debug!(
            hosts = hosts.len(),
            databases = config.databases.len(),
            max_retries,
            ?sleep_interval,
            "applying environment configuration"
        );

        *self.settings.write() = Settings {
            environment: Some(environment.to_string()),
            config,
            hosts,
        };
        self.set_max_retries(max_retries);
        self.set_sleep_interval(sleep_interval);
        self.slot.lock().handle = None;

        tracing::info!("environment configured");
        Ok(())
    }

    /// Name of the configured environment
    pub fn environment(&self) -> Option<String> {
        self.settings.read().environment.clone()
    }

    /// Parsed hosts of the configured environment
    pub fn hosts(&self) -> Vec<HostDescriptor> {
        self.settings.read().hosts.clone()
    }

    /// Database alias map of the configured environment
    pub fn databases(&self) -> BTreeMap<String, String> {
        self.settings.read().config.databases.clone()
    }

    /// Options passed to the client library
    pub fn connection_options(&self) -> ConnectionOptions {
        self.settings.read().config.connection_options.clone()
    }

    /// Look up the database name behind an alias
    pub fn database_name(&self, alias: &str) -> Result<String> {
        self.settings
            .read()
            .config
            .databases
            .get(alias)
            .cloned()
            .ok_or_else(|| {
                tracing::warn!(alias = %alias, "unknown database alias");
                WardenError::Configuration(format!("Unknown database alias `{}`", alias))
            })
    }

    /// Get the live connection, building it if unset
    pub fn connect(&self) -> Result<ConnectionRef> {
        self.checkout().map(|(handle, _)| handle)
    }

    /// Get the live connection together with its generation
    pub fn checkout(&self) -> Result<(ConnectionRef, u64)> {
        self.try_checkout().map_err(|(error, _)| error)
    }

    /// Like [`Self::checkout`], but a failed build also reports the
    /// generation it was attempted on.
    pub(crate) fn try_checkout(&self) -> std::result::Result<(ConnectionRef, u64), (WardenError, u64)> {
        let mut slot = self.slot.lock();
        if let Some(handle) = &slot.handle {
            return Ok((handle.clone(), slot.generation));
        }

        let handle = self
            .build_connection()
            .map_err(|error| (error, slot.generation))?;
        slot.generation += 1;
        slot.handle = Some(handle.clone());
        tracing::info!(generation = slot.generation, "connection established");
        Ok((handle, slot.generation))
    }

    /// Discard the live connection and build a new one
    #[tracing::instrument(skip(self))]
    pub fn reconnect(&self) -> Result<ConnectionRef> {
        let mut slot = self.slot.lock();
        self.replace(&mut slot)
    }

    /// Reconnect on behalf of an attempt that failed on generation `stale`.
    ///
    /// When the live handle has already moved past `stale`, another caller
    /// reconnected in the meantime and the current handle is returned as is.
    /// `stale` may also be the generation a failed build was attempted on.
    /// `None` always rebuilds.
    #[tracing::instrument(skip(self))]
    pub fn reconnect_from(&self, stale: Option<u64>) -> Result<ConnectionRef> {
        let mut slot = self.slot.lock();
        if let (Some(stale), Some(handle)) = (stale, &slot.handle) {
            if slot.generation != stale {
                tracing::debug!(
                    generation = slot.generation,
                    "connection already replaced, skipping reconnect"
                );
                return Ok(handle.clone());
            }
        }
        self.replace(&mut slot)
    }

    fn replace(&self, slot: &mut Slot) -> Result<ConnectionRef> {
        slot.handle = None;
        self.reconnects.fetch_add(1, Ordering::SeqCst);

        let handle = self.build_connection().map_err(|e| {
            tracing::error!(error = %e, "failed to reconnect");
            e
        })?;
        slot.generation += 1;
        slot.handle = Some(handle.clone());
        tracing::info!(generation = slot.generation, "reconnected");
        Ok(handle)
    }

    fn build_connection(&self) -> Result<ConnectionRef> {
        let settings = self.settings.read();
        let options = &settings.config.connection_options;

        let handle = match settings.hosts.as_slice() {
            [] => {
                return Err(WardenError::Configuration(format!(
                    "No server or replica_set configured for environment `{}`",
                    settings.environment.as_deref().unwrap_or("<unconfigured>")
                )));
            }
            [host] => {
                tracing::debug!(host = %host, "connecting to single server");
                self.client
                    .new_single_connection(&host.host, host.port, options)?
            }
            members => {
                tracing::debug!(members = members.len(), "connecting to replica set");
                let addresses: Vec<(String, u16)> =
                    members.iter().map(HostDescriptor::address).collect();
                self.client.new_multi_connection(&addresses, options)?
            }
        };

        if let Some((username, password)) =
            settings.hosts.first().and_then(HostDescriptor::credentials)
        {
            for database in settings.config.databases.values() {
                handle.add_auth(database, username, password)?;
            }
            handle.apply_saved_authentication()?;
            tracing::debug!(
                databases = settings.config.databases.len(),
                "authentication applied"
            );
        }

        Ok(handle)
    }

    /// Database-scoped handle for an alias, from the live connection
    #[tracing::instrument(skip(self))]
    pub fn resolve_database(&self, alias: &str) -> Result<ObjectRef> {
        let name = self.database_name(alias)?;
        self.connect()?.db(&name)
    }

    /// The live handle, without building one
    pub fn current_connection(&self) -> Option<ConnectionRef> {
        self.slot.lock().handle.clone()
    }

    /// Generation of the most recently built handle (0 before the first build)
    pub fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    /// Number of reconnects requested so far
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.load(Ordering::SeqCst)
    }

    pub fn set_max_retries(&self, max_retries: u32) {
        self.max_retries.store(max_retries, Ordering::SeqCst);
    }

    /// Pause between retries
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_nanos(self.sleep_interval.load(Ordering::SeqCst))
    }

    pub fn set_sleep_interval(&self, interval: Duration) {
        let nanos = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX);
        self.sleep_interval.store(nanos, Ordering::SeqCst);
    }

    /// Register the failure callback, replacing any previous one
    pub fn on_failure<F>(&self, callback: F)
    where
        F: Fn(&WardenError, Option<&ConnectionRef>) + Send + Sync + 'static,
    {
        *self.on_failure.write() = Some(Arc::new(callback));
    }

    pub fn clear_on_failure(&self) {
        *self.on_failure.write() = None;
    }

    pub fn failure_callback(&self) -> Option<FailureCallback> {
        self.on_failure.read().clone()
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("environment", &self.environment())
            .field("generation", &self.generation())
            .field("max_retries", &self.max_retries())
            .field("sleep_interval", &self.sleep_interval())
            .finish_non_exhaustive()
    }
}
