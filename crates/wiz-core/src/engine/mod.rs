//! Bulb state reconciliation engine
//!
//! The [`Reconciler`] is responsible for:
//! - Refreshing one bulb or every registered bulb
//! - Normalizing bulb status into [`BulbState`]
//! - Writing UP/DOWN outcomes to the [`BulbStore`]
//! - Running control commands followed by a refresh
//! - Registering discovered bulbs
//! - Polling all bulbs periodically
//!
//! ## Architecture
//!
//! ```text
//!  caller (CLI, poll loop)
//!          │
//!          ▼
//!  ┌──────────────┐   command / query   ┌─────────────────┐
//!  │  Reconciler  │────────────────────▶│ DeviceConnector │
//!  └──────────────┘                     └─────────────────┘
//!          │  │
//!          │  └── discover ──▶ BulbDiscovery
//!          ▼
//!  ┌──────────────┐
//!  │  BulbStore   │   UP + state, or DOWN only
//!  └──────────────┘
//! ```
//!
//! ## Failure Policy
//!
//! Device failures (timeout, transport, protocol) never leave the engine:
//! the bulb is recorded as DOWN and the stored record is returned. Store
//! failures are propagated, since there is no meaningful record to report.

mod control;
mod locks;
mod scan;

pub use control::Command;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::{ControlConfig, WizConfig};
use crate::error::{DeviceError, Error, FailureKind, Result};
use crate::model::{BulbRecord, BulbState};
use crate::normalizer;
use crate::traits::{BulbDiscovery, BulbStore, DeviceConnector, RawStatus};
use locks::AddressLocks;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulbEvent {
    /// A new address was added to the store
    Registered { address: String },

    /// A bulb answered and its state was stored
    Refreshed { address: String, state: BulbState },

    /// A bulb failed to answer and was marked DOWN
    MarkedDown { address: String, kind: FailureKind },

    /// A control command reached the bulb
    CommandSucceeded { address: String, command: Command },

    /// A control command failed
    CommandFailed {
        address: String,
        command: Command,
        kind: FailureKind,
    },

    /// Discovery finished
    ScanCompleted {
        discovered: usize,
        registered: usize,
    },

    /// Poll loop started
    PollStarted { interval_secs: u64 },

    /// Poll loop stopped
    PollStopped { reason: String },
}

/// Bulb state reconciliation engine
///
/// Cheap to clone; clones share the same collaborators, locks and event
/// channel.
///
/// ## Concurrency
///
/// - `refresh_all` runs one task per bulb, bounded by
///   `engine.max_concurrent_refreshes`
/// - Calls touching the same address are serialized
/// - Calls touching different addresses run independently
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

struct Inner {
    /// Opens connections to individual bulbs
    connector: Box<dyn DeviceConnector>,

    /// Enumerates bulbs for `scan`
    discovery: Box<dyn BulbDiscovery>,

    /// Persistent bulb records
    store: Box<dyn BulbStore>,

    /// Per-address serialization
    locks: AddressLocks,

    /// Bounds the refresh fan-out
    refresh_permits: Semaphore,

    /// Defaults for control operations
    control: ControlConfig,

    /// Range used by `scan` when none is given
    default_range: String,

    /// Poll loop interval
    poll_interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<BulbEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `connector`: Device client implementation
    /// - `discovery`: Discovery implementation
    /// - `store`: Bulb store implementation
    /// - `config`: Validated before use
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// engine events
    pub fn new(
        connector: Box<dyn DeviceConnector>,
        discovery: Box<dyn BulbDiscovery>,
        store: Box<dyn BulbStore>,
        config: &WizConfig,
    ) -> Result<(Self, mpsc::Receiver<BulbEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let inner = Inner {
            connector,
            discovery,
            store,
            locks: AddressLocks::new(),
            refresh_permits: Semaphore::new(config.engine.max_concurrent_refreshes),
            control: config.control.clone(),
            default_range: config.discovery.default_range.clone(),
            poll_interval: Duration::from_secs(config.engine.poll_interval_secs),
            event_tx: tx,
        };

        Ok((
            Self {
                inner: Arc::new(inner),
            },
            rx,
        ))
    }

    /// The bulb store this reconciler writes to
    pub fn store(&self) -> &dyn BulbStore {
        self.inner.store.as_ref()
    }

    /// Refresh one bulb
    ///
    /// One status round trip. On success the normalized state is stored and
    /// the bulb marked UP (registering the address if it was unknown). On
    /// any device failure only `reachable` changes, to DOWN.
    ///
    /// # Returns
    ///
    /// - `Ok(BulbRecord)`: The record as stored after the refresh
    /// - `Err(Error)`: Store failure only
    pub async fn refresh_one(&self, address: &str) -> Result<BulbRecord> {
        let _guard = self.inner.locks.lock(address).await;
        self.refresh_locked(address).await
    }

    /// Refresh every registered bulb
    ///
    /// Bulbs are refreshed concurrently. The result holds one record per
    /// registered address, in the store's enumeration order at the start of
    /// the call, regardless of which bulb answered first.
    pub async fn refresh_all(&self) -> Result<Vec<BulbRecord>> {
        let addresses: Vec<String> = self
            .inner
            .store
            .get_all_bulbs()
            .await?
            .into_iter()
            .map(|bulb| bulb.address)
            .collect();

        debug!("Refreshing {} bulb(s)", addresses.len());

        let handles: Vec<_> = addresses
            .into_iter()
            .map(|address| {
                let this = self.clone();
                tokio::spawn(async move {
                    let _permit = this
                        .inner
                        .refresh_permits
                        .acquire()
                        .await
                        .map_err(|e| Error::Other(e.to_string()))?;
                    this.refresh_one(&address).await
                })
            })
            .collect();

        // Join every task before reporting, even after a failure
        let mut records = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            match handle.await.map_err(Error::from).and_then(|r| r) {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!("Refresh failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(records),
        }
    }

    /// Change a bulb's display name
    ///
    /// # Returns
    ///
    /// - `Ok(BulbRecord)`: The renamed record
    /// - `Err(Error::InvalidInput)`: Name is blank
    /// - `Err(Error::NotFound)`: Address not registered
    pub async fn rename(&self, address: &str, name: &str) -> Result<BulbRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("Bulb name cannot be empty"));
        }

        let _guard = self.inner.locks.lock(address).await;
        if !self.inner.store.rename_bulb(address, name).await? {
            return Err(Error::not_found(address));
        }
        info!("Renamed bulb {} to '{}'", address, name);
        self.current_record(address).await
    }

    /// Run the poll loop
    ///
    /// Refreshes every bulb immediately and then every
    /// `engine.poll_interval_secs`, until Ctrl-C. Store failures during a
    /// pass are logged and the loop continues.
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the poll loop until `shutdown_rx` fires
    ///
    /// Like [`Reconciler::run`], but stopped by a channel instead of OS
    /// signals. Used by embedding applications and tests.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        self.run_internal(Some(shutdown_rx)).await
    }

    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let mut interval = tokio::time::interval(self.inner.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        info!(
            "Polling bulbs every {}s",
            self.inner.poll_interval.as_secs()
        );
        self.emit_event(BulbEvent::PollStarted {
            interval_secs: self.inner.poll_interval.as_secs(),
        });

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                    "Shutdown signal"
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                    "Ctrl-C"
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                reason = &mut shutdown => {
                    info!("Poll loop stopping: {}", reason);
                    self.emit_event(BulbEvent::PollStopped {
                        reason: reason.to_string(),
                    });
                    break;
                }

                Some(_) = ticks.next() => {
                    match self.refresh_all().await {
                        Ok(bulbs) => {
                            let up = bulbs.iter().filter(|b| b.reachable.is_up()).count();
                            debug!("Poll pass: {}/{} bulb(s) up", up, bulbs.len());
                        }
                        Err(e) => {
                            error!("Poll pass failed: {}", e);
                            // Continue polling despite errors
                        }
                    }
                }
            }
        }

        self.inner.store.flush().await?;
        info!("Bulb store flushed, poll loop stopped");

        Ok(())
    }

    /// Refresh with the address lock already held
    async fn refresh_locked(&self, address: &str) -> Result<BulbRecord> {
        match self.query_status(address).await {
            Ok(raw) => {
                let state = normalizer::normalize(&raw);

                if self.inner.store.add_bulb(address).await? {
                    info!("Registered bulb {} on first contact", address);
                    self.emit_event(BulbEvent::Registered {
                        address: address.to_string(),
                    });
                }
                self.inner
                    .store
                    .update_bulb_state(address, state.clone())
                    .await?;

                debug!("Bulb {} is up: {:?}", address, state);
                self.emit_event(BulbEvent::Refreshed {
                    address: address.to_string(),
                    state,
                });
            }
            Err(e) => {
                warn!("Cannot get state of {}: {}", address, e);
                self.mark_down(address, e.kind()).await?;
            }
        }

        self.current_record(address).await
    }

    /// Single status round trip
    async fn query_status(&self, address: &str) -> std::result::Result<RawStatus, DeviceError> {
        let device = self.inner.connector.connect(address).await?;
        device.query_status().await
    }

    /// Record a device failure
    async fn mark_down(&self, address: &str, kind: FailureKind) -> Result<()> {
        self.inner.store.update_bulb_down(address).await?;
        self.emit_event(BulbEvent::MarkedDown {
            address: address.to_string(),
            kind,
        });
        Ok(())
    }

    /// Read back the stored record
    ///
    /// An address that has never been registered has no stored record; a
    /// DOWN record with unknown state is returned for it instead, without
    /// persisting it.
    async fn current_record(&self, address: &str) -> Result<BulbRecord> {
        match self.inner.store.get_bulb(address).await? {
            Some(record) => Ok(record),
            None => {
                debug!("Bulb {} is not registered", address);
                Ok(BulbRecord::new(address))
            }
        }
    }

    /// Emit an engine event
    ///
    /// Events are dropped (with a warning) when the channel is full, and
    /// silently when nobody is listening.
    fn emit_event(&self, event: BulbEvent) {
        match self.inner.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Event channel full, dropping event. Consider increasing event_channel_capacity."
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
