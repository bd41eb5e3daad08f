//! Test doubles and common utilities for contract tests
//!
//! `FakeNetwork` stands in for a LAN of bulbs: each address can answer,
//! time out, refuse connections, reject commands, or answer slowly.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiz_core::normalizer::brightness_to_percent;
use wiz_core::traits::{BulbDevice, BulbDiscovery, BulbStore, DeviceConnector, RawStatus};
use wiz_core::{
    BulbEvent, BulbRecord, BulbState, DeviceError, Error, MemoryBulbStore, Reconciler, WizConfig,
};

/// Behaviour of one simulated bulb
#[derive(Debug, Clone, Default)]
pub struct FakeBulb {
    /// Status returned by queries; `None` makes queries time out
    pub status: Option<Value>,
    /// Commands fail with a transport error
    pub command_fails: bool,
    /// Connecting fails with a transport error
    pub connect_fails: bool,
    /// Time every call takes
    pub delay: Duration,
}

impl FakeBulb {
    /// A bulb that answers with `status`
    pub fn answering(status: Value) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A bulb that never answers queries
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn rejecting_commands(mut self) -> Self {
        self.command_fails = true;
        self
    }
}

/// A `getPilot` result for a lit bulb
pub fn lit_status(scene_id: u32, dimming: u8) -> Value {
    json!({ "state": true, "sceneId": scene_id, "dimming": dimming })
}

/// A `getPilot` result for a bulb that is off
pub fn off_status(scene_id: u32, dimming: u8) -> Value {
    json!({ "state": false, "sceneId": scene_id, "dimming": dimming })
}

/// A command a bulb received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Power(bool),
    Scene {
        scene_id: u32,
        brightness: Option<u8>,
    },
}

#[derive(Default)]
struct NetworkState {
    bulbs: HashMap<String, FakeBulb>,
    queries: HashMap<String, usize>,
    sent: Vec<(String, Sent)>,
    in_flight: HashMap<String, usize>,
    max_in_flight: HashMap<String, usize>,
    total_in_flight: usize,
    max_total_in_flight: usize,
}

/// A simulated network of bulbs, shared between the test and the engine
#[derive(Clone, Default)]
pub struct FakeNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a bulb
    pub fn set_bulb(&self, address: &str, bulb: FakeBulb) {
        self.state
            .lock()
            .unwrap()
            .bulbs
            .insert(address.to_string(), bulb);
    }

    /// Change what a bulb answers to queries
    pub fn set_status(&self, address: &str, status: Option<Value>) {
        let mut state = self.state.lock().unwrap();
        if let Some(bulb) = state.bulbs.get_mut(address) {
            bulb.status = status;
        }
    }

    /// Number of status queries an address received
    pub fn query_count(&self, address: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queries
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    /// Every command received, in order
    pub fn sent(&self) -> Vec<(String, Sent)> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Highest number of simultaneous calls seen for one address
    pub fn max_in_flight(&self, address: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .max_in_flight
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of simultaneous calls seen across all addresses
    pub fn max_total_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_total_in_flight
    }

    fn bulb(&self, address: &str) -> Option<FakeBulb> {
        self.state.lock().unwrap().bulbs.get(address).cloned()
    }

    async fn call<T>(
        &self,
        address: &str,
        f: impl FnOnce(&mut NetworkState) -> Result<T, DeviceError>,
    ) -> Result<T, DeviceError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            let current = {
                let count = state.in_flight.entry(address.to_string()).or_default();
                *count += 1;
                *count
            };
            let max = state.max_in_flight.entry(address.to_string()).or_default();
            *max = (*max).max(current);
            state.total_in_flight += 1;
            state.max_total_in_flight = state.max_total_in_flight.max(state.total_in_flight);
            state
                .bulbs
                .get(address)
                .map(|b| b.delay)
                .unwrap_or_default()
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(count) = state.in_flight.get_mut(address) {
            *count -= 1;
        }
        state.total_in_flight -= 1;
        f(&mut state)
    }
}

#[async_trait::async_trait]
impl DeviceConnector for FakeNetwork {
    async fn connect(&self, address: &str) -> Result<Box<dyn BulbDevice>, DeviceError> {
        match self.bulb(address) {
            Some(bulb) if !bulb.connect_fails => Ok(Box::new(FakeConnection {
                network: self.clone(),
                address: address.to_string(),
            })),
            _ => Err(DeviceError::unreachable(address, "connection refused")),
        }
    }
}

struct FakeConnection {
    network: FakeNetwork,
    address: String,
}

#[async_trait::async_trait]
impl BulbDevice for FakeConnection {
    fn address(&self) -> &str {
        &self.address
    }

    async fn query_status(&self) -> Result<RawStatus, DeviceError> {
        let address = self.address.clone();
        self.network
            .call(&self.address, move |state| {
                *state.queries.entry(address.clone()).or_default() += 1;
                match state.bulbs.get(&address).and_then(|b| b.status.clone()) {
                    Some(status) => Ok(RawStatus::new(status)),
                    None => Err(DeviceError::timeout(address, Duration::from_secs(2))),
                }
            })
            .await
    }

    async fn power(&self, on: bool) -> Result<(), DeviceError> {
        self.command(Sent::Power(on)).await
    }

    async fn apply_scene(&self, scene_id: u32, brightness: Option<u8>) -> Result<(), DeviceError> {
        self.command(Sent::Scene {
            scene_id,
            brightness,
        })
        .await
    }
}

impl FakeConnection {
    async fn command(&self, sent: Sent) -> Result<(), DeviceError> {
        let address = self.address.clone();
        self.network
            .call(&self.address, move |state| {
                let Some(bulb) = state.bulbs.get_mut(&address) else {
                    return Err(DeviceError::unreachable(address, "connection refused"));
                };
                if bulb.command_fails {
                    return Err(DeviceError::unreachable(address, "no route to host"));
                }

                // The bulb applies the command to what it reports next
                if let Some(Value::Object(status)) = bulb.status.as_mut() {
                    match &sent {
                        Sent::Power(on) => {
                            status.insert("state".to_string(), json!(on));
                        }
                        Sent::Scene {
                            scene_id,
                            brightness,
                        } => {
                            status.insert("state".to_string(), json!(true));
                            status.insert("sceneId".to_string(), json!(scene_id));
                            if let Some(b) = brightness {
                                status.insert("dimming".to_string(), json!(brightness_to_percent(*b)));
                            }
                        }
                    }
                }

                state.sent.push((address, sent));
                Ok(())
            })
            .await
    }
}

/// Discovery returning a fixed list and recording the ranges asked for
#[derive(Clone, Default)]
pub struct StaticDiscovery {
    addresses: Vec<String>,
    ranges: Arc<Mutex<Vec<String>>>,
}

impl StaticDiscovery {
    pub fn new(addresses: &[&str]) -> Self {
        Self {
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            ranges: Arc::default(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Ranges passed to `discover`, in call order
    pub fn ranges(&self) -> Vec<String> {
        self.ranges.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BulbDiscovery for StaticDiscovery {
    async fn discover(&self, range: &str) -> Result<Vec<String>, Error> {
        self.ranges.lock().unwrap().push(range.to_string());
        Ok(self.addresses.clone())
    }
}

/// Discovery that always fails
pub struct FailingDiscovery;

#[async_trait::async_trait]
impl BulbDiscovery for FailingDiscovery {
    async fn discover(&self, _range: &str) -> Result<Vec<String>, Error> {
        Err(Error::discovery("socket bind failed"))
    }
}

/// A store whose backend is gone
pub struct FailingStore;

#[async_trait::async_trait]
impl BulbStore for FailingStore {
    async fn get_bulb(&self, _address: &str) -> Result<Option<BulbRecord>, Error> {
        Err(Error::store("database unavailable"))
    }

    async fn get_all_bulbs(&self) -> Result<Vec<BulbRecord>, Error> {
        Err(Error::store("database unavailable"))
    }

    async fn add_bulb(&self, _address: &str) -> Result<bool, Error> {
        Err(Error::store("database unavailable"))
    }

    async fn update_bulb_state(&self, _address: &str, _state: BulbState) -> Result<(), Error> {
        Err(Error::store("database unavailable"))
    }

    async fn update_bulb_down(&self, _address: &str) -> Result<(), Error> {
        Err(Error::store("database unavailable"))
    }

    async fn rename_bulb(&self, _address: &str, _name: &str) -> Result<bool, Error> {
        Err(Error::store("database unavailable"))
    }

    async fn delete_bulb(&self, _address: &str) -> Result<bool, Error> {
        Err(Error::store("database unavailable"))
    }

    async fn flush(&self) -> Result<(), Error> {
        Err(Error::store("database unavailable"))
    }
}

/// A memory store that counts flushes
#[derive(Clone, Default)]
pub struct CountingStore {
    pub inner: MemoryBulbStore,
    flush_count: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BulbStore for CountingStore {
    async fn get_bulb(&self, address: &str) -> Result<Option<BulbRecord>, Error> {
        self.inner.get_bulb(address).await
    }

    async fn get_all_bulbs(&self) -> Result<Vec<BulbRecord>, Error> {
        self.inner.get_all_bulbs().await
    }

    async fn add_bulb(&self, address: &str) -> Result<bool, Error> {
        self.inner.add_bulb(address).await
    }

    async fn update_bulb_state(&self, address: &str, state: BulbState) -> Result<(), Error> {
        self.inner.update_bulb_state(address, state).await
    }

    async fn update_bulb_down(&self, address: &str) -> Result<(), Error> {
        self.inner.update_bulb_down(address).await
    }

    async fn rename_bulb(&self, address: &str, name: &str) -> Result<bool, Error> {
        self.inner.rename_bulb(address, name).await
    }

    async fn delete_bulb(&self, address: &str) -> Result<bool, Error> {
        self.inner.delete_bulb(address).await
    }

    async fn flush(&self) -> Result<(), Error> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// Configuration used by the contract tests
pub fn test_config() -> WizConfig {
    let mut config = WizConfig::new();
    config.engine.poll_interval_secs = 1;
    config.engine.event_channel_capacity = 100;
    config
}

/// Build a reconciler over a fake network and a shared memory store
pub fn reconciler(
    network: &FakeNetwork,
    discovery: impl BulbDiscovery + 'static,
    store: &MemoryBulbStore,
) -> (Reconciler, tokio::sync::mpsc::Receiver<BulbEvent>) {
    reconciler_with_config(network, discovery, store, &test_config())
}

pub fn reconciler_with_config(
    network: &FakeNetwork,
    discovery: impl BulbDiscovery + 'static,
    store: &MemoryBulbStore,
    config: &WizConfig,
) -> (Reconciler, tokio::sync::mpsc::Receiver<BulbEvent>) {
    Reconciler::new(
        Box::new(network.clone()),
        Box::new(discovery),
        Box::new(store.clone()),
        config,
    )
    .expect("reconciler construction succeeds")
}

/// Drain every event currently queued
pub fn drain(rx: &mut tokio::sync::mpsc::Receiver<BulbEvent>) -> Vec<BulbEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
