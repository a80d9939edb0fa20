//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use stowage_fetch::{Bundle, BundleOrigin, DownloadCommand, FetchHandler, ProgressSink};
use stowage_manifest::{BundleDescriptor, Fingerprint, Manifest};
use tokio::sync::Semaphore;

/// Build a manifest from `(name, version, dependencies)` triples.
pub fn manifest(bundles: &[(&str, u32, &[&str])]) -> Manifest {
    Manifest::from_descriptors(bundles.iter().map(|(name, version, deps)| {
        BundleDescriptor::new(*name)
            .fingerprint(Fingerprint::from_version(*version))
            .depends_on(deps.iter().copied())
    }))
    .unwrap()
}

/// Serves any bundle with its name as payload and records every command.
///
/// Names in `failing` resolve to nothing. A gated handler holds every
/// command until [`RecordingHandler::open`] is called, then reports the
/// configured progress values to the command's sink.
pub struct RecordingHandler {
    commands: Mutex<Vec<(String, Fingerprint)>>,
    failing:  HashSet<String>,
    gate:     Option<Semaphore>,
    progress: Vec<f32>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            failing:  HashSet::new(),
            gate:     None,
            progress: Vec::new(),
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn failing(mut self, names: &[&str]) -> Self {
        self.failing = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn reporting(mut self, progress: &[f32]) -> Self {
        self.progress = progress.to_vec();
        self
    }

    pub fn open(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn commands(&self) -> Vec<(String, Fingerprint)> { self.commands.lock().unwrap().clone() }

    pub fn names(&self) -> Vec<String> { self.commands().into_iter().map(|(name, _)| name).collect() }

    pub fn count(&self, name: &str) -> usize { self.names().iter().filter(|n| *n == name).count() }
}

#[async_trait]
impl FetchHandler for RecordingHandler {
    async fn handle(&self, command: DownloadCommand) -> Option<Bundle> {
        self.commands
            .lock()
            .unwrap()
            .push((command.name.clone(), command.fingerprint.clone()));
        if let Some(gate) = &self.gate {
            gate.acquire().await.ok()?.forget();
        }
        if let Some(sink) = &command.progress {
            for value in &self.progress {
                sink(*value);
            }
        }
        if self.failing.contains(&command.name) {
            return None;
        }
        let payload = Bytes::from(command.name.clone().into_bytes());
        Some(Bundle::new(command.name, command.fingerprint, payload, BundleOrigin::Remote))
    }
}

/// A manifest endpoint: answers manifest requests for the versions it
/// publishes and records every version asked for.
pub struct ManifestEndpoint {
    published: HashMap<Fingerprint, Vec<u8>>,
    requested: Mutex<Vec<Fingerprint>>,
}

impl ManifestEndpoint {
    pub fn new() -> Self {
        Self {
            published: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn publish(mut self, version: u32, manifest: &Manifest) -> Self {
        self.published
            .insert(Fingerprint::from_version(version), manifest.to_json().unwrap());
        self
    }

    pub fn publish_raw(mut self, version: u32, payload: &[u8]) -> Self {
        self.published.insert(Fingerprint::from_version(version), payload.to_vec());
        self
    }

    /// Versions requested so far, in order.
    pub fn requested(&self) -> Vec<u32> {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .map(|fp| (1..=64).find(|v| Fingerprint::from_version(*v) == *fp).unwrap_or(0))
            .collect()
    }
}

#[async_trait]
impl FetchHandler for ManifestEndpoint {
    async fn handle(&self, command: DownloadCommand) -> Option<Bundle> {
        self.requested.lock().unwrap().push(command.fingerprint.clone());
        let payload = self.published.get(&command.fingerprint)?;
        Some(Bundle::new(
            command.name,
            command.fingerprint,
            Bytes::from(payload.clone()),
            BundleOrigin::Remote,
        ))
    }
}

/// A progress sink that records every value it sees.
pub fn progress_recorder() -> (ProgressSink, Arc<Mutex<Vec<f32>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    (Arc::new(move |p| sink_seen.lock().unwrap().push(p)), seen)
}
