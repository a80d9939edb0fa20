use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{self, BoxFuture, FutureExt};
use stowage_fetch::{Bundle, DownloadCommand, FetchHandler, ProgressGate, ProgressSink};
use stowage_manifest::{Fingerprint, Manifest};
use tokio::sync::oneshot;

use crate::data::CacheSetting;
use crate::error::{Error, Result};

/// Reference-counted, dependency-aware bundle cache.
///
/// Per name there is at most one entry, either active or loading:
///
/// - active: the loaded bundle, its reference count and the dependency
///   names it acquired when it was loaded
/// - loading: the waiters that will all receive the same result
///
/// The first request for a name spawns a driver task that loads every
/// dependency through the cache itself, then issues the main command, then
/// promotes the entry with one reference per waiter. Dependencies that fail
/// do not stop the main command. Each dependency that did load holds one
/// reference for the dependent, released again by the cascading unload.
///
/// Progress of the main command is forwarded to every waiter that passed a
/// sink, from the moment it joined. Dependency loads report no progress.
/// Each sink sees increasing values and exactly one final `1.0`, delivered
/// just before its result; an active hit gets the `1.0` alone.
#[derive(Clone)]
pub struct BundleCache {
    inner: Arc<Inner>,
}

struct Inner {
    handler:  Arc<dyn FetchHandler>,
    manifest: Mutex<Option<Arc<Manifest>>>,
    entries:  Mutex<Entries>,
}

#[derive(Default)]
struct Entries {
    active:  HashMap<String, ActiveEntry>,
    loading: HashMap<String, Vec<Waiter>>,
}

/// A request parked on a loading entry.
struct Waiter {
    result:   oneshot::Sender<Option<Bundle>>,
    progress: Option<Arc<ProgressGate>>,
}

struct ActiveEntry {
    bundle:       Bundle,
    ref_count:    usize,
    dependencies: Vec<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

impl BundleCache {
    /// An empty cache that fetches through `handler`. Requests fail with
    /// [`Error::NotInitialized`] until a manifest is set.
    pub fn new(handler: Arc<dyn FetchHandler>) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler,
                manifest: Mutex::new(None),
                entries: Mutex::new(Entries::default()),
            }),
        }
    }

    /// Replace the manifest wholesale. Active entries keep the dependency
    /// lists they were loaded with.
    pub fn set_manifest(&self, manifest: impl Into<Arc<Manifest>>) {
        *lock(&self.inner.manifest) = Some(manifest.into());
    }

    pub fn manifest(&self) -> Option<Arc<Manifest>> { lock(&self.inner.manifest).clone() }

    pub fn is_initialized(&self) -> bool { lock(&self.inner.manifest).is_some() }

    /// Load `name` and its dependencies, or take another reference if it is
    /// already loaded. Concurrent requests for a loading name share its
    /// single fetch.
    ///
    /// A name whose dependency graph contains a cycle is rejected with
    /// [`Error::DependencyCycle`] before anything is fetched.
    pub async fn get_bundle(&self, name: &str, setting: CacheSetting) -> Result<Bundle> {
        self.get_bundle_with_progress(name, setting, None).await
    }

    /// [`get_bundle`](Self::get_bundle) reporting download progress to
    /// `progress`.
    pub async fn get_bundle_with_progress(
        &self,
        name: &str,
        setting: CacheSetting,
        progress: Option<ProgressSink>,
    ) -> Result<Bundle> {
        let manifest = self.manifest().ok_or(Error::NotInitialized)?;
        self.inner
            .acquire(name.to_string(), setting, manifest, progress)?
            .await
            .ok_or_else(|| Error::Unavailable { name: name.to_string() })
    }

    /// Drop one reference to `name`, or all of them when `force` is set.
    ///
    /// A bundle left without references is released and removed, and each of
    /// its recorded dependencies is unloaded the same way. Untracked names
    /// are ignored. Returns how many bundles were released.
    pub fn unload_bundle(&self, name: &str, destroy_loaded_objects: bool, force: bool) -> usize {
        self.inner.unload(name, destroy_loaded_objects, force)
    }

    /// Release every active bundle and forget them. Loads still in flight
    /// complete normally.
    pub fn dispose(&self) {
        let drained: Vec<(String, ActiveEntry)> = lock(&self.inner.entries).active.drain().collect();
        tracing::info!(bundles = drained.len(), "disposing bundle cache");
        for (_, entry) in drained {
            entry.bundle.release(true);
        }
    }

    /// References held on an active bundle.
    pub fn ref_count(&self, name: &str) -> Option<usize> {
        lock(&self.inner.entries).active.get(name).map(|entry| entry.ref_count)
    }

    /// Dependency names recorded when `name` was loaded.
    pub fn dependencies(&self, name: &str) -> Option<Vec<String>> {
        lock(&self.inner.entries)
            .active
            .get(name)
            .map(|entry| entry.dependencies.clone())
    }

    /// Number of requests waiting on a load of `name`.
    pub fn waiters(&self, name: &str) -> usize {
        lock(&self.inner.entries).loading.get(name).map_or(0, Vec::len)
    }

    pub fn is_loading(&self, name: &str) -> bool { lock(&self.inner.entries).loading.contains_key(name) }

    /// Names of all active bundles, sorted.
    pub fn active_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.inner.entries).active.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Inner {
    fn acquire(
        self: &Arc<Self>,
        name: String,
        setting: CacheSetting,
        manifest: Arc<Manifest>,
        progress: Option<ProgressSink>,
    ) -> Result<BoxFuture<'static, Option<Bundle>>> {
        let mut entries = lock(&self.entries);

        if let Some(active) = entries.active.get_mut(&name) {
            active.ref_count += 1;
            tracing::trace!(bundle = %name, ref_count = active.ref_count, "active hit");
            let bundle = active.bundle.clone();
            drop(entries);
            if let Some(sink) = progress {
                sink(1.0);
            }
            return Ok(future::ready(Some(bundle)).boxed());
        }

        let (tx, rx) = oneshot::channel();
        let waiter = Waiter {
            result:   tx,
            progress: progress.map(|sink| Arc::new(ProgressGate::new(Some(sink)))),
        };
        let first = match entries.loading.entry(name.clone()) {
            Entry::Occupied(mut waiters) => {
                waiters.get_mut().push(waiter);
                tracing::debug!(bundle = %name, waiters = waiters.get().len(), "joined in-flight load");
                false
            }
            Entry::Vacant(slot) => {
                // Dependencies of an acyclic root are acyclic too.
                if let Some(cycle) = manifest.find_cycle(slot.key()) {
                    tracing::error!(bundle = %name, cycle = ?cycle, "dependency cycle");
                    return Err(Error::DependencyCycle { name, cycle });
                }
                slot.insert(vec![waiter]);
                true
            }
        };
        drop(entries);

        if first {
            tokio::spawn(Arc::clone(self).drive(name, setting, manifest));
        }

        Ok(async move { rx.await.ok().flatten() }.boxed())
    }

    async fn drive(self: Arc<Self>, name: String, setting: CacheSetting, manifest: Arc<Manifest>) {
        let wanted = manifest.dependencies_of(&name);
        let mut acquired = Vec::with_capacity(wanted.len());
        if !wanted.is_empty() {
            tracing::debug!(bundle = %name, dependencies = ?wanted, "loading dependencies");
            let loads = wanted.iter().map(|dependency| {
                self.acquire(dependency.clone(), CacheSetting::UseManifest, Arc::clone(&manifest), None)
                    .unwrap_or_else(|_| future::ready(None).boxed())
            });
            let results = future::join_all(loads).await;
            for (dependency, result) in wanted.iter().zip(results) {
                match result {
                    Some(_) => acquired.push(dependency.clone()),
                    None => tracing::warn!(bundle = %name, dependency = %dependency, "dependency failed to load"),
                }
            }
        }

        let fingerprint = match setting {
            CacheSetting::UseManifest => manifest.fingerprint_of(&name),
            CacheSetting::Bypass => Fingerprint::unversioned(),
        };
        let fan_out: ProgressSink = {
            let inner = Arc::downgrade(&self);
            let name = name.clone();
            Arc::new(move |value| {
                if let Some(inner) = inner.upgrade() {
                    inner.report_progress(&name, value);
                }
            })
        };
        let command = DownloadCommand::new(name.clone(), fingerprint).on_progress(fan_out);
        let bundle = self.handler.handle(command).await;
        self.settle(name, bundle, acquired);
    }

    /// Forward one progress value to the current waiters of `name`.
    fn report_progress(&self, name: &str, value: f32) {
        let gates: Vec<Arc<ProgressGate>> = lock(&self.entries)
            .loading
            .get(name)
            .map(|waiters| waiters.iter().filter_map(|w| w.progress.clone()).collect())
            .unwrap_or_default();
        for gate in gates {
            gate.report(value);
        }
    }

    /// Promote or dispose the loading entry for `name` and fan the result
    /// out to its waiters in the order they asked.
    fn settle(&self, name: String, bundle: Option<Bundle>, dependencies: Vec<String>) {
        let mut entries = lock(&self.entries);
        let waiters = entries.loading.remove(&name).unwrap_or_default();

        let Some(bundle) = bundle else {
            drop(entries);
            tracing::error!(bundle = %name, waiters = waiters.len(), "bundle failed to load");
            for waiter in waiters {
                waiter.finish(None);
            }
            for dependency in &dependencies {
                self.unload(dependency, false, false);
            }
            return;
        };

        let references = waiters.len();
        let (delivered, surplus) = match entries.active.entry(name.clone()) {
            Entry::Occupied(mut existing) => {
                tracing::warn!(bundle = %name, "bundle became active twice; keeping the first copy");
                let existing = existing.get_mut();
                existing.ref_count += references;
                (existing.bundle.clone(), Some((bundle, dependencies)))
            }
            Entry::Vacant(slot) => {
                slot.insert(ActiveEntry {
                    bundle: bundle.clone(),
                    ref_count: references,
                    dependencies,
                });
                (bundle, None)
            }
        };
        drop(entries);

        tracing::debug!(bundle = %name, references, "bundle active");
        let mut abandoned = 0;
        for waiter in waiters {
            if !waiter.finish(Some(delivered.clone())) {
                abandoned += 1;
            }
        }

        if let Some((duplicate, dependencies)) = surplus {
            duplicate.release(false);
            for dependency in &dependencies {
                self.unload(dependency, false, false);
            }
        }
        for _ in 0..abandoned {
            self.unload(&name, false, false);
        }
    }

    fn unload(&self, name: &str, destroy_loaded_objects: bool, force: bool) -> usize {
        let mut released = Vec::new();
        {
            let mut entries = lock(&self.entries);
            let mut pending = vec![name.to_string()];
            while let Some(name) = pending.pop() {
                let Entry::Occupied(mut slot) = entries.active.entry(name) else {
                    continue;
                };
                let ref_count = {
                    let entry = slot.get_mut();
                    entry.ref_count = if force { 0 } else { entry.ref_count.saturating_sub(1) };
                    entry.ref_count
                };
                if ref_count > 0 {
                    tracing::trace!(bundle = %slot.key(), ref_count, "reference dropped");
                    continue;
                }
                let (name, entry) = slot.remove_entry();
                tracing::debug!(bundle = %name, dependencies = entry.dependencies.len(), "unloading");
                pending.extend(entry.dependencies);
                released.push(entry.bundle);
            }
        }

        for bundle in &released {
            bundle.release(destroy_loaded_objects);
        }
        released.len()
    }
}

impl Waiter {
    /// Complete this waiter's progress, then hand it the result. Returns
    /// `false` when the request was dropped before delivery.
    fn finish(self, bundle: Option<Bundle>) -> bool {
        if let Some(gate) = &self.progress {
            gate.finish();
        }
        self.result.send(bundle).is_ok()
    }
}
