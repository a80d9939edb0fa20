use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;
use crate::error::{Error, Result};

/// One bundle as described by the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDescriptor {
    /// Unique bundle identity.
    pub name: String,

    /// Content hash of the bundle payload. Unversioned when absent.
    #[serde(default)]
    pub fingerprint: Fingerprint,

    /// Names of the bundles this one depends on, in manifest order.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl BundleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fingerprint: Fingerprint::unversioned(),
            dependencies: Vec::new(),
        }
    }

    #[must_use]
    pub fn fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    #[must_use]
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Serialize, Deserialize)]
struct ManifestDocument {
    #[serde(default)]
    bundles: Vec<BundleDescriptor>,
}

/// The authoritative mapping of bundle names to fingerprints and dependencies.
///
/// # Examples
///
/// ```
/// use stowage_manifest::{BundleDescriptor, Fingerprint, Manifest};
///
/// let manifest = Manifest::from_json(br#"{
///     "bundles": [
///         { "name": "ui", "fingerprint": "0a0b", "dependencies": ["shared"] },
///         { "name": "shared" }
///     ]
/// }"#).unwrap();
///
/// assert_eq!(manifest.fingerprint_of("ui"), Fingerprint::parse("0a0b").unwrap());
/// assert_eq!(manifest.dependencies_of("ui"), ["shared".to_string()]);
/// assert!(manifest.dependencies_of("missing").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    bundles: BTreeMap<String, BundleDescriptor>,
}

impl Manifest {
    pub fn new() -> Self { Self::default() }

    /// Build a manifest from descriptors, rejecting duplicate names.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = BundleDescriptor>,
    {
        let mut manifest = Self::new();
        for descriptor in descriptors {
            if manifest.bundles.contains_key(&descriptor.name) {
                return Err(Error::DuplicateBundle(descriptor.name));
            }
            manifest.bundles.insert(descriptor.name.clone(), descriptor);
        }
        Ok(manifest)
    }

    /// Parse a JSON manifest document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let document: ManifestDocument = serde_json::from_slice(bytes)?;
        Self::from_descriptors(document.bundles)
    }

    /// Serialize to a JSON manifest document.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let document = ManifestDocument {
            bundles: self.bundles.values().cloned().collect(),
        };
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    pub fn get(&self, name: &str) -> Option<&BundleDescriptor> { self.bundles.get(name) }

    pub fn contains(&self, name: &str) -> bool { self.bundles.contains_key(name) }

    /// Fingerprint recorded for `name`, unversioned for unknown bundles.
    pub fn fingerprint_of(&self, name: &str) -> Fingerprint {
        self.bundles
            .get(name)
            .map(|d| d.fingerprint.clone())
            .unwrap_or_default()
    }

    /// Direct dependencies of `name`, empty for unknown bundles.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.bundles
            .get(name)
            .map(|d| d.dependencies.as_slice())
            .unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.bundles.keys().map(String::as_str) }

    pub fn len(&self) -> usize { self.bundles.len() }

    pub fn is_empty(&self) -> bool { self.bundles.is_empty() }

    /// First dependency cycle reachable from `name`, as a closed path
    /// (`[a, b, a]`).
    pub fn find_cycle(&self, name: &str) -> Option<Vec<String>> { crate::core::find_cycle(self, name) }
}
