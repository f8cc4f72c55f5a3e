//! Checking that re-executed tasks really were served from the cache.

use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::daemon::Daemon;
use crate::task::TaskHandle;
use crate::validator::{lookup_failure, Failure, TaskVerdict, ValidationReport};
use crate::value::ResultValue;

/// Hex SHA-256 over the objects a task's hash is computed from.
///
/// Every value is fed with a type tag and, for variable-size data, its length,
/// so that differently shaped inputs cannot collide by concatenation.
pub fn content_hash(objects: &ResultValue) -> String {
    let mut hasher = Sha256::new();
    feed(&mut hasher, objects);
    hex::encode(hasher.finalize())
}

fn feed(hasher: &mut Sha256, value: &ResultValue) {
    match value {
        ResultValue::Null => hasher.update(b"n"),
        ResultValue::Bool(b) => hasher.update(if *b { b"b1" } else { b"b0" }),
        ResultValue::Int(i) => {
            hasher.update(b"i");
            hasher.update(i.to_le_bytes());
        }
        ResultValue::Float(f) => {
            hasher.update(b"f");
            hasher.update(f.to_bits().to_le_bytes());
        }
        ResultValue::Str(s) => feed_bytes(hasher, b"s", s.as_bytes()),
        ResultValue::List(items) => {
            hasher.update(b"l");
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                feed(hasher, item);
            }
        }
        ResultValue::Mapping(map) => {
            hasher.update(b"m");
            hasher.update((map.len() as u64).to_le_bytes());
            // BTreeMap keeps keys sorted
            for (key, item) in map {
                feed_bytes(hasher, b"k", key.as_bytes());
                feed(hasher, item);
            }
        }
        ResultValue::Node { type_name, value } => {
            feed_bytes(hasher, b"t", type_name.as_bytes());
            feed(hasher, value);
        }
    }
}

fn feed_bytes(hasher: &mut Sha256, tag: &[u8], bytes: &[u8]) {
    hasher.update(tag);
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

pub struct CacheEquivalenceChecker {
    daemon: Arc<dyn Daemon>,
}

impl CacheEquivalenceChecker {
    pub fn new(daemon: Arc<dyn Daemon>) -> Self {
        Self { daemon }
    }

    /// Check every handle; each verdict collects all failures found for it
    pub async fn validate_cached(&self, handles: &[TaskHandle]) -> ValidationReport {
        let mut report = ValidationReport::new("cache");
        for handle in handles {
            report.push(self.check_one(*handle).await);
        }
        report
    }

    async fn check_one(&self, handle: TaskHandle) -> TaskVerdict {
        let mut verdict = TaskVerdict::new(handle);

        match self.daemon.status(handle).await {
            Ok(status) if !status.is_finished_ok() => {
                verdict.failures.push(Failure::NotFinishedOk { status });
            }
            Ok(_) => {}
            Err(e) => {
                verdict.failures.push(lookup_failure(&e));
                if e.is_missing() {
                    return verdict;
                }
            }
        }

        let record = match self.daemon.cache_metadata(handle).await {
            Ok(record) => record,
            Err(e) => {
                verdict.failures.push(Failure::CacheMetadataUnavailable {
                    reason: e.to_string(),
                });
                return verdict;
            }
        };

        if record.cached_from.is_none() {
            verdict.failures.push(Failure::NotCached);
        }

        let computed = content_hash(&record.hash_objects);
        if record.stored_hash.as_deref() != Some(computed.as_str()) {
            verdict.failures.push(Failure::HashMismatch {
                stored: record.stored_hash.clone(),
                computed,
            });
        }

        if !record.kind.has_artifacts() {
            return verdict;
        }

        if record.artifacts.is_empty() {
            verdict.failures.push(Failure::NoArtifacts);
        }

        let Some(original) = record.cached_from else {
            return verdict;
        };

        match self.daemon.artifact_names(original).await {
            Ok(names) if names.is_empty() => {
                verdict.failures.push(Failure::OriginalNoArtifacts { original });
            }
            Ok(names) => {
                if !record.artifacts.is_empty() && names != record.artifacts {
                    verdict.failures.push(Failure::ArtifactSetMismatch {
                        original,
                        cached: record.artifacts,
                        original_artifacts: names,
                    });
                }
            }
            Err(e) => verdict.failures.push(Failure::OriginalArtifactsUnavailable {
                original,
                reason: e.to_string(),
            }),
        }

        verdict
    }
}
