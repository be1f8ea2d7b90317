//! Bounded-concurrency image existence prober.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};

use super::{ImageReference, ManifestStore};
use crate::config::RegistryConfig;

/// Limits applied to one probing run.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Concurrent store requests
    pub max_parallel: usize,
    /// Deadline shared by the whole run
    pub timeout: Duration,
    /// References reported as existing without a lookup
    pub placeholder_refs: Vec<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from(&RegistryConfig::default())
    }
}

impl From<&RegistryConfig> for ProbeSettings {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            max_parallel: config.max_parallel.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
            placeholder_refs: config.placeholder_refs.clone(),
        }
    }
}

/// Check every image against `store`, returning `image -> exists`.
///
/// Each image gets its own task; tasks wait for one of `max_parallel` permits
/// and give up with `false` once the shared deadline passes. Unparseable
/// references and store errors also record `false`.
pub async fn check_images_exist(
    store: Arc<dyn ManifestStore>,
    images: &[String],
    settings: &ProbeSettings,
) -> HashMap<String, bool> {
    let results = Arc::new(Mutex::new(HashMap::with_capacity(images.len())));
    let semaphore = Arc::new(Semaphore::new(settings.max_parallel.max(1)));
    let deadline = Instant::now() + settings.timeout;

    let mut tasks = Vec::new();
    for image in images {
        if results.lock().contains_key(image) {
            continue;
        }
        if settings.placeholder_refs.iter().any(|p| p == image) {
            log::debug!("Treating placeholder image '{}' as present", image);
            results.lock().insert(image.clone(), true);
            continue;
        }
        // Reserve the slot so duplicates are not probed twice
        results.lock().insert(image.clone(), false);

        let store = Arc::clone(&store);
        let semaphore = Arc::clone(&semaphore);
        let results = Arc::clone(&results);
        let image = image.clone();
        tasks.push(tokio::spawn(async move {
            let exists = match timeout_at(deadline, probe(store.as_ref(), &semaphore, &image)).await {
                Ok(exists) => exists,
                Err(_) => {
                    log::warn!("Timed out checking image {}", image);
                    false
                }
            };
            results.lock().insert(image, exists);
        }));
    }

    for joined in join_all(tasks).await {
        if let Err(e) = joined {
            log::warn!("Image check task failed: {}", e);
        }
    }

    let results = results.lock().clone();
    results
}

async fn probe(store: &dyn ManifestStore, semaphore: &Semaphore, image: &str) -> bool {
    let reference = match ImageReference::parse(image) {
        Ok(reference) => reference,
        Err(e) => {
            log::warn!("{}", e);
            return false;
        }
    };
    let Ok(_permit) = semaphore.acquire().await else {
        return false;
    };

    match store.head_manifest(&reference).await {
        Ok(()) => true,
        Err(head_err) => {
            log::debug!("HEAD {} failed ({}), trying GET", reference, head_err);
            match store.get_manifest(&reference).await {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("Image {} not available: {}", reference, e);
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store; `head_works == false` forces the GET fallback.
    struct FakeStore {
        existing: HashSet<String>,
        head_works: bool,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeStore {
        fn new(existing: &[&str]) -> Self {
            Self {
                existing: existing.iter().map(|s| s.to_string()).collect(),
                head_works: true,
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        async fn lookup(&self, image: &ImageReference) -> Result<(), RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let key = format!("{}:{}", image.repository, image.reference);
            if self.existing.contains(&key) {
                Ok(())
            } else {
                Err(RegistryError::NotFound(image.to_string()))
            }
        }
    }

    #[async_trait]
    impl ManifestStore for FakeStore {
        async fn head_manifest(&self, image: &ImageReference) -> Result<(), RegistryError> {
            if !self.head_works {
                return Err(RegistryError::Status {
                    status: 405,
                    url: image.to_string(),
                });
            }
            self.lookup(image).await
        }

        async fn get_manifest(&self, image: &ImageReference) -> Result<(), RegistryError> {
            self.lookup(image).await
        }
    }

    fn images(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_existing_missing_and_placeholder() {
        let store = Arc::new(FakeStore::new(&["library/nginx:1.25"]));
        let results = check_images_exist(
            store.clone(),
            &images(&["nginx:1.25", "nginx:9.9", "auto", "Not A Ref"]),
            &ProbeSettings::default(),
        )
        .await;

        assert_eq!(results.len(), 4);
        assert!(results["nginx:1.25"]);
        assert!(!results["nginx:9.9"]);
        assert!(results["auto"]);
        assert!(!results["Not A Ref"]);
        // HEAD succeeds for the first, HEAD then GET for the missing one
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_get_fallback_when_head_fails() {
        let mut store = FakeStore::new(&["team/app:1.0"]);
        store.head_works = false;
        let results = check_images_exist(
            Arc::new(store),
            &images(&["registry.example.com/team/app:1.0"]),
            &ProbeSettings::default(),
        )
        .await;
        assert!(results["registry.example.com/team/app:1.0"]);
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let mut store = FakeStore::new(&[]);
        store.delay = Duration::from_millis(20);
        let store = Arc::new(store);
        let list: Vec<String> = (0..12).map(|i| format!("app{}:1", i)).collect();
        let settings = ProbeSettings {
            max_parallel: 3,
            ..Default::default()
        };

        let results = check_images_exist(store.clone(), &list, &settings).await;
        assert_eq!(results.len(), 12);
        assert!(store.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_deadline_records_false() {
        let mut store = FakeStore::new(&["library/slow:1"]);
        store.delay = Duration::from_secs(5);
        let settings = ProbeSettings {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };

        let started = std::time::Instant::now();
        let results = check_images_exist(Arc::new(store), &images(&["slow:1"]), &settings).await;
        assert!(!results["slow:1"]);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_deadline_covers_images_waiting_for_a_permit() {
        let mut store = FakeStore::new(&["library/slow:1", "library/slow:2"]);
        store.delay = Duration::from_secs(5);
        let store = Arc::new(store);
        let settings = ProbeSettings {
            max_parallel: 1,
            timeout: Duration::from_millis(100),
            ..Default::default()
        };

        let started = std::time::Instant::now();
        let results = check_images_exist(store.clone(), &images(&["slow:1", "slow:2"]), &settings).await;
        assert!(!results["slow:1"]);
        assert!(!results["slow:2"]);
        assert!(started.elapsed() < Duration::from_secs(2));
        // The second image never got past the semaphore
        assert!(store.calls.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test]
    async fn test_duplicates_probed_once() {
        let store = Arc::new(FakeStore::new(&["library/redis:7"]));
        let results = check_images_exist(
            store.clone(),
            &images(&["redis:7", "redis:7"]),
            &ProbeSettings::default(),
        )
        .await;
        assert_eq!(results.len(), 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
