//! Path registry: the single authority for active API paths.
//!
//! Maps normalized API paths to the active deployment serving them.
//! Reads (`resolve`) are lock-free through `DashMap`; every mutation is
//! serialized by one async mutex so claim-then-persist sequences in the
//! publisher cannot interleave.

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Thread-safe registry of active API paths.
pub struct PathRegistry {
    /// Path -> deployment id.
    paths: DashMap<String, Uuid>,
    write: Mutex<()>,
}

/// Exclusive access to registry mutations, held across the storage write
/// that makes a claim or release durable.
pub struct PathLease<'a> {
    registry: &'a PathRegistry,
    _guard: MutexGuard<'a, ()>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self {
            paths: DashMap::new(),
            write: Mutex::new(()),
        }
    }

    /// The deployment actively serving `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<Uuid> {
        self.paths.get(&normalize_path(path)).map(|r| *r.value())
    }

    /// Acquire the mutation lock.
    pub async fn lease(&self) -> PathLease<'_> {
        PathLease {
            registry: self,
            _guard: self.write.lock().await,
        }
    }
}

impl Default for PathRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PathLease<'_> {
    /// Bind `path` to `deployment_id`.
    ///
    /// Re-claiming a path already held by the same deployment succeeds.
    /// Returns the current holder when another deployment has it.
    pub fn claim(&self, path: &str, deployment_id: Uuid) -> Result<(), Uuid> {
        let normalized = normalize_path(path);
        match self.registry.paths.get(&normalized).map(|r| *r.value()) {
            Some(holder) if holder != deployment_id => Err(holder),
            _ => {
                self.registry.paths.insert(normalized, deployment_id);
                Ok(())
            }
        }
    }

    /// Free `path` if `deployment_id` holds it. Returns whether it did.
    pub fn release(&self, path: &str, deployment_id: Uuid) -> bool {
        self.registry
            .paths
            .remove_if(&normalize_path(path), |_, holder| *holder == deployment_id)
            .is_some()
    }
}

/// Paths served by the management API and health check. A deployment bound
/// to one of these would never be reached through the fallback route.
const RESERVED_PREFIXES: &[&str] = &["/api/v1", "/health"];

/// Whether a normalized path is the root or falls under a reserved prefix.
pub fn is_reserved(path: &str) -> bool {
    path == "/"
        || RESERVED_PREFIXES.iter().any(|prefix| {
            path == *prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
}

/// Normalize a path: leading `/`, no trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("api/execute/loan/"), "/api/execute/loan");
        assert_eq!(normalize_path("/api/execute/loan"), "/api/execute/loan");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_reserved_paths() {
        assert!(is_reserved("/"));
        assert!(is_reserved("/health"));
        assert!(is_reserved("/api/v1"));
        assert!(is_reserved("/api/v1/workflows"));
        assert!(!is_reserved("/api/v10/loan"));
        assert!(!is_reserved("/healthcheck"));
        assert!(!is_reserved("/api/execute/loan"));
    }

    #[tokio::test]
    async fn test_claim_conflict_returns_holder() {
        let registry = PathRegistry::new();
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();

        let lease = registry.lease().await;
        assert!(lease.claim("/api/execute/loan", first).is_ok());
        assert!(lease.claim("/api/execute/loan/", first).is_ok());
        assert_eq!(lease.claim("/api/execute/loan", second), Err(first));
        drop(lease);

        assert_eq!(registry.resolve("api/execute/loan"), Some(first));
    }

    #[tokio::test]
    async fn test_release_only_by_holder() {
        let registry = PathRegistry::new();
        let other = Uuid::now_v7();

        let lease = registry.lease().await;
        assert!(lease.claim("/a", Uuid::nil()).is_ok());
        assert!(!lease.release("/a", other));
        assert!(lease.release("/a", Uuid::nil()));
        assert!(lease.claim("/a", other).is_ok());
        drop(lease);

        assert_eq!(registry.resolve("/a"), Some(other));
    }
}
