// src/engine/pool.rs
//
// Global thread pool for batch corruption.
//
// One lazily-built rayon pool is shared by every batch run. Its size comes
// from CRUNGE_THREADS when set, otherwise from available_parallelism().
// The size is fixed at first use; later changes to the variable are ignored.

use rayon::ThreadPool;
use std::sync::OnceLock;
use tracing::warn;

const ENV_THREADS: &str = "CRUNGE_THREADS";

/// Upper bound accepted from CRUNGE_THREADS.
pub const MAX_THREADS: usize = 1024;

/// Minimum number of rayon threads to ensure at least some parallelism
const MIN_RAYON_THREADS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// Thread count from an optional override, falling back to the CPU count.
fn resolve_threads(raw: Option<&str>) -> usize {
    let detected = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_RAYON_THREADS);

    match raw.map(|r| r.trim().parse::<usize>()) {
        Some(Ok(n)) if (MIN_RAYON_THREADS..=MAX_THREADS).contains(&n) => n,
        Some(_) => {
            warn!(
                target: "crunge::batch",
                value = raw.unwrap_or_default(),
                fallback = detected,
                "ignoring invalid {ENV_THREADS}"
            );
            detected
        }
        None => detected,
    }
}

pub fn configured_threads() -> usize {
    resolve_threads(std::env::var(ENV_THREADS).ok().as_deref())
}

/// The shared pool, or `None` if rayon could not start any threads; callers
/// then run sequentially on the current thread.
pub fn get_pool() -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let threads = configured_threads();
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("crunge-{i}"))
                .build()
                .or_else(|e| {
                    warn!(
                        target: "crunge::batch",
                        threads,
                        error = %e,
                        "falling back to a single worker"
                    );
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(MIN_RAYON_THREADS)
                        .build()
                })
                .ok()
        })
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_when_valid() {
        assert_eq!(resolve_threads(Some("3")), 3);
        assert_eq!(resolve_threads(Some(" 1 ")), 1);
    }

    #[test]
    fn invalid_override_falls_back() {
        let detected = resolve_threads(None);
        assert!(detected >= 1);
        assert_eq!(resolve_threads(Some("0")), detected);
        assert_eq!(resolve_threads(Some("many")), detected);
        assert_eq!(resolve_threads(Some("4096")), detected);
    }

    #[test]
    fn pool_is_shared() {
        let a = get_pool().map(|p| p as *const ThreadPool);
        let b = get_pool().map(|p| p as *const ThreadPool);
        assert_eq!(a, b);
        assert!(a.is_some());
    }
}
