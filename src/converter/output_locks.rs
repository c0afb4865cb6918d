//! # Output Locks Module
//!
//! Mutua esclusione per path di output tra job concorrenti: due job non
//! scrivono mai lo stesso file nello stesso momento (es. `clip.mov` e
//! `clip.mp4` condividono `clip_proxy.mp4`). I lock vengono presi in ordine
//! ordinato per evitare deadlock e rilasciati al drop del guard.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<PathBuf, Arc<AsyncMutex<()>>>;

/// Registry of one async mutex per output path in use
#[derive(Default)]
pub struct OutputLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Held while a job checks and writes its outputs
pub struct OutputGuard {
    guards: Vec<OwnedMutexGuard<()>>,
    paths: Vec<PathBuf>,
    locks: Arc<Mutex<LockMap>>,
}

impl OutputLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every path in `paths`, waiting for other jobs holding any of them
    pub async fn acquire(&self, paths: &[&Path]) -> OutputGuard {
        let mut sorted: Vec<PathBuf> = paths.iter().map(|p| p.to_path_buf()).collect();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for path in &sorted {
            let lock = self.lock_for(path);
            guards.push(lock.lock_owned().await);
        }

        OutputGuard {
            guards,
            paths: sorted,
            locks: self.locks.clone(),
        }
    }

    fn lock_for(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = lock_map(&self.locks);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked_paths(&self) -> usize {
        lock_map(&self.locks).len()
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        // Release first so the map holds the only reference to idle locks.
        self.guards.clear();

        let mut locks = lock_map(&self.locks);
        for path in &self.paths {
            if locks.get(path).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(path);
            }
        }
    }
}

fn lock_map(locks: &Mutex<LockMap>) -> std::sync::MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_path_is_exclusive() {
        let locks = Arc::new(OutputLocks::new());
        let guard = locks.acquire(&[Path::new("/f/clip_proxy.mp4")]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&[Path::new("/f/clip_proxy.mp4")]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_paths_do_not_block() {
        let locks = OutputLocks::new();
        let _a = locks.acquire(&[Path::new("/f/a_prores.mov")]).await;
        let b = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(&[Path::new("/f/b_prores.mov")]),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_paths_are_forgotten() {
        let locks = Arc::new(OutputLocks::new());
        let guard = locks
            .acquire(&[Path::new("/f/a_prores.mov"), Path::new("/f/a_proxy.mp4")])
            .await;
        assert_eq!(locks.tracked_paths(), 2);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&[Path::new("/f/a_proxy.mp4")]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The proxy lock is still wanted by the waiter.
        drop(guard);
        waiter.await.unwrap();
        assert_eq!(locks.tracked_paths(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_paths_in_one_request() {
        let locks = OutputLocks::new();
        let p = Path::new("/f/clip_prores.mov");
        let guard = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&[p, p])).await;
        assert!(guard.is_ok());
    }
}
