use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per model name, serializing writes to the same artifact.
///
/// Entries nobody holds or waits on are pruned on the next acquisition.
#[derive(Default)]
pub struct NameLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        self.entry(name).lock_owned().await
    }

    fn entry(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_name_is_exclusive() {
        let locks = NameLocks::new();
        let guard = locks.acquire("resnet").await;

        assert!(locks.entry("resnet").try_lock().is_err());
        assert!(locks.entry("bert").try_lock().is_ok());

        drop(guard);
        assert!(locks.entry("resnet").try_lock().is_ok());
    }

    #[tokio::test]
    async fn released_names_are_pruned() {
        let locks = NameLocks::new();
        {
            let _a = locks.acquire("a").await;
            let _b = locks.acquire("b").await;
            assert_eq!(locks.tracked(), 2);
        }

        let _c = locks.acquire("c").await;
        assert_eq!(locks.tracked(), 1);
    }
}
