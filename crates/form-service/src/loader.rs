//! Process-wide lazy initialisation shared by concurrent callers.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::OnceCell;

/// Runs an async initialiser at most once to completion. The first caller
/// triggers the load and every concurrent caller awaits the same result. A
/// failed load is not cached, so the next caller tries again.
#[derive(Debug, Default)]
pub struct SharedLoader<T> {
    cell: OnceCell<T>,
    attempts: AtomicUsize,
}

impl<T> SharedLoader<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// A loader that is already initialised with `value`.
    pub fn ready(value: T) -> Self {
        Self {
            cell: OnceCell::new_with(Some(value)),
            attempts: AtomicUsize::new(0),
        }
    }

    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell
            .get_or_try_init(|| {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                load()
            })
            .await
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    /// How many times an initialiser has been started.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let loader = Arc::new(SharedLoader::<u32>::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let loader = Arc::clone(&loader);
            handles.push(tokio::spawn(async move {
                *loader
                    .get_or_load(|| async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(7)
                    })
                    .await
                    .expect("load")
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join"), 7);
        }
        assert_eq!(loader.attempts(), 1);
        assert!(loader.is_ready());
    }

    #[tokio::test]
    async fn ready_loader_skips_the_initialiser() {
        let loader = SharedLoader::ready(5_u32);
        let value = loader
            .get_or_load(|| async { Ok::<_, String>(9) })
            .await
            .expect("value");
        assert_eq!(*value, 5);
        assert_eq!(loader.attempts(), 0);
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let loader = SharedLoader::<u32>::new();
        let err = loader
            .get_or_load(|| async { Err::<u32, _>("offline") })
            .await
            .expect_err("first load fails");
        assert_eq!(err, "offline");
        assert!(loader.get().is_none());

        let value = loader
            .get_or_load(|| async { Ok::<_, &str>(3) })
            .await
            .expect("second load");
        assert_eq!(*value, 3);
        assert_eq!(loader.attempts(), 2);
    }
}
