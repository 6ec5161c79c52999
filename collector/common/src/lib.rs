use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vulnwatch_model::RawRecord;

/// Cooperative cancellation flag shared between an orchestrated run and its
/// source adapters. Checked at target granularity; an in-flight request
/// always completes.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// What a single adapter run produced: the raw records it fetched and the
/// number of targets it had to skip.
#[derive(Debug, Default)]
pub struct Fetched {
    pub records: Vec<RawRecord>,
    pub errors: usize,
}

/// A source of raw vulnerability records.
///
/// One fetch issues one network request per configured target,
/// sequentially, pausing between requests to respect the upstream rate
/// limit. A failing target is logged, counted and skipped; it never aborts
/// the rest of the run.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, cancel: &CancelFlag) -> Fetched;
}

/// Run `operation` up to `attempts` times, doubling `delay` after each
/// failed attempt. The last error is returned once the attempts are
/// exhausted.
pub async fn with_retries<T, F, Fut>(
    what: &str,
    attempts: u32,
    mut delay: Duration,
    operation: F,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, anyhow::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                log::warn!("{what} failed (attempt {attempt}/{attempts}): {e}");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test]
    async fn retries_until_success() -> Result<(), anyhow::Error> {
        let calls = AtomicUsize::new(0);
        let value = with_retries("flaky", 3, Duration::from_millis(1), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(anyhow::anyhow!("boom"))
            } else {
                Ok(42)
            }
        })
        .await?;

        assert_eq!(42, value);
        assert_eq!(3, calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn gives_up_after_last_attempt() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_retries("hopeless", 3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("boom"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(3, calls.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
