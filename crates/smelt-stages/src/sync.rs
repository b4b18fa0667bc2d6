//! Bulk-copy collaborator boundary
//!
//! The payload copy itself is an external concern; this module models its
//! boundary: a pollable progress state while the copy is in flight, a
//! progress monitor whose lifetime is tied to the copy call through
//! explicit cancellation, and the post-copy persistence of a fetched setup
//! file under the target tree.

use async_trait::async_trait;
use camino::Utf8Path;
use smelt_core::{Result, SourceFetcher, SourceReference};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Snapshot of an in-flight copy's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CopyProgress {
    pub percent: f64,
    pub remaining: u64,
    pub total: u64,
}

/// A long-running file-tree copy exposing progress while in flight.
#[async_trait]
pub trait FileSyncer: Send + Sync {
    /// Snapshot of the current progress
    fn progress(&self) -> CopyProgress;

    /// Run the copy to completion
    async fn run(&self) -> Result<()>;
}

/// Run a bulk copy, logging its progress roughly once per second.
///
/// The monitor task is bound to the copy's lifetime: it is cancelled as
/// soon as the copy returns (success or failure) and awaited before this
/// function does, so it can never outlive the operation.
pub async fn copy_with_progress(syncer: Arc<dyn FileSyncer>) -> Result<()> {
    let token = CancellationToken::new();

    let monitor = {
        let token = token.clone();
        let syncer = Arc::clone(&syncer);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // the first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let progress = syncer.progress();
                        info!(
                            "progress: {:.2} / rem. {} / tot. {}",
                            progress.percent, progress.remaining, progress.total
                        );
                    }
                }
            }
        })
    };

    let result = syncer.run().await;
    token.cancel();
    if monitor.await.is_err() {
        debug!("progress monitor aborted");
    }

    result
}

/// Fetch a setup source and persist it under the target tree with
/// restrictive permissions. Returns the number of bytes written.
pub async fn install_setup_file(
    fetcher: &SourceFetcher,
    uri: &str,
    destination: &Utf8Path,
) -> Result<u64> {
    let reference = SourceReference::parse(uri);
    info!("Installing {} to {}", uri, destination);
    let bytes = fetcher.fetch(&reference).await?;

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(destination, &bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(destination, perms).await?;
    }

    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use smelt_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeSyncer {
        polls: AtomicUsize,
        duration: Duration,
        fail: bool,
    }

    impl FakeSyncer {
        fn new(duration: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                polls: AtomicUsize::new(0),
                duration,
                fail,
            })
        }
    }

    #[async_trait]
    impl FileSyncer for FakeSyncer {
        fn progress(&self) -> CopyProgress {
            self.polls.fetch_add(1, Ordering::SeqCst);
            CopyProgress {
                percent: 50.0,
                remaining: 1,
                total: 2,
            }
        }

        async fn run(&self) -> Result<()> {
            tokio::time::sleep(self.duration).await;
            if self.fail {
                Err(Error::invalid_config("copy failed"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_polls_and_stops_with_copy() {
        let syncer = FakeSyncer::new(Duration::from_secs(3), false);

        copy_with_progress(syncer.clone() as Arc<dyn FileSyncer>)
            .await
            .unwrap();

        let polls = syncer.polls.load(Ordering::SeqCst);
        assert!(polls >= 2, "expected progress polls, got {}", polls);

        // The monitor was joined before copy_with_progress returned;
        // advancing time further must not produce more polls.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(syncer.polls.load(Ordering::SeqCst), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_stops_when_copy_fails() {
        let syncer = FakeSyncer::new(Duration::from_secs(2), true);

        let result = copy_with_progress(syncer.clone() as Arc<dyn FileSyncer>).await;
        assert!(result.is_err());

        let polls = syncer.polls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(syncer.polls.load(Ordering::SeqCst), polls);
    }

    #[tokio::test]
    async fn test_install_setup_file_writes_restrictive_permissions() {
        let source_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();

        let source = source_dir.path().join("custom.yaml");
        std::fs::write(&source, "stages: {}").unwrap();

        let destination =
            Utf8PathBuf::from_path_buf(target_dir.path().join("oem/99_custom.yaml"))
                .expect("Invalid UTF-8 path");

        let fetcher = SourceFetcher::new();
        let written = install_setup_file(&fetcher, source.to_str().unwrap(), &destination)
            .await
            .unwrap();

        assert_eq!(written, "stages: {}".len() as u64);
        assert_eq!(
            std::fs::read_to_string(&destination).unwrap(),
            "stages: {}"
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&destination)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
