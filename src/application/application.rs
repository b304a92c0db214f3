use std::path::Path;
use std::time::Duration;

use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::RuntimeConfig;
use crate::cli::Command;
use crate::config::{ConfigError, SyncConfig};
use crate::ext::BestEffortPathExt;
use crate::render::render_snapshot;
use crate::services::{LocalWatchRegistry, WatchRegistry};
use crate::sync::{SessionError, SyncSession};
use crate::transport::{self, TransportError};

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        let config = SyncConfig::read(&app_config.root)
            .await
            .context(ConfigSnafu)?;
        debug!("Loaded config: {:?}", config);

        match app_config.command {
            Command::Replay { file } => Self::replay(&file).await,
            Command::Follow {
                endpoint,
                retries,
                retry_delay_ms,
            } => {
                let endpoint = endpoint
                    .or(config.endpoint)
                    .context(MissingEndpointSnafu)?;
                Self::follow(&endpoint, retries, Duration::from_millis(retry_delay_ms)).await
            }
            Command::WatchCheck => Self::watch_check(&config).await,
        }
    }

    async fn replay(file: &Path) -> Result<(), ApplicationError> {
        let frames = transport::read_recording(file)
            .await
            .context(TransportSnafu)?;

        let session = SyncSession::new();
        match session.run(frames).await {
            Ok(()) | Err(SessionError::StreamEnded) => {}
            Err(source) => return Err(ApplicationError::ReplayError { source }),
        }

        let snapshot = session.current_snapshot();
        info!(
            "Replayed {}: {} nodes, fingerprint {:016x}",
            file.best_effort_path_display(),
            snapshot.node_count(),
            snapshot.fingerprint()
        );
        print!("{}", render_snapshot(&snapshot));
        Ok(())
    }

    /// Consumes the producer until the session is closed, reconnecting after
    /// every interruption. A fresh connection starts with a full snapshot, so
    /// no local state has to be reconciled.
    async fn follow(endpoint: &str, retries: u32, delay: Duration) -> Result<(), ApplicationError> {
        let session = SyncSession::new();
        let _printer = session.subscribe(|snapshot| {
            debug!("Tree fingerprint {:016x}", snapshot.fingerprint());
            println!("{}", render_snapshot(snapshot));
        });

        let mut failures = 0;
        loop {
            match transport::connect(endpoint).await {
                Ok(frames) => {
                    failures = 0;
                    match session.run(frames).await {
                        Ok(()) => return Ok(()),
                        Err(error) => warn!("Lost connection to {}: {}", endpoint, error),
                    }
                }
                Err(error) => warn!("{}", error),
            }

            failures += 1;
            ensure!(
                failures <= retries,
                ReconnectExhaustedSnafu {
                    endpoint,
                    attempts: failures
                }
            );
            info!("Reconnecting to {} in {:?} ({}/{})", endpoint, delay, failures, retries);
            compio::time::sleep(delay).await;
        }
    }

    async fn watch_check(config: &SyncConfig) -> Result<(), ApplicationError> {
        if config.watch.is_empty() {
            println!("No watch paths configured");
            return Ok(());
        }

        let registry = LocalWatchRegistry::new();
        let mut rejected: usize = 0;
        for path in &config.watch {
            if let Err(error) = registry.add_watch_path(path).await {
                println!("rejected  {path}: {error}");
                rejected += 1;
            }
        }
        for root in registry.watch_paths().await {
            println!("watching  {root}");
        }

        ensure!(rejected == 0, WatchPathsRejectedSnafu { count: rejected });
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ConfigError { source: ConfigError },
    #[snafu(display("No endpoint given on the command line or in the config file"))]
    MissingEndpoint,
    #[snafu(display("Failed to open the inbound stream"))]
    TransportError { source: TransportError },
    #[snafu(display("Recorded stream could not be replayed"))]
    ReplayError { source: SessionError },
    #[snafu(display("Gave up on {} after {} failed attempts", endpoint, attempts))]
    ReconnectExhausted { endpoint: String, attempts: u32 },
    #[snafu(display("{} watch path(s) rejected", count))]
    WatchPathsRejected { count: usize },
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;
    use crate::application::RuntimeConfig;

    fn runtime(command: Command, root: &Path) -> RuntimeConfig {
        RuntimeConfig {
            command,
            root: root.to_path_buf(),
        }
    }

    #[compio::test]
    async fn replay_succeeds_on_recorded_stream() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let mut recording = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(
            recording,
            r#"{{"type":"tree","tree":[{{"name":"a","path":"a","type":"directory","children":[]}}]}}"#
        )
        .expect("Failed to write recording");
        writeln!(
            recording,
            r#"{{"type":"file-changed","action":"created","path":"a/b.txt","node":{{"name":"b.txt","path":"a/b.txt","type":"file"}}}}"#
        )
        .expect("Failed to write recording");
        writeln!(recording, "not json").expect("Failed to write recording");

        let command = Command::Replay {
            file: recording.path().to_path_buf(),
        };
        Application::run(runtime(command, root.path())).await.unwrap();
    }

    #[compio::test]
    async fn replay_survives_lines_that_are_not_utf8() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let mut recording = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(recording, r#"{{"type":"tree","tree":[{{"name":"a","type":"directory"}}]}}"#)
            .expect("Failed to write recording");
        recording
            .write_all(&[0xff, 0xfe, b'\n'])
            .expect("Failed to write recording");
        writeln!(
            recording,
            r#"{{"type":"file-changed","action":"created","path":"a/b.txt","node":{{"name":"b.txt","type":"file"}}}}"#
        )
        .expect("Failed to write recording");

        let command = Command::Replay {
            file: recording.path().to_path_buf(),
        };
        Application::run(runtime(command, root.path())).await.unwrap();
    }

    #[compio::test]
    async fn replay_fails_on_missing_recording() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let command = Command::Replay {
            file: root.path().join("missing.jsonl"),
        };

        let result = Application::run(runtime(command, root.path())).await;
        assert!(matches!(result, Err(ApplicationError::TransportError { .. })));
    }

    #[compio::test]
    async fn follow_requires_an_endpoint() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let command = Command::Follow {
            endpoint: None,
            retries: 0,
            retry_delay_ms: 0,
        };

        let result = Application::run(runtime(command, root.path())).await;
        assert!(matches!(result, Err(ApplicationError::MissingEndpoint)));
    }

    #[compio::test]
    async fn follow_gives_up_after_retries() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        drop(listener);

        let command = Command::Follow {
            endpoint: Some(endpoint),
            retries: 1,
            retry_delay_ms: 1,
        };

        let result = Application::run(runtime(command, root.path())).await;
        assert!(matches!(
            result,
            Err(ApplicationError::ReconnectExhausted { attempts: 2, .. })
        ));
    }

    #[compio::test]
    async fn watch_check_reports_rejected_paths() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let watched = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(
            root.path().join("tree-sync.yaml"),
            format!(
                "watch:\n  - {}\n  - /this/path/does/not/exist\n",
                watched.path().display()
            ),
        )
        .expect("Failed to write config file");

        let result = Application::run(runtime(Command::WatchCheck, root.path())).await;
        assert!(matches!(
            result,
            Err(ApplicationError::WatchPathsRejected { count: 1 })
        ));
    }

    #[compio::test]
    async fn watch_check_accepts_empty_config() {
        let root = TempDir::new().expect("Failed to create temp directory");
        Application::run(runtime(Command::WatchCheck, root.path()))
            .await
            .unwrap();
    }
}
