//! Engine fan-out and lifecycle.
//!
//! One task per engine, all watching the same shutdown channel. The
//! supervisor returns once every engine has observed cancellation and
//! exited; it never aborts a task.

use tokio::sync::watch;
use tracing::{error, info};

use crate::engine::Engine;

/// Run all engines to completion.
pub async fn run(engines: Vec<Box<dyn Engine>>, shutdown: watch::Receiver<bool>) {
    let mut handles = Vec::with_capacity(engines.len());

    for mut engine in engines {
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            let interface = engine.interface_name().to_string();
            if let Err(err) = engine.run(shutdown).await {
                error!(interface = %interface, error = %err, "interface engine failed");
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    info!("all interface engines stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct WaitingEngine {
        name: String,
        stopped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Engine for WaitingEngine {
        fn interface_name(&self) -> &str {
            &self.name
        }

        async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
            loop {
                if shutdown.changed().await.is_err() || *shutdown.borrow() {
                    self.stopped.fetch_add(1, Ordering::SeqCst);
                    return Ok(());
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_fans_out_to_all_engines() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let engines: Vec<Box<dyn Engine>> = (0..3)
            .map(|i| {
                Box::new(WaitingEngine {
                    name: format!("eth{}", i),
                    stopped: stopped.clone(),
                }) as Box<dyn Engine>
            })
            .collect();

        let (tx, rx) = watch::channel(false);
        let supervisor = tokio::spawn(run(engines, rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(60), supervisor)
            .await
            .expect("supervisor did not stop")
            .unwrap();

        assert_eq!(stopped.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_engines_returns_immediately() {
        let (_tx, rx) = watch::channel(false);
        run(Vec::new(), rx).await;
    }
}
