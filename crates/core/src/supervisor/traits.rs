//! Supervised component abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

/// A long-lived part of the daemon the supervisor keeps alive.
#[async_trait]
pub trait ManagedComponent: Send + Sync {
    fn name(&self) -> &str;

    async fn is_alive(&self) -> bool;

    /// Bring the component back. Called only when it is not alive.
    async fn restart(&self) -> anyhow::Result<()>;
}

type TaskFactory = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A background tokio task, respawned from its factory on restart.
pub struct SpawnedComponent {
    name: String,
    factory: TaskFactory,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SpawnedComponent {
    /// Spawn the task immediately.
    pub fn spawn<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let factory: TaskFactory = Arc::new(factory);
        let handle = tokio::spawn(factory());
        Self {
            name: name.into(),
            factory,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Abort the running task, if any.
    pub async fn abort(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl ManagedComponent for SpawnedComponent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_alive(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    async fn restart(&self) -> anyhow::Result<()> {
        let mut handle = self.handle.lock().await;
        if let Some(old) = handle.take() {
            old.abort();
        }
        *handle = Some(tokio::spawn((self.factory)()));
        info!(component = %self.name, "Respawned component task");
        Ok(())
    }
}
