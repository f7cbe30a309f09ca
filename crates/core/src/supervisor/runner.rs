//! Self-healing supervisor.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::metrics;

use super::config::SupervisorConfig;
use super::traits::ManagedComponent;
use super::types::{ComponentHealth, ComponentPhase};

/// Shared view of component health, readable without touching the supervisor.
pub type HealthHandle = Arc<RwLock<BTreeMap<String, ComponentHealth>>>;

/// Periodically checks components and restarts dead ones, within a
/// per-component restart budget.
pub struct Supervisor {
    config: SupervisorConfig,
    components: Vec<Arc<dyn ManagedComponent>>,
    health: HealthHandle,
    /// Recent restart instants per component, oldest first.
    restarts: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            components: Vec::new(),
            health: Arc::new(RwLock::new(BTreeMap::new())),
            restarts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_component(mut self, component: Arc<dyn ManagedComponent>) -> Self {
        let name = component.name().to_string();
        // The handle is not shared yet, so this never contends.
        if let Ok(mut health) = self.health.try_write() {
            health.insert(name.clone(), ComponentHealth::new(name));
        }
        self.components.push(component);
        self
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn health_handle(&self) -> HealthHandle {
        Arc::clone(&self.health)
    }

    /// Health of every component, sorted by name.
    pub async fn snapshot(&self) -> Vec<ComponentHealth> {
        self.health.read().await.values().cloned().collect()
    }

    /// Check every component once, restarting the dead ones.
    pub async fn check_once(&self) {
        for component in &self.components {
            self.check_component(component.as_ref()).await;
        }
    }

    async fn check_component(&self, component: &dyn ManagedComponent) {
        let name = component.name().to_string();
        let previous = self.phase_of(&name).await;

        if component.is_alive().await {
            if previous != ComponentPhase::Alive {
                info!(component = %name, "Component is alive again");
            }
            self.update(&name, |h| {
                h.phase = ComponentPhase::Alive;
                h.message = None;
            })
            .await;
            return;
        }

        let now = Instant::now();
        let window = self.config.restart_window();
        let (recent, last) = {
            let mut restarts = self.restarts.lock().await;
            let history = restarts.entry(name.clone()).or_default();
            while history
                .front()
                .is_some_and(|t| now.duration_since(*t) >= window)
            {
                history.pop_front();
            }
            (history.len(), history.back().copied())
        };

        if recent >= self.config.max_restarts {
            metrics::RESTARTS_SUPPRESSED.inc();
            if previous != ComponentPhase::Backoff {
                error!(
                    component = %name,
                    restarts = recent,
                    window_secs = window.as_secs(),
                    "Restart budget exhausted, backing off"
                );
            }
            self.update(&name, |h| {
                h.phase = ComponentPhase::Backoff;
                h.message = Some(format!(
                    "{recent} restarts within {}s, waiting for the window to drain",
                    window.as_secs()
                ));
            })
            .await;
            return;
        }

        if let Some(last) = last {
            if now.duration_since(last) < self.config.backoff() {
                debug!(component = %name, "Component down, restart deferred by backoff");
                self.update(&name, |h| {
                    h.phase = ComponentPhase::Restarting;
                    h.message = Some("waiting before next restart".to_string());
                })
                .await;
                return;
            }
        }

        warn!(component = %name, "Component is down, restarting");
        self.update(&name, |h| {
            h.phase = ComponentPhase::Restarting;
            h.message = None;
        })
        .await;

        let result = component.restart().await;
        self.restarts
            .lock()
            .await
            .entry(name.clone())
            .or_default()
            .push_back(Instant::now());
        metrics::COMPONENT_RESTARTS
            .with_label_values(&[name.as_str()])
            .inc();

        match result {
            Ok(()) => {
                info!(component = %name, "Component restarted");
                self.update(&name, |h| {
                    h.phase = ComponentPhase::Alive;
                    h.restart_count += 1;
                    h.last_restart = Some(Utc::now());
                    h.message = None;
                })
                .await;
            }
            Err(e) => {
                error!(component = %name, error = %e, "Component restart failed");
                self.update(&name, |h| {
                    h.restart_count += 1;
                    h.last_restart = Some(Utc::now());
                    h.message = Some(format!("restart failed: {e}"));
                })
                .await;
            }
        }
    }

    async fn phase_of(&self, name: &str) -> ComponentPhase {
        self.health
            .read()
            .await
            .get(name)
            .map(|h| h.phase)
            .unwrap_or(ComponentPhase::Alive)
    }

    async fn update(&self, name: &str, f: impl FnOnce(&mut ComponentHealth)) {
        let mut health = self.health.write().await;
        let entry = health
            .entry(name.to_string())
            .or_insert_with(|| ComponentHealth::new(name));
        f(entry);
    }

    /// Run [`check_once`](Self::check_once) every check interval until shutdown.
    pub fn spawn(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                components = self.components.len(),
                interval_secs = self.config.check_interval_secs,
                "Supervisor started"
            );
            let mut ticker = tokio::time::interval(self.config.check_interval());
            // The first tick completes immediately; components were just started.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.check_once().await,
                    _ = shutdown.recv() => {
                        info!("Supervisor shutting down");
                        break;
                    }
                }
            }
        })
    }
}
