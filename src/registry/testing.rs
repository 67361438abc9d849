//! A scripted provider client for exercising the registry without a network.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::providers::{
    providers::ProviderIdentifier, Error, ErrorKind, GenerationOptions, ModelDescriptor,
    ProviderClient,
};

#[derive(Debug, Clone)]
pub(crate) enum Behaviour {
    Serve(Vec<String>),
    /// Serves the models after sleeping.
    Delay(Duration, Vec<String>),
    Fail(ErrorKind),
    Hang,
    Panic,
}

pub(crate) struct MockProvider {
    id: ProviderIdentifier,
    behaviour: Mutex<Behaviour>,
    healthy: bool,
    default_model: Option<String>,
    timeout: Duration,
    list_calls: AtomicUsize,
    health_calls: AtomicUsize,
}

impl MockProvider {
    fn new(id: ProviderIdentifier, behaviour: Behaviour) -> MockProvider {
        MockProvider {
            id,
            behaviour: Mutex::new(behaviour),
            healthy: true,
            default_model: None,
            timeout: Duration::from_millis(100),
            list_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn serving(id: ProviderIdentifier, models: &[&str]) -> MockProvider {
        let models = models.iter().map(|m| m.to_string()).collect();

        MockProvider::new(id, Behaviour::Serve(models))
    }

    /// Answers late but well inside its own timeout.
    pub(crate) fn delayed(
        id: ProviderIdentifier,
        delay: Duration,
        models: &[&str],
    ) -> MockProvider {
        let models = models.iter().map(|m| m.to_string()).collect();

        MockProvider {
            timeout: delay + Duration::from_secs(1),
            ..MockProvider::new(id, Behaviour::Delay(delay, models))
        }
    }

    pub(crate) fn failing(id: ProviderIdentifier, kind: ErrorKind) -> MockProvider {
        MockProvider::new(id, Behaviour::Fail(kind)).unhealthy()
    }

    /// Never answers; the registry has to time it out.
    pub(crate) fn hanging(id: ProviderIdentifier) -> MockProvider {
        MockProvider::new(id, Behaviour::Hang)
    }

    pub(crate) fn panicking(id: ProviderIdentifier) -> MockProvider {
        MockProvider::new(id, Behaviour::Panic)
    }

    pub(crate) fn unhealthy(mut self) -> MockProvider {
        self.healthy = false;
        self
    }

    pub(crate) fn with_default(mut self, model: &str) -> MockProvider {
        self.default_model = Some(model.to_string());
        self
    }

    pub(crate) fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap_or_else(PoisonError::into_inner) = behaviour;
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    fn describe(&self, models: Vec<String>) -> Vec<ModelDescriptor> {
        models
            .into_iter()
            .map(|id| {
                let is_default = self.default_model.as_deref() == Some(id.as_str());
                ModelDescriptor::new(id, self.id).marked_default(is_default)
            })
            .collect()
    }

    fn behaviour(&self) -> Behaviour {
        self.behaviour
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn id(&self) -> ProviderIdentifier {
        self.id
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn health_timeout(&self) -> Duration {
        self.timeout
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        match self.behaviour() {
            Behaviour::Serve(models) => Ok(self.describe(models)),
            Behaviour::Delay(delay, models) => {
                tokio::time::sleep(delay).await;
                Ok(self.describe(models))
            }
            Behaviour::Fail(kind) => Err(Error::from_kind(kind)),
            Behaviour::Hang => std::future::pending().await,
            Behaviour::Panic => panic!("{} listing exploded", self.id),
        }
    }

    async fn check_health(&self) -> bool {
        self.health_calls.fetch_add(1, Ordering::SeqCst);

        match self.behaviour() {
            Behaviour::Hang => std::future::pending().await,
            Behaviour::Panic => panic!("{} probe exploded", self.id),
            Behaviour::Delay(delay, _) => {
                tokio::time::sleep(delay).await;
                self.healthy
            }
            Behaviour::Serve(_) | Behaviour::Fail(_) => self.healthy,
        }
    }

    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, Error> {
        Ok(format!("{}:{}:{}", self.id, model, prompt))
    }
}
