pub mod github;
pub mod types;
pub mod yandex;

use async_trait::async_trait;
use types::{InstanceId, InstanceSpec, Runner};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("yandex cloud error: {0}")]
    Cloud(#[from] yc_api::Error),

    #[error("github error: {0}")]
    Github(#[from] gh_api::Error),

    #[error("operation {0} finished without an instance id")]
    MissingInstanceId(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Creates and deletes runner VMs.
///
/// Both calls block until the provider's asynchronous operation has finished.
/// Failures are returned as-is; retrying is up to the caller's pipeline.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait VmLifecycle: Send + Sync {
    async fn create_instance(&self, spec: &InstanceSpec) -> Result<InstanceId>;

    async fn delete_instance(&self, id: &InstanceId) -> Result<()>;
}

/// Self-hosted runner bookkeeping on the source-control side.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait RunnerRegistry: Send + Sync {
    /// All runners registered to the repository.
    async fn list_runners(&self) -> Result<Vec<Runner>>;

    /// A short-lived token a new runner uses to register itself.
    async fn registration_token(&self) -> Result<String>;

    async fn delete_runner(&self, runner_id: u64) -> Result<()>;
}

/// First runner carrying `label`, if any.
///
/// A failure to list runners is reported as `None`, the same as "no such
/// runner". Callers polling for a runner therefore cannot tell an outage
/// from a runner that has not registered yet.
pub async fn find_runner_by_label<R>(registry: &R, label: &str) -> Option<Runner>
where
    R: RunnerRegistry + ?Sized,
{
    match registry.list_runners().await {
        Ok(runners) => runners.into_iter().find(|r| r.has_label(label)),
        Err(e) => {
            tracing::debug!(label, error = %e, "listing runners failed, treating as not found");
            None
        }
    }
}
