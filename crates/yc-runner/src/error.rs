use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Infra(#[from] runner_infra::Error),

    #[error("failed to render cloud-init user data: {0}")]
    UserData(#[from] serde_yaml::Error),

    #[error("failed to write step output: {0}")]
    Output(#[from] std::io::Error),

    #[error(
        "A timeout of {minutes} minutes is exceeded. The instance was not able to register itself in GitHub as a new self-hosted runner."
    )]
    RegistrationTimeout { minutes: u64 },
}

pub type Result<T> = std::result::Result<T, ActionError>;
