use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use runner_infra::types::{DiskSpec, InstanceId, ResourcesSpec};

use crate::memory::{SizeError, parse_size};

const DEFAULT_ZONE: &str = "ru-central1-a";
const DEFAULT_PLATFORM: &str = "standard-v3";
const DEFAULT_CORES: &str = "2";
const DEFAULT_MEMORY: &str = "1GiB";
const DEFAULT_CORE_FRACTION: &str = "100";
const DEFAULT_DISK_TYPE: &str = "network-ssd";
const DEFAULT_DISK_SIZE: &str = "30GiB";
const DEFAULT_DISK2_SIZE: &str = "0";
const DEFAULT_RUNNER_VERSION: &str = "2.321.0";
const DEFAULT_SERVER_URL: &str = "https://github.com";
const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The 'mode' input is not specified")]
    MissingMode,

    #[error("Wrong mode '{0}'. Allowed values: start, stop.")]
    WrongMode(String),

    #[error("The 'github-token' input is not specified")]
    MissingGithubToken,

    #[error("Not all the required inputs are provided for the 'start' mode: {}", .0.join(", "))]
    MissingStartInputs(Vec<&'static str>),

    #[error("Secondary disk image id is missing")]
    MissingSecondDiskImage,

    #[error("Not all the required inputs are provided for the 'stop' mode: {}", .0.join(", "))]
    MissingStopInputs(Vec<&'static str>),

    #[error("The 'yc-sa-json-credentials' input is not specified")]
    MissingCredentials,

    #[error("GITHUB_REPOSITORY is not set")]
    MissingRepository,

    #[error("GITHUB_REPOSITORY must look like 'owner/repo', got '{0}'")]
    InvalidRepository(String),

    #[error("invalid '{input}' input: {reason}")]
    InvalidInput { input: &'static str, reason: String },

    #[error("invalid '{input}' input: {source}")]
    InvalidSize {
        input: &'static str,
        #[source]
        source: SizeError,
    },
}

/// Raw inputs, as the Actions runner hands them over.
///
/// Each input is a long flag and an `INPUT_<NAME>` environment variable.
/// Values stay untyped here: Actions passes an empty string for every
/// declared input the workflow leaves out.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "yc-github-runner", version, about = "Start or stop a Yandex Cloud VM acting as a GitHub self-hosted runner")]
pub struct Inputs {
    /// `start` creates a runner VM, `stop` removes it
    #[arg(long, env = "INPUT_MODE")]
    pub mode: Option<String>,

    /// GitHub token with admin access to the repository's runners
    #[arg(long, env = "INPUT_GITHUB-TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Service account authorized key (JSON)
    #[arg(long, env = "INPUT_YC-SA-JSON-CREDENTIALS", hide_env_values = true)]
    pub yc_sa_json_credentials: Option<String>,

    #[arg(long, env = "INPUT_FOLDER-ID")]
    pub folder_id: Option<String>,

    /// Runner label returned by `start`; required by `stop`
    #[arg(long, env = "INPUT_LABEL")]
    pub label: Option<String>,

    /// Instance id returned by `start`; required by `stop`
    #[arg(long, env = "INPUT_INSTANCE-ID")]
    pub instance_id: Option<String>,

    /// Directory in the image with a pre-installed actions runner
    #[arg(long, env = "INPUT_RUNNER-HOME-DIR")]
    pub runner_home_dir: Option<String>,

    #[arg(long, env = "INPUT_SERVICE-ACCOUNT-ID")]
    pub service_account_id: Option<String>,

    #[arg(long, env = "INPUT_IMAGE-ID")]
    pub image_id: Option<String>,

    #[arg(long, env = "INPUT_ZONE-ID")]
    pub zone_id: Option<String>,

    #[arg(long, env = "INPUT_SUBNET-ID")]
    pub subnet_id: Option<String>,

    /// Assign a public IPv4 address
    #[arg(long, env = "INPUT_PUBLIC-IP")]
    pub public_ip: Option<String>,

    #[arg(long, env = "INPUT_PLATFORM-ID")]
    pub platform_id: Option<String>,

    #[arg(long, env = "INPUT_CORES")]
    pub cores: Option<String>,

    /// Memory size, e.g. 8GiB
    #[arg(long, env = "INPUT_MEMORY")]
    pub memory: Option<String>,

    #[arg(long, env = "INPUT_CORE-FRACTION")]
    pub core_fraction: Option<String>,

    #[arg(long, env = "INPUT_DISK-TYPE")]
    pub disk_type: Option<String>,

    /// Boot disk size, e.g. 30GiB
    #[arg(long, env = "INPUT_DISK-SIZE")]
    pub disk_size: Option<String>,

    #[arg(long = "image2-id", env = "INPUT_IMAGE2-ID")]
    pub image2_id: Option<String>,

    #[arg(long = "disk2-type", env = "INPUT_DISK2-TYPE")]
    pub disk2_type: Option<String>,

    /// Second disk size; 0 means no second disk
    #[arg(long = "disk2-size", env = "INPUT_DISK2-SIZE")]
    pub disk2_size: Option<String>,

    /// User to create for SSH access (needs `ssh-public-key`)
    #[arg(long, env = "INPUT_USER")]
    pub user: Option<String>,

    #[arg(long, env = "INPUT_SSH-PUBLIC-KEY")]
    pub ssh_public_key: Option<String>,

    #[arg(long, env = "INPUT_RUNNER-VERSION")]
    pub runner_version: Option<String>,

    /// Pass --disableupdate to the runner
    #[arg(long, env = "INPUT_DISABLE-UPDATE")]
    pub disable_update: Option<String>,

    /// Sets an `expires` label on the VM, e.g. 24h or PT24H
    #[arg(long, env = "INPUT_TTL")]
    pub ttl: Option<String>,

    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub github_repository: Option<String>,

    #[arg(long, env = "GITHUB_SERVER_URL")]
    pub github_server_url: Option<String>,

    #[arg(long, env = "GITHUB_API_URL")]
    pub github_api_url: Option<String>,

    /// File step outputs are appended to
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub github_output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubRepo {
    pub owner: String,
    pub repo: String,
}

impl GithubRepo {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(ConfigError::InvalidRepository(raw.to_string())),
        }
    }
}

/// Where the repository lives.
#[derive(Debug, Clone)]
pub struct GithubContext {
    pub repo: GithubRepo,
    /// Web root, used for the runner's `--url`.
    pub server_url: String,
    /// REST API root.
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshAccess {
    pub user: String,
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub struct StartConfig {
    pub folder_id: String,
    pub zone_id: String,
    pub platform_id: String,
    pub subnet_id: String,
    pub public_ip: bool,
    pub service_account_id: Option<String>,
    pub resources: ResourcesSpec,
    pub boot_disk: DiskSpec,
    pub second_disk: Option<DiskSpec>,
    pub runner_home_dir: Option<String>,
    pub ssh: Option<SshAccess>,
    pub runner_version: String,
    pub disable_update: bool,
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct StopConfig {
    pub label: String,
    pub instance_id: InstanceId,
}

#[derive(Debug, Clone)]
pub enum Mode {
    Start(Box<StartConfig>),
    Stop(StopConfig),
}

/// Validated run parameters.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub github_token: String,
    pub yc_credentials: String,
    pub github: GithubContext,
    pub output_file: Option<PathBuf>,
    pub mode: Mode,
}

impl RunConfiguration {
    pub fn from_inputs(inputs: Inputs) -> Result<Self, ConfigError> {
        let mode = non_empty(inputs.mode.clone()).ok_or(ConfigError::MissingMode)?;
        let github_token =
            non_empty(inputs.github_token.clone()).ok_or(ConfigError::MissingGithubToken)?;

        let mode = match mode.as_str() {
            "start" => Mode::Start(Box::new(start_config(&inputs)?)),
            "stop" => Mode::Stop(stop_config(&inputs)?),
            _ => return Err(ConfigError::WrongMode(mode)),
        };

        let yc_credentials =
            non_empty(inputs.yc_sa_json_credentials).ok_or(ConfigError::MissingCredentials)?;
        let repo = non_empty(inputs.github_repository).ok_or(ConfigError::MissingRepository)?;

        Ok(Self {
            github_token,
            yc_credentials,
            github: GithubContext {
                repo: GithubRepo::parse(&repo)?,
                server_url: url_root(inputs.github_server_url, DEFAULT_SERVER_URL),
                api_url: url_root(inputs.github_api_url, DEFAULT_API_URL),
            },
            output_file: inputs.github_output.filter(|p| !p.as_os_str().is_empty()),
            mode,
        })
    }
}

fn start_config(inputs: &Inputs) -> Result<StartConfig, ConfigError> {
    let image_id = non_empty(inputs.image_id.clone());
    let subnet_id = non_empty(inputs.subnet_id.clone());
    let folder_id = non_empty(inputs.folder_id.clone());

    let (Some(image_id), Some(subnet_id), Some(folder_id)) = (image_id, subnet_id, folder_id)
    else {
        let missing = [
            ("image-id", &inputs.image_id),
            ("subnet-id", &inputs.subnet_id),
            ("folder-id", &inputs.folder_id),
        ]
        .into_iter()
        .filter(|(_, v)| non_empty((*v).clone()).is_none())
        .map(|(name, _)| name)
        .collect();
        return Err(ConfigError::MissingStartInputs(missing));
    };

    let disk2_size = size_input("disk2-size", &inputs.disk2_size, DEFAULT_DISK2_SIZE)?;
    let second_disk = if disk2_size > 0 {
        let image_id =
            non_empty(inputs.image2_id.clone()).ok_or(ConfigError::MissingSecondDiskImage)?;
        Some(DiskSpec {
            image_id,
            type_id: or_default(&inputs.disk2_type, DEFAULT_DISK_TYPE),
            size: disk2_size,
        })
    } else {
        None
    };

    let ssh = match (non_empty(inputs.user.clone()), non_empty(inputs.ssh_public_key.clone())) {
        (Some(user), Some(public_key)) => Some(SshAccess { user, public_key }),
        _ => None,
    };

    Ok(StartConfig {
        folder_id,
        zone_id: or_default(&inputs.zone_id, DEFAULT_ZONE),
        platform_id: or_default(&inputs.platform_id, DEFAULT_PLATFORM),
        subnet_id,
        public_ip: bool_input("public-ip", &inputs.public_ip)?,
        service_account_id: non_empty(inputs.service_account_id.clone()),
        resources: ResourcesSpec {
            cores: int_input("cores", &inputs.cores, DEFAULT_CORES)?,
            memory: size_input("memory", &inputs.memory, DEFAULT_MEMORY)?,
            core_fraction: int_input("core-fraction", &inputs.core_fraction, DEFAULT_CORE_FRACTION)?,
        },
        boot_disk: DiskSpec {
            image_id,
            type_id: or_default(&inputs.disk_type, DEFAULT_DISK_TYPE),
            size: size_input("disk-size", &inputs.disk_size, DEFAULT_DISK_SIZE)?,
        },
        second_disk,
        runner_home_dir: non_empty(inputs.runner_home_dir.clone()),
        ssh,
        runner_version: or_default(&inputs.runner_version, DEFAULT_RUNNER_VERSION),
        disable_update: bool_input("disable-update", &inputs.disable_update)?,
        ttl: non_empty(inputs.ttl.clone())
            .map(|raw| parse_ttl(&raw))
            .transpose()
            .map_err(|reason| ConfigError::InvalidInput {
                input: "ttl",
                reason,
            })?,
    })
}

fn stop_config(inputs: &Inputs) -> Result<StopConfig, ConfigError> {
    let label = non_empty(inputs.label.clone());
    let instance_id = non_empty(inputs.instance_id.clone());

    match (label, instance_id) {
        (Some(label), Some(instance_id)) => Ok(StopConfig {
            label,
            instance_id: InstanceId(instance_id),
        }),
        (label, instance_id) => {
            let mut missing = Vec::new();
            if label.is_none() {
                missing.push("label");
            }
            if instance_id.is_none() {
                missing.push("instance-id");
            }
            Err(ConfigError::MissingStopInputs(missing))
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn or_default(value: &Option<String>, default: &str) -> String {
    non_empty(value.clone()).unwrap_or_else(|| default.to_string())
}

fn url_root(value: Option<String>, default: &str) -> String {
    non_empty(value)
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// YAML 1.2 core schema booleans, the spelling Actions accepts for boolean inputs.
fn bool_input(input: &'static str, value: &Option<String>) -> Result<bool, ConfigError> {
    match non_empty(value.clone()).as_deref() {
        None => Ok(false),
        Some("true" | "True" | "TRUE") => Ok(true),
        Some("false" | "False" | "FALSE") => Ok(false),
        Some(other) => Err(ConfigError::InvalidInput {
            input,
            reason: format!("'{other}' is not a boolean (true | True | TRUE | false | False | FALSE)"),
        }),
    }
}

fn int_input(input: &'static str, value: &Option<String>, default: &str) -> Result<u32, ConfigError> {
    let raw = or_default(value, default);
    raw.parse().map_err(|_| ConfigError::InvalidInput {
        input,
        reason: format!("'{raw}' is not a non-negative integer"),
    })
}

fn size_input(input: &'static str, value: &Option<String>, default: &str) -> Result<u64, ConfigError> {
    parse_size(&or_default(value, default)).map_err(|source| ConfigError::InvalidSize { input, source })
}

/// Accepts `duration-str` syntax (`24h`, `1h30m`) and ISO-8601 durations (`PT24H`, `P1DT2H`).
fn parse_ttl(raw: &str) -> Result<Duration, String> {
    if raw.starts_with(['P', 'p']) {
        parse_iso8601_duration(raw)
    } else {
        duration_str::parse(raw)
    }
}

fn parse_iso8601_duration(raw: &str) -> Result<Duration, String> {
    let invalid = || format!("'{raw}' is not an ISO-8601 duration");

    let mut secs: u64 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut any_component = false;

    for c in raw[1..].chars() {
        match c.to_ascii_uppercase() {
            '0'..='9' => digits.push(c),
            'T' if !in_time && digits.is_empty() => in_time = true,
            unit => {
                let factor = match (in_time, unit) {
                    (false, 'W') => 7 * 24 * 3600,
                    (false, 'D') => 24 * 3600,
                    (true, 'H') => 3600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return Err(invalid()),
                };
                let n: u64 = digits.parse().map_err(|_| invalid())?;
                secs = n
                    .checked_mul(factor)
                    .and_then(|v| secs.checked_add(v))
                    .ok_or_else(invalid)?;
                digits.clear();
                any_component = true;
            }
        }
    }

    if !digits.is_empty() || !any_component {
        return Err(invalid());
    }
    Ok(Duration::from_secs(secs))
}
