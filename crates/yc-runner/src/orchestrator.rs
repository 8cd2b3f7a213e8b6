use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use runner_infra::types::{InstanceId, InstanceSpec, Runner};
use runner_infra::{RunnerRegistry, VmLifecycle, find_runner_by_label};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info, info_span};

use crate::actions::{LogGroup, OutputSink};
use crate::config::{ConfigError, Mode, RunConfiguration, StartConfig, StopConfig};
use crate::error::{ActionError, Result};
use crate::label::RunnerLabel;
use crate::user_data::{UserDataParams, build_user_data};

/// Time a fresh VM gets to boot before the first registration check.
pub const QUIET_PERIOD: Duration = Duration::from_secs(30);
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub quiet_period: Duration,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            quiet_period: QUIET_PERIOD,
            interval: POLL_INTERVAL,
            timeout: REGISTRATION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Registering,
    Creating,
    Polling,
    Deleting,
    Deregistering,
}

impl Phase {
    fn title(self) -> &'static str {
        match self {
            Phase::Registering => "Get registration token",
            Phase::Creating => "Create VM",
            Phase::Polling => "Wait for runner registration",
            Phase::Deleting => "Delete VM",
            Phase::Deregistering => "Remove runner",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Registering => "registering",
            Phase::Creating => "creating",
            Phase::Polling => "polling",
            Phase::Deleting => "deleting",
            Phase::Deregistering => "deregistering",
        })
    }
}

async fn in_phase<T>(phase: Phase, fut: impl Future<Output = T>) -> T {
    let _group = LogGroup::open(phase.title());
    fut.instrument(info_span!("phase", name = %phase)).await
}

/// Result of a successful `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub label: RunnerLabel,
    pub instance_id: InstanceId,
}

/// Drives one start or stop invocation against the cloud and GitHub.
pub struct Orchestrator<'a> {
    vms: &'a dyn VmLifecycle,
    runners: &'a dyn RunnerRegistry,
    outputs: &'a dyn OutputSink,
    poll: PollSettings,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        vms: &'a dyn VmLifecycle,
        runners: &'a dyn RunnerRegistry,
        outputs: &'a dyn OutputSink,
    ) -> Self {
        Self {
            vms,
            runners,
            outputs,
            poll: PollSettings::default(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub async fn run(&self, config: &RunConfiguration) -> Result<()> {
        match &config.mode {
            Mode::Start(start) => {
                let started = self.start(config, start, RunnerLabel::generate()).await?;
                info!(label = %started.label, instance_id = %started.instance_id, "runner started");
            }
            Mode::Stop(stop) => self.stop(stop).await?,
        }
        Ok(())
    }

    // ── Start ──

    pub async fn start(
        &self,
        config: &RunConfiguration,
        start: &StartConfig,
        label: RunnerLabel,
    ) -> Result<Started> {
        info!(%label, "starting runner");

        let token = in_phase(Phase::Registering, self.runners.registration_token()).await?;

        let instance_id = in_phase(Phase::Creating, async {
            let user_data = build_user_data(&UserDataParams {
                server_url: &config.github.server_url,
                repo: &config.github.repo,
                registration_token: &token,
                label: &label,
                runner_home_dir: start.runner_home_dir.as_deref(),
                runner_version: &start.runner_version,
                disable_update: start.disable_update,
                ssh: start.ssh.as_ref(),
            })?
            .join("\n");
            info!(user_data = %user_data.replace(token.as_str(), "***"), "boot script");

            let spec = instance_spec(config, start, user_data, Utc::now())?;
            let id = self.vms.create_instance(&spec).await?;
            info!(instance_id = %id, "instance created");
            Ok::<_, ActionError>(id)
        })
        .await?;

        self.outputs.set_output("label", label.as_str())?;
        self.outputs.set_output("instance-id", &instance_id.0)?;

        let runner = in_phase(Phase::Polling, self.wait_for_runner_registered(&label)).await?;
        info!(%label, runner = %runner.name, runner_id = runner.id, "runner is online");

        Ok(Started { label, instance_id })
    }

    /// Waits for a runner carrying `label` to come online.
    ///
    /// After the quiet period the registry is polled once per interval. A
    /// failure to list runners counts as "not registered yet".
    pub async fn wait_for_runner_registered(&self, label: &RunnerLabel) -> Result<Runner> {
        let PollSettings {
            quiet_period,
            interval,
            timeout,
        } = self.poll;

        info!(%label, quiet_secs = quiet_period.as_secs(), "waiting before the first check");
        tokio::time::sleep(quiet_period).await;

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut waited = Duration::ZERO;

        loop {
            ticker.tick().await;

            match find_runner_by_label(self.runners, label.as_str()).await {
                Some(runner) if runner.is_online() => return Ok(runner),
                Some(runner) => debug!(runner = %runner.name, status = ?runner.status, "runner not online yet"),
                None => debug!(%label, "runner not registered yet"),
            }

            if waited > timeout {
                return Err(ActionError::RegistrationTimeout {
                    minutes: timeout.as_secs() / 60,
                });
            }
            waited += interval;
            info!(%label, waited_secs = waited.as_secs(), "checking runner registration");
        }
    }

    // ── Stop ──

    pub async fn stop(&self, stop: &StopConfig) -> Result<()> {
        info!(label = %stop.label, instance_id = %stop.instance_id, "stopping runner");

        in_phase(Phase::Deleting, async {
            self.vms.delete_instance(&stop.instance_id).await?;
            info!(instance_id = %stop.instance_id, "instance deleted");
            Ok::<_, ActionError>(())
        })
        .await?;

        in_phase(Phase::Deregistering, async {
            let Some(runner) = find_runner_by_label(self.runners, &stop.label).await else {
                info!(label = %stop.label, "no runner with this label, nothing to remove");
                return Ok(());
            };
            self.runners.delete_runner(runner.id).await?;
            info!(runner = %runner.name, runner_id = runner.id, "runner removed");
            Ok::<_, ActionError>(())
        })
        .await
    }
}

fn instance_spec(
    config: &RunConfiguration,
    start: &StartConfig,
    user_data: String,
    now: DateTime<Utc>,
) -> Result<InstanceSpec> {
    let mut labels = HashMap::new();
    if let Some(ttl) = start.ttl {
        labels.insert("expires".to_string(), expires_at(now, ttl)?.timestamp().to_string());
    }

    Ok(InstanceSpec {
        folder_id: start.folder_id.clone(),
        zone_id: start.zone_id.clone(),
        platform_id: start.platform_id.clone(),
        description: format!(
            "Runner for: {}/{}",
            config.github.repo.owner, config.github.repo.repo
        ),
        service_account_id: start.service_account_id.clone(),
        resources: start.resources,
        boot_disk: start.boot_disk.clone(),
        second_disk: start.second_disk.clone(),
        subnet_id: start.subnet_id.clone(),
        public_ip: start.public_ip,
        labels,
        user_data,
    })
}

fn expires_at(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            ConfigError::InvalidInput {
                input: "ttl",
                reason: "expiry time is out of range".to_string(),
            }
            .into()
        })
}
