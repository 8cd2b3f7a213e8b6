use serde::Serialize;

use crate::config::{GithubRepo, SshAccess};
use crate::label::RunnerLabel;

/// What the VM needs to know to register itself as a runner.
#[derive(Debug, Clone)]
pub struct UserDataParams<'a> {
    pub server_url: &'a str,
    pub repo: &'a GithubRepo,
    pub registration_token: &'a str,
    pub label: &'a RunnerLabel,
    /// Directory with a pre-installed runner. Without it the runner is downloaded.
    pub runner_home_dir: Option<&'a str>,
    pub runner_version: &'a str,
    pub disable_update: bool,
    pub ssh: Option<&'a SshAccess>,
}

// ── cloud-init document ──

#[derive(Serialize)]
struct CloudConfig<'a> {
    ssh_pwauth: bool,
    users: Vec<CloudUser<'a>>,
    runcmd: &'a [String],
}

#[derive(Serialize)]
struct CloudUser<'a> {
    name: &'a str,
    sudo: &'static str,
    shell: &'static str,
    ssh_authorized_keys: Vec<&'a str>,
}

/// Boot payload for the runner VM, one line per element.
///
/// A plain bash script, or a `#cloud-config` document running the same
/// script when SSH access is requested.
pub fn build_user_data(params: &UserDataParams<'_>) -> Result<Vec<String>, serde_yaml::Error> {
    let script = runner_script(params);

    let Some(ssh) = params.ssh else {
        return Ok(script);
    };

    let doc = CloudConfig {
        ssh_pwauth: false,
        users: vec![CloudUser {
            name: &ssh.user,
            sudo: "ALL=(ALL) NOPASSWD:ALL",
            shell: "/bin/bash",
            ssh_authorized_keys: vec![ssh.public_key.as_str()],
        }],
        runcmd: &script[1..],
    };
    let yaml = serde_yaml::to_string(&doc)?;

    Ok(std::iter::once("#cloud-config".to_string())
        .chain(yaml.lines().map(str::to_string))
        .collect())
}

fn runner_script(params: &UserDataParams<'_>) -> Vec<String> {
    let mut config = format!(
        "./config.sh --url {}/{}/{} --token {} --labels {}",
        params.server_url,
        params.repo.owner,
        params.repo.repo,
        params.registration_token,
        params.label
    );
    if params.disable_update {
        config.push_str(" --disableupdate");
    }

    let mut lines = vec!["#!/bin/bash".to_string()];
    match params.runner_home_dir {
        Some(dir) => lines.push(format!("cd \"{dir}\"")),
        None => {
            let version = params.runner_version;
            let archive = format!("actions-runner-linux-${{RUNNER_ARCH}}-{version}.tar.gz");
            lines.extend([
                "mkdir actions-runner && cd actions-runner".to_string(),
                r#"case $(uname -m) in aarch64) ARCH="arm64" ;; amd64|x86_64) ARCH="x64" ;; esac && export RUNNER_ARCH=${ARCH}"#
                    .to_string(),
                format!(
                    "curl -O -L https://github.com/actions/runner/releases/download/v{version}/{archive}"
                ),
                format!("tar xzf ./{archive}"),
            ]);
        }
    }
    lines.extend([
        "export RUNNER_ALLOW_RUNASROOT=1".to_string(),
        config,
        "./run.sh".to_string(),
    ]);
    lines
}
