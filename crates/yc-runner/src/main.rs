mod actions;
mod config;
mod error;
mod label;
mod memory;
mod orchestrator;
mod user_data;

use std::process::ExitCode;

use clap::Parser;
use gh_api::GithubClient;
use runner_infra::github::GithubRunners;
use runner_infra::yandex::YandexCompute;
use tracing_subscriber::EnvFilter;

use crate::actions::{GithubOutput, LogGroup, error_annotation};
use crate::config::{Inputs, Mode, RunConfiguration};
use crate::error::Result;
use crate::memory::format_size;
use crate::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run(Inputs::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "action failed");
            println!("{}", error_annotation(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

async fn run(inputs: Inputs) -> Result<()> {
    let config = {
        let _group = LogGroup::open("Parsing Action Inputs");
        let config = RunConfiguration::from_inputs(inputs)?;
        log_config(&config);
        config
    };

    let vms = YandexCompute::from_service_account_json(&config.yc_credentials).await?;
    let runners = GithubRunners::new(
        GithubClient::new(config.github_token.clone()).with_base_url(config.github.api_url.clone()),
        config.github.repo.owner.clone(),
        config.github.repo.repo.clone(),
    );
    let outputs = GithubOutput::new(config.output_file.clone());

    Orchestrator::new(&vms, &runners, &outputs)
        .run(&config)
        .await
}

fn log_config(config: &RunConfiguration) {
    let repo = format!("{}/{}", config.github.repo.owner, config.github.repo.repo);
    match &config.mode {
        Mode::Start(start) => tracing::info!(
            mode = "start",
            %repo,
            folder_id = %start.folder_id,
            zone_id = %start.zone_id,
            platform_id = %start.platform_id,
            cores = start.resources.cores,
            memory = %format_size(start.resources.memory),
            core_fraction = start.resources.core_fraction,
            disk = %format_size(start.boot_disk.size),
            second_disk = ?start.second_disk.as_ref().map(|d| format_size(d.size)),
            public_ip = start.public_ip,
            "inputs parsed"
        ),
        Mode::Stop(stop) => tracing::info!(
            mode = "stop",
            %repo,
            label = %stop.label,
            instance_id = %stop.instance_id,
            "inputs parsed"
        ),
    }
}
