//! Command handlers.

use std::time::Duration;

use tracing::info;
use url::Url;
use zynr_api::{ClientConfig, TlsMode, ZyxelClient};

use crate::cli::{GlobalOpts, RebootArgs, StatusArgs};
use crate::error::CliError;

fn build_client(global: &GlobalOpts) -> Result<ZyxelClient, CliError> {
    let host = global.host.as_deref().ok_or(CliError::MissingHost)?;
    let base_url = Url::parse(host).map_err(|source| CliError::InvalidUrl {
        url: host.to_owned(),
        source,
    })?;

    let password = match &global.password {
        Some(p) => p.clone(),
        None => rpassword::prompt_password("Device password: ")
            .map_err(CliError::PasswordPrompt)?,
    };

    let tls = if global.tls_verify {
        TlsMode::System
    } else {
        TlsMode::DangerAcceptInvalid
    };
    let config = ClientConfig::new(base_url, global.username.clone(), &password)
        .with_tls(tls)
        .with_timeout(Duration::from_secs(global.timeout));

    ZyxelClient::new(&config).map_err(CliError::from)
}

pub async fn status(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let client = build_client(global)?;
    let record = client.get_status().await?;

    if args.raw {
        let raw = client.last_status_data().await.unwrap_or_default();
        println!("{}", serde_json::to_string_pretty(&raw)?);
    } else if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        for (key, value) in record.iter() {
            println!("{key} = {value}");
        }
    }

    client.logout().await;
    Ok(())
}

pub async fn reboot(args: RebootArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if !args.yes {
        return Err(CliError::RebootNotConfirmed);
    }

    let client = build_client(global)?;
    client.reboot().await?;
    info!("reboot accepted by device");
    println!("Reboot accepted. The device will be unreachable for a few minutes.");
    Ok(())
}

pub async fn probe(global: &GlobalOpts) -> Result<(), CliError> {
    let client = build_client(global)?;
    let available = client.probe_endpoints().await?;

    if available.is_empty() {
        println!("No status sub-resources answered.");
    } else {
        for oid in available {
            println!("{oid}");
        }
    }

    client.logout().await;
    Ok(())
}
