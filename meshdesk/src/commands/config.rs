use anyhow::Result;
use meshdesk_core::{ModemPreset, RadioConfig, Store};

use super::Session;
use crate::output::{OutputFormat, print_output};
use crate::utils::{print_success, spinner};

pub async fn handle_config<S: Store>(
    session: &Session<S>,
    address: &str,
    region: i32,
    preset: ModemPreset,
    format: OutputFormat,
) -> Result<()> {
    let config = RadioConfig {
        region,
        modem_preset: preset,
    };

    let pb = spinner(
        &format!("Connecting to {address}..."),
        format == OutputFormat::Table,
    );
    let connected = session.connect(address).await;
    pb.finish_and_clear();
    connected?;

    let sent = session.send_config(&config).await;
    session.disconnect().await;
    sent?;

    match format {
        OutputFormat::Json => print_output(&config, format),
        OutputFormat::Table => print_success(&format!(
            "Sent region {region} with preset {preset} to {address}"
        )),
    }
    Ok(())
}
