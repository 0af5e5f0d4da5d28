use anyhow::Result;
use comfy_table::Cell;
use meshdesk_core::Store;

use super::Session;
use crate::output::{OutputFormat, create_table, print_output};
use crate::utils::{print_info, spinner};

pub async fn handle_scan<S: Store>(session: &Session<S>, format: OutputFormat) -> Result<()> {
    let pb = spinner("Scanning for devices...", format == OutputFormat::Table);
    let devices = session.scan().await;
    pb.finish_and_clear();

    match format {
        OutputFormat::Json => print_output(&devices, format),
        OutputFormat::Table => {
            if devices.is_empty() {
                print_info("No devices found");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec![Cell::new("Name"), Cell::new("Address")]);
            for device in &devices {
                table.add_row(vec![Cell::new(&device.name), Cell::new(&device.address)]);
            }
            println!("{table}");
        }
    }

    Ok(())
}
