use anyhow::Result;
use comfy_table::Cell;
use meshdesk_core::Store;

use crate::output::{
    OutputFormat, create_table, format_coordinate, format_last_heard, print_output,
};
use crate::utils::print_info;

pub fn handle_nodes<S: Store>(store: &S, format: OutputFormat) -> Result<()> {
    let nodes = store.load_nodes()?;

    match format {
        OutputFormat::Json => print_output(&nodes, format),
        OutputFormat::Table => {
            if nodes.is_empty() {
                print_info("No nodes stored yet; connect with `meshdesk chat` first");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec![
                Cell::new("ID"),
                Cell::new("Long Name"),
                Cell::new("Short Name"),
                Cell::new("SNR"),
                Cell::new("Battery"),
                Cell::new("Last Heard"),
                Cell::new("Lat"),
                Cell::new("Lon"),
            ]);

            for node in &nodes {
                let id = node
                    .id
                    .clone()
                    .or_else(|| node.num.map(|n| n.to_string()))
                    .unwrap_or_default();
                table.add_row(vec![
                    Cell::new(id),
                    Cell::new(node.long_name_or_default()),
                    Cell::new(node.short_name_or_default()),
                    Cell::new(
                        node.snr
                            .map(|s| format!("{s:.1} dB"))
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                    Cell::new(
                        node.battery_level
                            .map(|b| format!("{b}%"))
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                    Cell::new(format_last_heard(node.last_heard)),
                    Cell::new(format_coordinate(node.latitude)),
                    Cell::new(format_coordinate(node.longitude)),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}
