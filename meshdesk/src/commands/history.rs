use anyhow::Result;
use comfy_table::Cell;
use meshdesk_core::message::LOCAL_USER_LABEL;
use meshdesk_core::{MessageRecord, NodeCache, Role, Store};

use crate::output::{OutputFormat, create_table, format_timestamp, print_output};
use crate::utils::print_info;

pub fn handle_history<S: Store>(
    store: &S,
    channel: Option<u32>,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let mut messages: Vec<MessageRecord> = store
        .load_messages()?
        .into_iter()
        .filter(|m| channel.is_none_or(|c| m.channel == c))
        .collect();
    if limit > 0 && messages.len() > limit {
        messages.drain(..messages.len() - limit);
    }

    match format {
        OutputFormat::Json => print_output(&messages, format),
        OutputFormat::Table => {
            if messages.is_empty() {
                print_info("No messages stored");
                return Ok(());
            }

            let cache = NodeCache::from_records(store.load_nodes()?);
            let mut table = create_table();
            table.set_header(vec![
                Cell::new("Time"),
                Cell::new("Channel"),
                Cell::new("From"),
                Cell::new("Message"),
            ]);

            for message in &messages {
                let from = match message.role {
                    Role::Local => LOCAL_USER_LABEL.to_string(),
                    Role::Remote => cache.display_name(&message.sender_id.as_str().into()),
                };
                table.add_row(vec![
                    Cell::new(format_timestamp(&message.timestamp)),
                    Cell::new(message.channel),
                    Cell::new(from),
                    Cell::new(&message.payload),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}
