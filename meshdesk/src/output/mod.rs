use chrono::{DateTime, Local, Utc};
use colored::*;
use comfy_table::Table;
use meshdesk_core::{ChatMessage, NodeRecord, Role, TelemetrySample};
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Json,
    Table,
}

pub fn print_output<T: Serialize>(data: T, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&data) {
                println!("{json}");
            }
        }
        OutputFormat::Table => {
            // Default table output - override in specific implementations
            if let Ok(json) = serde_json::to_string_pretty(&data) {
                println!("{json}");
            }
        }
    }
}

/// One JSON document per line, for streamed events
pub fn print_json_line<T: Serialize>(data: &T) {
    if let Ok(json) = serde_json::to_string(data) {
        println!("{json}");
    }
}

pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

pub fn print_chat_line(message: &ChatMessage) {
    let label = match message.role {
        Role::Local => message.sender_label.green().bold(),
        Role::Remote => message.sender_label.blue().bold(),
    };
    println!(
        "{label} [{channel}]: {text}",
        channel = message.channel,
        text = message.text
    );
}

pub fn print_node_line(node: &NodeRecord) {
    let id = node
        .id
        .clone()
        .or_else(|| node.num.map(|n| n.to_string()))
        .unwrap_or_default();
    println!(
        "{label} {name} ({id}) {heard}",
        label = "Node:".dimmed(),
        name = node.long_name_or_default().cyan(),
        heard = format_last_heard(node.last_heard).dimmed()
    );
}

pub fn print_telemetry_line(sample: &TelemetrySample) {
    let from = sample
        .from
        .map(|n| format!("{n:08x}"))
        .unwrap_or_else(|| "local".to_string());
    let voltage = sample
        .voltage
        .map(|v| format!("{v:.2} V"))
        .unwrap_or_else(|| "-".to_string());
    let rssi = sample
        .rssi
        .map(|r| format!("{r} dBm"))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{label} {from}: {voltage}, RSSI {rssi}",
        label = "Telemetry:".dimmed()
    );
}

/// `"5m 3s ago"` style age for a UNIX-seconds timestamp
pub fn format_last_heard(last_heard: Option<u64>) -> String {
    let Some(secs) = last_heard else {
        return "never".to_string();
    };
    let heard = UNIX_EPOCH + Duration::from_secs(secs);
    match SystemTime::now().duration_since(heard) {
        Ok(age) => {
            // Second precision is enough for display
            let age = Duration::from_secs(age.as_secs());
            format!("{} ago", humantime::format_duration(age))
        }
        Err(_) => "just now".to_string(),
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn format_coordinate(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.5}"))
        .unwrap_or_else(|| "-".to_string())
}
