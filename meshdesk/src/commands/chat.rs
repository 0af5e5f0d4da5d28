use anyhow::{Context, Result};
use meshdesk_core::{Notification, NotificationLoop, Phase, SessionManager, Store, Transport};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use super::Session;
use crate::output::{
    OutputFormat, print_chat_line, print_json_line, print_node_line, print_telemetry_line,
};
use crate::utils::{parse_node_num, print_error, print_info, print_success, print_warning, spinner};

/// How often an idle chat checks whether the link is still up
const LINK_CHECK_INTERVAL: Duration = Duration::from_millis(500);

pub async fn handle_chat<S: Store>(
    session: &Session<S>,
    notifications: NotificationLoop,
    address: &str,
    channel: u32,
    to: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let destination = to.map(parse_node_num).transpose()?;

    register_printers(session, format);

    let pb = spinner(
        &format!("Connecting to {address}..."),
        format == OutputFormat::Table,
    );
    let connected = session.connect(address).await;
    pb.finish_and_clear();
    connected.with_context(|| format!("Failed to connect to {address}"))?;

    let name = session
        .get_local_node_name()
        .await
        .unwrap_or_else(|| address.to_string());
    print_success(&format!("Connected to {name}"));
    print_info("Type a message and press Enter to send. Ctrl+D or Ctrl+C to quit");

    let lines = BufReader::new(tokio::io::stdin()).lines();
    run_chat(
        session,
        notifications,
        lines,
        tokio::signal::ctrl_c(),
        channel,
        destination,
    )
    .await
}

/// Drive a connected session until input ends, `quit` fires or the link
/// drops. The session is disconnected on every exit, errors included.
async fn run_chat<T, S, R, Q>(
    session: &SessionManager<T, S>,
    mut notifications: NotificationLoop,
    mut lines: Lines<R>,
    quit: Q,
    channel: u32,
    destination: Option<u32>,
) -> Result<()>
where
    T: Transport,
    S: Store,
    R: AsyncBufRead + Unpin,
    Q: Future,
{
    let outcome = chat_loop(
        session,
        &mut notifications,
        &mut lines,
        quit,
        channel,
        destination,
    )
    .await;

    session.disconnect().await;
    // Flush whatever arrived before the link closed
    notifications.dispatch_pending();
    print_info("Disconnected");
    outcome
}

async fn chat_loop<T, S, R, Q>(
    session: &SessionManager<T, S>,
    notifications: &mut NotificationLoop,
    lines: &mut Lines<R>,
    quit: Q,
    channel: u32,
    destination: Option<u32>,
) -> Result<()>
where
    T: Transport,
    S: Store,
    R: AsyncBufRead + Unpin,
    Q: Future,
{
    tokio::pin!(quit);
    let mut link_check = tokio::time::interval(LINK_CHECK_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut quit => return Ok(()),
            delivered = notifications.dispatch_next() => {
                if !delivered {
                    return Ok(());
                }
            }
            _ = link_check.tick() => {
                if session.state().await.phase == Phase::Disconnected {
                    print_warning("Link to the device is gone");
                    return Ok(());
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    return Ok(());
                };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if let Err(e) = session.send(text, channel, destination).await {
                    print_error(&format!("Message not sent: {e}"));
                    if session.state().await.phase == Phase::Disconnected {
                        print_warning("Link to the device is gone");
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn register_printers<S: Store>(session: &Session<S>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            session.on_message(|m| print_json_line(&Notification::Message(m)));
            session.on_node_update(|n| print_json_line(&Notification::NodeUpdate(n)));
            session.on_telemetry(|t| print_json_line(&Notification::Telemetry(t)));
        }
        OutputFormat::Table => {
            session.on_message(|m| print_chat_line(&m));
            session.on_node_update(|n| print_node_line(&n));
            session.on_telemetry(|t| print_telemetry_line(&t));
        }
    }
}
