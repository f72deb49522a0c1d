//! Server events the bot reacts to.

use idlemover_id::ClientId;
use idlemover_query::Notification;
use tracing::{debug, warn};

use crate::commands::{dispatch, Command};
use crate::controller::Controller;

const CLIENT_LEFT: &str = "notifyclientleftview";
const TEXT_MESSAGE: &str = "notifytextmessage";

/// An event relevant to the mover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A client disconnected (or was kicked, banned, timed out).
    ClientLeft { client: ClientId },

    /// A private text message to the bot.
    TextMessage {
        invoker: ClientId,
        invoker_name: String,
        message: String,
    },
}

impl SessionEvent {
    /// Translate a notification. One notification may carry several
    /// records; records missing required fields are dropped.
    pub fn from_notification(notification: &Notification) -> Vec<Self> {
        if notification.is(CLIENT_LEFT) {
            notification
                .records
                .iter()
                .filter_map(|record| match record.require::<ClientId>(ClientId::KEY) {
                    Ok(client) => Some(Self::ClientLeft { client }),
                    Err(e) => {
                        warn!(error = %e, "Ignoring malformed client-left event");
                        None
                    }
                })
                .collect()
        } else if notification.is(TEXT_MESSAGE) {
            notification
                .records
                .iter()
                .filter_map(|record| {
                    let invoker = match record.require::<ClientId>("invokerid") {
                        Ok(invoker) => invoker,
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed text message event");
                            return None;
                        }
                    };
                    Some(Self::TextMessage {
                        invoker,
                        invoker_name: record.get("invokername").unwrap_or_default().to_string(),
                        message: record.get("msg").unwrap_or_default().to_string(),
                    })
                })
                .collect()
        } else {
            debug!(event = %notification.event, "Ignoring notification");
            Vec::new()
        }
    }
}

/// Apply an event. Returns a reply to send, addressed to a client.
pub async fn handle_event(
    controller: &Controller,
    prefix: &str,
    event: SessionEvent,
) -> Option<(ClientId, String)> {
    match event {
        SessionEvent::ClientLeft { client } => {
            controller.on_client_left(client).await;
            None
        }
        SessionEvent::TextMessage {
            invoker,
            invoker_name,
            message,
        } => {
            let command = Command::parse(prefix, &message)?;
            debug!(
                client_id = %invoker,
                nickname = %invoker_name,
                command = command.as_str(),
                "Received command"
            );
            let reply = dispatch(controller, command).await;
            Some((invoker, reply))
        }
    }
}
