//! Text commands operators send to the bot.

use tracing::{error, info};

use crate::controller::{Controller, StartError, StartOutcome, StopOutcome};

/// A recognised `<prefix> <keyword>` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Version,
    Start,
    Stop,
    Restart,
}

impl Command {
    /// Parse a private text message. Returns `None` for anything that is not
    /// exactly the prefix followed by one known keyword.
    pub fn parse(prefix: &str, text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        if words.next()? != prefix {
            return None;
        }

        let command = match words.next()? {
            "version" => Self::Version,
            "start" => Self::Start,
            "stop" => Self::Stop,
            "restart" => Self::Restart,
            _ => return None,
        };

        if words.next().is_some() {
            return None;
        }
        Some(command)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

/// Run a command against the controller and build the reply text.
pub async fn dispatch(controller: &Controller, command: Command) -> String {
    info!(command = command.as_str(), "Running command");

    match command {
        Command::Version => format!(
            "This plugin is installed in the version `{}`.",
            env!("CARGO_PKG_VERSION")
        ),
        Command::Start => start_reply(controller.start().await),
        Command::Stop => match controller.stop().await {
            StopOutcome::Stopped => "Idle mover stopped.".to_string(),
            StopOutcome::NotRunning => "Idle mover is not running.".to_string(),
        },
        Command::Restart => start_reply(controller.restart().await),
    }
}

fn start_reply(result: Result<StartOutcome, StartError>) -> String {
    match result {
        Ok(StartOutcome::Started) => "Idle mover started.".to_string(),
        Ok(StartOutcome::AlreadyRunning) => "Idle mover is already running.".to_string(),
        Err(e) => {
            error!(error = %e, "Failed to start idle mover");
            format!("Failed to start idle mover: {e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MoverConfig;
    use crate::mock::MockSessionClient;
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case("!idlemover version", Some(Command::Version))]
    #[case("!idlemover start", Some(Command::Start))]
    #[case("  !idlemover   stop ", Some(Command::Stop))]
    #[case("!idlemover restart", Some(Command::Restart))]
    #[case("!idlemover", None)]
    #[case("!idlemover START", None)]
    #[case("!idlemover start now", None)]
    #[case("!idlemoverstart", None)]
    #[case("hello there", None)]
    #[case("", None)]
    fn test_parse(#[case] text: &str, #[case] expected: Option<Command>) {
        assert_eq!(Command::parse("!idlemover", text), expected);
    }

    #[tokio::test]
    async fn test_dispatch_replies() {
        let mock = Arc::new(MockSessionClient::new());
        mock.add_channel(99, "AFK");
        let controller = Controller::new(mock, MoverConfig::default());

        let reply = dispatch(&controller, Command::Version).await;
        assert_eq!(
            reply,
            format!("This plugin is installed in the version `{}`.", env!("CARGO_PKG_VERSION"))
        );

        assert_eq!(dispatch(&controller, Command::Start).await, "Idle mover started.");
        assert_eq!(
            dispatch(&controller, Command::Start).await,
            "Idle mover is already running."
        );
        assert_eq!(dispatch(&controller, Command::Restart).await, "Idle mover started.");
        assert_eq!(dispatch(&controller, Command::Stop).await, "Idle mover stopped.");
        assert_eq!(dispatch(&controller, Command::Stop).await, "Idle mover is not running.");
    }
}
