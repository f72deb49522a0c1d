//! Session client over the server's text query interface.

use std::time::Duration;

use async_trait::async_trait;
use idlemover_id::{ChannelId, ClientDbId, ClientId, ServerGroupId};
use idlemover_query::{Command, Connection, Notification, QueryError, Record};
use idlemover_reconcile::{
    Channel, ChannelDetail, ChannelLimit, ClientKind, Participant, ServerGroup,
};
use tokio::net::ToSocketAddrs;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::client::{ClientError, RejectReason, SessionClient};

/// "invalid channelID"
const ERR_CHANNEL_INVALID: u32 = 768;
/// "channel maxclient reached"
const ERR_CHANNEL_FULL: u32 = 777;
/// "channel maxfamily reached"
const ERR_CHANNEL_FAMILY_FULL: u32 = 778;
/// "invalid channel password"
const ERR_CHANNEL_PASSWORD: u32 = 781;
/// "database empty result set"
const ERR_EMPTY_RESULT: u32 = 1281;

/// Text message target mode for a single client.
const TARGET_CLIENT: u8 = 1;

/// Map a server status code to a refusal category.
pub fn reject_reason(code: u32) -> RejectReason {
    match code {
        ERR_CHANNEL_INVALID => RejectReason::DestinationGone,
        ERR_CHANNEL_FULL | ERR_CHANNEL_FAMILY_FULL => RejectReason::DestinationFull,
        ERR_CHANNEL_PASSWORD => RejectReason::AccessDenied,
        _ => RejectReason::Unclassified,
    }
}

fn translate(err: QueryError) -> ClientError {
    match err {
        QueryError::Server { id, message } => ClientError::Rejected {
            reason: reject_reason(id),
            code: id,
            message,
        },
        other => ClientError::Query(other),
    }
}

/// Session client backed by one query connection.
pub struct ServerQueryClient {
    conn: Connection,
}

impl ServerQueryClient {
    /// Open the query connection.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let conn = Connection::connect(addr).await?;
        Ok(Self { conn })
    }

    /// Authenticate, select the virtual server and set the bot's nickname.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        user: &str,
        password: &str,
        server_id: u64,
        nickname: &str,
    ) -> Result<(), ClientError> {
        self.run(
            Command::new("login")
                .arg("client_login_name", user)
                .arg("client_login_password", password),
        )
        .await?;
        self.run(Command::new("use").arg("sid", server_id)).await?;

        // A taken nickname is not worth failing over
        if let Err(e) = self
            .run(Command::new("clientupdate").arg("client_nickname", nickname))
            .await
        {
            warn!(error = %e, nickname, "Failed to set nickname");
        }

        info!(server_id, "Logged in to query interface");
        Ok(())
    }

    /// Register for server-wide client events and private text messages.
    pub async fn subscribe(&self) -> Result<(), ClientError> {
        self.run(Command::new("servernotifyregister").arg("event", "server"))
            .await?;
        self.run(Command::new("servernotifyregister").arg("event", "textprivate"))
            .await?;
        Ok(())
    }

    /// Notification stream; only the first call returns it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<Notification>> {
        self.conn.take_notifications()
    }

    /// Send a private text message to a client.
    pub async fn send_text(&self, client: ClientId, message: &str) -> Result<(), ClientError> {
        self.run(
            Command::new("sendtextmessage")
                .arg("targetmode", TARGET_CLIENT)
                .arg("target", client)
                .arg("msg", message),
        )
        .await?;
        Ok(())
    }

    /// Send a no-op command so the server does not drop the idle session.
    pub async fn keepalive(&self) -> Result<(), ClientError> {
        self.run(Command::new("version")).await?;
        Ok(())
    }

    async fn run(&self, command: Command) -> Result<Vec<Record>, ClientError> {
        self.conn.execute(&command).await.map_err(translate)
    }

    /// Like [`run`](Self::run), but an empty result set is an empty list.
    async fn list(&self, command: Command) -> Result<Vec<Record>, ClientError> {
        match self.conn.execute(&command).await {
            Err(QueryError::Server { id: ERR_EMPTY_RESULT, .. }) => Ok(Vec::new()),
            other => other.map_err(translate),
        }
    }
}

/// Parse one record, dropping (and logging) it if required fields are bad.
fn parse_each<T>(
    records: &[Record],
    what: &'static str,
    parse: impl Fn(&Record) -> Result<T, QueryError>,
) -> Vec<T> {
    records
        .iter()
        .filter_map(|record| match parse(record) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, what, "Skipping malformed record");
                None
            }
        })
        .collect()
}

fn parse_participant(record: &Record) -> Result<Participant, QueryError> {
    Ok(Participant {
        id: record.require(ClientId::KEY)?,
        database_id: record.require("client_database_id")?,
        channel: record.get_parsed(ChannelId::KEY)?,
        idle: record
            .get_parsed::<u64>("client_idle_time")?
            .map(Duration::from_millis),
        kind: ClientKind::from_raw(record.get_parsed("client_type")?.unwrap_or(0)),
        nickname: record.get("client_nickname").unwrap_or_default().to_string(),
    })
}

fn parse_channel(record: &Record) -> Result<Channel, QueryError> {
    Ok(Channel {
        id: record.require(ChannelId::KEY)?,
        name: record.require("channel_name")?,
        total_clients: record.get_parsed("total_clients")?.unwrap_or(0),
    })
}

fn parse_channel_detail(record: &Record) -> Result<ChannelDetail, QueryError> {
    let unlimited = record
        .get_parsed::<u8>("channel_flag_maxclients_unlimited")?
        .unwrap_or(0)
        == 1;
    let max_clients = if unlimited {
        ChannelLimit::Unlimited
    } else {
        ChannelLimit::from_raw(record.get_parsed("channel_maxclients")?.unwrap_or(-1))
    };

    Ok(ChannelDetail {
        max_clients,
        password_protected: record
            .get_parsed::<u8>("channel_flag_password")?
            .unwrap_or(0)
            == 1,
    })
}

fn parse_group(record: &Record) -> Result<ServerGroup, QueryError> {
    Ok(ServerGroup {
        id: record.require(ServerGroupId::KEY)?,
        name: record.require("name")?,
    })
}

#[async_trait]
impl SessionClient for ServerQueryClient {
    async fn list_participants(&self) -> Result<Vec<Participant>, ClientError> {
        let records = self.list(Command::new("clientlist").flag("times")).await?;
        Ok(parse_each(&records, "client", parse_participant))
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, ClientError> {
        let records = self.list(Command::new("channellist")).await?;
        Ok(parse_each(&records, "channel", parse_channel))
    }

    async fn channel_detail(&self, channel: ChannelId) -> Result<ChannelDetail, ClientError> {
        let records = self
            .run(Command::new("channelinfo").arg(ChannelId::KEY, channel))
            .await?;
        let record = records
            .first()
            .ok_or_else(|| QueryError::Malformed("empty channelinfo response".to_string()))?;
        Ok(parse_channel_detail(record)?)
    }

    async fn list_server_groups(&self) -> Result<Vec<ServerGroup>, ClientError> {
        let records = self.list(Command::new("servergrouplist")).await?;
        Ok(parse_each(&records, "server group", parse_group))
    }

    async fn server_groups_of(
        &self,
        account: ClientDbId,
    ) -> Result<Vec<ServerGroupId>, ClientError> {
        let records = self
            .list(Command::new("servergroupsbyclientid").arg(ClientDbId::KEY, account))
            .await?;
        Ok(parse_each(&records, "server group", |r| {
            r.require(ServerGroupId::KEY)
        }))
    }

    async fn find_channel(&self, name: &str) -> Result<ChannelId, ClientError> {
        let not_found = || ClientError::ChannelNotFound(name.to_string());

        // channelfind matches substrings; only an exact name counts
        let records = match self
            .conn
            .execute(&Command::new("channelfind").arg("pattern", name))
            .await
        {
            Ok(records) => records,
            Err(QueryError::Server {
                id: ERR_CHANNEL_INVALID | ERR_EMPTY_RESULT,
                ..
            }) => return Err(not_found()),
            Err(e) => return Err(translate(e)),
        };

        records
            .iter()
            .find(|r| r.get("channel_name") == Some(name))
            .map(|r| r.require::<ChannelId>(ChannelId::KEY))
            .transpose()?
            .ok_or_else(not_found)
    }

    async fn move_client(&self, client: ClientId, to: ChannelId) -> Result<(), ClientError> {
        self.run(
            Command::new("clientmove")
                .arg(ClientId::KEY, client)
                .arg(ChannelId::KEY, to),
        )
        .await?;
        Ok(())
    }
}
