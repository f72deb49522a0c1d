//! In-memory session client for testing and development.
//!
//! Holds a tiny model of a voice server: channels, clients and groups. Moves
//! actually relocate clients, so consecutive ticks observe their effects.
//! Individual failures can be scripted per client and destination.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use idlemover_id::{ChannelId, ClientDbId, ClientId, ServerGroupId};
use idlemover_reconcile::{
    Channel, ChannelDetail, ChannelLimit, ClientKind, Participant, ServerGroup,
};
use tracing::debug;

use crate::client::{ClientError, RejectReason, SessionClient};

#[derive(Debug, Clone)]
struct MockChannel {
    name: String,
    detail: ChannelDetail,
    occupancy_override: Option<u32>,
}

#[derive(Default)]
struct MockState {
    channels: BTreeMap<ChannelId, MockChannel>,
    participants: Vec<Participant>,
    groups: Vec<ServerGroup>,
    memberships: HashMap<ClientDbId, Vec<ServerGroupId>>,
    move_failures: HashMap<(ClientId, ChannelId), RejectReason>,
    fail_participant_listing: bool,
    fail_channel_listing: bool,
    fail_group_listing: bool,
    fail_membership_lookup: bool,
    panic_on_listing: bool,
    moves: Vec<(ClientId, ChannelId)>,
    participant_listings: u32,
}

/// Mock session client.
#[derive(Default)]
pub struct MockSessionClient {
    state: Mutex<MockState>,
}

impl MockSessionClient {
    /// Create an empty mock server.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add an unlimited, open channel.
    pub fn add_channel(&self, id: u64, name: &str) -> ChannelId {
        self.add_channel_with(id, name, ChannelLimit::Unlimited, false)
    }

    /// Add a channel with explicit limits.
    pub fn add_channel_with(
        &self,
        id: u64,
        name: &str,
        max_clients: ChannelLimit,
        password_protected: bool,
    ) -> ChannelId {
        let id = ChannelId::new(id);
        self.state().channels.insert(
            id,
            MockChannel {
                name: name.to_string(),
                detail: ChannelDetail {
                    max_clients,
                    password_protected,
                },
                occupancy_override: None,
            },
        );
        id
    }

    /// Delete a channel.
    pub fn remove_channel(&self, id: ChannelId) {
        self.state().channels.remove(&id);
    }

    /// Report a fixed occupancy for a channel instead of counting clients.
    pub fn set_occupancy(&self, id: ChannelId, occupancy: u32) {
        if let Some(channel) = self.state().channels.get_mut(&id) {
            channel.occupancy_override = Some(occupancy);
        }
    }

    /// Connect a voice client.
    pub fn add_client(&self, id: u64, channel: ChannelId, idle: Duration) -> ClientId {
        let client_id = ClientId::new(id);
        self.state().participants.push(Participant {
            id: client_id,
            database_id: ClientDbId::new(id + 1000),
            channel: Some(channel),
            idle: Some(idle),
            kind: ClientKind::Voice,
            nickname: format!("client-{id}"),
        });
        client_id
    }

    /// Connect an arbitrary participant record.
    pub fn add_participant(&self, participant: Participant) {
        self.state().participants.push(participant);
    }

    /// Disconnect a client.
    pub fn remove_client(&self, id: ClientId) {
        self.state().participants.retain(|p| p.id != id);
    }

    pub fn set_idle(&self, id: ClientId, idle: Duration) {
        if let Some(p) = self.state().participants.iter_mut().find(|p| p.id == id) {
            p.idle = Some(idle);
        }
    }

    /// Current channel of a client.
    pub fn channel_of(&self, id: ClientId) -> Option<ChannelId> {
        self.state()
            .participants
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.channel)
    }

    pub fn add_group(&self, id: u64, name: &str) -> ServerGroupId {
        let id = ServerGroupId::new(id);
        self.state().groups.push(ServerGroup {
            id,
            name: name.to_string(),
        });
        id
    }

    /// Assign a group to a client's account.
    pub fn assign_group(&self, client: ClientId, group: ServerGroupId) {
        let mut state = self.state();
        let account = state
            .participants
            .iter()
            .find(|p| p.id == client)
            .map(|p| p.database_id);
        if let Some(account) = account {
            state.memberships.entry(account).or_default().push(group);
        }
    }

    /// Make every move of `client` into `to` fail with `reason`.
    pub fn fail_move(&self, client: ClientId, to: ChannelId, reason: RejectReason) {
        self.state().move_failures.insert((client, to), reason);
    }

    pub fn clear_move_failures(&self) {
        self.state().move_failures.clear();
    }

    pub fn fail_participant_listing(&self, fail: bool) {
        self.state().fail_participant_listing = fail;
    }

    pub fn fail_channel_listing(&self, fail: bool) {
        self.state().fail_channel_listing = fail;
    }

    pub fn fail_group_listing(&self, fail: bool) {
        self.state().fail_group_listing = fail;
    }

    pub fn fail_membership_lookup(&self, fail: bool) {
        self.state().fail_membership_lookup = fail;
    }

    /// Panic inside `list_participants`, simulating a bug in a tick.
    pub fn panic_on_listing(&self, panic: bool) {
        self.state().panic_on_listing = panic;
    }

    /// Every successful move, in order.
    pub fn moves(&self) -> Vec<(ClientId, ChannelId)> {
        self.state().moves.clone()
    }

    /// Number of `list_participants` calls so far.
    pub fn participant_listings(&self) -> u32 {
        self.state().participant_listings
    }

    fn occupancy(state: &MockState, id: ChannelId) -> u32 {
        let counted = state
            .participants
            .iter()
            .filter(|p| p.channel == Some(id))
            .count();
        state
            .channels
            .get(&id)
            .and_then(|c| c.occupancy_override)
            .unwrap_or_else(|| u32::try_from(counted).unwrap_or(u32::MAX))
    }
}

fn rejected(reason: RejectReason) -> ClientError {
    let (code, message) = match reason {
        RejectReason::DestinationGone => (768, "invalid channelID"),
        RejectReason::DestinationFull => (777, "channel maxclient reached"),
        RejectReason::AccessDenied => (781, "invalid channel password"),
        RejectReason::Unclassified => (512, "invalid clientID"),
    };
    ClientError::Rejected {
        reason,
        code,
        message: message.to_string(),
    }
}

fn unavailable() -> ClientError {
    ClientError::Query(idlemover_query::QueryError::Closed)
}

#[async_trait]
impl SessionClient for MockSessionClient {
    async fn list_participants(&self) -> Result<Vec<Participant>, ClientError> {
        let mut state = self.state();
        state.participant_listings += 1;
        if state.panic_on_listing {
            drop(state);
            panic!("[MOCK] list_participants panicked");
        }
        if state.fail_participant_listing {
            return Err(unavailable());
        }
        Ok(state.participants.clone())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, ClientError> {
        let state = self.state();
        if state.fail_channel_listing {
            return Err(unavailable());
        }
        Ok(state
            .channels
            .iter()
            .map(|(id, c)| Channel {
                id: *id,
                name: c.name.clone(),
                total_clients: Self::occupancy(&state, *id),
            })
            .collect())
    }

    async fn channel_detail(&self, channel: ChannelId) -> Result<ChannelDetail, ClientError> {
        self.state()
            .channels
            .get(&channel)
            .map(|c| c.detail)
            .ok_or_else(|| rejected(RejectReason::DestinationGone))
    }

    async fn list_server_groups(&self) -> Result<Vec<ServerGroup>, ClientError> {
        let state = self.state();
        if state.fail_group_listing {
            return Err(unavailable());
        }
        Ok(state.groups.clone())
    }

    async fn server_groups_of(
        &self,
        account: ClientDbId,
    ) -> Result<Vec<ServerGroupId>, ClientError> {
        let state = self.state();
        if state.fail_membership_lookup {
            return Err(unavailable());
        }
        Ok(state.memberships.get(&account).cloned().unwrap_or_default())
    }

    async fn find_channel(&self, name: &str) -> Result<ChannelId, ClientError> {
        self.state()
            .channels
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, _)| *id)
            .ok_or_else(|| ClientError::ChannelNotFound(name.to_string()))
    }

    async fn move_client(&self, client: ClientId, to: ChannelId) -> Result<(), ClientError> {
        let mut state = self.state();

        if let Some(reason) = state.move_failures.get(&(client, to)) {
            return Err(rejected(*reason));
        }
        if !state.channels.contains_key(&to) {
            return Err(rejected(RejectReason::DestinationGone));
        }

        let Some(participant) = state.participants.iter_mut().find(|p| p.id == client) else {
            return Err(rejected(RejectReason::Unclassified));
        };
        participant.channel = Some(to);
        state.moves.push((client, to));

        debug!(client_id = %client, channel_id = %to, "[MOCK] Moved client");
        Ok(())
    }
}
