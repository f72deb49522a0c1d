//! Typed ID definitions for voice server objects.

use crate::define_id;

// =============================================================================
// Clients
// =============================================================================

define_id!(ClientId, "clid");
define_id!(ClientDbId, "cldbid");

// =============================================================================
// Channels and Groups
// =============================================================================

define_id!(ChannelId, "cid");
define_id!(ServerGroupId, "sgid");
