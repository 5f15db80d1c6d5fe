//! Room configuration.

use serde::{Deserialize, Serialize};

/// Capacities and limits shared by every room a registry creates.
///
/// Override individual fields with struct update syntax:
///
/// ```rust
/// use watchparty_room::RoomConfig;
///
/// let config = RoomConfig {
///     history_limit: 0,
///     ..RoomConfig::default()
/// };
/// assert_eq!(config.command_queue_capacity, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Capacity of each room's inbound command queue. Submitters wait when
    /// it is full.
    pub command_queue_capacity: usize,

    /// Capacity of each participant's outbound queue. The room never waits
    /// on it; a message for a full queue is dropped.
    pub outbound_queue_capacity: usize,

    /// How many recent chat messages a room keeps to replay to late
    /// joiners. 0 disables history.
    pub history_limit: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: 32,
            outbound_queue_capacity: 16,
            history_limit: 50,
        }
    }
}

impl RoomConfig {
    /// Outbound queue capacity for a newly admitted participant: the
    /// steady-state capacity plus room for a full history replay on join.
    pub fn admission_queue_capacity(&self) -> usize {
        self.outbound_queue_capacity.max(1) + self.history_limit
    }
}
