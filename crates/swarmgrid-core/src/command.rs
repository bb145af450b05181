//! Commands a host uses to steer selection and targeting.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::Position;
use crate::{AgentId, WorldState, WorldStateError};

/// Host-issued mutation of selection or targeting state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    /// Send `agent` toward `point`.
    SetTarget { agent: AgentId, point: Position },
    /// Select `agent` and activate its default target.
    Select { agent: AgentId },
    ClearSelection,
    /// Flag agents around `point` as near.
    Highlight { point: Position },
}

/// Apply a host command to the world.
pub fn apply_host_command(
    world: &mut WorldState,
    command: HostCommand,
) -> Result<(), WorldStateError> {
    debug!(?command, "applying host command");
    match command {
        HostCommand::SetTarget { agent, point } => world.set_target(agent, point),
        HostCommand::Select { agent } => world.select(agent),
        HostCommand::ClearSelection => {
            world.clear_selection();
            Ok(())
        }
        HostCommand::Highlight { point } => {
            world.highlight_near(point);
            Ok(())
        }
    }
}
