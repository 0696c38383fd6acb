/*!
Simulation data exchanged between the driver, the state machine and the modes.

- time_step:     tick time descriptor
- sync_state:    replicable agent state, movement base, aux state
- data:          typed data blocks and persistence rules
- input:         per-tick input command and the input producer contract
- proposed_move: what a mode or layered move wants to do
- events:        notifications and the observer dispatcher
- blackboard:    per-agent cache of derived query results
- settings:      shared movement settings
- base:          movement-base transform provider
*/

pub mod base;
pub mod blackboard;
pub mod data;
pub mod events;
pub mod input;
pub mod proposed_move;
pub mod settings;
pub mod sync_state;
pub mod time_step;

pub use base::{BaseProvider, NoBases, StaticBases};
pub use blackboard::{InvalidationReason, LAST_FLOOR_RESULT, SimBlackboard};
pub use data::{AnySyncBlock, DataCollection, DataPersistence, SyncBlock};
pub use events::{EventDispatcher, ImpactEvent, MoverEvent, ObserverId};
pub use input::{InputCmd, InputProducer};
pub use proposed_move::{MoveMixMode, ProposedMove};
pub use settings::{CommonMovementSettings, SettingsKind, SharedSettings};
pub use sync_state::{AuxState, MovementBase, SyncState};
pub use time_step::TimeStep;
