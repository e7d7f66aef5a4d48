//! Chat turn orchestration: the primary tool-calling pass and the
//! analysis pass that narrates tool output.

pub mod analysis;
pub mod turn;

pub use turn::{run_turn, ToolRecord, ToolRecordLog, TurnContext, TurnEvent};
