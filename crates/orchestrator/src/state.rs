/// The turn orchestrator's state machine. Transitions are one-directional
/// except for the `Generate <-> ToolExec` loop, bounded by
/// `max_tool_call_iterations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Init,
    Plan,
    Generate,
    ToolExec,
    Finalize,
    EmitError,
    Done,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Init => "init",
            TurnState::Plan => "plan",
            TurnState::Generate => "generate",
            TurnState::ToolExec => "tool_exec",
            TurnState::Finalize => "finalize",
            TurnState::EmitError => "emit_error",
            TurnState::Done => "done",
        }
    }
}
