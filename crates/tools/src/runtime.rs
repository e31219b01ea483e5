//! `ao_orchestrator::ToolRuntime` implementation backed by [`ProcessManager`].
//!
//! Exposes two tools to the LLM: `exec` (run a shell command, foreground or
//! background) and `process` (inspect/control a previously backgrounded
//! session). Both dispatch through the same [`ProcessManager`], so a session
//! started by `exec` is visible to `process`.

use std::sync::Arc;

use async_trait::async_trait;

use ao_domain::error::{Error, Result};
use ao_domain::tool::{ToolCall, ToolDefinition};

use crate::exec::{exec, ExecRequest};
use crate::manager::ProcessManager;
use crate::process::{handle_process, ProcessRequest};

pub struct ExecToolRuntime {
    manager: Arc<ProcessManager>,
}

impl ExecToolRuntime {
    pub fn new(manager: Arc<ProcessManager>) -> Self {
        Self { manager }
    }

    fn exec_definition() -> ToolDefinition {
        ToolDefinition {
            name: "exec".into(),
            description: "Run a shell command. Long-running commands are \
                automatically backgrounded and return a session_id for \
                polling via the `process` tool."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "background": {"type": "boolean"},
                    "yield_ms": {"type": "integer"},
                    "timeout_sec": {"type": "integer"},
                    "workdir": {"type": "string"},
                    "env": {"type": "object", "additionalProperties": {"type": "string"}}
                },
                "required": ["command"]
            }),
        }
    }

    fn process_definition() -> ToolDefinition {
        ToolDefinition {
            name: "process".into(),
            description: "Manage a backgrounded exec session: list, poll, \
                log, write stdin, kill, clear, or remove."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["list", "poll", "log", "write", "kill", "clear", "remove"]},
                    "session_id": {"type": "string"},
                    "offset": {"type": "integer"},
                    "limit": {"type": "integer"},
                    "tail_lines": {"type": "integer"},
                    "data": {"type": "string"},
                    "eof": {"type": "boolean"}
                },
                "required": ["action"]
            }),
        }
    }
}

#[async_trait]
impl ao_orchestrator::ToolRuntime for ExecToolRuntime {
    fn definitions(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|n| match n.as_str() {
                "exec" => Some(Self::exec_definition()),
                "process" => Some(Self::process_definition()),
                _ => None,
            })
            .collect()
    }

    fn all_definitions(&self) -> Vec<ToolDefinition> {
        vec![Self::exec_definition(), Self::process_definition()]
    }

    async fn execute(&self, call: &ToolCall) -> Result<String> {
        match call.tool_name.as_str() {
            "exec" => {
                let req: ExecRequest = serde_json::from_value(call.arguments.clone())?;
                let resp = exec(&self.manager, req).await;
                Ok(serde_json::to_string(&resp)?)
            }
            "process" => {
                let req: ProcessRequest = serde_json::from_value(call.arguments.clone())?;
                let resp = handle_process(&self.manager, req).await;
                Ok(serde_json::to_string(&resp)?)
            }
            other => Err(Error::ToolExecution {
                tool: other.into(),
                message: "unknown tool".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_domain::config::ExecConfig;
    use ao_orchestrator::ToolRuntime as _;

    #[tokio::test]
    async fn exec_tool_runs_and_returns_output() {
        let manager = Arc::new(ProcessManager::new(ExecConfig::default()));
        let runtime = ExecToolRuntime::new(manager);

        let call = ToolCall {
            call_id: "c1".into(),
            tool_name: "exec".into(),
            arguments: serde_json::json!({"command": "echo hello"}),
        };
        let result = runtime.execute(&call).await.unwrap();
        assert!(result.contains("hello"));
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let manager = Arc::new(ProcessManager::new(ExecConfig::default()));
        let runtime = ExecToolRuntime::new(manager);

        let call = ToolCall {
            call_id: "c1".into(),
            tool_name: "bogus".into(),
            arguments: serde_json::json!({}),
        };
        assert!(runtime.execute(&call).await.is_err());
    }

    #[test]
    fn definitions_filters_unknown_names() {
        let manager = Arc::new(ProcessManager::new(ExecConfig::default()));
        let runtime = ExecToolRuntime::new(manager);
        let defs = runtime.definitions(&["exec".into(), "bogus".into(), "process".into()]);
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn all_definitions_returns_full_catalog() {
        let manager = Arc::new(ProcessManager::new(ExecConfig::default()));
        let runtime = ExecToolRuntime::new(manager);
        let defs = runtime.all_definitions();
        assert_eq!(defs.len(), 2);
        assert!(defs.iter().any(|d| d.name == "exec"));
        assert!(defs.iter().any(|d| d.name == "process"));
    }
}
