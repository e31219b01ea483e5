//! Built-in tool runtime: shell `exec` plus `process` session management,
//! wired into `ao_orchestrator::ToolRuntime` by [`runtime::ExecToolRuntime`].

pub mod exec;
pub mod manager;
pub mod process;
pub mod runtime;

pub use manager::ProcessManager;
pub use runtime::ExecToolRuntime;
