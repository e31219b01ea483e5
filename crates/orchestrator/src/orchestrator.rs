use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;

use ao_adaptive::adapt;
use ao_domain::config::{AdaptiveConfig, OrchestratorConfig};
use ao_domain::error::{Error, Result};
use ao_domain::outcome::{KpiWindow, OutcomeEntry, OutcomeStatus, ScopeKey};
use ao_domain::stream::{
    LongTermMemoryRecallMetadata, ProviderEvent, StreamChunk, StreamMetadata,
    TaskOutcomeAlertMetadata, TaskOutcomeKpiMetadata, TaskOutcomeMetadata, TenantRoutingMetadata,
    TurnPlanningMetadata,
};
use ao_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use ao_domain::trace::TraceEvent;
use ao_domain::turn::{ExecutionAction, ToolFailureMode, ToolSelectionMode, TurnContext, TurnPlan};
use ao_planner::TurnPlanner;
use ao_telemetry::{OutcomeTracker, TelemetryAlert};

use crate::conversation_lock::ConversationLockMap;
use crate::memory::MemoryRetriever;
use crate::provider::{ChatRequest, LlmProvider};
use crate::state::TurnState;
use crate::tool_runtime::ToolRuntime;

/// Everything the orchestrator needs from the outside world to run a turn,
/// all injected as trait objects rather than reached into directly.
pub struct TurnOrchestrator {
    planner: Arc<TurnPlanner>,
    telemetry: Arc<OutcomeTracker>,
    llm: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolRuntime>,
    memory: Option<Arc<dyn MemoryRetriever>>,
    config: OrchestratorConfig,
    adaptive_config: AdaptiveConfig,
    locks: ConversationLockMap,
}

/// One incoming turn.
pub struct TurnRequest {
    pub context: TurnContext,
    pub messages: Vec<Message>,
    /// Natural-language query fed to capability discovery. Usually the
    /// latest user message's text.
    pub discovery_query: String,
    pub policy_overrides: HashMap<String, String>,
    pub memory_scopes: Vec<String>,
}

impl TurnOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        planner: Arc<TurnPlanner>,
        telemetry: Arc<OutcomeTracker>,
        llm: Arc<dyn LlmProvider>,
        tools: Arc<dyn ToolRuntime>,
        memory: Option<Arc<dyn MemoryRetriever>>,
        config: OrchestratorConfig,
        adaptive_config: AdaptiveConfig,
    ) -> Self {
        Self {
            planner,
            telemetry,
            llm,
            tools,
            memory,
            config,
            adaptive_config,
            locks: ConversationLockMap::new(),
        }
    }

    /// Start a turn. Returns immediately with a channel of `StreamChunk`s;
    /// the turn itself runs on a spawned task, serialized per conversation.
    pub fn run_turn(self: &Arc<Self>, request: TurnRequest) -> mpsc::Receiver<StreamChunk> {
        let (tx, rx) = mpsc::channel(64);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_turn_inner(request, tx).await;
        });
        rx
    }

    async fn run_turn_inner(&self, request: TurnRequest, tx: mpsc::Sender<StreamChunk>) {
        let conversation_key = request.context.conversation_key().to_string();
        let _permit = self.locks.acquire(&conversation_key).await;

        let mut state = TurnState::Init;
        self.transition(&conversation_key, &mut state, TurnState::Plan);

        let organization_id = request
            .context
            .organization_id
            .clone()
            .unwrap_or_else(|| self.config.default_organization_id.clone());
        let used_default = request.context.organization_id.is_none();
        let _ = tx
            .send(StreamChunk::MetadataUpdate {
                metadata: StreamMetadata {
                    tenant_routing: Some(TenantRoutingMetadata {
                        organization_id: organization_id.clone(),
                        used_default,
                    }),
                    ..Default::default()
                },
            })
            .await;

        let plan = match self
            .planner
            .plan(&request.discovery_query, &request.policy_overrides)
            .await
        {
            Ok(plan) => plan,
            Err(err) => {
                self.emit_error(&tx, &err).await;
                return;
            }
        };

        let scope_key = ScopeKey::Composite {
            user_id: request.context.user_id.clone(),
            organization_id: organization_id.clone(),
        };
        let kpi: KpiWindow = self.telemetry.snapshot(&scope_key);
        let (plan, actions) = adapt(&plan, &kpi, &self.adaptive_config);
        let plan = self.apply_actions(plan, &scope_key, actions);

        self.emit_planning_metadata(&tx, &plan).await;
        self.transition(&conversation_key, &mut state, TurnState::Generate);

        let mut messages = request.messages.clone();
        self.inject_capability_context(&plan, &mut messages);
        self.inject_memory(&tx, &request, &mut messages).await;

        let tool_defs = match plan.policy.tool_selection_mode {
            ToolSelectionMode::All => self.tools.all_definitions(),
            ToolSelectionMode::Discovered => self.tools.definitions(&plan.capability_plan.tool_names),
        };

        let result = self
            .run_generation_loop(
                &conversation_key,
                &mut state,
                &tx,
                messages,
                tool_defs,
                plan.policy.tool_failure_mode,
            )
            .await;

        let (final_text, status) = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                self.record_outcome(&scope_key, OutcomeStatus::Failed).await;
                self.emit_error(&tx, &err).await;
                return;
            }
        };

        self.transition(&conversation_key, &mut state, TurnState::Finalize);
        let _ = tx
            .send(StreamChunk::FinalResponse {
                text: final_text,
            })
            .await;

        let (kpi, alert) = self.record_outcome(&scope_key, status).await;
        let _ = tx
            .send(StreamChunk::MetadataUpdate {
                metadata: StreamMetadata {
                    task_outcome: Some(TaskOutcomeMetadata {
                        status: status_str(status).to_string(),
                        score: Some(outcome_score(status)),
                    }),
                    task_outcome_kpi: Some(TaskOutcomeKpiMetadata {
                        scope_key: kpi.scope_key.clone(),
                        sample_count: kpi.sample_count,
                        weighted_success_rate: kpi.weighted_success_rate,
                    }),
                    task_outcome_alert: alert.map(|a| TaskOutcomeAlertMetadata {
                        scope_key: a.scope_key,
                        weighted_success_rate: a.weighted_success_rate,
                        threshold: self.telemetry.alert_threshold(),
                    }),
                    ..Default::default()
                },
            })
            .await;

        self.transition(&conversation_key, &mut state, TurnState::Done);
        let _ = tx.send(StreamChunk::Done).await;
    }

    /// Drives the GENERATE <-> TOOL_EXEC loop until the model stops
    /// requesting tools, the iteration cap is hit, or an unrecoverable
    /// error occurs. Returns `Ok` with the final text and outcome
    /// classification, or `Err` when `FailClosed` policy demands the turn
    /// terminate with a processing error.
    async fn run_generation_loop(
        &self,
        conversation_key: &str,
        state: &mut TurnState,
        tx: &mpsc::Sender<StreamChunk>,
        mut messages: Vec<Message>,
        tool_defs: Vec<ToolDefinition>,
        fail_mode: ToolFailureMode,
    ) -> Result<(String, OutcomeStatus)> {
        let mut final_text = String::new();

        for iteration in 1..=self.config.max_tool_call_iterations {
            let req = ChatRequest {
                messages: messages.clone(),
                tools: tool_defs.clone(),
                model: None,
            };
            let mut stream = self.llm.generate_stream(req).await?;

            let mut pending_calls: Vec<ToolCall> = Vec::new();
            let mut done_text: Option<String> = None;

            while let Some(event) = stream.next().await {
                match event {
                    ProviderEvent::Token { text } => {
                        let _ = tx.send(StreamChunk::TextDelta { text }).await;
                    }
                    ProviderEvent::ToolCallStarted { call_id, tool_name } => {
                        let _ = tx
                            .send(StreamChunk::ToolCallStart { call_id, tool_name })
                            .await;
                    }
                    ProviderEvent::ToolCallDelta { .. } => {}
                    ProviderEvent::ToolCallFinished {
                        call_id,
                        tool_name,
                        arguments,
                    } => {
                        pending_calls.push(ToolCall {
                            call_id,
                            tool_name,
                            arguments,
                        });
                    }
                    ProviderEvent::Done { text, .. } => done_text = Some(text),
                    ProviderEvent::Error { message } => {
                        return Err(Error::Provider {
                            provider: self.llm.provider_id().to_string(),
                            message,
                        });
                    }
                }
            }

            let text = done_text.unwrap_or_default();
            final_text = text.clone();
            messages.push(Message::assistant(text));

            if pending_calls.is_empty() {
                return Ok((final_text, OutcomeStatus::Success));
            }

            if iteration == self.config.max_tool_call_iterations {
                return Ok((final_text, OutcomeStatus::Partial));
            }

            self.transition(conversation_key, state, TurnState::ToolExec);
            for call in &pending_calls {
                match self.tools.execute(call).await {
                    Ok(content) => {
                        let _ = tx
                            .send(StreamChunk::ToolCallEnd {
                                call_id: call.call_id.clone(),
                                tool_name: call.tool_name.clone(),
                                success: true,
                                error: None,
                            })
                            .await;
                        messages.push(Message::tool_result(call.call_id.clone(), content));
                    }
                    Err(err) => {
                        let _ = tx
                            .send(StreamChunk::ToolCallEnd {
                                call_id: call.call_id.clone(),
                                tool_name: call.tool_name.clone(),
                                success: false,
                                error: Some(err.to_string()),
                            })
                            .await;
                        match fail_mode {
                            ToolFailureMode::FailOpen => {
                                messages.push(Message {
                                    role: Role::Tool,
                                    content: MessageContent::Parts(vec![ContentPart::ToolResult {
                                        tool_use_id: call.call_id.clone(),
                                        content: format!("error: {err}"),
                                        is_error: true,
                                    }]),
                                });
                            }
                            ToolFailureMode::FailClosed => return Err(err),
                        }
                    }
                }
            }
            self.transition(conversation_key, state, TurnState::Generate);
        }

        Ok((final_text, OutcomeStatus::Partial))
    }

    fn apply_actions(
        &self,
        mut plan: TurnPlan,
        scope_key: &ScopeKey,
        actions: Vec<ExecutionAction>,
    ) -> TurnPlan {
        for action in &actions {
            let reason = match action {
                ExecutionAction::ForcedAllTools { .. } => "forced_all_tools",
                ExecutionAction::ForcedFailOpen { .. } => "forced_fail_open",
                ExecutionAction::PreservedRequestedFailClosed { .. } => {
                    "preserved_requested_fail_closed"
                }
            };
            TraceEvent::AdaptiveActionApplied {
                scope_key: scope_key.as_string(),
                reason: reason.to_string(),
            }
            .emit();
        }
        plan.capability_plan.diagnostics.actions_applied = actions;
        plan
    }

    async fn emit_planning_metadata(&self, tx: &mpsc::Sender<StreamChunk>, plan: &TurnPlan) {
        let mode = match plan.policy.tool_selection_mode {
            ToolSelectionMode::Discovered => "discovered",
            ToolSelectionMode::All => "all",
        };
        let _ = tx
            .send(StreamChunk::MetadataUpdate {
                metadata: StreamMetadata {
                    turn_planning: Some(TurnPlanningMetadata {
                        tool_selection_mode: mode.to_string(),
                        discovery_attempted: plan.capability_plan.diagnostics.discovery_attempts > 0,
                        discovery_succeeded: plan.capability_plan.diagnostics.discovery_succeeded,
                        selected_tool_count: plan.capability_plan.tool_names.len(),
                        fallback_reason: plan.capability_plan.diagnostics.fallback_reason.clone(),
                    }),
                    ..Default::default()
                },
            })
            .await;
    }

    /// Injects the discovery engine's assembled Tier 0/1/2 text as a system
    /// message right after the caller's persona message(s), ahead of any
    /// recalled memory or the user's own messages. A no-op when discovery
    /// never ran for this turn.
    fn inject_capability_context(&self, plan: &TurnPlan, messages: &mut Vec<Message>) {
        let Some(context) = plan.capability_plan.prompt_context.as_ref() else {
            return;
        };
        if context.is_empty() {
            return;
        }
        let insert_at = messages.iter().take_while(|m| m.role == Role::System).count();
        messages.insert(insert_at, Message::system(format!("Available capabilities:\n{context}")));
    }

    async fn inject_memory(
        &self,
        tx: &mpsc::Sender<StreamChunk>,
        request: &TurnRequest,
        messages: &mut Vec<Message>,
    ) {
        let Some(memory) = &self.memory else { return };
        if request.memory_scopes.is_empty() {
            return;
        }
        let query = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.text())
            .unwrap_or_default()
            .to_string();

        let Ok(hits) = memory
            .recall(&query, self.config.long_term_memory.top_k)
            .await
        else {
            return;
        };

        let mut injected = String::new();
        let mut recalled_count = 0usize;
        for hit in &hits {
            if injected.len() + hit.text.len() > self.config.long_term_memory.max_context_chars {
                break;
            }
            injected.push_str(&hit.text);
            injected.push('\n');
            recalled_count += 1;
        }

        if !injected.is_empty() {
            messages.insert(0, Message::system(format!("Relevant memory:\n{injected}")));
        }

        let _ = tx
            .send(StreamChunk::MetadataUpdate {
                metadata: StreamMetadata {
                    long_term_memory_recall: Some(LongTermMemoryRecallMetadata {
                        scopes: request.memory_scopes.clone(),
                        recalled_count,
                        injected_chars: injected.len(),
                    }),
                    ..Default::default()
                },
            })
            .await;
    }

    async fn record_outcome(
        &self,
        scope_key: &ScopeKey,
        status: OutcomeStatus,
    ) -> (KpiWindow, Option<TelemetryAlert>) {
        let now_ms = now_ms();
        let entry = match status {
            OutcomeStatus::Success => OutcomeEntry::Success {
                timestamp_ms: now_ms,
                score: 1.0,
            },
            OutcomeStatus::Partial => OutcomeEntry::Partial {
                timestamp_ms: now_ms,
                score: 0.5,
            },
            OutcomeStatus::Failed => OutcomeEntry::Failed { timestamp_ms: now_ms },
        };
        let (kpi, alert) = self.telemetry.record(scope_key, entry, now_ms);
        TraceEvent::TurnOutcomeRecorded {
            scope_key: kpi.scope_key.clone(),
            status: status_str(status).to_string(),
            sample_count: kpi.sample_count,
            weighted_success_rate: kpi.weighted_success_rate,
        }
        .emit();
        if let Some(alert) = &alert {
            TraceEvent::TurnOutcomeAlertFired {
                scope_key: alert.scope_key.clone(),
                weighted_success_rate: alert.weighted_success_rate,
                threshold: self.telemetry.alert_threshold(),
            }
            .emit();
        }
        (kpi, alert)
    }

    async fn emit_error(&self, tx: &mpsc::Sender<StreamChunk>, err: &Error) {
        let _ = tx
            .send(StreamChunk::Error {
                kind: err.kind(),
                message: err.to_string(),
            })
            .await;
        let _ = tx.send(StreamChunk::Done).await;
    }

    fn transition(&self, conversation_id: &str, state: &mut TurnState, to: TurnState) {
        TraceEvent::TurnStateTransition {
            conversation_id: conversation_id.to_string(),
            from: state.as_str().to_string(),
            to: to.as_str().to_string(),
        }
        .emit();
        *state = to;
    }
}

fn status_str(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Failed => "failed",
        OutcomeStatus::Partial => "partial",
        OutcomeStatus::Success => "success",
    }
}

fn outcome_score(status: OutcomeStatus) -> f64 {
    match status {
        OutcomeStatus::Failed => 0.0,
        OutcomeStatus::Partial => 0.5,
        OutcomeStatus::Success => 1.0,
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
