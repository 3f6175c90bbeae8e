//! Run lifecycle — start, stop, heartbeat, and the abandoned-run
//! reaper.
//!
//! The controller is the only place that emits terminal status events,
//! always paired with the store's exactly-once `finish_once`
//! transition, so duplicate stops and reaper races collapse into a
//! single terminal event per run.

use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;

use al_bus::ControlMessage;
use al_domain::error::{Error, FailureKind, Result};
use al_domain::event::{EventPayload, RunStatus};
use al_domain::record::{MessageRecord, MessageType, RunRecord};

use crate::state::AppState;

use super::turn::{run_thread, RunInput, TurnOutcome};
use super::truncate_str;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// start
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default instructions when the thread is not driven by a configured
/// agent.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful agent. Use the available tools to \
     accomplish the user's task, keep the task list up to date as you work, and call \
     `complete` when you are done or `ask` when you need input.";

/// What the API layer passes to start a run.
pub struct StartRequest {
    pub thread_id: Uuid,
    pub account_id: String,
    pub message: String,
    pub model: Option<String>,
    pub enable_thinking: bool,
    pub reasoning_effort: Option<String>,
    pub tool_call_style: al_domain::chat::ToolCallStyle,
    pub agent_id: Option<Uuid>,
}

/// Insert the run record, persist the user message, publish
/// `status(running)`, and spawn the worker. Returns the run id.
pub fn start_run(state: &AppState, req: StartRequest) -> Result<Uuid> {
    let thread = state
        .store
        .threads
        .get(&req.thread_id)
        .ok_or_else(|| Error::NotFound(format!("thread {}", req.thread_id)))?;

    // Resolve the agent's immutable config snapshot, if one drives this
    // thread.
    let (system_prompt, enabled_tools, agent_model) = match req.agent_id {
        Some(agent_id) => {
            let version = state
                .store
                .agents
                .current_version(&agent_id)
                .ok_or_else(|| Error::NotFound(format!("agent {agent_id}")))?;
            (
                version.system_prompt,
                Some(version.enabled_tools),
                Some(version.model),
            )
        }
        None => (DEFAULT_SYSTEM_PROMPT.to_string(), None, None),
    };

    // Persist the triggering user message.
    let user_record = MessageRecord::new(
        req.thread_id,
        thread.project_id,
        MessageType::User,
        "user",
        serde_json::json!(req.message),
    );
    state.store.messages.append(&user_record)?;

    // Insert the run row.
    let mut run = RunRecord::new(req.thread_id, state.instance_id.clone());
    let model = req.model.clone().or(agent_model);
    run.model = model.clone();
    run.input_preview = Some(truncate_str(&req.message, 200));
    let run_id = run.run_id;
    state.store.runs.insert(run)?;

    state
        .bus
        .publish(run_id, EventPayload::status(RunStatus::Running));
    state.active_runs.add(run_id);
    state.stops.register(run_id);

    let input = RunInput {
        run_id,
        thread_id: req.thread_id,
        project_id: thread.project_id,
        account_id: req.account_id,
        system_prompt,
        model,
        temperature: None,
        max_tokens: None,
        tool_choice: al_domain::chat::ToolChoice::Auto,
        tool_call_style: req.tool_call_style,
        include_xml_examples: true,
        enable_thinking: req.enable_thinking,
        reasoning_effort: req.reasoning_effort,
        enabled_tools,
        output_schema: None,
    };

    tokio::spawn(worker(state.clone(), input));
    Ok(run_id)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// worker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn worker(state: AppState, input: RunInput) {
    let run_id = input.run_id;
    let stop = state.stops.register(run_id);

    // Bridge the run's control channel onto the stop flag. Both Stop
    // and Shutdown end the run cooperatively; Shutdown is also swept by
    // the reaper on other instances via the lapsed heartbeat.
    let mut control = state.bus.subscribe_control(run_id);
    let bridge_stop = stop.clone();
    let bridge = tokio::spawn(async move {
        loop {
            match control.recv().await {
                Ok(ControlMessage::Stop) | Ok(ControlMessage::Shutdown) => {
                    bridge_stop.stop();
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Heartbeat: refresh this run's TTL in the active set.
    let heartbeat_state = state.clone();
    let heartbeat_secs = state.config.run.heartbeat_seconds;
    let heartbeat = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(heartbeat_secs));
        loop {
            interval.tick().await;
            heartbeat_state.active_runs.heartbeat(run_id);
        }
    });

    tracing::debug!(run_id = %run_id, thread_id = %input.thread_id, "run worker started");
    let result = run_thread(&state, &input, &stop).await;

    bridge.abort();
    heartbeat.abort();

    finalize(&state, &input, result);

    state.active_runs.remove(&run_id);
    state.stops.remove(&run_id);
}

/// Convert the worker's outcome into the single terminal status event,
/// gated on the store's exactly-once transition.
fn finalize(state: &AppState, input: &RunInput, result: Result<TurnOutcome>) {
    let run_id = input.run_id;
    match result {
        Ok(TurnOutcome::Completed { final_text, usage }) => {
            state.store.runs.update(&run_id, |r| {
                r.usage = usage.clone();
                r.output_preview = Some(truncate_str(&final_text, 200));
            });
            if state.store.runs.finish_once(&run_id, RunStatus::Completed, None) {
                state
                    .bus
                    .publish(run_id, EventPayload::status(RunStatus::Completed));
            }
            tracing::info!(run_id = %run_id, "run completed");
        }
        Ok(TurnOutcome::Stopped) | Err(Error::AgentStopped) => {
            if state.store.runs.finish_once(&run_id, RunStatus::Stopped, None) {
                state
                    .bus
                    .publish(run_id, EventPayload::status(RunStatus::Stopped));
            }
            tracing::info!(run_id = %run_id, "run stopped");
        }
        Err(e) => {
            let kind = e.failure_kind().unwrap_or(FailureKind::Unrecoverable);
            let message = e.to_string();
            if state
                .store
                .runs
                .finish_once(&run_id, RunStatus::Failed, Some(message.clone()))
            {
                state
                    .bus
                    .publish(run_id, EventPayload::failed(kind, message.clone()));
            }
            tracing::warn!(run_id = %run_id, error = %message, "run failed");
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// stop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Signal a run to stop. Idempotent: repeated calls (and calls after
/// the run already ended) have no further effect. Returns `false` only
/// when the run is unknown.
pub fn stop_run(state: &AppState, run_id: Uuid) -> bool {
    if state.store.runs.get(&run_id).is_none() {
        return false;
    }
    // Level-triggered flag first: a stop arriving before the worker
    // subscribes to its control channel must still take effect.
    state.stops.stop(run_id);
    let listeners = state.bus.publish_control(run_id, ControlMessage::Stop);
    tracing::info!(run_id = %run_id, listeners, "stop requested");
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Background sweepers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Mark runs whose heartbeat TTL lapsed as failed/abandoned.
pub fn spawn_reaper(state: AppState) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(state.config.run.heartbeat_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            for run_id in state.active_runs.take_expired() {
                let message = "run abandoned: heartbeat expired".to_string();
                if state
                    .store
                    .runs
                    .finish_once(&run_id, RunStatus::Failed, Some(message.clone()))
                {
                    state
                        .bus
                        .publish(run_id, EventPayload::failed(FailureKind::Abandoned, message));
                    tracing::warn!(run_id = %run_id, "abandoned run reaped");
                }
                state.stops.remove(&run_id);
            }
        }
    })
}

/// Drop expired response logs (24h TTL by default).
pub fn spawn_bus_sweeper(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let removed = state.bus.sweep_expired();
            if removed > 0 {
                tracing::info!(removed, "expired response logs swept");
            }
        }
    })
}

/// Graceful shutdown: every active worker persists `stopped` and exits.
pub fn shutdown(state: &AppState) {
    state.bus.shutdown_all();
}
