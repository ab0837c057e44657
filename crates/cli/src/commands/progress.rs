//! Live progress lines on stderr, driven by the agent's event bus.

use std::sync::Arc;

use taskloom_core::event::DomainEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Print events from `rx` until the bus closes or the task is aborted.
pub fn spawn(mut rx: broadcast::Receiver<Arc<DomainEvent>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => eprintln!("{}", describe(&event)),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    eprintln!("  … {missed} events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn describe(event: &DomainEvent) -> String {
    match event {
        DomainEvent::StateChanged { agent, to, .. } => format!("  ● {agent}: {to}"),
        DomainEvent::StepCompleted { step, .. } => format!("  ✔ step {step} done"),
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => {
            let mark = if *success { "🔧" } else { "⚠️ " };
            format!("  {mark} {tool_name} ({duration_ms} ms)")
        }
        DomainEvent::PlanStepMarked {
            step_index, status, ..
        } => format!("  📋 plan step {step_index} {status}"),
    }
}
