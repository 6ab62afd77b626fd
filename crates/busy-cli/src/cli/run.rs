//! `busy run`: drive the sample order playbook through the orchestrator.

use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;

use busy_core::event::EventBus;
use busy_core::operation::order::order_operations;
use busy_core::orchestration::{
    ContextError, ExecutionContext, InterventionManager, OrchestratorError, TraceEntry,
    TraceStatus,
};
use busy_types::config::EngineConfig;
use busy_types::intervention::ExecutionStats;
use busy_types::operation::Input;

use super::interface::TerminalInterface;
use super::policy::AutoPolicy;
use super::{PolicyKind, RunArgs};

const PROCESS_NAME: &str = "order-processing";

/// How the playbook ended.
#[derive(Debug)]
pub struct RunReport {
    pub aborted: bool,
    pub data: Option<Value>,
    pub stats: ExecutionStats,
    pub trace: Vec<TraceEntry>,
    pub manual_mode: bool,
}

/// Build the manager with the interface selected on the command line.
fn build_manager(args: &RunArgs, config: &EngineConfig, quiet: bool) -> Arc<InterventionManager> {
    let manager = Arc::new(InterventionManager::new(
        config,
        EventBus::new(config.event_channel_capacity),
    ));
    match args.policy {
        PolicyKind::Interactive => manager.set_interface(TerminalInterface::new()),
        PolicyKind::Auto => {
            manager.set_interface(AutoPolicy::new(args.on_failure, args.max_retries, quiet))
        }
    }
    if args.manual {
        manager.enter_manual_mode();
    }
    manager
}

/// Run the context's playbook from its first operation, following the
/// navigation decisions of each step until the sequence ends or is aborted.
pub async fn drive(ctx: &mut ExecutionContext, input: Input) -> Result<RunReport> {
    let mut next = ctx.operation_names().first().cloned();
    let mut input = input;
    let mut data = None;
    let mut aborted = false;

    while let Some(operation) = next.take() {
        let outcome = match ctx.send_input_with_interventions(&operation, input.clone()).await {
            Ok(outcome) => outcome,
            Err(ContextError::Orchestrator(OrchestratorError::Aborted)) => {
                aborted = true;
                break;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Step '{operation}' failed"));
            }
        };

        if let Some(restored) = outcome.restored_context {
            ctx.apply_state(restored);
        }
        if let Some(output) = outcome.output {
            data = Some(output.data().clone());
            input = output.into_input();
        }
        if outcome.should_continue {
            next = outcome.next_operation;
        }
    }

    let manager = ctx.manager();
    Ok(RunReport {
        aborted,
        data,
        stats: manager.get_execution_stats(),
        trace: ctx.execution_trace().to_vec(),
        manual_mode: manager.is_manual_mode(),
    })
}

pub async fn run(args: RunArgs, config: &EngineConfig, json: bool, quiet: bool) -> Result<()> {
    let manager = build_manager(&args, config, quiet);

    let mut events = manager.event_bus().subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(?event, "orchestration event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut ctx = ExecutionContext::new(PROCESS_NAME, Arc::clone(&manager), config);
    for operation in order_operations() {
        ctx.register_capability(operation);
    }

    if !json && !quiet {
        println!();
        println!(
            "  {} Running {} ({})",
            style("▶").green().bold(),
            style(PROCESS_NAME).cyan(),
            ctx.operation_names().join(" -> ")
        );
    }

    let input = Input::untyped(json!({ "orderId": args.order_id }));
    let report = drive(&mut ctx, input).await;
    logger.abort();
    let report = report?;

    print_report(&report, json)?;

    if report.aborted {
        return Err(OrchestratorError::Aborted).context("Run stopped");
    }
    Ok(())
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        let value = json!({
            "process": PROCESS_NAME,
            "status": if report.aborted { "aborted" } else { "completed" },
            "data": report.data,
            "stats": report.stats,
            "trace": report.trace,
            "manual_mode": report.manual_mode,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    let mut trace = Table::new();
    trace.load_preset(presets::UTF8_FULL_CONDENSED);
    trace.set_content_arrangement(ContentArrangement::Dynamic);
    trace.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Operation").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);
    for (index, entry) in report.trace.iter().enumerate() {
        let color = match entry.status {
            TraceStatus::Completed => Color::Green,
            TraceStatus::Skipped | TraceStatus::Rewound => Color::Yellow,
            TraceStatus::Aborted | TraceStatus::Failed => Color::Red,
        };
        trace.add_row(vec![
            Cell::new(index + 1).fg(Color::DarkGrey),
            Cell::new(&entry.operation_name).fg(Color::Cyan),
            Cell::new(entry.status).fg(color),
        ]);
    }
    println!("{trace}");

    let stats = report.stats;
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Steps").fg(Color::White),
        Cell::new("Completed").fg(Color::White),
        Cell::new("Failed").fg(Color::White),
        Cell::new("Checkpoints").fg(Color::White),
    ]);
    table.add_row(vec![
        Cell::new(stats.total_steps),
        Cell::new(stats.completed_steps).fg(Color::Green),
        Cell::new(stats.failed_steps).fg(if stats.failed_steps > 0 {
            Color::Red
        } else {
            Color::DarkGrey
        }),
        Cell::new(stats.total_checkpoints),
    ]);
    println!("{table}");

    if let Some(data) = &report.data {
        println!("  {} {}", style("Data:").dim(), serde_json::to_string(data)?);
    }
    if report.aborted {
        println!("  {}", style("Process aborted by user intervention").red().bold());
    } else {
        println!("  {}", style("Playbook finished").green());
    }
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use busy_core::testing::ScriptedInterface;
    use busy_types::intervention::InterventionAction;

    fn context(manager: Arc<InterventionManager>) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(PROCESS_NAME, manager, &EngineConfig::default());
        for operation in order_operations() {
            ctx.register_capability(operation);
        }
        ctx
    }

    #[tokio::test]
    async fn test_playbook_completes_without_interventions() {
        let manager = Arc::new(InterventionManager::with_defaults());
        let mut ctx = context(Arc::clone(&manager));

        let report = drive(&mut ctx, Input::untyped(json!({ "orderId": "ORD-001" })))
            .await
            .unwrap();

        assert!(!report.aborted);
        let data = report.data.unwrap();
        assert_eq!(data["validated"], json!(true));
        assert_eq!(data["processed"], json!(true));
        assert_eq!(report.stats.completed_steps, 2);
        assert_eq!(report.stats.total_checkpoints, 4);
        assert_eq!(report.trace.len(), 2);
    }

    #[tokio::test]
    async fn test_rewind_replays_from_checkpoint() {
        let manager = Arc::new(InterventionManager::with_defaults());
        let mut ctx = context(Arc::clone(&manager));

        // Validate once, then rewind the replay's first step to that run's
        // `before` checkpoint.
        ctx.send_input_with_interventions(
            "validate-order",
            Input::untyped(json!({ "orderId": "ORD-001" })),
        )
        .await
        .unwrap();
        let first = manager.checkpoints().get_all_checkpoints()[0].id;
        manager.set_interface(ScriptedInterface::new(vec![InterventionAction::Back {
            target_checkpoint: first,
        }]));
        manager.request_intervention();

        let report = drive(&mut ctx, Input::untyped(json!({ "orderId": "ORD-001" })))
            .await
            .unwrap();

        assert!(!report.aborted);
        let statuses: Vec<TraceStatus> = report.trace.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![
                TraceStatus::Completed,
                TraceStatus::Rewound,
                TraceStatus::Completed,
                TraceStatus::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_abort_is_reported() {
        let manager = Arc::new(InterventionManager::with_defaults());
        manager.set_interface(ScriptedInterface::new(vec![InterventionAction::Abort]));
        let mut ctx = context(Arc::clone(&manager));

        let report = drive(&mut ctx, Input::untyped(json!({ "orderId": "" })))
            .await
            .unwrap();

        assert!(report.aborted);
        assert!(report.manual_mode);
        assert_eq!(report.stats.failed_steps, 1);
        assert_eq!(report.trace[0].status, TraceStatus::Aborted);
    }
}
