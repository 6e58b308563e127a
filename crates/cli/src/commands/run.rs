use std::time::Duration;

use warden_engine::{
    compile_and_run, AuditStatus, CancelToken, ExecutionReport, InMemoryRepository, Mode,
    RunError, RunOptions, RunOutcome, Status,
};
use warden_storage::JsonlHistoryStore;

use super::{report_compile_error, resolve_options, script_cache};
use crate::{report_error, Context, OutputFormat};

fn print_report(report: &ExecutionReport) {
    println!(
        "{} {} (checksum {})",
        report.mode,
        report.script,
        &report.checksum[..report.checksum.len().min(12)]
    );
    for (i, entry) in report.entries.iter().enumerate() {
        println!(
            "  {:>3}. {:<48} {}",
            i + 1,
            entry.action.action.describe(),
            entry.outcome
        );
    }
    let s = report.summary();
    println!(
        "status: {} ({} applied, {} skipped, {} failed, {} not attempted{})",
        s.status,
        s.applied,
        s.skipped,
        s.failed,
        s.not_attempted,
        if s.cancelled { ", cancelled" } else { "" }
    );
}

/// `dry-run` and `apply`. Exit code 1 when the script never ran or its
/// changes could not be saved, 2 when it ran without full success. The
/// state file is written by the repository commit, before history.
pub(crate) fn cmd_run(ctx: &Context, script: &str, mode: Mode, rerun: bool) -> i32 {
    let config = &ctx.config;
    let repo = match InMemoryRepository::load(&config.state_file) {
        Ok(r) => r,
        Err(e) => {
            report_error(&e.to_string(), ctx.output, ctx.quiet);
            return 1;
        }
    };
    let history = match JsonlHistoryStore::open(&config.history_file) {
        Ok(h) => h,
        Err(e) => {
            report_error(&e.to_string(), ctx.output, ctx.quiet);
            return 1;
        }
    };
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {}", e), ctx.output, ctx.quiet);
            return 1;
        }
    };

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing the current action");
            on_interrupt.cancel();
        }
    });

    let options = RunOptions {
        resolve: resolve_options(ctx),
        call_timeout: Duration::from_millis(config.call_timeout_ms),
        principal: config.principal.clone(),
        rerun,
        cancel,
    };
    let cache = script_cache(ctx);
    let outcome = rt.block_on(compile_and_run(script, mode, &options, &cache, &repo, &history));

    let (report, audit) = match outcome {
        Ok(RunOutcome::Executed { report, audit }) => (report, audit),
        Ok(RunOutcome::Unchanged { previous }) => {
            if !ctx.quiet {
                match ctx.output {
                    OutputFormat::Text => println!(
                        "{} unchanged since record #{} ({}); use --rerun to apply again",
                        previous.identity, previous.id, previous.recorded_at
                    ),
                    OutputFormat::Json => {
                        let json = serde_json::json!({ "unchanged": true, "previous": previous });
                        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
                    }
                }
            }
            return 0;
        }
        Err(RunError::Compile(e)) => {
            report_compile_error(ctx, &e);
            return 1;
        }
        Err(e) => {
            match ctx.output {
                OutputFormat::Json => eprintln!("{}", e.to_json_value()),
                OutputFormat::Text => report_error(&e.to_string(), ctx.output, ctx.quiet),
            }
            return 1;
        }
    };

    let audit_json = match &audit {
        AuditStatus::Recorded(record) => serde_json::json!({ "recorded": record.id }),
        AuditStatus::WriteFailed(e) => {
            tracing::warn!(error = %e, "execution was not recorded in history");
            serde_json::json!({ "write_failed": e.to_string() })
        }
    };

    if !ctx.quiet {
        match ctx.output {
            OutputFormat::Text => print_report(&report),
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "report": report.to_json_value(),
                    "audit":  audit_json,
                });
                println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
            }
        }
    }

    if report.status == Status::Success {
        0
    } else {
        2
    }
}
