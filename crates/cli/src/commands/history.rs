use warden_core::source::canonical_identity;
use warden_storage::{HistoryStore, JsonlHistoryStore};

use crate::{report_error, Context, OutputFormat};

pub(crate) fn cmd_history(ctx: &Context, script: &str, limit: usize) -> i32 {
    let Some(identity) = canonical_identity(script) else {
        report_error(
            &format!("script identifier '{}' escapes the scripts root", script),
            ctx.output,
            ctx.quiet,
        );
        return 1;
    };
    let history = match JsonlHistoryStore::open(&ctx.config.history_file) {
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
    let records = match rt.block_on(history.list(&identity, limit)) {
        Ok(r) => r,
        Err(e) => {
            report_error(&e.to_string(), ctx.output, ctx.quiet);
            return 1;
        }
    };

    match ctx.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records).unwrap_or_default());
        }
        OutputFormat::Text if records.is_empty() => {
            if !ctx.quiet {
                println!("no recorded executions of {}", identity);
            }
        }
        OutputFormat::Text => {
            for r in &records {
                println!(
                    "#{:<4} {}  {:<8} {:<16} {:<12} {}{}",
                    r.id,
                    r.recorded_at,
                    r.mode.to_string(),
                    r.summary.status.to_string(),
                    r.principal,
                    &r.checksum[..r.checksum.len().min(12)],
                    if r.rerun { "  (rerun)" } else { "" }
                );
            }
        }
    }
    0
}
