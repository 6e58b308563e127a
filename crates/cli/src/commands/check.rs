use crate::{Context, OutputFormat};

use super::compile_or_report;

pub(crate) fn cmd_check(ctx: &Context, script: &str) -> i32 {
    let Some(list) = compile_or_report(ctx, script) else {
        return 1;
    };
    if !ctx.quiet {
        match ctx.output {
            OutputFormat::Text => {
                println!(
                    "ok {} {} ({} actions from {} script{})",
                    list.script,
                    list.checksum,
                    list.len(),
                    list.sources.len(),
                    if list.sources.len() == 1 { "" } else { "s" }
                );
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid":    true,
                    "script":   list.script,
                    "checksum": list.checksum,
                    "actions":  list.len(),
                    "sources":  list.sources,
                });
                println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
            }
        }
    }
    0
}
