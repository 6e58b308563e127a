use crate::Context;

use super::compile_or_report;

/// Always JSON: the action list is the command's product.
pub(crate) fn cmd_compile(ctx: &Context, script: &str) -> i32 {
    let Some(list) = compile_or_report(ctx, script) else {
        return 1;
    };
    let pretty = serde_json::to_string_pretty(&list)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
    0
}
