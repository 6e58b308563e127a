pub(crate) mod check;
pub(crate) mod compile;
pub(crate) mod history;
pub(crate) mod run;

use warden_core::{
    compile_script, ActionList, CompileError, FileSystemLoader, ResolveOptions, ScriptCache,
};

use crate::{report_error, Context, OutputFormat};

pub(crate) fn script_cache(ctx: &Context) -> ScriptCache<FileSystemLoader> {
    ScriptCache::new(FileSystemLoader::new(&ctx.config.scripts_dir))
}

pub(crate) fn resolve_options(ctx: &Context) -> ResolveOptions {
    ResolveOptions {
        max_depth: ctx.config.max_include_depth,
    }
}

/// Compile `script`, printing the error and returning `None` on failure.
pub(crate) fn compile_or_report(ctx: &Context, script: &str) -> Option<ActionList> {
    let cache = script_cache(ctx);
    match compile_script(script, &cache, resolve_options(ctx)) {
        Ok(list) => Some(list),
        Err(e) => {
            report_compile_error(ctx, &e);
            None
        }
    }
}

pub(crate) fn report_compile_error(ctx: &Context, e: &CompileError) {
    match ctx.output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&e.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", e));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => match e {
            CompileError::Semantic(errors) => {
                for err in errors {
                    report_error(&err.to_string(), ctx.output, ctx.quiet);
                }
            }
            CompileError::Resolution(warden_core::ResolutionError::IncludeInvalid {
                identifier,
                errors,
            }) => {
                report_error(
                    &format!("included script '{}' is invalid:", identifier),
                    ctx.output,
                    ctx.quiet,
                );
                for err in errors {
                    report_error(&format!("  {}", err), ctx.output, ctx.quiet);
                }
            }
            other => report_error(&other.to_string(), ctx.output, ctx.quiet),
        },
    }
}
