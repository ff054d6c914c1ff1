//! Purpose: Hold top-level CLI command dispatch for `stowage`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command emits exactly one JSON document on stdout on success.
//! Invariants: Library errors pass through unchanged so exit codes stay kind-derived.

use std::path::Path;

use clap::CommandFactory;
use stowage::api::{FormatRegistry, LoadOptions, SyncOptions, load, recursive_copy, save};
use stowage::notice::sync_notice;

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Show {
            path,
            format,
            skip_pixel_data,
            decode_strings,
            replace_unresolved_globals,
        } => {
            let format = requested_format(format.as_deref())?;
            let options = LoadOptions {
                decode_strings,
                replace_unresolved_globals,
                skip_pixel_data,
            };
            let artifact = load(&path, format, &options)?.ok_or_else(|| not_utf8(&path))?;
            emit_json(artifact_json(&artifact));
            Ok(RunOutcome::ok())
        }
        Command::Convert {
            input,
            output,
            from,
            to,
        } => {
            let from = requested_format(from.as_deref())?;
            let to = requested_format(to.as_deref())?;
            let artifact = load(&input, from, &LoadOptions::default())?
                .ok_or_else(|| not_utf8(&input))?;
            save(&artifact, &output, to)?.ok_or_else(|| not_utf8(&output))?;
            emit_json(json!({
                "input": input.display().to_string(),
                "output": output.display().to_string(),
                "artifact": artifact.kind(),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Sync {
            src,
            dst,
            softlink,
            no_overwrite,
            exts,
            registered_only,
        } => {
            let exts = exts
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect::<Vec<_>>();
            let registry = FormatRegistry::global();
            let mut options = SyncOptions::new()
                .softlink(softlink)
                .overwrite(!no_overwrite);
            if !exts.is_empty() || registered_only {
                options = options.filter(|name: &str| {
                    let Some(ext) = file_extension(name) else {
                        return false;
                    };
                    (exts.is_empty() || exts.contains(&ext))
                        && (!registered_only || registry.resolve(&ext).is_some())
                });
            }

            let report = recursive_copy(&src, &dst, &options)?;
            for event in &report.events {
                emit_notice(&sync_notice(event, notice_time_now()));
            }
            emit_json(json!({
                "src": src.display().to_string(),
                "dst": dst.display().to_string(),
                "copied": report.copied.len(),
                "linked": report.linked.len(),
                "overwritten": report.overwritten.len(),
                "skipped": report.skipped.len(),
                "up_to_date": report.up_to_date,
            }));
            Ok(RunOutcome::ok())
        }
        Command::Formats => {
            let formats = FormatRegistry::global()
                .entries()
                .map(|(format, exts)| json!({ "name": format.name(), "extensions": exts }))
                .collect::<Vec<_>>();
            emit_json(json!({ "formats": formats }));
            Ok(RunOutcome::ok())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "stowage", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(json!({
                "name": "stowage",
                "version": env!("CARGO_PKG_VERSION"),
            }));
            Ok(RunOutcome::ok())
        }
    }
}

/// Lower-cased text after the last dot; a name without a dot has no extension.
fn file_extension(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

fn not_utf8(path: &Path) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message("path is not valid UTF-8")
        .with_path(path)
}
