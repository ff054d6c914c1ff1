//! Purpose: `stowage` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Command results are emitted as JSON on stdout.
//! Invariants: Non-interactive errors and notices are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use stowage::api::{Artifact, Error, ErrorKind, Format, pickle_to_json, to_exit_code};
use stowage::notice::{Notice, notice_json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `stowage --help` for usage."));
            }
        },
    };

    init_tracing();
    command_dispatch::dispatch_command(cli.command)
}

#[derive(Parser, Debug)]
#[command(
    name = "stowage",
    version,
    about = "Load, save, convert and mirror data files by extension",
    long_about = r#"Load and save JSON, pickle, safetensors and DICOM files with the format
inferred from the file extension, and mirror directory trees idempotently.

Logging goes to stderr and is controlled with RUST_LOG (default: warn)."#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Load a file and print it as JSON")]
    Show {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(long, help = "Format name, or auto to infer from the extension")]
        format: Option<String>,
        #[arg(long, help = "DICOM: stop reading before Pixel Data")]
        skip_pixel_data: bool,
        #[arg(long, help = "Pickle: decode Python 2 byte strings as text")]
        decode_strings: bool,
        #[arg(long, help = "Pickle: tolerate classes that cannot be resolved")]
        replace_unresolved_globals: bool,
    },
    #[command(about = "Load a file and save it in another format")]
    Convert {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        output: PathBuf,
        #[arg(long, help = "Input format (default: inferred)")]
        from: Option<String>,
        #[arg(long, help = "Output format (default: inferred)")]
        to: Option<String>,
    },
    #[command(about = "Copy or link source files missing from the destination")]
    Sync {
        #[arg(value_hint = ValueHint::DirPath)]
        src: PathBuf,
        #[arg(value_hint = ValueHint::DirPath)]
        dst: PathBuf,
        #[arg(long, help = "Create symlinks to the absolute source path instead of copying")]
        softlink: bool,
        #[arg(long, help = "Leave conflicting destination entries in place")]
        no_overwrite: bool,
        #[arg(
            long = "ext",
            value_name = "EXT",
            help = "Only sync files with this extension (repeatable)"
        )]
        exts: Vec<String>,
        #[arg(long, help = "Only sync files whose extension maps to a known format")]
        registered_only: bool,
    },
    #[command(about = "List known formats and their extensions")]
    Formats,
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version information")]
    Version,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    rendered
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim_start_matches("error:").trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

/// `None` and `auto` both mean "infer from the extension".
fn requested_format(value: Option<&str>) -> Result<Option<Format>, Error> {
    match value {
        None => Ok(None),
        Some(name) if name.eq_ignore_ascii_case("auto") => Ok(None),
        Some(name) => name.parse().map(Some),
    }
}

fn artifact_json(artifact: &Artifact) -> Value {
    match artifact {
        Artifact::Json(value) => value.clone(),
        Artifact::Pickle(value) => pickle_to_json(value)
            .unwrap_or_else(|_| json!({ "kind": "pickle", "repr": format!("{value:?}") })),
        Artifact::Checkpoint(checkpoint) => {
            let mut tensors = Map::new();
            for (name, tensor) in &checkpoint.tensors {
                tensors.insert(
                    name.clone(),
                    json!({
                        "dtype": format!("{:?}", tensor.dtype),
                        "shape": tensor.shape,
                        "bytes": tensor.data.len(),
                        "device": tensor.device.to_string(),
                    }),
                );
            }
            json!({
                "kind": "checkpoint",
                "tensors": tensors,
                "metadata": checkpoint.metadata,
            })
        }
        Artifact::Image(image) => {
            let meta = image.meta();
            json!({
                "kind": "image",
                "transfer_syntax": meta.transfer_syntax(),
                "sop_class_uid": meta.media_storage_sop_class_uid(),
                "sop_instance_uid": meta.media_storage_sop_instance_uid(),
                "elements": image.iter().count(),
            })
        }
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> String {
    use time::format_description::well_known::Rfc3339;
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| {
            time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()
        })
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_default()
}

fn emit_notice(notice: &Notice) {
    if io::stderr().is_terminal() {
        eprintln!("notice: {}", notice.message);
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::AlreadyExists => "already exists".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::UnknownExtension => "unrecognized extension".to_string(),
        ErrorKind::NotImplemented => "format not implemented".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    for cause in error_causes(err) {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}
