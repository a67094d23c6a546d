mod capture;

use std::env;
use std::io;
use std::io::BufRead;
use std::path::PathBuf;

use chatbox_core::actions::ChatInput;
use chatbox_core::config::Config;
use chatbox_core::reducer::Notification;
use chatbox_core::response_data::flatten_response_data;
use chatbox_core::session::TranscriptStore;
use chatbox_upload::accept::AcceptFilter;
use chatbox_upload::controller::UploadController;
use chatbox_upload::controller::UploadLimits;
use chatbox_upload::traversal::collect_dropped;
use chatbox_upload::uploader::LocalStoreUploader;
use serde::Serialize;
use tracing::info;
use tracing::warn;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("chatbox {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "record" => run_record(parse_args(rest)?),
        "replay" => run_replay(parse_args(rest)?),
        "upload" => run_upload(parse_args(rest)?),
        "config" => run_config(parse_args(rest)?),
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayView {
    Transcript,
    Response,
}

#[derive(Debug)]
struct CliArgs {
    positional: Vec<PathBuf>,
    config: Option<PathBuf>,
    prompt: String,
    format: OutputFormat,
    view: ReplayView,
    store: PathBuf,
}

fn parse_args(args: Vec<String>) -> Result<CliArgs, Box<dyn std::error::Error>> {
    let mut parsed = CliArgs {
        positional: Vec::new(),
        config: None,
        prompt: "replay".to_string(),
        format: OutputFormat::Json,
        view: ReplayView::Transcript,
        store: PathBuf::from(".chatbox/store"),
    };
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" => parsed.config = Some(PathBuf::from(flag_value(&args, i)?)),
            "--prompt" => parsed.prompt = flag_value(&args, i)?.to_string(),
            "--store" => parsed.store = PathBuf::from(flag_value(&args, i)?),
            "--format" => {
                parsed.format = match flag_value(&args, i)? {
                    "json" => OutputFormat::Json,
                    "yaml" => OutputFormat::Yaml,
                    other => return Err(format!("unsupported format: {other}").into()),
                }
            }
            "--view" => {
                parsed.view = match flag_value(&args, i)? {
                    "transcript" => ReplayView::Transcript,
                    "response" => ReplayView::Response,
                    other => return Err(format!("unsupported view: {other}").into()),
                }
            }
            other if other.starts_with("--") => {
                return Err(format!("unsupported argument: {other}").into());
            }
            other => {
                parsed.positional.push(PathBuf::from(other));
                i += 1;
                continue;
            }
        }
        i += 2;
    }
    Ok(parsed)
}

fn flag_value(args: &[String], i: usize) -> Result<&str, Box<dyn std::error::Error>> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", args[i]).into())
}

fn load_config(args: &CliArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => match dirs::config_dir() {
            Some(dir) => dir.join("chatbox").join("config.toml"),
            None => return Ok(Config::default()),
        },
    };
    info!(path = %path.display(), "loading config");
    Ok(Config::load(&path)?)
}

/// Appends stream events and lifecycle markers read as JSON lines from
/// stdin to a capture file.
fn run_record(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let [path] = args.positional.as_slice() else {
        return Err("record requires exactly one capture path".into());
    };
    let mut writer = capture::CaptureWriter::open(path)?;
    let mut appended = 0_usize;
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match capture::parse_input_line(&line) {
            Ok(entry) => {
                writer.write(entry)?;
                appended += 1;
            }
            Err(err) => warn!(error = %err, "skipping unparseable input line"),
        }
    }
    println!("appended {appended} entries to {}", writer.path().display());
    Ok(())
}

fn run_replay(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let [path] = args.positional.as_slice() else {
        return Err("replay requires exactly one capture path".into());
    };
    let recorded = capture::read_capture(path)?;
    if recorded.skipped > 0 {
        warn!(skipped = recorded.skipped, "capture has unreadable lines");
    }
    let mut session = capture::replay(ChatInput::text(args.prompt.as_str()), &recorded.lines)?;
    report(&session.take_notifications());

    match args.view {
        ReplayView::Transcript => emit(session.transcript(), args.format),
        ReplayView::Response => {
            let records = session
                .transcript()
                .last()
                .map(|turn| flatten_response_data(&turn.response_data))
                .unwrap_or_default();
            emit(&records, args.format)
        }
    }
}

fn run_upload(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.positional.is_empty() {
        return Err("upload requires at least one path".into());
    }
    let config = load_config(&args)?;
    let filter = AcceptFilter::from_config(&config.upload)?;
    let selected = collect_dropped(&args.positional, &filter)?;

    let mut controller = UploadController::new(UploadLimits::from_config(&config.upload));
    controller.select_files(selected);
    let uploader = LocalStoreUploader::new(&args.store, config.upload.chunk_size_bytes());
    controller.upload_pending(&uploader);
    report(&controller.take_notifications());

    emit(&controller.submit_files(), args.format)
}

fn run_config(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn emit<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn report(notifications: &[Notification]) {
    for notification in notifications {
        eprintln!("{}: {}", notification.level.label(), notification.message);
    }
}

fn print_help() {
    println!("chatbox {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  chatbox record CAPTURE < stream.jsonl");
    println!("  chatbox replay CAPTURE [--prompt TEXT] [--view transcript|response] [--format json|yaml]");
    println!("  chatbox upload PATH... [--store DIR] [--config PATH] [--format json|yaml]");
    println!("  chatbox config [--config PATH]");
    println!("  chatbox --help");
    println!("  chatbox --version");
}
