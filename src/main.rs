//! Purpose: `hdlrun` CLI entry point.
//! Role: Binary crate root; parses args, loads the manifest, runs the bootstrap sequence.
//! Invariants: Setup errors are emitted as JSON on stderr when stderr is not a TTY.
//! Invariants: Process exit code is the engine's, or `api::to_exit_code` on setup failure.
//! Invariants: Logs go to stderr; stdout belongs to the engine (or the dry-run snapshot).
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use hdlrun::api::{
    BootstrapConfig, CommandEngine, DEFAULT_MANIFEST, DryRunEngine, Engine, EngineArgs, Error,
    ErrorKind, NativeLibraryTool, OutputLayout, RunManifest, Simulator, default_output_root,
    prepare, to_exit_code,
};
use hdlrun::notice::{Notice, empty_registration_notice, notice_json};

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
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

#[derive(Parser)]
#[command(
    name = "hdlrun",
    version,
    about = "Bootstrap an HDL unit-test run and hand it to the test engine",
    long_about = None,
    after_help = r#"EXAMPLES
  $ hdlrun --dry-run                         # print the project snapshot
  $ hdlrun --engine 'python3 run_vunit.py'   # run all tests
  $ hdlrun --engine 'python3 run_vunit.py' 'blog_lib.tb_*' -p 4

The run manifest (default: hdlrun.json) declares libraries, source files and
globs, simulation options, and bundles (osvvm, verification_components,
check_preprocessing). Source patterns resolve relative to the manifest.
Sources with `*` or `?` are globs that may match nothing; a name with only
`[...]` must match at least one file (write [[] for a literal bracket).

Runner paths with spaces: pass the path alone to --engine, or put arguments
in repeated --engine-arg values."#
)]
struct Cli {
    #[arg(help = "Test name patterns forwarded to the engine")]
    patterns: Vec<String>,

    #[arg(
        short,
        long,
        default_value = DEFAULT_MANIFEST,
        help = "Run manifest describing libraries, sources, options, and bundles",
        value_hint = ValueHint::FilePath
    )]
    manifest: PathBuf,

    #[arg(
        short,
        long = "output-path",
        help = "Output root for simulator libraries (default: vunit_out)",
        value_hint = ValueHint::DirPath
    )]
    output_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "modelsim", help = "Target simulator")]
    simulator: SimulatorArg,

    #[arg(
        long,
        help = "Command that creates a native library (default: vlib; none for ghdl)",
        value_hint = ValueHint::CommandName
    )]
    library_tool: Option<PathBuf>,

    #[arg(
        long,
        help = "Test engine command, split on whitespace unless it names an existing file; \
                receives --project <snapshot.json> and the test arguments",
        conflicts_with = "dry_run"
    )]
    engine: Option<String>,

    #[arg(
        long = "engine-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        help = "Extra argument placed before --project; repeatable, kept verbatim (spaces allowed)"
    )]
    engine_args: Vec<String>,

    #[arg(long, help = "Print the project snapshot instead of running the engine")]
    dry_run: bool,

    #[arg(long, help = "Remove previous simulator output before setup")]
    clean: bool,

    #[arg(short, long, help = "Only list tests")]
    list: bool,

    #[arg(long, help = "Only compile the project")]
    compile: bool,

    #[arg(long, help = "Only elaborate test benches")]
    elaborate: bool,

    #[arg(long = "exit-0", help = "Exit 0 even when tests fail")]
    exit_0: bool,

    #[arg(short = 'p', long, help = "Number of parallel simulation threads")]
    num_threads: Option<usize>,

    #[arg(short = 'x', long, help = "xUnit XML report path", value_hint = ValueHint::FilePath)]
    xunit_xml: Option<PathBuf>,

    #[arg(short, long, help = "Verbose logging and engine output")]
    verbose: bool,

    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[arg(long, value_enum, value_name = "SHELL", help = "Print shell completions and exit")]
    completions: Option<Shell>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SimulatorArg {
    Modelsim,
    Rivierapro,
    Activehdl,
    Ghdl,
}

impl From<SimulatorArg> for Simulator {
    fn from(value: SimulatorArg) -> Self {
        match value {
            SimulatorArg::Modelsim => Simulator::Modelsim,
            SimulatorArg::Rivierapro => Simulator::Rivierapro,
            SimulatorArg::Activehdl => Simulator::Activehdl,
            SimulatorArg::Ghdl => Simulator::Ghdl,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(RunOutcome::ok());
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `hdlrun --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        clap_complete::aot::generate(shell, &mut cmd, "hdlrun", &mut io::stdout());
        return Ok(RunOutcome::ok());
    }

    init_tracing(cli.verbose);

    bootstrap(cli, color_mode)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn bootstrap(cli: Cli, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    let simulator = Simulator::from(cli.simulator);
    let output_root = cli.output_path.unwrap_or_else(default_output_root);
    let layout = OutputLayout::new(output_root, simulator);

    let manifest = RunManifest::load(&cli.manifest)?;
    let source_root = RunManifest::source_root(&cli.manifest);

    let library_tool = match cli.library_tool {
        Some(program) => NativeLibraryTool::with_program(program),
        None => NativeLibraryTool::for_simulator(simulator),
    };
    let config = BootstrapConfig::new(layout, source_root)
        .with_library_tool(library_tool)
        .with_clean(cli.clean);

    let engine_args = EngineArgs {
        patterns: cli.patterns,
        list: cli.list,
        compile: cli.compile,
        elaborate: cli.elaborate,
        verbose: cli.verbose,
        exit_0: cli.exit_0,
        num_threads: cli.num_threads,
        xunit_xml: cli.xunit_xml,
    };
    let mut engine: Box<dyn Engine> = if cli.dry_run {
        Box::new(DryRunEngine::new(io::stdout(), engine_args))
    } else {
        let command = cli.engine.ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("no test engine configured")
                .with_hint("Pass --engine '<runner command>' or use --dry-run.")
        })?;
        Box::new(
            CommandEngine::from_command_line(&command, engine_args)?
                .with_leading_args(cli.engine_args),
        )
    };

    let prepared = prepare(&config, &manifest)?;
    for (library, registration) in prepared.empty_registrations() {
        emit_notice(&empty_registration_notice(library, registration), color_mode);
    }
    let exit_code = prepared.execute(engine.as_mut())?;
    Ok(RunOutcome::with_code(exit_code))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => err.with_hint(
            "Permission denied. Check directory permissions or use --output-path to a writable location.",
        ),
        ErrorKind::Busy => err.with_hint(
            "Another hdlrun is using this output directory. Wait for it or use a different --output-path.",
        ),
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share command/context if it persists.",
    )
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!("{label} {} (library: {})", notice.message, notice.library);
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
        ErrorKind::DuplicateLibrary => "duplicate library".to_string(),
        ErrorKind::Busy => "output directory is busy".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::SourceNotFound => "source file not found".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::UnrecognizedOption => "unrecognized option".to_string(),
        ErrorKind::OptionType => "option value has the wrong type".to_string(),
        ErrorKind::Tool => "external tool failed".to_string(),
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
    if let Some(library) = err.library() {
        inner.insert("library".to_string(), json!(library));
    }
    if let Some(option) = err.option() {
        inner.insert("option".to_string(), json!(option));
    }
    if let Some(status) = err.exit_status() {
        inner.insert("exit_status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(library) = err.library() {
        lines.push(format!(
            "{} {library}",
            colorize_label("library:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(option) = err.option() {
        lines.push(format!(
            "{} {option}",
            colorize_label("option:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(status) = err.exit_status() {
        lines.push(format!(
            "{} {status}",
            colorize_label("exit status:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
