//! Purpose: Hand the frozen project to the external test engine.
//! Exports: `Engine`, `EngineArgs`, `CommandEngine`, `DryRunEngine`.
//! Role: Boundary with the test-discovery/compile/simulate/report runner.
//! Invariants: Engines only ever see an immutable `Project`.
//! Invariants: The returned integer is the process exit code for the whole run.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use serde_json::json;

use crate::core::error::{Error, ErrorKind, map_io_error_kind};
use crate::core::project::Project;

pub trait Engine {
    fn run(&mut self, project: &Project) -> Result<i32, Error>;
}

/// Test-runner arguments forwarded verbatim in meaning to the engine.
/// Cleaning is not among them: the bootstrap clears simulator output itself and the
/// engine's output path holds the snapshot it is about to read.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EngineArgs {
    pub patterns: Vec<String>,
    pub list: bool,
    pub compile: bool,
    pub elaborate: bool,
    pub verbose: bool,
    pub exit_0: bool,
    pub num_threads: Option<usize>,
    pub xunit_xml: Option<PathBuf>,
}

impl EngineArgs {
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        let flags = [
            (self.list, "--list"),
            (self.compile, "--compile"),
            (self.elaborate, "--elaborate"),
            (self.verbose, "--verbose"),
            (self.exit_0, "--exit-0"),
        ];
        for (enabled, flag) in flags {
            if enabled {
                args.push(flag.into());
            }
        }
        if let Some(threads) = self.num_threads {
            args.push("--num-threads".into());
            args.push(threads.to_string().into());
        }
        if let Some(path) = &self.xunit_xml {
            args.push("--xunit-xml".into());
            args.push(path.clone().into_os_string());
        }
        args.extend(self.patterns.iter().map(OsString::from));
        args
    }
}

/// Runs an external runner command against the project snapshot file.
#[derive(Clone, Debug)]
pub struct CommandEngine {
    program: PathBuf,
    leading_args: Vec<String>,
    args: EngineArgs,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>, args: EngineArgs) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            args,
        }
    }

    /// Splits a whitespace-separated command line such as `python3 run.py`.
    /// A command naming an existing file is taken whole, so runner paths may contain spaces.
    pub fn from_command_line(command: &str, args: EngineArgs) -> Result<Self, Error> {
        let trimmed = command.trim();
        if !trimmed.is_empty() && Path::new(trimmed).is_file() {
            return Ok(Self::new(trimmed, args));
        }
        let mut words = trimmed.split_whitespace();
        let program = words.next().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("engine command is empty")
                .with_hint("Pass the runner command with --engine, e.g. --engine 'python3 run.py'.")
        })?;
        Ok(Self {
            program: PathBuf::from(program),
            leading_args: words.map(str::to_string).collect(),
            args,
        })
    }

    pub fn with_leading_args(mut self, leading_args: impl IntoIterator<Item = String>) -> Self {
        self.leading_args.extend(leading_args);
        self
    }

    pub fn command(&self, project: &Project) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("--project")
            .arg(project.project_file())
            .arg("--output-path")
            .arg(project.output_root())
            .args(self.args.to_args());
        cmd
    }

    fn write_snapshot(&self, project: &Project) -> Result<(), Error> {
        let path = project.project_file();
        let bytes = serde_json::to_vec_pretty(project).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode project snapshot")
                .with_source(err)
        })?;
        std::fs::write(path, bytes).map_err(|err| {
            Error::new(map_io_error_kind(&err))
                .with_message("failed to write project snapshot")
                .with_path(path)
                .with_source(err)
        })
    }
}

impl Engine for CommandEngine {
    fn run(&mut self, project: &Project) -> Result<i32, Error> {
        self.write_snapshot(project)?;
        tracing::info!(
            engine = %self.program.display(),
            project = %project.project_file().display(),
            "handing off to test engine"
        );
        let status = self.command(project).status().map_err(|err| {
            Error::new(ErrorKind::Tool)
                .with_message(format!("failed to start test engine {}", self.program.display()))
                .with_hint("Check the --engine command and that it is on PATH.")
                .with_source(err)
        })?;
        match status.code() {
            Some(code) => {
                tracing::info!(exit_code = code, "test engine finished");
                Ok(code)
            }
            None => Err(Error::new(ErrorKind::Tool)
                .with_message("test engine was terminated by a signal")),
        }
    }
}

/// Prints the snapshot and the engine arguments instead of running anything.
#[derive(Debug)]
pub struct DryRunEngine<W> {
    out: W,
    args: EngineArgs,
}

impl<W: Write> DryRunEngine<W> {
    pub fn new(out: W, args: EngineArgs) -> Self {
        Self { out, args }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Engine for DryRunEngine<W> {
    fn run(&mut self, project: &Project) -> Result<i32, Error> {
        let value = json!({
            "project": project,
            "engine_args": &self.args,
        });
        let text = serde_json::to_string_pretty(&value).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode project snapshot")
                .with_source(err)
        })?;
        writeln!(self.out, "{text}").map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write dry-run output")
                .with_source(err)
        })?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandEngine, DryRunEngine, Engine, EngineArgs};
    use crate::core::error::ErrorKind;
    use crate::core::project::ProjectBuilder;
    use crate::layout::{OutputLayout, Simulator};
    use std::ffi::OsString;
    use std::path::PathBuf;

    #[test]
    fn engine_args_use_runner_flag_syntax() {
        let args = EngineArgs {
            patterns: vec!["lib.tb_*".to_string()],
            list: true,
            num_threads: Some(4),
            xunit_xml: Some(PathBuf::from("out.xml")),
            ..EngineArgs::default()
        };
        let expected: Vec<OsString> = ["--list", "--num-threads", "4", "--xunit-xml", "out.xml", "lib.tb_*"]
            .into_iter()
            .map(OsString::from)
            .collect();
        assert_eq!(args.to_args(), expected);
    }

    #[test]
    fn empty_engine_command_is_usage_error() {
        let err = CommandEngine::from_command_line("   ", EngineArgs::default()).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn command_line_keeps_leading_arguments() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = ProjectBuilder::new(
            OutputLayout::new(temp.path().join("out"), Simulator::Modelsim),
            temp.path(),
        )
        .freeze();
        let engine = CommandEngine::from_command_line(
            "python3 run.py",
            EngineArgs {
                compile: true,
                ..EngineArgs::default()
            },
        )
        .expect("engine");
        let cmd = engine.command(&project);
        assert_eq!(cmd.get_program(), "python3");
        let args: Vec<_> = cmd.get_args().map(|arg| arg.to_os_string()).collect();
        assert_eq!(args[0], "run.py");
        assert_eq!(args[1], "--project");
        assert_eq!(PathBuf::from(&args[2]), temp.path().join("out/project.json"));
        assert_eq!(args.last().expect("last"), "--compile");
    }

    #[test]
    fn clean_is_never_forwarded_to_the_engine() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = ProjectBuilder::new(
            OutputLayout::new(temp.path().join("out"), Simulator::Modelsim),
            temp.path(),
        )
        .freeze();
        let args = EngineArgs {
            list: true,
            compile: true,
            elaborate: true,
            verbose: true,
            exit_0: true,
            ..EngineArgs::default()
        };
        let engine = CommandEngine::new("runner", args);
        let cmd = engine.command(&project);
        assert!(cmd.get_args().all(|arg| arg != "--clean"));
        assert!(cmd.get_args().any(|arg| arg == "--output-path"));
    }

    #[test]
    fn engine_path_with_spaces_is_kept_whole() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = temp.path().join("my tools").join("run vunit.py");
        std::fs::create_dir_all(runner.parent().expect("parent")).expect("mkdir");
        std::fs::write(&runner, "").expect("write runner");
        let project = ProjectBuilder::new(
            OutputLayout::new(temp.path().join("out"), Simulator::Ghdl),
            temp.path(),
        )
        .freeze();

        let engine = CommandEngine::from_command_line(
            runner.to_str().expect("utf8"),
            EngineArgs::default(),
        )
        .expect("engine")
        .with_leading_args(["--fast".to_string()]);
        let cmd = engine.command(&project);
        assert_eq!(PathBuf::from(cmd.get_program()), runner);
        let args: Vec<_> = cmd.get_args().map(|arg| arg.to_os_string()).collect();
        assert_eq!(args[0], "--fast");
        assert_eq!(args[1], "--project");
    }

    #[test]
    fn dry_run_prints_snapshot_and_succeeds() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = ProjectBuilder::new(
            OutputLayout::new(temp.path().join("out"), Simulator::Ghdl),
            temp.path(),
        )
        .freeze();
        let mut engine = DryRunEngine::new(Vec::new(), EngineArgs::default());
        assert_eq!(engine.run(&project).expect("run"), 0);
        let out: serde_json::Value =
            serde_json::from_slice(&engine.into_inner()).expect("json output");
        assert_eq!(out["project"]["simulator"], "ghdl");
        assert!(out["project"]["libraries"].as_array().expect("libraries").is_empty());
        assert_eq!(out["engine_args"]["list"], false);
    }
}
