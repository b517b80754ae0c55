//! Purpose: On-disk setup steps that run before the project is handed off.
//! Exports: `prepare_dir`, `clean_dir`, `NativeLibraryTool`, `OutputLock`.
//! Role: Filesystem preparation and native simulator library creation.
//! Invariants: `prepare_dir` is idempotent; an existing directory is not an error.
//! Invariants: A library tool that fails to spawn or exits non-zero is fatal.
//! Invariants: At most one run holds the output-root lock at a time.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use fs2::FileExt;

use crate::core::error::{Error, ErrorKind, map_io_error_kind};
use crate::layout::Simulator;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DirState {
    Created,
    Existing,
}

pub fn prepare_dir(path: &Path) -> Result<DirState, Error> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => return Ok(DirState::Existing),
        Ok(_) => {
            return Err(Error::new(ErrorKind::Io)
                .with_message("path exists and is not a directory")
                .with_path(path)
                .with_hint("Remove the file or choose a different --output-path."));
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(Error::new(map_io_error_kind(&err))
                .with_message("failed to inspect directory")
                .with_path(path)
                .with_source(err));
        }
    }

    match fs::create_dir_all(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "created directory");
            Ok(DirState::Created)
        }
        // Lost a race with another creator; the directory is usable.
        Err(_) if path.is_dir() => Ok(DirState::Existing),
        Err(err) => Err(Error::new(map_io_error_kind(&err))
            .with_message("failed to create directory")
            .with_path(path)
            .with_source(err)),
    }
}

pub fn clean_dir(path: &Path) -> Result<(), Error> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "removed previous simulator output");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Error::new(map_io_error_kind(&err))
            .with_message("failed to clean output directory")
            .with_path(path)
            .with_source(err)),
    }
}

/// Creates empty simulator-native libraries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NativeLibraryTool {
    program: Option<PathBuf>,
}

impl NativeLibraryTool {
    pub fn for_simulator(simulator: Simulator) -> Self {
        Self {
            program: simulator.library_tool().map(PathBuf::from),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    /// Simulators whose native libraries are plain directories.
    pub fn directory_only() -> Self {
        Self { program: None }
    }

    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    pub fn create(&self, library_path: &Path) -> Result<(), Error> {
        let Some(program) = &self.program else {
            prepare_dir(library_path)?;
            return Ok(());
        };

        tracing::info!(
            tool = %program.display(),
            path = %library_path.display(),
            "creating native library"
        );
        let output = Command::new(program)
            .arg(library_path)
            .output()
            .map_err(|err| {
                let hint = if err.kind() == io::ErrorKind::NotFound {
                    "Put the simulator's bin directory on PATH or pass --library-tool."
                } else {
                    "Check that the library tool is executable."
                };
                Error::new(ErrorKind::Tool)
                    .with_message(format!("failed to run {}", program.display()))
                    .with_path(library_path)
                    .with_hint(hint)
                    .with_source(err)
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            tracing::debug!(tool = %program.display(), "{line}");
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(str::trim)
            .unwrap_or("no diagnostic output");
        let mut err = Error::new(ErrorKind::Tool)
            .with_message(format!("{} failed: {detail}", program.display()))
            .with_path(library_path);
        if let Some(code) = output.status.code() {
            err = err.with_exit_status(code);
        }
        Err(err)
    }
}

/// Exclusive advisory lock on the output root, released on drop.
#[derive(Debug)]
pub struct OutputLock {
    file: File,
    path: PathBuf,
}

impl OutputLock {
    pub fn acquire(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|err| {
                Error::new(map_io_error_kind(&err))
                    .with_message("failed to open output lock file")
                    .with_path(path)
                    .with_source(err)
            })?;
        file.try_lock_exclusive().map_err(|err| {
            let kind = if err.kind() == fs2::lock_contended_error().kind() {
                ErrorKind::Busy
            } else {
                map_io_error_kind(&err)
            };
            Error::new(kind)
                .with_message("output directory is locked by another run")
                .with_path(path)
                .with_source(err)
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
