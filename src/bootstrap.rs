//! Purpose: Run the simulation environment bootstrap sequence.
//! Exports: `BootstrapConfig`, `Prepared`, `prepare`, `run`.
//! Role: Orchestrates setup steps in order, then delegates to an `Engine`.
//! Invariants: Steps run in order: directories, native libraries, libraries and
//! sources, library options, global options, bundles, engine hand-off.
//! Invariants: Any setup error aborts before the engine is invoked.
//! Invariants: Every user library's native directory exists before hand-off.

use std::path::PathBuf;

use crate::core::error::{Error, ErrorKind};
use crate::core::project::{LibraryHandle, Project, ProjectBuilder, Registration};
use crate::engine::Engine;
use crate::layout::OutputLayout;
use crate::manifest::{RunManifest, option_value};
use crate::setup::{NativeLibraryTool, OutputLock, clean_dir, prepare_dir};

#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    pub layout: OutputLayout,
    pub source_root: PathBuf,
    pub library_tool: NativeLibraryTool,
    pub clean: bool,
}

impl BootstrapConfig {
    pub fn new(layout: OutputLayout, source_root: impl Into<PathBuf>) -> Self {
        let library_tool = NativeLibraryTool::for_simulator(layout.simulator());
        Self {
            layout,
            source_root: source_root.into(),
            library_tool,
            clean: false,
        }
    }

    pub fn with_library_tool(mut self, tool: NativeLibraryTool) -> Self {
        self.library_tool = tool;
        self
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }
}

/// A fully set-up project waiting to be handed to an engine.
#[derive(Debug)]
pub struct Prepared {
    project: Project,
    registrations: Vec<(String, Registration)>,
    _lock: OutputLock,
}

impl Prepared {
    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn registrations(&self) -> &[(String, Registration)] {
        &self.registrations
    }

    /// Registrations whose pattern resolved to no files.
    pub fn empty_registrations(&self) -> impl Iterator<Item = (&str, &Registration)> {
        self.registrations
            .iter()
            .filter(|(_, registration)| registration.is_empty())
            .map(|(library, registration)| (library.as_str(), registration))
    }

    pub fn execute(self, engine: &mut dyn Engine) -> Result<i32, Error> {
        for library in self.project.user_libraries() {
            if !library.native_path().is_dir() {
                return Err(Error::new(ErrorKind::NotFound)
                    .with_message("native library is missing")
                    .with_library(library.name())
                    .with_path(library.native_path())
                    .with_hint("The library tool reported success but created nothing; check --library-tool."));
            }
        }
        engine.run(&self.project)
    }
}

pub fn prepare(config: &BootstrapConfig, manifest: &RunManifest) -> Result<Prepared, Error> {
    manifest.validate()?;
    let layout = &config.layout;

    prepare_dir(layout.root())?;
    let lock = OutputLock::acquire(&layout.lock_file())?;
    tracing::debug!(lock = %lock.path().display(), "acquired output lock");
    if config.clean {
        clean_dir(&layout.simulator_dir())?;
    }

    let libraries_dir = layout.libraries_dir();
    let state = prepare_dir(&libraries_dir)?;
    tracing::info!(path = %libraries_dir.display(), ?state, "prepared library directory");

    for library in &manifest.libraries {
        config
            .library_tool
            .create(&layout.native_library(&library.name))
            .map_err(|err| err.with_library(library.name.clone()))?;
    }

    let mut builder = ProjectBuilder::new(layout.clone(), config.source_root.clone());
    let mut handles: Vec<LibraryHandle> = Vec::with_capacity(manifest.libraries.len());
    let mut registrations = Vec::new();
    for library in &manifest.libraries {
        let handle = builder.create_library(&library.name)?;
        for reference in &library.sources {
            let registration = builder.add_sources(handle, reference)?;
            registrations.push((library.name.clone(), registration));
        }
        let count = builder.sources(handle)?.len();
        tracing::info!(library = %library.name, sources = count, "registered library");
        handles.push(handle);
    }

    for (library, handle) in manifest.libraries.iter().zip(&handles) {
        for (key, value) in &library.options {
            let value = option_value(key, value).map_err(|err| err.with_library(library.name.clone()))?;
            builder.set_library_option_raw(*handle, key, value)?;
        }
    }
    for (key, value) in &manifest.global_options {
        builder.set_global_option_raw(key, option_value(key, value)?)?;
    }

    for bundle in &manifest.bundles {
        builder.enable(*bundle)?;
        tracing::info!(%bundle, "enabled bundle");
    }

    Ok(Prepared {
        project: builder.freeze(),
        registrations,
        _lock: lock,
    })
}

pub fn run(
    config: &BootstrapConfig,
    manifest: &RunManifest,
    engine: &mut dyn Engine,
) -> Result<i32, Error> {
    prepare(config, manifest)?.execute(engine)
}
