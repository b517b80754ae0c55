//! Purpose: Define the public Rust API boundary for hdlrun.
//! Exports: Project model, option vocabulary, setup steps, and engine types.
//! Role: One import path for the CLI, tests, and embedding runners.
//! Invariants: Additive-only; internal helpers stay behind their modules.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::bootstrap::{BootstrapConfig, Prepared, prepare, run};
pub use crate::core::bundle::Bundle;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::options::{AssertLevel, OptionKey, OptionSet, OptionValue, SimOption, ValueKind};
pub use crate::core::project::{
    Library, LibraryHandle, Project, ProjectBuilder, RUNTIME_LIBRARY, Registration,
};
pub use crate::core::sources::SourceRef;
pub use crate::engine::{CommandEngine, DryRunEngine, Engine, EngineArgs};
pub use crate::layout::{OutputLayout, Simulator, default_output_root};
pub use crate::manifest::{DEFAULT_MANIFEST, LibrarySpec, RunManifest};
pub use crate::setup::{DirState, NativeLibraryTool, OutputLock, clean_dir, prepare_dir};
