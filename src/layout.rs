//! Purpose: Output-root directory layout and simulator identity.
//! Exports: `Simulator`, `OutputLayout`, `default_output_root`.
//! Role: Keep CLI, setup steps, and engine hand-off agreeing on where things live.
//! Invariants: Native libraries live at `<output-root>/<simulator>/libraries/<name>`.
//! Invariants: Native library directory names are the lowercased library name.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

const DEFAULT_OUTPUT_ROOT: &str = "vunit_out";
const LIBRARIES_DIR: &str = "libraries";
const PROJECT_FILE: &str = "project.json";
const LOCK_FILE: &str = ".hdlrun.lock";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Simulator {
    Modelsim,
    Rivierapro,
    Activehdl,
    Ghdl,
}

impl Simulator {
    pub fn as_str(self) -> &'static str {
        match self {
            Simulator::Modelsim => "modelsim",
            Simulator::Rivierapro => "rivierapro",
            Simulator::Activehdl => "activehdl",
            Simulator::Ghdl => "ghdl",
        }
    }

    /// Command that creates an empty native library, when the simulator has one.
    pub fn library_tool(self) -> Option<&'static str> {
        match self {
            Simulator::Modelsim | Simulator::Rivierapro | Simulator::Activehdl => Some("vlib"),
            Simulator::Ghdl => None,
        }
    }
}

impl fmt::Display for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn default_output_root() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_ROOT)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputLayout {
    root: PathBuf,
    simulator: Simulator,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, simulator: Simulator) -> Self {
        Self {
            root: root.into(),
            simulator,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn simulator(&self) -> Simulator {
        self.simulator
    }

    pub fn simulator_dir(&self) -> PathBuf {
        self.root.join(self.simulator.as_str())
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.simulator_dir().join(LIBRARIES_DIR)
    }

    pub fn native_library(&self, library: &str) -> PathBuf {
        self.libraries_dir().join(library.to_ascii_lowercase())
    }

    pub fn project_file(&self) -> PathBuf {
        self.root.join(PROJECT_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}
