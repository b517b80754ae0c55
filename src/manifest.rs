//! Purpose: Load and pre-validate the JSON run manifest.
//! Exports: `RunManifest`, `LibrarySpec`.
//! Role: Declarative input for the bootstrap sequence (libraries, sources, options, bundles).
//! Invariants: Unknown manifest fields are rejected.
//! Invariants: `validate` catches name and option errors before anything touches disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::bundle::Bundle;
use crate::core::error::{Error, ErrorKind, map_io_error_kind};
use crate::core::options::{OptionValue, SimOption};
use crate::core::project::{
    reserved_library_error, reserved_library_owner, validate_library_name,
};

pub const DEFAULT_MANIFEST: &str = "hdlrun.json";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunManifest {
    #[serde(default)]
    pub libraries: Vec<LibrarySpec>,
    #[serde(default)]
    pub global_options: Map<String, Value>,
    #[serde(default)]
    pub bundles: Vec<Bundle>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibrarySpec {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl RunManifest {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            let err_kind = map_io_error_kind(&err);
            let mut out = Error::new(err_kind)
                .with_message("failed to read run manifest")
                .with_path(path)
                .with_source(err);
            if err_kind == ErrorKind::NotFound {
                out = out.with_hint(format!(
                    "Create {DEFAULT_MANIFEST} next to your sources or pass --manifest."
                ));
            }
            out
        })?;
        Self::from_json_str(&text).map_err(|err| err.with_path(path))
    }

    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid run manifest: {err}"))
                .with_source(err)
        })
    }

    /// Directory that relative source patterns resolve against.
    pub fn source_root(path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for library in &self.libraries {
            validate_library_name(&library.name)?;
            let bundles = self
                .bundles
                .iter()
                .flat_map(|bundle| std::iter::once(*bundle).chain(bundle.implies().iter().copied()));
            if let Some(owner) = reserved_library_owner(&library.name, bundles) {
                return Err(reserved_library_error(&library.name, &owner));
            }
            if !seen.insert(library.name.to_ascii_lowercase()) {
                return Err(Error::new(ErrorKind::DuplicateLibrary)
                    .with_message("library declared more than once")
                    .with_library(library.name.clone()));
            }
            for (key, value) in &library.options {
                parse_option(key, value).map_err(|err| err.with_library(library.name.clone()))?;
            }
        }
        for (key, value) in &self.global_options {
            parse_option(key, value)?;
        }
        Ok(())
    }
}

pub(crate) fn option_value(key: &str, value: &Value) -> Result<OptionValue, Error> {
    OptionValue::from_json(key, value)
}

fn parse_option(key: &str, value: &Value) -> Result<SimOption, Error> {
    SimOption::from_raw(key, option_value(key, value)?)
}
