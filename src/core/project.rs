// Project model: an exclusively owned builder accumulating libraries, options,
// and bundles, frozen into an immutable snapshot for the test engine.
// Library names are unique case-insensitively, including bundle libraries.
// Failed calls leave the builder unchanged.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::core::bundle::Bundle;
use crate::core::error::{Error, ErrorKind};
use crate::core::options::{OptionSet, OptionValue, SimOption};
use crate::core::sources::SourceRef;
use crate::layout::{OutputLayout, Simulator};

/// Library holding the test engine's own runtime; never user-creatable.
pub const RUNTIME_LIBRARY: &str = "vunit_lib";

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LibraryHandle {
    builder: u64,
    index: usize,
}

/// Outcome of one `add_sources` call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Registration {
    pub reference: String,
    pub matched: Vec<PathBuf>,
    pub added: Vec<PathBuf>,
}

impl Registration {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

#[derive(Debug)]
struct LibraryState {
    name: String,
    sources: Vec<PathBuf>,
    options: OptionSet,
}

#[derive(Debug)]
pub struct ProjectBuilder {
    id: u64,
    layout: OutputLayout,
    source_root: PathBuf,
    libraries: Vec<LibraryState>,
    global_options: OptionSet,
    bundles: BTreeSet<Bundle>,
}

impl ProjectBuilder {
    pub fn new(layout: OutputLayout, source_root: impl Into<PathBuf>) -> Self {
        Self {
            id: NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed),
            layout,
            source_root: source_root.into(),
            libraries: Vec::new(),
            global_options: OptionSet::new(),
            bundles: BTreeSet::new(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn create_library(&mut self, name: &str) -> Result<LibraryHandle, Error> {
        validate_library_name(name)?;
        if let Some(owner) = reserved_library_owner(name, self.bundles.iter().copied()) {
            return Err(reserved_library_error(name, &owner));
        }
        if self.user_library_named(name) {
            return Err(Error::new(ErrorKind::DuplicateLibrary)
                .with_message("library already exists")
                .with_library(name));
        }
        self.libraries.push(LibraryState {
            name: name.to_string(),
            sources: Vec::new(),
            options: OptionSet::new(),
        });
        tracing::debug!(library = name, "created library");
        Ok(LibraryHandle {
            builder: self.id,
            index: self.libraries.len() - 1,
        })
    }

    pub fn library(&self, name: &str) -> Option<LibraryHandle> {
        self.libraries
            .iter()
            .position(|library| library.name.eq_ignore_ascii_case(name))
            .map(|index| LibraryHandle {
                builder: self.id,
                index,
            })
    }

    pub fn add_sources(
        &mut self,
        handle: LibraryHandle,
        reference: &str,
    ) -> Result<Registration, Error> {
        let index = self.check_handle(handle)?;
        let source = SourceRef::parse(reference);
        let matched = source
            .resolve(&self.source_root)
            .map_err(|err| err.with_library(self.libraries[index].name.clone()))?;

        let library = &mut self.libraries[index];
        let mut added = Vec::new();
        for path in &matched {
            if !library.sources.contains(path) {
                library.sources.push(path.clone());
                added.push(path.clone());
            }
        }
        if matched.is_empty() {
            tracing::warn!(
                library = %library.name,
                pattern = reference,
                "source pattern matched no files"
            );
        } else {
            tracing::debug!(
                library = %library.name,
                reference,
                matched = matched.len(),
                added = added.len(),
                "registered sources"
            );
        }
        Ok(Registration {
            reference: reference.to_string(),
            matched,
            added,
        })
    }

    pub fn sources(&self, handle: LibraryHandle) -> Result<&[PathBuf], Error> {
        let index = self.check_handle(handle)?;
        Ok(&self.libraries[index].sources)
    }

    pub fn library_options(&self, handle: LibraryHandle) -> Result<&OptionSet, Error> {
        let index = self.check_handle(handle)?;
        Ok(&self.libraries[index].options)
    }

    pub fn global_options(&self) -> &OptionSet {
        &self.global_options
    }

    pub fn set_library_option(
        &mut self,
        handle: LibraryHandle,
        option: SimOption,
    ) -> Result<(), Error> {
        let index = self.check_handle(handle)?;
        let library = &mut self.libraries[index];
        tracing::debug!(library = %library.name, option = %option.key(), "set library option");
        library.options.apply(option);
        Ok(())
    }

    pub fn set_library_option_raw(
        &mut self,
        handle: LibraryHandle,
        key: &str,
        value: OptionValue,
    ) -> Result<(), Error> {
        let index = self.check_handle(handle)?;
        let option = SimOption::from_raw(key, value)
            .map_err(|err| err.with_library(self.libraries[index].name.clone()))?;
        self.set_library_option(handle, option)
    }

    pub fn set_global_option(&mut self, option: SimOption) {
        tracing::debug!(option = %option.key(), "set global option");
        self.global_options.apply(option);
    }

    pub fn set_global_option_raw(&mut self, key: &str, value: OptionValue) -> Result<(), Error> {
        let option = SimOption::from_raw(key, value)?;
        self.set_global_option(option);
        Ok(())
    }

    /// Enables a bundle and anything it implies. Enabling twice is a no-op.
    pub fn enable(&mut self, bundle: Bundle) -> Result<(), Error> {
        let mut pending = vec![bundle];
        pending.extend_from_slice(bundle.implies());
        for candidate in &pending {
            if self.bundles.contains(candidate) {
                continue;
            }
            if let Some(name) = candidate.library_name() {
                if self.user_library_named(name) {
                    return Err(Error::new(ErrorKind::DuplicateLibrary)
                        .with_message(format!(
                            "bundle `{candidate}` provides a library that already exists"
                        ))
                        .with_library(name));
                }
            }
        }
        for candidate in pending {
            if self.bundles.insert(candidate) {
                tracing::debug!(bundle = %candidate, "enabled bundle");
            }
        }
        Ok(())
    }

    pub fn is_enabled(&self, bundle: Bundle) -> bool {
        self.bundles.contains(&bundle)
    }

    pub fn freeze(self) -> Project {
        let check_preprocessing = self.bundles.contains(&Bundle::CheckPreprocessing);
        let mut libraries: Vec<Library> = self
            .libraries
            .into_iter()
            .map(|library| Library {
                native_path: self.layout.native_library(&library.name),
                name: library.name,
                provided_by: None,
                sources: library.sources,
                options: library.options,
                check_preprocessing,
            })
            .collect();
        for bundle in &self.bundles {
            if let Some(name) = bundle.library_name() {
                libraries.push(Library {
                    name: name.to_string(),
                    native_path: self.layout.native_library(name),
                    provided_by: Some(*bundle),
                    sources: Vec::new(),
                    options: OptionSet::new(),
                    check_preprocessing: false,
                });
            }
        }
        Project {
            simulator: self.layout.simulator(),
            output_root: self.layout.root().to_path_buf(),
            project_file: self.layout.project_file(),
            libraries,
            global_options: self.global_options,
            bundles: self.bundles.into_iter().collect(),
        }
    }

    fn check_handle(&self, handle: LibraryHandle) -> Result<usize, Error> {
        if handle.builder != self.id || handle.index >= self.libraries.len() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("library handle does not belong to this project"));
        }
        Ok(handle.index)
    }

    fn user_library_named(&self, name: &str) -> bool {
        self.libraries
            .iter()
            .any(|library| library.name.eq_ignore_ascii_case(name))
    }
}

/// Names who owns `name` when it is reserved by the runtime or one of `bundles`.
pub(crate) fn reserved_library_owner(
    name: &str,
    bundles: impl IntoIterator<Item = Bundle>,
) -> Option<String> {
    if name.eq_ignore_ascii_case(RUNTIME_LIBRARY) {
        return Some("the engine runtime".to_string());
    }
    bundles
        .into_iter()
        .find(|bundle| {
            bundle
                .library_name()
                .is_some_and(|provided| provided.eq_ignore_ascii_case(name))
        })
        .map(|bundle| format!("bundle `{bundle}`"))
}

pub(crate) fn reserved_library_error(name: &str, owner: &str) -> Error {
    Error::new(ErrorKind::DuplicateLibrary)
        .with_message(format!("library name is reserved by {owner}"))
        .with_library(name)
        .with_hint("Rename the library; reserved names are created for you.")
}

/// Checks `name` is a VHDL basic identifier.
pub fn validate_library_name(name: &str) -> Result<(), Error> {
    let invalid = |reason: &str| {
        Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid library name: {reason}"))
            .with_library(name)
            .with_hint("Library names start with a letter and contain letters, digits, and single underscores."))
    };
    let mut chars = name.chars();
    match chars.next() {
        None => return invalid("name is empty"),
        Some(first) if !first.is_ascii_alphabetic() => {
            return invalid("must start with a letter");
        }
        Some(_) => {}
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return invalid("contains characters other than letters, digits, and underscores");
    }
    if name.contains("__") {
        return invalid("contains consecutive underscores");
    }
    if name.ends_with('_') {
        return invalid("ends with an underscore");
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize)]
pub struct Library {
    name: String,
    native_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    provided_by: Option<Bundle>,
    sources: Vec<PathBuf>,
    options: OptionSet,
    check_preprocessing: bool,
}

impl Library {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native_path(&self) -> &Path {
        &self.native_path
    }

    pub fn provided_by(&self) -> Option<Bundle> {
        self.provided_by
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn check_preprocessing(&self) -> bool {
        self.check_preprocessing
    }
}

/// Frozen project handed to the test engine.
#[derive(Clone, Debug, Serialize)]
pub struct Project {
    simulator: Simulator,
    output_root: PathBuf,
    project_file: PathBuf,
    libraries: Vec<Library>,
    global_options: OptionSet,
    bundles: Vec<Bundle>,
}

impl Project {
    pub fn simulator(&self) -> Simulator {
        self.simulator
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn project_file(&self) -> &Path {
        &self.project_file
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    pub fn user_libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries
            .iter()
            .filter(|library| library.provided_by.is_none())
    }

    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libraries
            .iter()
            .find(|library| library.name.eq_ignore_ascii_case(name))
    }

    pub fn global_options(&self) -> &OptionSet {
        &self.global_options
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }
}
