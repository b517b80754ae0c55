// Pre-packaged capability bundles merged into a project at freeze time.
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bundle {
    Osvvm,
    VerificationComponents,
    CheckPreprocessing,
}

impl Bundle {
    pub fn as_str(self) -> &'static str {
        match self {
            Bundle::Osvvm => "osvvm",
            Bundle::VerificationComponents => "verification_components",
            Bundle::CheckPreprocessing => "check_preprocessing",
        }
    }

    /// Library the bundle contributes to the project, if it adds one.
    pub fn library_name(self) -> Option<&'static str> {
        match self {
            Bundle::Osvvm => Some("osvvm"),
            Bundle::VerificationComponents | Bundle::CheckPreprocessing => None,
        }
    }

    /// Bundles enabled implicitly alongside this one.
    pub fn implies(self) -> &'static [Bundle] {
        match self {
            Bundle::VerificationComponents => &[Bundle::Osvvm],
            Bundle::Osvvm | Bundle::CheckPreprocessing => &[],
        }
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
