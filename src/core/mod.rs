// Core project model: errors, option vocabulary, source resolution, bundles.
pub mod bundle;
pub mod error;
pub mod options;
pub mod project;
pub mod sources;
