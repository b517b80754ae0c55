// Recognized simulation options, their value types, and merge rules.
// Keys are a closed vocabulary; values are validated before they are stored.
// List values merge by appending unseen entries; scalar values replace.
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub enum OptionKey {
    #[serde(rename = "disable_ieee_warnings")]
    DisableIeeeWarnings,
    #[serde(rename = "vhdl_assert_stop_level")]
    VhdlAssertStopLevel,
    #[serde(rename = "pli")]
    Pli,
    #[serde(rename = "modelsim.vsim_flags")]
    ModelsimVsimFlags,
    #[serde(rename = "modelsim.vsim_flags.gui")]
    ModelsimVsimFlagsGui,
    #[serde(rename = "modelsim.init_files.after_load")]
    ModelsimInitFilesAfterLoad,
    #[serde(rename = "rivierapro.vsim_flags")]
    RivieraproVsimFlags,
    #[serde(rename = "ghdl.sim_flags")]
    GhdlSimFlags,
    #[serde(rename = "ghdl.elab_flags")]
    GhdlElabFlags,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Bool,
    String,
    List,
}

impl OptionKey {
    pub const ALL: [OptionKey; 9] = [
        OptionKey::DisableIeeeWarnings,
        OptionKey::VhdlAssertStopLevel,
        OptionKey::Pli,
        OptionKey::ModelsimVsimFlags,
        OptionKey::ModelsimVsimFlagsGui,
        OptionKey::ModelsimInitFilesAfterLoad,
        OptionKey::RivieraproVsimFlags,
        OptionKey::GhdlSimFlags,
        OptionKey::GhdlElabFlags,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::DisableIeeeWarnings => "disable_ieee_warnings",
            OptionKey::VhdlAssertStopLevel => "vhdl_assert_stop_level",
            OptionKey::Pli => "pli",
            OptionKey::ModelsimVsimFlags => "modelsim.vsim_flags",
            OptionKey::ModelsimVsimFlagsGui => "modelsim.vsim_flags.gui",
            OptionKey::ModelsimInitFilesAfterLoad => "modelsim.init_files.after_load",
            OptionKey::RivieraproVsimFlags => "rivierapro.vsim_flags",
            OptionKey::GhdlSimFlags => "ghdl.sim_flags",
            OptionKey::GhdlElabFlags => "ghdl.elab_flags",
        }
    }

    pub fn parse(name: &str) -> Result<Self, Error> {
        OptionKey::ALL
            .into_iter()
            .find(|key| key.as_str() == name)
            .ok_or_else(|| {
                Error::new(ErrorKind::UnrecognizedOption)
                    .with_message("unrecognized simulation option")
                    .with_option(name)
                    .with_hint(format!(
                        "Recognized options: {}.",
                        OptionKey::ALL.map(OptionKey::as_str).join(", ")
                    ))
            })
    }

    pub fn value_kind(self) -> ValueKind {
        match self {
            OptionKey::DisableIeeeWarnings => ValueKind::Bool,
            OptionKey::VhdlAssertStopLevel => ValueKind::String,
            OptionKey::Pli
            | OptionKey::ModelsimVsimFlags
            | OptionKey::ModelsimVsimFlagsGui
            | OptionKey::ModelsimInitFilesAfterLoad
            | OptionKey::RivieraproVsimFlags
            | OptionKey::GhdlSimFlags
            | OptionKey::GhdlElabFlags => ValueKind::List,
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ValueKind {
    fn describe(self) -> &'static str {
        match self {
            ValueKind::Bool => "a boolean",
            ValueKind::String => "a string",
            ValueKind::List => "a list of strings",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    String(String),
    List(Vec<String>),
}

impl OptionValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            OptionValue::Bool(_) => ValueKind::Bool,
            OptionValue::String(_) => ValueKind::String,
            OptionValue::List(_) => ValueKind::List,
        }
    }

    /// Converts a manifest JSON value; anything that is not a bool, string,
    /// or array of strings is a type error for `key`.
    pub fn from_json(key: &str, value: &Value) -> Result<Self, Error> {
        match value {
            Value::Bool(flag) => Ok(OptionValue::Bool(*flag)),
            Value::String(text) => Ok(OptionValue::String(text.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        Error::new(ErrorKind::OptionType)
                            .with_message("list options may only contain strings")
                            .with_option(key)
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(OptionValue::List),
            other => Err(Error::new(ErrorKind::OptionType)
                .with_message(format!("unsupported option value type: {}", json_type_name(other)))
                .with_option(key)),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssertLevel {
    Warning,
    Error,
    Failure,
}

impl AssertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AssertLevel::Warning => "warning",
            AssertLevel::Error => "error",
            AssertLevel::Failure => "failure",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "warning" => Some(AssertLevel::Warning),
            "error" => Some(AssertLevel::Error),
            "failure" => Some(AssertLevel::Failure),
            _ => None,
        }
    }
}

/// One recognized option together with its typed value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SimOption {
    DisableIeeeWarnings(bool),
    VhdlAssertStopLevel(AssertLevel),
    Pli(Vec<String>),
    ModelsimVsimFlags(Vec<String>),
    ModelsimVsimFlagsGui(Vec<String>),
    ModelsimInitFilesAfterLoad(Vec<String>),
    RivieraproVsimFlags(Vec<String>),
    GhdlSimFlags(Vec<String>),
    GhdlElabFlags(Vec<String>),
}

impl SimOption {
    pub fn key(&self) -> OptionKey {
        match self {
            SimOption::DisableIeeeWarnings(_) => OptionKey::DisableIeeeWarnings,
            SimOption::VhdlAssertStopLevel(_) => OptionKey::VhdlAssertStopLevel,
            SimOption::Pli(_) => OptionKey::Pli,
            SimOption::ModelsimVsimFlags(_) => OptionKey::ModelsimVsimFlags,
            SimOption::ModelsimVsimFlagsGui(_) => OptionKey::ModelsimVsimFlagsGui,
            SimOption::ModelsimInitFilesAfterLoad(_) => OptionKey::ModelsimInitFilesAfterLoad,
            SimOption::RivieraproVsimFlags(_) => OptionKey::RivieraproVsimFlags,
            SimOption::GhdlSimFlags(_) => OptionKey::GhdlSimFlags,
            SimOption::GhdlElabFlags(_) => OptionKey::GhdlElabFlags,
        }
    }

    pub fn into_value(self) -> OptionValue {
        match self {
            SimOption::DisableIeeeWarnings(flag) => OptionValue::Bool(flag),
            SimOption::VhdlAssertStopLevel(level) => OptionValue::String(level.as_str().to_string()),
            SimOption::Pli(items)
            | SimOption::ModelsimVsimFlags(items)
            | SimOption::ModelsimVsimFlagsGui(items)
            | SimOption::ModelsimInitFilesAfterLoad(items)
            | SimOption::RivieraproVsimFlags(items)
            | SimOption::GhdlSimFlags(items)
            | SimOption::GhdlElabFlags(items) => OptionValue::List(items),
        }
    }

    /// Validates a string-keyed option against the vocabulary.
    pub fn from_raw(name: &str, value: OptionValue) -> Result<Self, Error> {
        let key = OptionKey::parse(name)?;
        let expected = key.value_kind();
        if value.kind() != expected {
            return Err(Error::new(ErrorKind::OptionType)
                .with_message(format!(
                    "expected {}, got {}",
                    expected.describe(),
                    value.kind().describe()
                ))
                .with_option(name));
        }
        let option = match (key, value) {
            (OptionKey::DisableIeeeWarnings, OptionValue::Bool(flag)) => {
                SimOption::DisableIeeeWarnings(flag)
            }
            (OptionKey::VhdlAssertStopLevel, OptionValue::String(level)) => {
                let level = AssertLevel::parse(&level).ok_or_else(|| {
                    Error::new(ErrorKind::OptionType)
                        .with_message(format!("invalid assert stop level `{level}`"))
                        .with_option(name)
                        .with_hint("Use one of: warning, error, failure.")
                })?;
                SimOption::VhdlAssertStopLevel(level)
            }
            (OptionKey::Pli, OptionValue::List(items)) => SimOption::Pli(items),
            (OptionKey::ModelsimVsimFlags, OptionValue::List(items)) => {
                SimOption::ModelsimVsimFlags(items)
            }
            (OptionKey::ModelsimVsimFlagsGui, OptionValue::List(items)) => {
                SimOption::ModelsimVsimFlagsGui(items)
            }
            (OptionKey::ModelsimInitFilesAfterLoad, OptionValue::List(items)) => {
                SimOption::ModelsimInitFilesAfterLoad(items)
            }
            (OptionKey::RivieraproVsimFlags, OptionValue::List(items)) => {
                SimOption::RivieraproVsimFlags(items)
            }
            (OptionKey::GhdlSimFlags, OptionValue::List(items)) => SimOption::GhdlSimFlags(items),
            (OptionKey::GhdlElabFlags, OptionValue::List(items)) => SimOption::GhdlElabFlags(items),
            (key, _) => {
                return Err(Error::new(ErrorKind::Internal)
                    .with_message("option kind table out of sync")
                    .with_option(key.as_str()));
            }
        };
        Ok(option)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OptionSet {
    values: BTreeMap<OptionKey, OptionValue>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, option: SimOption) {
        let key = option.key();
        let value = option.into_value();
        match (self.values.get_mut(&key), value) {
            (Some(OptionValue::List(existing)), OptionValue::List(items)) => {
                for item in items {
                    if !existing.contains(&item) {
                        existing.push(item);
                    }
                }
            }
            (_, value) => {
                self.values.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
        self.values.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &OptionValue)> {
        self.values.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
