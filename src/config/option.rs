//! Declarative option specifications and value resolution.
//!
//! Every configurable field of every module is described by an
//! [`OptionSpec`]: its name, requirement level, value type, default, and the
//! external attribute name it maps to. Resolution turns the raw section text
//! (or its absence) into a typed [`OptionValue`].

use std::fmt;

use crate::config::context::Context;
use crate::config::grammar::{split_grouped_list, split_list};
use crate::error::ConfigError;

/// Requirement level of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// The option must be supplied; its absence is a hard validation error.
    Mandatory,
    /// The option must be supplied only when the host is a compute entry
    /// point; on other hosts it resolves to its default.
    MandatoryOnCe,
    /// The option may be omitted and resolves to its default.
    #[default]
    Optional,
}

/// The value type an option converts its raw text into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    /// Free-form string.
    #[default]
    Str,
    /// Signed integer.
    Int,
    /// Floating-point number.
    Float,
    /// Boolean with a fixed vocabulary (`true/false/yes/no/1/0`).
    Bool,
    /// Flat comma-separated list.
    List,
    /// Two-level list of parenthesized groups.
    Groups,
}

impl ValueKind {
    /// Returns the type's zero value, used when a conditionally-mandatory
    /// option is absent and no default was declared.
    #[must_use]
    pub fn zero(self) -> OptionValue {
        match self {
            Self::Str => OptionValue::Str(String::new()),
            Self::Int => OptionValue::Int(0),
            Self::Float => OptionValue::Float(0.0),
            Self::Bool => OptionValue::Bool(false),
            Self::List => OptionValue::List(Vec::new()),
            Self::Groups => OptionValue::Groups(Vec::new()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Str => "string",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Bool => "boolean",
            Self::List => "list",
            Self::Groups => "grouped list",
        };
        write!(f, "{s}")
    }
}

/// A resolved, typed option value.
///
/// Constructed once during the parse stage and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// String value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Flat list value.
    List(Vec<String>),
    /// Grouped (two-level) list value.
    Groups(Vec<Vec<String>>),
}

impl OptionValue {
    /// Returns the string form of this value, or `None` if interpreting it
    /// as a plain string makes no sense (lists and groups).
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean form of this value, if it is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the flat-list form of this value, if it is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the grouped-list form of this value, if it is one.
    #[must_use]
    pub fn as_groups(&self) -> Option<&[Vec<String>]> {
        match self {
            Self::Groups(groups) => Some(groups),
            _ => None,
        }
    }

    /// True if the value is an empty or whitespace-only string.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Str(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Groups(groups) => groups.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => write!(f, "{}", items.join(",")),
            Self::Groups(groups) => {
                let rendered: Vec<String> =
                    groups.iter().map(|g| format!("({})", g.join(","))).collect();
                write!(f, "{}", rendered.join(","))
            }
        }
    }
}

/// Declarative description of one configurable field.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    /// Option name as it appears in the configuration section.
    pub name: String,
    /// Requirement level.
    pub requirement: Requirement,
    /// Expected value type.
    pub kind: ValueKind,
    /// Default value used when an optional option is absent.
    pub default: Option<OptionValue>,
    /// External attribute name this option maps to, if any.
    pub external_name: Option<String>,
}

impl OptionSpec {
    /// Creates a new mandatory string option with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirement: Requirement::Mandatory,
            kind: ValueKind::Str,
            default: None,
            external_name: None,
        }
    }

    /// Sets the requirement level.
    #[must_use]
    pub const fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirement = requirement;
        self
    }

    /// Marks the option optional.
    #[must_use]
    pub const fn optional(self) -> Self {
        self.requirement(Requirement::Optional)
    }

    /// Marks the option mandatory only on compute entry points.
    #[must_use]
    pub const fn mandatory_on_ce(self) -> Self {
        self.requirement(Requirement::MandatoryOnCe)
    }

    /// Sets the value type.
    #[must_use]
    pub const fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: OptionValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Convenience for a string default.
    #[must_use]
    pub fn default_str(self, value: impl Into<String>) -> Self {
        self.default_value(OptionValue::Str(value.into()))
    }

    /// Sets the external attribute name this option exports as.
    #[must_use]
    pub fn external(mut self, name: impl Into<String>) -> Self {
        self.external_name = Some(name.into());
        self
    }

    /// Resolves raw section text (or its absence) into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingMandatory`] when a mandatory option (or
    /// a conditionally-mandatory option on a compute entry point) has no
    /// value, and [`ConfigError::TypeMismatch`] when the supplied text cannot
    /// be converted to the declared type.
    pub fn resolve(&self, raw: Option<&str>, ctx: &Context) -> Result<OptionValue, ConfigError> {
        match raw {
            Some(text) => self.convert(text),
            None => match self.requirement {
                Requirement::Mandatory => Err(ConfigError::missing(&self.name)),
                Requirement::MandatoryOnCe if ctx.is_compute_entry_point => {
                    Err(ConfigError::missing(&self.name))
                }
                Requirement::MandatoryOnCe | Requirement::Optional => {
                    Ok(self.default.clone().unwrap_or_else(|| self.kind.zero()))
                }
            },
        }
    }

    /// Converts raw text into this option's value type.
    fn convert(&self, text: &str) -> Result<OptionValue, ConfigError> {
        let mismatch = || ConfigError::type_mismatch(&self.name, text, self.kind.to_string());
        let trimmed = text.trim();

        match self.kind {
            ValueKind::Str => Ok(OptionValue::Str(trimmed.to_string())),
            ValueKind::Int => trimmed
                .parse::<i64>()
                .map(OptionValue::Int)
                .map_err(|_| mismatch()),
            ValueKind::Float => trimmed
                .parse::<f64>()
                .map(OptionValue::Float)
                .map_err(|_| mismatch()),
            ValueKind::Bool => parse_bool(trimmed).map(OptionValue::Bool).ok_or_else(mismatch),
            ValueKind::List => Ok(OptionValue::List(split_list(trimmed))),
            ValueKind::Groups => split_grouped_list(trimmed).map(OptionValue::Groups),
        }
    }
}

/// Parses the fixed boolean vocabulary, case-insensitively.
///
/// Anything outside `true/false/yes/no/1/0` is rejected rather than coerced.
fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
