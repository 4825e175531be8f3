//! Configuration model for gridconf.
//!
//! This module owns everything between raw input text and typed option
//! values:
//! - a minimal INI reader for the site configuration file
//! - declarative option specifications with requirement levels and defaults
//! - the flat/grouped list grammar used by multi-value settings
//! - the immutable run context threaded through all lifecycle stages

mod context;
mod grammar;
mod ini;
mod option;

pub use context::Context;
pub use grammar::{split_grouped_list, split_list, UNAVAILABLE};
pub use ini::IniConfig;
pub use option::{OptionSpec, OptionValue, Requirement, ValueKind};
