// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # gridconf
//!
//! A declarative configuration tool for grid-computing middleware: job
//! gateways, local and remote batch-system bridges, cache proxies, and
//! monitoring probes.
//!
//! ## Overview
//!
//! gridconf reads one INI-style site configuration file and drives a fixed
//! registry of configuration modules through a shared lifecycle:
//!
//! - **Parse**: every module resolves its declared options from its section
//! - **Validate**: every module checks consistency, collecting all issues
//! - **Apply**: modules with side effects invoke external collaborators
//! - **Export**: active modules contribute to one external-attribute file
//!
//! The phases are strictly barriered: nothing is applied until every module
//! has validated, and one module's failure never stops its siblings.
//!
//! ## Example
//!
//! ```no_run
//! use gridconf::config::{Context, IniConfig};
//! use gridconf::orchestrator::Orchestrator;
//!
//! # fn main() -> Result<(), gridconf::error::GridConfError> {
//! let config = IniConfig::load("/etc/gridconf/config.ini")?;
//! let ctx = Context::discover(true);
//!
//! let mut orchestrator = Orchestrator::with_default_registry();
//! let result = orchestrator.run(&config, &ctx)?;
//!
//! for (section, state) in &result.per_module {
//!     println!("{section}: {state}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod external;
pub mod module;
pub mod orchestrator;

pub use error::{GridConfError, Result};
pub use orchestrator::{Orchestrator, OverallResult};
