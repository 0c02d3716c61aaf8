//! linchk: Linearization Dependency Checker for Polyhedral Kernels
//!
//! Given a kernel whose schedule has already been flattened into one
//! concrete execution order (a *linearization*), this library decides
//! whether that order respects the kernel's declared dependencies under
//! three execution regimes:
//! 1. sequential execution
//! 2. lanes of one work group running concurrently, ordered only by local
//!    barriers
//! 3. groups running concurrently, ordered only by global barriers
//!
//! # Core Flow
//! ```text
//! linearization ──► PairwiseScheduleBuilder ──► schedule maps ─┐
//!                        ▲                                      ├─► SIO per scope ──► dependency check
//! iname tags ──► ConcurrencyClassifier        lex order map ───┘
//! ```
//!
//! # Module Organization
//!
//! ## Inputs
//! - [`linearization`]: Linearization item sum type
//! - [`kernel`]: Domain and tag lookups, JSON kernel descriptions
//! - [`parse`]: isl string and text-linearization parsing
//!
//! ## Ordering Core
//! - [`concurrency`]: Iname classification into sequential / lane / group
//! - [`lex_order`]: Lexicographic order relations
//! - [`schedule`]: Single-pass linearization walk and schedule maps
//! - [`sio`]: Statement-instance orderings per concurrency scope
//!
//! ## Checking
//! - [`dependency`]: Declared dependency verification
//! - [`config`]: Checker options
//!
//! # Example
//! ```no_run
//! use isl_rs::Context;
//! use linchk::{get_schedules_for_statement_pairs, CheckerConfig, KernelDescription};
//!
//! let kernel = KernelDescription::from_file("kernel.json")?;
//! let items = kernel.linearization_items()?;
//! let ctx = Context::alloc();
//! let orderings = get_schedules_for_statement_pairs(
//!     &ctx, &kernel, &items, &[("a", "b")], &CheckerConfig::default())?;
//! println!("{}", orderings[0].sequential.sio.to_str());
//! # Ok::<(), linchk::CheckerError>(())
//! ```

// ============================================================================
// Inputs
// ============================================================================

pub mod kernel;
pub mod linearization;
pub mod parse;

// ============================================================================
// Ordering Core
// ============================================================================

pub mod concurrency;
pub mod isl_utils;
pub mod lex_order;
pub mod schedule;
pub mod sio;

// ============================================================================
// Checking
// ============================================================================

pub mod config;
pub mod dependency;
pub mod error;

// ============================================================================
// Reserved names
// ============================================================================

/// Prefix shared by every coordinate the checker introduces
pub const LIN_CHECK_IDENTIFIER_PREFIX: &str = "_lp_linchk_";
/// Sequential lex coordinates: `_lp_linchk_lex0`, `_lp_linchk_lex1`, ...
pub const LEX_VAR_PREFIX: &str = "_lp_linchk_lex";
/// Barrier lex coordinates used by the concurrent scopes
pub const BLEX_VAR_PREFIX: &str = "_lp_linchk_blex";
/// The "which statement" coordinate
pub const STATEMENT_VAR_NAME: &str = "_lp_linchk_stmt";
/// Lane coordinates: `_lp_linchk_lid{axis}`
pub const LANE_VAR_PREFIX: &str = "_lp_linchk_lid";
/// Group coordinates: `_lp_linchk_gid{axis}`
pub const GROUP_VAR_PREFIX: &str = "_lp_linchk_gid";
/// Suffix distinguishing before-side copies of a coordinate
pub const BEFORE_MARK: &str = "'";

// ============================================================================
// Re-exports
// ============================================================================

pub use concurrency::{ConcurrencyClass, ConcurrencyClassifier, ConcurrencyPartition, IndexTag};
pub use config::CheckerConfig;
pub use dependency::{check_dependencies, DependencyCheck, StatementDependency};
pub use error::CheckerError;
pub use kernel::{KernelDescription, KernelInfo};
pub use lex_order::LexOrderRelationFactory;
pub use linearization::{LinearizationItem, MemKind, SyncKind};
pub use parse::parse_linearization;
pub use schedule::{LexPoint, PairwiseScheduleBuilder, StatementInstanceSet, WalkParams};
pub use sio::{
    get_schedules_for_statement_pairs, ConcurrencyScope, PairwiseSchedule, ScopedOrdering,
    SioComposer, StatementPairOrderings,
};
