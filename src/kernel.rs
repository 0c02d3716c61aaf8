//! Kernel description consumed by the checker
//!
//! The checker needs three things from a kernel:
//! 1. the domain of every statement (legal values of its enclosing inames)
//! 2. the hardware-axis tags of every iname
//! 3. the linearization chosen by the scheduler
//!
//! [`KernelInfo`] is the lookup seam used by the core. [`KernelDescription`]
//! is the JSON-backed implementation used by the CLI and the tests:
//!
//! ```json
//! {
//!   "name": "lbarrier_kernel",
//!   "domains": {
//!     "j1": "[p1, p2] -> { [i, j, l0, l1, g0] : 0 <= i, j < p1 and 0 <= l0, l1, g0 < p2 }"
//!   },
//!   "iname_tags": { "l0": ["l.0"], "l1": ["l.1"], "g0": ["g.0"] },
//!   "linearization": "for i\n  j1\nend i",
//!   "dependencies": [
//!     { "before": "j1", "after": "j1", "relation": "{ [i', ...] -> [i, ...] : ... }" }
//!   ]
//! }
//! ```
//!
//! `linearization` may be given either as text (see [`crate::parse`]) or as
//! a list of tagged items.

use isl_rs::{Context, DimType, Set};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::concurrency::IndexTag;
use crate::dependency::StatementDependency;
use crate::error::{CheckerError, Result};
use crate::linearization::LinearizationItem;
use crate::parse::{parse_linearization, parse_set};

/// Lookups the checker performs against a kernel. Implementations only
/// read; nothing is ever written back.
pub trait KernelInfo {
    /// Domain of a statement's enclosing inames, allocated in `ctx`.
    /// `Ok(None)` when the kernel has no such statement.
    fn statement_domain(&self, ctx: &Context, statement_id: &str) -> Result<Option<Set>>;

    /// Hardware-axis tags of an iname; empty for sequential inames.
    fn iname_tags(&self, iname: &str) -> Vec<IndexTag>;

    /// Every iname of the kernel.
    ///
    /// # Errors
    /// `IslParse` if a recorded domain cannot be read.
    fn all_inames(&self) -> Result<Vec<String>>;
}

/// Linearization in either accepted encoding
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LinearizationSource {
    Text(String),
    Items(Vec<LinearizationItem>),
}

impl Default for LinearizationSource {
    fn default() -> Self {
        LinearizationSource::Items(Vec::new())
    }
}

impl LinearizationSource {
    pub fn to_items(&self) -> Result<Vec<LinearizationItem>> {
        match self {
            LinearizationSource::Text(text) => parse_linearization(text),
            LinearizationSource::Items(items) => Ok(items.clone()),
        }
    }
}

/// Serializable kernel description
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KernelDescription {
    /// Kernel name, used in reports only
    #[serde(default)]
    pub name: String,

    /// Statement id -> isl set string over the statement's inames
    pub domains: BTreeMap<String, String>,

    /// Optional: iname -> hardware-axis tags
    #[serde(default)]
    pub iname_tags: BTreeMap<String, Vec<IndexTag>>,

    /// Optional: the linearization to check
    #[serde(default)]
    pub linearization: LinearizationSource,

    /// Optional: declared dependencies
    #[serde(default)]
    pub dependencies: Vec<StatementDependency>,
}

impl KernelDescription {
    pub fn new(name: &str) -> Self {
        KernelDescription {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Load from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading kernel description from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn with_domain(mut self, statement_id: &str, domain: &str) -> Self {
        self.domains
            .insert(statement_id.to_string(), domain.to_string());
        self
    }

    pub fn with_tag(mut self, iname: &str, tag: IndexTag) -> Self {
        self.iname_tags
            .entry(iname.to_string())
            .or_default()
            .push(tag);
        self
    }

    pub fn with_linearization(mut self, items: Vec<LinearizationItem>) -> Self {
        self.linearization = LinearizationSource::Items(items);
        self
    }

    pub fn with_dependency(mut self, dependency: StatementDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn linearization_items(&self) -> Result<Vec<LinearizationItem>> {
        self.linearization.to_items()
    }
}

impl KernelInfo for KernelDescription {
    fn statement_domain(&self, ctx: &Context, statement_id: &str) -> Result<Option<Set>> {
        match self.domains.get(statement_id) {
            Some(text) => Ok(Some(parse_set(ctx, text)?)),
            None => Ok(None),
        }
    }

    fn iname_tags(&self, iname: &str) -> Vec<IndexTag> {
        self.iname_tags.get(iname).cloned().unwrap_or_default()
    }

    fn all_inames(&self) -> Result<Vec<String>> {
        // Domains are parsed in a scratch context only to read dim names
        let ctx = Context::alloc();
        let mut inames: BTreeSet<String> = self.iname_tags.keys().cloned().collect();
        for text in self.domains.values() {
            inames.extend(set_dim_names(&parse_set(&ctx, text)?));
        }
        Ok(inames.into_iter().collect())
    }
}

/// Names of the set dimensions of `set`, in order
pub fn set_dim_names(set: &Set) -> Vec<String> {
    let n = set.dim(DimType::Set).max(0) as u32;
    (0..n)
        .map(|pos| set.get_dim_name(DimType::Set, pos).to_string())
        .collect()
}

/// Domain of a statement, or `MissingDomain`
pub fn require_domain(kernel: &dyn KernelInfo, ctx: &Context, statement_id: &str) -> Result<Set> {
    kernel
        .statement_domain(ctx, statement_id)?
        .ok_or_else(|| CheckerError::MissingDomain(statement_id.to_string()))
}
