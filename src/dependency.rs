//! Verification of declared dependencies against a linearization
//!
//! A dependency says which instances of `before` must complete before which
//! instances of `after`. It is written as an isl map from the before
//! statement's inames (primed) to the after statement's inames:
//!
//! ```text
//! before: "a", after: "b",
//! relation: "[pi] -> { [i', k'] -> [i, j] : i' <= i }"
//! ```
//!
//! The dependency holds when every required pair is ordered by the
//! linearization under at least one scope, i.e. when it is a subset of
//! `SIO_seq ∪ SIO_lconc ∪ SIO_gconc` of the pair. Pairs running in
//! different lanes are only covered by the local SIO (a barrier between
//! them), pairs in different groups only by the global one.

use isl_rs::{Context, DimType, Map};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::isl_utils::{append_marker_to_dim_names, ensure_dim_names_match_and_align, insert_fixed_map_dim};
use crate::parse::parse_map;
use crate::sio::{ConcurrencyScope, SioComposer, StatementPairOrderings};
use crate::{BEFORE_MARK, STATEMENT_VAR_NAME};

/// A declared dependency between two statements
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatementDependency {
    pub before: String,
    pub after: String,
    /// isl map from before-instances to after-instances that must be ordered
    pub relation: String,
}

impl StatementDependency {
    pub fn new(before: &str, after: &str, relation: &str) -> Self {
        StatementDependency {
            before: before.to_string(),
            after: after.to_string(),
            relation: relation.to_string(),
        }
    }
}

/// Outcome of checking one dependency
#[derive(Debug, Clone, Serialize)]
pub struct DependencyCheck {
    pub dependency: StatementDependency,
    pub satisfied: bool,
    /// Scopes whose SIO alone contains the whole dependency
    pub covered_by: Vec<ConcurrencyScope>,
    /// Required pairs no scope orders, as an isl map string. Empty when
    /// satisfied.
    pub violations: String,
}

/// Lift a dependency relation into the space of the pair's SIO: statement
/// coordinates added, before side marked, restricted to both domains.
pub fn dependency_map_in_sio_space(
    ctx: &Context,
    dependency: &StatementDependency,
    orderings: &StatementPairOrderings,
) -> Result<Map> {
    let schedule = &orderings.sequential.schedule;
    let (sid_before, sid_after) = schedule.builder.statement_var_values();

    let dep = parse_map(ctx, &dependency.relation)?;
    let dep = append_marker_to_dim_names(dep, DimType::In, BEFORE_MARK);
    let dep = insert_fixed_map_dim(
        dep,
        DimType::In,
        &format!("{}{}", STATEMENT_VAR_NAME, BEFORE_MARK),
        sid_before,
    );
    let dep = insert_fixed_map_dim(dep, DimType::Out, STATEMENT_VAR_NAME, sid_after);

    let sio = &orderings.sequential.sio;
    let dep = ensure_dim_names_match_and_align(dep, sio)?;
    // SIO in-dims follow the before schedule's in-dims, out-dims the after's
    let dep = dep
        .intersect_domain(schedule.map_before.copy().domain())
        .intersect_range(schedule.map_after.copy().domain());
    Ok(dep)
}

/// Check one dependency against already built orderings of its pair
pub fn check_dependency_against(
    ctx: &Context,
    dependency: &StatementDependency,
    orderings: &StatementPairOrderings,
) -> Result<DependencyCheck> {
    let dep = dependency_map_in_sio_space(ctx, dependency, orderings)?;

    let covered_by: Vec<ConcurrencyScope> = orderings
        .iter()
        .filter(|ordering| dep.is_subset(&ordering.sio))
        .map(|ordering| ordering.scope)
        .collect();

    let remainder = dep.subtract(orderings.union_sio());
    let satisfied = remainder.is_empty();
    let violations = if satisfied {
        String::new()
    } else {
        remainder.coalesce().to_str().to_string()
    };

    if satisfied {
        info!(
            "Dependency {} -> {} satisfied (covered by {:?})",
            dependency.before, dependency.after, covered_by
        );
    } else {
        warn!(
            "Dependency {} -> {} violated: {}",
            dependency.before, dependency.after, violations
        );
    }

    Ok(DependencyCheck {
        dependency: dependency.clone(),
        satisfied,
        covered_by,
        violations,
    })
}

/// Check every dependency; orderings are rebuilt per dependency.
pub fn check_dependencies(
    composer: &SioComposer,
    ctx: &Context,
    dependencies: &[StatementDependency],
) -> Result<Vec<DependencyCheck>> {
    dependencies
        .iter()
        .map(|dependency| {
            let orderings = composer.orderings_for_pair(&dependency.before, &dependency.after)?;
            check_dependency_against(ctx, dependency, &orderings)
        })
        .collect()
}
