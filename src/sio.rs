//! Statement-instance orderings
//!
//! For a statement pair the composer builds one relation per concurrency
//! scope:
//!
//! ```text
//! SIO = before_schedule ; order ; after_schedule^-1
//! ```
//!
//! `(x', x)` is in the SIO iff the instance `x'` of the before statement is
//! guaranteed to complete before the instance `x` of the after statement.
//!
//! | scope        | lex space                  | order                                   |
//! |--------------|----------------------------|-----------------------------------------|
//! | sequential   | statement walk             | `P' <_lex P`, all lanes and groups equal |
//! | local conc.  | barrier walk, local kinds  | `P' <_lex B <=_lex P`, groups equal     |
//! | global conc. | barrier walk, global kinds | `P' <_lex B <=_lex P`                   |
//!
//! `B` ranges over the points right after each qualifying barrier, so a pair
//! is ordered in a concurrent scope only when a barrier executes between
//! them. Lane coordinates stay free in the local scope because a local
//! barrier orders every lane of the group. Absence from a concurrent SIO
//! means "no guarantee", not "unordered".

use isl_rs::{Context, DimType, Map};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::concurrency::{ConcurrencyClassifier, ConcurrencyPartition};
use crate::config::CheckerConfig;
use crate::error::Result;
use crate::isl_utils::{append_marker_to_dim_names, apply_range_aligned};
use crate::kernel::KernelInfo;
use crate::lex_order::LexOrderRelationFactory;
use crate::linearization::{LinearizationItem, SyncKind};
use crate::schedule::{loops_in_linearization, loops_with_barriers, PairwiseScheduleBuilder, WalkParams};
use crate::BEFORE_MARK;

/// Execution regime an ordering is valid under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyScope {
    Sequential,
    LocalConcurrent,
    GlobalConcurrent,
}

impl ConcurrencyScope {
    pub const ALL: [ConcurrencyScope; 3] = [
        ConcurrencyScope::Sequential,
        ConcurrencyScope::LocalConcurrent,
        ConcurrencyScope::GlobalConcurrent,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            ConcurrencyScope::Sequential => "seq",
            ConcurrencyScope::LocalConcurrent => "lconc",
            ConcurrencyScope::GlobalConcurrent => "gconc",
        }
    }
}

impl fmt::Display for ConcurrencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for ConcurrencyScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "seq" | "sequential" => Ok(ConcurrencyScope::Sequential),
            "lconc" | "local" => Ok(ConcurrencyScope::LocalConcurrent),
            "gconc" | "global" => Ok(ConcurrencyScope::GlobalConcurrent),
            _ => Err(format!("unknown scope '{}' (expected seq, lconc or gconc)", s)),
        }
    }
}

/// Lex placement of a pair plus the maps derived from it
pub struct PairwiseSchedule {
    pub builder: PairwiseScheduleBuilder,
    /// `[stmt, inames..] -> [lex.., lid.., gid..]` of the before statement
    pub map_before: Map,
    /// Same for the after statement
    pub map_after: Map,
}

/// SIO of one scope together with the schedule it was built from
pub struct ScopedOrdering {
    pub scope: ConcurrencyScope,
    pub schedule: PairwiseSchedule,
    pub sio: Map,
}

impl fmt::Debug for ScopedOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedOrdering")
            .field("scope", &self.scope)
            .field("schedule", &self.schedule.builder)
            .field("sio", &self.sio.to_str())
            .finish()
    }
}

/// The three orderings of one statement pair
#[derive(Debug)]
pub struct StatementPairOrderings {
    pub before_id: String,
    pub after_id: String,
    pub sequential: ScopedOrdering,
    pub local_concurrent: ScopedOrdering,
    pub global_concurrent: ScopedOrdering,
}

impl StatementPairOrderings {
    pub fn get(&self, scope: ConcurrencyScope) -> &ScopedOrdering {
        match scope {
            ConcurrencyScope::Sequential => &self.sequential,
            ConcurrencyScope::LocalConcurrent => &self.local_concurrent,
            ConcurrencyScope::GlobalConcurrent => &self.global_concurrent,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScopedOrdering> {
        [
            &self.sequential,
            &self.local_concurrent,
            &self.global_concurrent,
        ]
        .into_iter()
    }

    /// Union of the three SIOs
    pub fn union_sio(&self) -> Map {
        self.sequential
            .sio
            .copy()
            .union(self.local_concurrent.sio.copy())
            .union(self.global_concurrent.sio.copy())
    }
}

/// `before ; order ; after^-1`, with the before side marked.
///
/// `order` must relate marked copies of the schedule range coordinates to
/// unmarked ones. Both compositions realign by name first.
pub fn get_statement_ordering_map(before: Map, order: Map, after: Map) -> Result<Map> {
    let before = append_marker_to_dim_names(before, DimType::Out, BEFORE_MARK);
    let to_after_lex = apply_range_aligned(before, order)?;
    let sio = apply_range_aligned(to_after_lex, after.reverse())?;
    Ok(append_marker_to_dim_names(sio, DimType::In, BEFORE_MARK))
}

/// Builds statement-instance orderings for pairs of one kernel.
///
/// Classification runs once in [`SioComposer::new`]; every pair query after
/// that is independent.
pub struct SioComposer<'a> {
    ctx: &'a Context,
    kernel: &'a dyn KernelInfo,
    items: &'a [LinearizationItem],
    config: &'a CheckerConfig,
    partition: ConcurrencyPartition,
}

impl<'a> SioComposer<'a> {
    /// # Errors
    /// `InvalidConcurrencyTag` if the kernel's tags are inconsistent.
    pub fn new(
        ctx: &'a Context,
        kernel: &'a dyn KernelInfo,
        items: &'a [LinearizationItem],
        config: &'a CheckerConfig,
    ) -> Result<Self> {
        let partition = ConcurrencyClassifier::classify(kernel)?;
        Ok(SioComposer {
            ctx,
            kernel,
            items,
            config,
            partition,
        })
    }

    pub fn partition(&self) -> &ConcurrencyPartition {
        &self.partition
    }

    /// All three orderings of `before_id -> after_id`
    pub fn orderings_for_pair(&self, before_id: &str, after_id: &str) -> Result<StatementPairOrderings> {
        info!("Building orderings for {} -> {}", before_id, after_id);
        Ok(StatementPairOrderings {
            before_id: before_id.to_string(),
            after_id: after_id.to_string(),
            sequential: self.ordering(before_id, after_id, ConcurrencyScope::Sequential)?,
            local_concurrent: self.ordering(before_id, after_id, ConcurrencyScope::LocalConcurrent)?,
            global_concurrent: self.ordering(before_id, after_id, ConcurrencyScope::GlobalConcurrent)?,
        })
    }

    /// Ordering of one pair under one scope
    pub fn ordering(&self, before_id: &str, after_id: &str, scope: ConcurrencyScope) -> Result<ScopedOrdering> {
        let ordering = match scope {
            ConcurrencyScope::Sequential => self.sequential_ordering(before_id, after_id)?,
            ConcurrencyScope::LocalConcurrent => {
                let pinned = self.partition.group_var_names();
                self.barrier_ordering(before_id, after_id, scope, self.config.local_barrier_kinds(), &pinned)?
            }
            ConcurrencyScope::GlobalConcurrent => {
                self.barrier_ordering(before_id, after_id, scope, self.config.global_barrier_kinds(), &[])?
            }
        };
        let ordering = if self.config.coalesce {
            ScopedOrdering {
                sio: ordering.sio.coalesce(),
                ..ordering
            }
        } else {
            ordering
        };
        debug!("{} SIO {} -> {}: {}", scope, before_id, after_id, ordering.sio.to_str());
        Ok(ordering)
    }

    fn sequential_ordering(&self, before_id: &str, after_id: &str) -> Result<ScopedOrdering> {
        // Concurrent loops ride along as lane and group coordinates
        let ignore = self.partition.concurrent_inames();
        let builder = PairwiseScheduleBuilder::from_linearization(
            self.items,
            &WalkParams {
                before_id,
                after_id,
                loops_to_ignore: &ignore,
                barrier_sync: None,
            },
        )?;
        let (map_before, map_after) = builder.build_maps(self.ctx, self.kernel, &self.partition)?;

        let hw_names = self.partition.hw_var_names();
        let order = LexOrderRelationFactory::new(self.ctx).create_order_map(
            &builder.lex_var_names(),
            &hw_names,
            &hw_names,
            true,
        )?;
        let sio = get_statement_ordering_map(map_before.copy(), order, map_after.copy())?;

        Ok(ScopedOrdering {
            scope: ConcurrencyScope::Sequential,
            schedule: PairwiseSchedule {
                builder,
                map_before,
                map_after,
            },
            sio,
        })
    }

    fn barrier_ordering(
        &self,
        before_id: &str,
        after_id: &str,
        scope: ConcurrencyScope,
        kinds: &[SyncKind],
        pinned: &[String],
    ) -> Result<ScopedOrdering> {
        // Loops without a qualifying barrier cannot separate phases
        let with_barriers = loops_with_barriers(self.items, kinds);
        let mut ignore: BTreeSet<String> = self.partition.concurrent_inames();
        ignore.extend(
            loops_in_linearization(self.items)
                .into_iter()
                .filter(|iname| !with_barriers.contains(iname)),
        );

        let builder = PairwiseScheduleBuilder::from_linearization(
            self.items,
            &WalkParams {
                before_id,
                after_id,
                loops_to_ignore: &ignore,
                barrier_sync: Some(kinds),
            },
        )?;
        let (map_before, map_after) = builder.build_maps(self.ctx, self.kernel, &self.partition)?;

        let factory = LexOrderRelationFactory::new(self.ctx);
        let lex_names = builder.lex_var_names();
        let hw_names = self.partition.hw_var_names();
        let before_barrier = factory.create_order_map(&lex_names, &hw_names, pinned, true)?;
        let order = match builder.barrier_point_set(self.ctx, self.kernel, &self.partition)? {
            Some(points) => {
                let points = points.align_params(before_barrier.get_space());
                let before_barrier = before_barrier.align_params(points.get_space());
                let up_to = factory.create_order_map(&lex_names, &hw_names, pinned, false)?;
                before_barrier.intersect_range(points).apply_range(up_to)
            }
            None => {
                debug!("No {:?} barriers in linearization, {} SIO is empty", kinds, scope);
                Map::empty(before_barrier.get_space())
            }
        };
        let sio = get_statement_ordering_map(map_before.copy(), order, map_after.copy())?;

        Ok(ScopedOrdering {
            scope,
            schedule: PairwiseSchedule {
                builder,
                map_before,
                map_after,
            },
            sio,
        })
    }
}

/// Orderings for every requested pair, in request order.
pub fn get_schedules_for_statement_pairs<S: AsRef<str>>(
    ctx: &Context,
    kernel: &dyn KernelInfo,
    items: &[LinearizationItem],
    pairs: &[(S, S)],
    config: &CheckerConfig,
) -> Result<Vec<StatementPairOrderings>> {
    let composer = SioComposer::new(ctx, kernel, items, config)?;
    pairs
        .iter()
        .map(|(before, after)| composer.orderings_for_pair(before.as_ref(), after.as_ref()))
        .collect()
}
