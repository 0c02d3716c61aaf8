//! Pairwise schedules from a linearization
//!
//! The builder walks a linearization once and places each statement of a
//! pair at a point of a lexicographic space. The walk keeps a stack of
//! frames, one per open loop plus a root frame:
//!
//! ```text
//! frame 0        frame 1            frame 2
//! [counter0]     [i, counter1]      [j, counter2]    ->  (c0, i, c1, j, c2)
//! ```
//!
//! A counter is bumped when a new block starts after content has been seen
//! at its level, so empty blocks consume no ordinal. What counts as
//! "content" depends on the walk:
//!
//! - statement walk (`barrier_sync == None`): executing one of the two
//!   target statements
//! - barrier walk (`barrier_sync == Some(..)`): passing a qualifying
//!   barrier; targets are only snapshotted
//!
//! In the barrier walk two statements land at the same point exactly when
//! no qualifying barrier separates them, which is what the concurrent SIOs
//! are built from.
//!
//! # Example
//!
//! ```text
//! for i            for i
//!   for k            a        -> a: (0, i, 0, k, 0)
//!     a            end k
//!   end k            ...
//!   for j
//!     b                       -> b: (0, i, 1, j, 0)
//!   end j
//! end i
//! ```

use isl_rs::{Context, Map, Set};
use log::{debug, trace};
use std::collections::BTreeSet;
use std::fmt;

use crate::concurrency::ConcurrencyPartition;
use crate::error::{CheckerError, Result};
use crate::isl_utils::insert_named_set_dim;
use crate::kernel::{require_domain, set_dim_names, KernelInfo};
use crate::lex_order::lex_var_names;
use crate::linearization::{LinearizationItem, SyncKind};
use crate::parse::parse_map;
use crate::{BLEX_VAR_PREFIX, LEX_VAR_PREFIX, STATEMENT_VAR_NAME};

// ============================================================================
// Lex points
// ============================================================================

/// One coordinate of a lex tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LexPoint {
    Int(i64),
    /// Value of the named loop variable
    Iname(String),
}

impl fmt::Display for LexPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexPoint::Int(v) => write!(f, "{}", v),
            LexPoint::Iname(name) => write!(f, "{}", name),
        }
    }
}

/// A statement together with its position in a lexicographic space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementInstanceSet {
    pub statement_id: String,
    pub lex_points: Vec<LexPoint>,
}

impl StatementInstanceSet {
    fn pad_to(&mut self, len: usize) {
        while self.lex_points.len() < len {
            self.lex_points.push(LexPoint::Int(0));
        }
    }
}

impl fmt::Display for StatementInstanceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let points: Vec<String> = self.lex_points.iter().map(|p| p.to_string()).collect();
        write!(f, "{}: ({})", self.statement_id, points.join(", "))
    }
}

// ============================================================================
// Walk
// ============================================================================

/// Per-call parameters of the linearization walk
#[derive(Debug, Clone, Copy)]
pub struct WalkParams<'a> {
    pub before_id: &'a str,
    pub after_id: &'a str,
    /// Loops that are transparent to this walk
    pub loops_to_ignore: &'a BTreeSet<String>,
    /// `None` for the statement walk. Otherwise the barrier kinds that
    /// advance counters.
    pub barrier_sync: Option<&'a [SyncKind]>,
}

impl WalkParams<'_> {
    fn counts_barrier(&self, kind: SyncKind) -> bool {
        self.barrier_sync
            .map(|kinds| kinds.contains(&kind))
            .unwrap_or(false)
    }
}

struct Frame {
    iname: Option<String>,
    counter: i64,
    seen: bool,
}

impl Frame {
    fn bump_if_seen(&mut self) {
        if self.seen {
            self.counter += 1;
            self.seen = false;
        }
    }
}

fn snapshot(frames: &[Frame]) -> Vec<LexPoint> {
    let mut points = Vec::with_capacity(frames.len() * 2);
    for frame in frames {
        if let Some(iname) = &frame.iname {
            points.push(LexPoint::Iname(iname.clone()));
        }
        points.push(LexPoint::Int(frame.counter));
    }
    points
}

fn advance(frames: &mut [Frame]) {
    if let Some(top) = frames.last_mut() {
        top.counter += 1;
    }
    for frame in frames.iter_mut() {
        frame.seen = true;
    }
}

fn item_error(idx: usize, message: String) -> CheckerError {
    CheckerError::LinearizationParse {
        line: idx + 1,
        message,
    }
}

/// Loops that enclose at least one barrier of the given kinds carrying an
/// originating statement id
pub fn loops_with_barriers(items: &[LinearizationItem], kinds: &[SyncKind]) -> BTreeSet<String> {
    let mut open: Vec<&str> = Vec::new();
    let mut found = BTreeSet::new();
    for item in items {
        match item {
            LinearizationItem::EnterLoop { iname } => open.push(iname),
            LinearizationItem::LeaveLoop { .. } => {
                open.pop();
            }
            LinearizationItem::Barrier {
                sync_kind,
                originating_statement_id: Some(_),
                ..
            } if kinds.contains(sync_kind) => {
                found.extend(open.iter().map(|s| s.to_string()));
            }
            _ => {}
        }
    }
    found
}

/// Every iname entered by the linearization
pub fn loops_in_linearization(items: &[LinearizationItem]) -> BTreeSet<String> {
    items
        .iter()
        .filter_map(|item| match item {
            LinearizationItem::EnterLoop { iname } => Some(iname.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Builder
// ============================================================================

/// Lex placement of one statement pair under one walk.
///
/// Construct with [`PairwiseScheduleBuilder::from_linearization`], then lift
/// into isl maps with [`build_maps`](Self::build_maps).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairwiseScheduleBuilder {
    pub before: StatementInstanceSet,
    pub after: StatementInstanceSet,
    /// Points right after each qualifying barrier (barrier walk only)
    pub barrier_points: Vec<StatementInstanceSet>,
    lex_var_prefix: &'static str,
}

impl PairwiseScheduleBuilder {
    /// Walk `items` once and place `before_id` and `after_id`.
    ///
    /// # Errors
    /// - `MissingStatement` if either target never executes
    /// - `LinearizationParse` if a `LeaveLoop` does not close the innermost
    ///   open loop
    pub fn from_linearization(items: &[LinearizationItem], params: &WalkParams) -> Result<Self> {
        let mut frames = vec![Frame {
            iname: None,
            counter: 0,
            seen: false,
        }];
        let mut before: Option<Vec<LexPoint>> = None;
        let mut after: Option<Vec<LexPoint>> = None;
        let mut barrier_points = Vec::new();

        for (idx, item) in items.iter().enumerate() {
            match item {
                LinearizationItem::EnterLoop { iname } => {
                    if params.loops_to_ignore.contains(iname) {
                        continue;
                    }
                    if let Some(top) = frames.last_mut() {
                        top.bump_if_seen();
                    }
                    frames.push(Frame {
                        iname: Some(iname.clone()),
                        counter: 0,
                        seen: false,
                    });
                }
                LinearizationItem::LeaveLoop { iname } => {
                    if params.loops_to_ignore.contains(iname) {
                        continue;
                    }
                    if frames.len() < 2 || frames.last().and_then(|f| f.iname.as_ref()) != Some(iname)
                    {
                        return Err(item_error(
                            idx,
                            format!("leaving loop '{}' which is not the innermost open loop", iname),
                        ));
                    }
                    frames.pop();
                    if let Some(top) = frames.last_mut() {
                        top.bump_if_seen();
                    }
                }
                LinearizationItem::RunInstruction { statement_id } => {
                    let captured = capture(statement_id, params, &frames, &mut before, &mut after);
                    if captured && params.barrier_sync.is_none() {
                        advance(&mut frames);
                    }
                }
                LinearizationItem::Barrier {
                    sync_kind,
                    originating_statement_id,
                    ..
                } => {
                    let id = match originating_statement_id {
                        Some(id) => id,
                        None => {
                            trace!("Skipping barrier without originating statement");
                            continue;
                        }
                    };
                    let captured = capture(id, params, &frames, &mut before, &mut after);
                    if params.barrier_sync.is_none() {
                        if captured {
                            advance(&mut frames);
                        }
                    } else if params.counts_barrier(*sync_kind) {
                        advance(&mut frames);
                        barrier_points.push(StatementInstanceSet {
                            statement_id: id.clone(),
                            lex_points: snapshot(&frames),
                        });
                    }
                }
            }

            // The statement walk is done once both ends are placed. The
            // barrier walk needs every barrier point.
            if params.barrier_sync.is_none() && before.is_some() && after.is_some() {
                break;
            }
        }

        let before = before.ok_or_else(|| CheckerError::MissingStatement {
            statement_id: params.before_id.to_string(),
            role: "before",
        })?;
        let after = after.ok_or_else(|| CheckerError::MissingStatement {
            statement_id: params.after_id.to_string(),
            role: "after",
        })?;

        let mut builder = PairwiseScheduleBuilder {
            before: StatementInstanceSet {
                statement_id: params.before_id.to_string(),
                lex_points: before,
            },
            after: StatementInstanceSet {
                statement_id: params.after_id.to_string(),
                lex_points: after,
            },
            barrier_points,
            lex_var_prefix: if params.barrier_sync.is_some() {
                BLEX_VAR_PREFIX
            } else {
                LEX_VAR_PREFIX
            },
        };
        builder.pad_lex_tuples();
        debug!("{}", builder);
        Ok(builder)
    }

    fn pad_lex_tuples(&mut self) {
        let len = self.max_lex_dims();
        self.before.pad_to(len);
        self.after.pad_to(len);
        for point in &mut self.barrier_points {
            point.pad_to(len);
        }
    }

    /// Length every lex tuple is padded to
    pub fn max_lex_dims(&self) -> usize {
        std::iter::once(&self.before)
            .chain(std::iter::once(&self.after))
            .chain(&self.barrier_points)
            .map(|s| s.lex_points.len())
            .max()
            .unwrap_or(0)
    }

    pub fn lex_var_names(&self) -> Vec<String> {
        lex_var_names(self.lex_var_prefix, self.max_lex_dims())
    }

    /// Statement coordinate values: 0 for before, 1 for after, both 0 when
    /// the pair is a statement with itself
    pub fn statement_var_values(&self) -> (i32, i32) {
        if self.before.statement_id == self.after.statement_id {
            (0, 0)
        } else {
            (0, 1)
        }
    }

    /// Lift both placements into maps
    /// `[_lp_linchk_stmt, inames..] -> [lex.., lid.., gid..]`, restricted to
    /// each statement's domain.
    pub fn build_maps(
        &self,
        ctx: &Context,
        kernel: &dyn KernelInfo,
        partition: &ConcurrencyPartition,
    ) -> Result<(Map, Map)> {
        let (sid_before, sid_after) = self.statement_var_values();
        let map_before = self.map_for_instance_set(ctx, kernel, partition, &self.before, sid_before, true)?;
        let map_after = self.map_for_instance_set(ctx, kernel, partition, &self.after, sid_after, true)?;
        Ok((map_before, map_after))
    }

    /// Union of the points directly after each qualifying barrier, over the
    /// barrier's whole domain. Lane and group coordinates are left free.
    /// `None` when the walk passed no qualifying barrier.
    pub fn barrier_point_set(
        &self,
        ctx: &Context,
        kernel: &dyn KernelInfo,
        partition: &ConcurrencyPartition,
    ) -> Result<Option<Set>> {
        let mut result: Option<Set> = None;
        for point in &self.barrier_points {
            let range = self
                .map_for_instance_set(ctx, kernel, partition, point, 0, false)?
                .range();
            result = Some(match result {
                Some(acc) => acc.union(range),
                None => range,
            });
        }
        Ok(result)
    }

    fn map_for_instance_set(
        &self,
        ctx: &Context,
        kernel: &dyn KernelInfo,
        partition: &ConcurrencyPartition,
        instance: &StatementInstanceSet,
        statement_var_value: i32,
        pin_hw_dims: bool,
    ) -> Result<Map> {
        let domain = require_domain(kernel, ctx, &instance.statement_id)?.reset_tuple_id();
        let inames = set_dim_names(&domain);
        partition.check_statement_axes(&instance.statement_id, &inames)?;

        let lex_names = self.lex_var_names();
        let mut constraints = vec![format!("{} = {}", STATEMENT_VAR_NAME, statement_var_value)];
        for (name, point) in lex_names.iter().zip(&instance.lex_points) {
            if let LexPoint::Iname(iname) = point {
                if !inames.contains(iname) {
                    return Err(CheckerError::UnknownIname {
                        statement_id: instance.statement_id.clone(),
                        iname: iname.clone(),
                    });
                }
            }
            constraints.push(format!("{} = {}", name, point));
        }
        if pin_hw_dims {
            for iname in &inames {
                if let Some(var) = partition.hw_var_for(iname) {
                    constraints.push(format!("{} = {}", var, iname));
                }
            }
        }

        let mut in_names = vec![STATEMENT_VAR_NAME.to_string()];
        in_names.extend(inames.iter().cloned());
        let mut out_names = lex_names;
        out_names.extend(partition.hw_var_names());

        let text = format!(
            "{{ [{}] -> [{}] : {} }}",
            in_names.join(", "),
            out_names.join(", "),
            constraints.join(" and ")
        );
        let map = parse_map(ctx, &text)?;

        let domain = insert_named_set_dim(domain, STATEMENT_VAR_NAME);
        let map = map.align_params(domain.get_space());
        Ok(map.intersect_domain(domain))
    }
}

impl fmt::Display for PairwiseScheduleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sid_before, sid_after) = self.statement_var_values();
        writeln!(f, "PairwiseScheduleBuilder(")?;
        writeln!(f, "  Before: [{}={}, <inames>] -> {}", STATEMENT_VAR_NAME, sid_before, self.before)?;
        writeln!(f, "  After:  [{}={}, <inames>] -> {}", STATEMENT_VAR_NAME, sid_after, self.after)?;
        for point in &self.barrier_points {
            writeln!(f, "  Barrier: {}", point)?;
        }
        write!(f, ")")
    }
}

fn capture(
    id: &str,
    params: &WalkParams,
    frames: &[Frame],
    before: &mut Option<Vec<LexPoint>>,
    after: &mut Option<Vec<LexPoint>>,
) -> bool {
    let mut captured = false;
    if id == params.before_id && before.is_none() {
        *before = Some(snapshot(frames));
        captured = true;
    }
    if id == params.after_id && after.is_none() {
        *after = Some(snapshot(frames));
        captured = true;
    }
    captured
}
