//! Checker configuration

use crate::linearization::SyncKind;

/// Options for building statement-instance orderings.
///
/// Passed explicitly to every query. There is no global configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerConfig {
    /// Run isl coalescing on every produced relation. This only changes how
    /// relations print, never what they contain.
    pub coalesce: bool,

    /// Let global barriers also advance the local-concurrent view. Off by
    /// default: the local-concurrent scope then only trusts local barriers.
    pub global_barriers_sync_locally: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            coalesce: true,
            global_barriers_sync_locally: false,
        }
    }
}

impl CheckerConfig {
    /// Barrier kinds that separate phases in the local-concurrent scope
    pub fn local_barrier_kinds(&self) -> &'static [SyncKind] {
        if self.global_barriers_sync_locally {
            &[SyncKind::Local, SyncKind::Global]
        } else {
            &[SyncKind::Local]
        }
    }

    /// Barrier kinds that separate phases in the global-concurrent scope
    pub fn global_barrier_kinds(&self) -> &'static [SyncKind] {
        &[SyncKind::Global]
    }
}
