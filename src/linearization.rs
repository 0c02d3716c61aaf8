//! Linearization items
//!
//! A linearization is the flat, fully ordered sequence of loop entries, loop
//! exits, statement executions and barriers chosen by the scheduler for one
//! kernel. The checker only ever reads it.
//!
//! The JSON form mirrors the enum directly:
//!
//! ```json
//! [
//!   {"kind": "enter_loop", "iname": "i"},
//!   {"kind": "run_instruction", "statement_id": "insn_a"},
//!   {"kind": "barrier", "sync_kind": "local", "mem_kind": "local",
//!    "originating_statement_id": "b0"},
//!   {"kind": "leave_loop", "iname": "i"}
//! ]
//! ```
//!
//! A terser line-oriented form is accepted by [`crate::parse::parse_linearization`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope a barrier synchronizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    /// Work items within one group
    Local,
    /// All groups of the kernel
    Global,
}

/// Memory made consistent by a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemKind {
    Local,
    Global,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncKind::Local => write!(f, "local"),
            SyncKind::Global => write!(f, "global"),
        }
    }
}

impl fmt::Display for MemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemKind::Local => write!(f, "local"),
            MemKind::Global => write!(f, "global"),
        }
    }
}

/// One entry of a linearization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinearizationItem {
    EnterLoop {
        iname: String,
    },
    LeaveLoop {
        iname: String,
    },
    RunInstruction {
        statement_id: String,
    },
    Barrier {
        sync_kind: SyncKind,
        mem_kind: MemKind,
        #[serde(default)]
        comment: String,
        /// Id under which dependencies may name this barrier. Barriers without
        /// one can never be a dependency endpoint.
        #[serde(default)]
        originating_statement_id: Option<String>,
    },
}

impl LinearizationItem {
    pub fn enter(iname: &str) -> Self {
        LinearizationItem::EnterLoop {
            iname: iname.to_string(),
        }
    }

    pub fn leave(iname: &str) -> Self {
        LinearizationItem::LeaveLoop {
            iname: iname.to_string(),
        }
    }

    pub fn run(statement_id: &str) -> Self {
        LinearizationItem::RunInstruction {
            statement_id: statement_id.to_string(),
        }
    }

    /// Barrier with memory scope equal to its synchronization scope
    pub fn barrier(sync_kind: SyncKind, originating_statement_id: Option<&str>) -> Self {
        let mem_kind = match sync_kind {
            SyncKind::Local => MemKind::Local,
            SyncKind::Global => MemKind::Global,
        };
        LinearizationItem::Barrier {
            sync_kind,
            mem_kind,
            comment: String::new(),
            originating_statement_id: originating_statement_id.map(str::to_string),
        }
    }

    /// Statement id this item executes, if it can be a dependency endpoint
    pub fn statement_id(&self) -> Option<&str> {
        match self {
            LinearizationItem::RunInstruction { statement_id } => Some(statement_id),
            LinearizationItem::Barrier {
                originating_statement_id,
                ..
            } => originating_statement_id.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for LinearizationItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearizationItem::EnterLoop { iname } => write!(f, "for {}", iname),
            LinearizationItem::LeaveLoop { iname } => write!(f, "end {}", iname),
            LinearizationItem::RunInstruction { statement_id } => write!(f, "{}", statement_id),
            LinearizationItem::Barrier {
                sync_kind,
                mem_kind,
                originating_statement_id,
                ..
            } => {
                let prefix = match sync_kind {
                    SyncKind::Local => "lbarrier",
                    SyncKind::Global => "gbarrier",
                };
                write!(f, "{}", prefix)?;
                if let Some(id) = originating_statement_id {
                    write!(f, " {}", id)?;
                }
                let default_mem = match sync_kind {
                    SyncKind::Local => MemKind::Local,
                    SyncKind::Global => MemKind::Global,
                };
                if *mem_kind != default_mem {
                    write!(f, " mem={}", mem_kind)?;
                }
                Ok(())
            }
        }
    }
}

/// Statement ids executed by a linearization, in order of first appearance
pub fn statement_ids(items: &[LinearizationItem]) -> Vec<String> {
    let mut seen = Vec::new();
    for item in items {
        if let Some(id) = item.statement_id() {
            if !seen.iter().any(|s: &String| s == id) {
                seen.push(id.to_string());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_id_of_items() {
        assert_eq!(LinearizationItem::run("a").statement_id(), Some("a"));
        assert_eq!(LinearizationItem::enter("i").statement_id(), None);
        assert_eq!(
            LinearizationItem::barrier(SyncKind::Local, Some("b0")).statement_id(),
            Some("b0")
        );
        assert_eq!(
            LinearizationItem::barrier(SyncKind::Global, None).statement_id(),
            None
        );
    }

    #[test]
    fn test_json_roundtrip_of_tagged_items() {
        let json = r#"[
            {"kind": "enter_loop", "iname": "i"},
            {"kind": "run_instruction", "statement_id": "a"},
            {"kind": "barrier", "sync_kind": "local", "mem_kind": "global"},
            {"kind": "leave_loop", "iname": "i"}
        ]"#;
        let items: Vec<LinearizationItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(
            items[2],
            LinearizationItem::Barrier {
                sync_kind: SyncKind::Local,
                mem_kind: MemKind::Global,
                comment: String::new(),
                originating_statement_id: None,
            }
        );
    }

    #[test]
    fn test_display_matches_text_form() {
        assert_eq!(LinearizationItem::enter("i").to_string(), "for i");
        assert_eq!(
            LinearizationItem::barrier(SyncKind::Local, Some("b0")).to_string(),
            "lbarrier b0"
        );
    }

    #[test]
    fn test_statement_ids_in_first_appearance_order() {
        let items = vec![
            LinearizationItem::run("b"),
            LinearizationItem::barrier(SyncKind::Local, None),
            LinearizationItem::run("a"),
            LinearizationItem::run("b"),
        ];
        assert_eq!(statement_ids(&items), vec!["b".to_string(), "a".to_string()]);
    }
}
