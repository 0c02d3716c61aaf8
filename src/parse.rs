//! Parsing of isl relation strings and textual linearizations
//!
//! isl-rs is a thin wrapper around the C library, which reports malformed
//! input by printing to stderr and handing back a null object. Every
//! user-provided string therefore goes through [`parse_map`] or
//! [`parse_set`], which screen the obvious failures first and turn a null
//! result (or a panic from the bindings) into `IslParse`.
//!
//! The text linearization format has one item per line:
//!
//! ```text
//! # comment
//! for i
//!   insn_a
//!   lbarrier b0
//!   gbarrier mem=local
//! end i
//! ```
//!
//! Indentation is ignored. A barrier line may carry an originating
//! statement id and a `mem=` override of its memory scope.

use isl_rs::{Context, Map, Set};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{CheckerError, Result};
use crate::linearization::{LinearizationItem, MemKind, SyncKind};

lazy_static! {
    static ref LOOP_LINE: Regex = Regex::new(r"^(for|end)\s+([A-Za-z_][A-Za-z0-9_]*)$").unwrap();
    static ref BARRIER_LINE: Regex = Regex::new(
        r"^([lg])barrier(?:\s+([A-Za-z0-9_][A-Za-z0-9_.]*))?(?:\s+mem=(local|global))?(?:\s+//\s*(.*))?$"
    )
    .unwrap();
    static ref STATEMENT_LINE: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.]*$").unwrap();
}

fn screen_isl_text(kind: &'static str, text: &str) -> Result<()> {
    // Empty or brace-less input makes isl hand back a null object
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.contains('{') || !trimmed.ends_with('}') {
        return Err(CheckerError::IslParse {
            kind,
            text: text.to_string(),
        });
    }
    Ok(())
}

fn rejected(kind: &'static str, text: &str) -> CheckerError {
    warn!("isl rejected {} '{}'", kind, text);
    CheckerError::IslParse {
        kind,
        text: text.to_string(),
    }
}

/// Parse an isl map such as `[n] -> { [i'] -> [i] : 0 <= i' < i < n }`.
///
/// # Errors
/// `IslParse` if the string is rejected.
pub fn parse_map(ctx: &Context, text: &str) -> Result<Map> {
    screen_isl_text("map", text)?;
    debug!("Parsing isl map: {}", text);
    let map = catch_unwind(AssertUnwindSafe(|| Map::read_from_str(ctx, text)))
        .map_err(|_| rejected("map", text))?;
    // isl reports a syntax error by returning a null object
    if map.ptr == 0 {
        return Err(rejected("map", text));
    }
    Ok(map)
}

/// Parse an isl set such as `[n] -> { [i, j] : 0 <= i, j < n }`.
pub fn parse_set(ctx: &Context, text: &str) -> Result<Set> {
    screen_isl_text("set", text)?;
    debug!("Parsing isl set: {}", text);
    let set = catch_unwind(AssertUnwindSafe(|| Set::read_from_str(ctx, text)))
        .map_err(|_| rejected("set", text))?;
    if set.ptr == 0 {
        return Err(rejected("set", text));
    }
    Ok(set)
}

/// Parse the line-oriented linearization format.
///
/// # Errors
/// `LinearizationParse` with the 1-based line number of the first line
/// that is not a loop, barrier or statement, or of an `end` that does not
/// close the innermost open loop.
pub fn parse_linearization(text: &str) -> Result<Vec<LinearizationItem>> {
    let mut items = Vec::new();
    let mut open_loops: Vec<String> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(caps) = LOOP_LINE.captures(line) {
            let iname = caps[2].to_string();
            if &caps[1] == "for" {
                open_loops.push(iname.clone());
                items.push(LinearizationItem::EnterLoop { iname });
            } else {
                match open_loops.pop() {
                    Some(open) if open == iname => {
                        items.push(LinearizationItem::LeaveLoop { iname });
                    }
                    Some(open) => {
                        return Err(CheckerError::LinearizationParse {
                            line: line_no,
                            message: format!("'end {}' closes open loop '{}'", iname, open),
                        })
                    }
                    None => {
                        return Err(CheckerError::LinearizationParse {
                            line: line_no,
                            message: format!("'end {}' without matching 'for'", iname),
                        })
                    }
                }
            }
        } else if let Some(caps) = BARRIER_LINE.captures(line) {
            let sync_kind = if &caps[1] == "l" {
                SyncKind::Local
            } else {
                SyncKind::Global
            };
            let mem_kind = match caps.get(3).map(|m| m.as_str()) {
                Some("local") => MemKind::Local,
                Some(_) => MemKind::Global,
                None if sync_kind == SyncKind::Local => MemKind::Local,
                None => MemKind::Global,
            };
            items.push(LinearizationItem::Barrier {
                sync_kind,
                mem_kind,
                comment: caps
                    .get(4)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                originating_statement_id: caps.get(2).map(|m| m.as_str().to_string()),
            });
        } else if STATEMENT_LINE.is_match(line) {
            items.push(LinearizationItem::RunInstruction {
                statement_id: line.to_string(),
            });
        } else {
            return Err(CheckerError::LinearizationParse {
                line: line_no,
                message: format!("unrecognized item '{}'", line),
            });
        }
    }

    if let Some(open) = open_loops.last() {
        return Err(CheckerError::LinearizationParse {
            line: text.lines().count(),
            message: format!("loop '{}' is never closed", open),
        });
    }

    debug!("Parsed linearization with {} items", items.len());
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_linearization() {
        let text = "
            # outer loop
            for i
              a
              lbarrier b0
              gbarrier mem=local // flush
              gbarrier
            end i
            c
        ";
        let items = parse_linearization(text).unwrap();
        assert_eq!(items.len(), 7);
        assert_eq!(items[0], LinearizationItem::enter("i"));
        assert_eq!(items[1], LinearizationItem::run("a"));
        assert_eq!(
            items[2],
            LinearizationItem::barrier(SyncKind::Local, Some("b0"))
        );
        assert_eq!(
            items[3],
            LinearizationItem::Barrier {
                sync_kind: SyncKind::Global,
                mem_kind: MemKind::Local,
                comment: "flush".to_string(),
                originating_statement_id: None,
            }
        );
        assert_eq!(items[4], LinearizationItem::barrier(SyncKind::Global, None));
        assert_eq!(items[5], LinearizationItem::leave("i"));
        assert_eq!(items[6], LinearizationItem::run("c"));
    }

    #[test]
    fn test_display_output_parses_back() {
        let items = vec![
            LinearizationItem::enter("i"),
            LinearizationItem::run("a"),
            LinearizationItem::barrier(SyncKind::Local, Some("b0")),
            LinearizationItem::leave("i"),
        ];
        let text: Vec<String> = items.iter().map(|i| i.to_string()).collect();
        assert_eq!(parse_linearization(&text.join("\n")).unwrap(), items);
    }

    #[test]
    fn test_numeric_statement_ids() {
        let items = parse_linearization("0\nlbarrier 1b\n2\n").unwrap();
        assert_eq!(items[0], LinearizationItem::run("0"));
        assert_eq!(items[1].statement_id(), Some("1b"));
        assert_eq!(items[2], LinearizationItem::run("2"));
    }

    #[test]
    fn test_mismatched_end_reports_line() {
        let err = parse_linearization("for i\nfor j\nend i\n").unwrap_err();
        match err {
            CheckerError::LinearizationParse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_loop_rejected() {
        assert!(parse_linearization("for i\na\n").is_err());
    }

    #[test]
    fn test_garbage_line_rejected() {
        let err = parse_linearization("a\nb c d\n").unwrap_err();
        assert!(matches!(err, CheckerError::LinearizationParse { line: 2, .. }));
    }

    #[test]
    fn test_screen_rejects_empty_isl_text() {
        let ctx = Context::alloc();
        assert!(matches!(
            parse_map(&ctx, "   "),
            Err(CheckerError::IslParse { kind: "map", .. })
        ));
        assert!(parse_set(&ctx, "[i] : i > 0").is_err());
    }

    #[test]
    fn test_malformed_constraints_rejected() {
        let ctx = Context::alloc();
        assert!(matches!(
            parse_set(&ctx, "{ [i] : 0 <= i < }"),
            Err(CheckerError::IslParse { kind: "set", .. })
        ));
        assert!(matches!(
            parse_map(&ctx, "{ [i] -> [j] : i = }"),
            Err(CheckerError::IslParse { kind: "map", .. })
        ));
    }

    #[test]
    fn test_parse_valid_set() {
        let ctx = Context::alloc();
        let set = parse_set(&ctx, "[n] -> { [i] : 0 <= i < n }").unwrap();
        assert_eq!(set.dim(isl_rs::DimType::Set), 1);
    }
}
