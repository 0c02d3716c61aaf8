//! Lexicographic order relations
//!
//! For tuples `A` and `B` of arity `n`, `A <_lex B` holds iff for some
//! `k < n` the two agree on coordinates `[0, k)` and `A[k] < B[k]`. The
//! relation is built as the union of exactly `n` such disjuncts.
//!
//! The before side of every relation built here carries
//! [`BEFORE_MARK`](crate::BEFORE_MARK) on its dimension names, so a map
//! `[lex0', lex1'] -> [lex0, lex1]` composes by name with schedules whose
//! range is `[lex0, lex1]`.

use isl_rs::{Context, DimType, Map};

use crate::error::{CheckerError, Result};
use crate::isl_utils::append_marker_to_dim_names;
use crate::parse::parse_map;
use crate::{BEFORE_MARK, LEX_VAR_PREFIX};

/// Default coordinate names `_lp_linchk_lex0 .. _lp_linchk_lex{n-1}`
pub fn lex_var_names(prefix: &str, n_dims: usize) -> Vec<String> {
    (0..n_dims).map(|k| format!("{}{}", prefix, k)).collect()
}

/// Textual constraint "`before` is lexicographically before `after`".
///
/// `before` and `after` must have the same length. With `strict == false`
/// the equal tuple is accepted as well. An empty tuple yields `1 = 0` for
/// the strict order (nothing is before nothing) and `1 = 1` otherwise.
pub fn lex_order_constraint(before: &[String], after: &[String], strict: bool) -> String {
    debug_assert_eq!(before.len(), after.len());
    let mut disjuncts = Vec::with_capacity(before.len() + 1);
    for k in 0..before.len() {
        let mut conj: Vec<String> = (0..k)
            .map(|i| format!("{} = {}", before[i], after[i]))
            .collect();
        conj.push(format!("{} < {}", before[k], after[k]));
        disjuncts.push(format!("({})", conj.join(" and ")));
    }
    if !strict {
        let all_equal: Vec<String> = before
            .iter()
            .zip(after)
            .map(|(b, a)| format!("{} = {}", b, a))
            .collect();
        if all_equal.is_empty() {
            disjuncts.push("(1 = 1)".to_string());
        } else {
            disjuncts.push(format!("({})", all_equal.join(" and ")));
        }
    }
    if disjuncts.is_empty() {
        "1 = 0".to_string()
    } else {
        disjuncts.join(" or ")
    }
}

/// Builds order relations between two copies of a lex space.
///
/// Extra coordinates may follow the ordered ones: each is either pinned
/// equal on both sides or left free. This is how lane and group coordinates
/// ride along with a lex space.
pub struct LexOrderRelationFactory<'a> {
    ctx: &'a Context,
}

impl<'a> LexOrderRelationFactory<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        LexOrderRelationFactory { ctx }
    }

    /// Strict lexicographic order of arity `n_dims`. Coordinate names
    /// default to `_lp_linchk_lex{k}`; the in-dims get the before marker.
    ///
    /// # Errors
    /// `DimensionMismatch` if `dim_names` does not hold exactly `n_dims`
    /// names.
    pub fn create_lex_order_map(&self, n_dims: usize, dim_names: Option<&[String]>) -> Result<Map> {
        let names = match dim_names {
            Some(names) if names.len() != n_dims => {
                return Err(CheckerError::DimensionMismatch {
                    expected: lex_var_names(LEX_VAR_PREFIX, n_dims),
                    found: names.to_vec(),
                })
            }
            Some(names) => names.to_vec(),
            None => lex_var_names(LEX_VAR_PREFIX, n_dims),
        };
        self.create_order_map(&names, &[], &[], true)
    }

    /// Order relation over `ordered` followed by `trailing` coordinates.
    ///
    /// The relation holds when the `ordered` coordinates compare strictly
    /// (or non-strictly) lexicographically and every trailing coordinate
    /// listed in `pinned` matches its before-side copy. Other trailing
    /// coordinates are unconstrained.
    pub fn create_order_map(
        &self,
        ordered: &[String],
        trailing: &[String],
        pinned: &[String],
        strict: bool,
    ) -> Result<Map> {
        // isl drops a trailing prime when it reads a name, so a primed
        // variable is a distinct dimension that still prints as its base.
        let primed = |names: &[String]| -> Vec<String> {
            names.iter().map(|n| format!("{}'", n)).collect()
        };

        let mut in_names = primed(ordered);
        in_names.extend(primed(trailing));
        let mut out_names = ordered.to_vec();
        out_names.extend_from_slice(trailing);

        let mut constraint = format!("({})", lex_order_constraint(&primed(ordered), ordered, strict));
        for name in trailing.iter().filter(|n| pinned.contains(n)) {
            constraint.push_str(&format!(" and {}' = {}", name, name));
        }

        let text = format!(
            "{{ [{}] -> [{}] : {} }}",
            in_names.join(", "),
            out_names.join(", "),
            constraint
        );
        let mut map = parse_map(self.ctx, &text)?;

        // Give the before side its real marked names
        for (pos, name) in ordered.iter().chain(trailing).enumerate() {
            map = map.set_dim_name(DimType::In, pos as u32, name);
            map = map.set_dim_name(DimType::Out, pos as u32, name);
        }
        Ok(append_marker_to_dim_names(map, DimType::In, BEFORE_MARK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isl_utils::map_dim_names;

    #[test]
    fn test_constraint_text_has_one_disjunct_per_dim() {
        let before = lex_var_names("a", 3);
        let after = lex_var_names("b", 3);
        let text = lex_order_constraint(&before, &after, true);
        assert_eq!(text.matches(" or ").count(), 2);
        assert_eq!(
            text,
            "(a0 < b0) or (a0 = b0 and a1 < b1) or (a0 = b0 and a1 = b1 and a2 < b2)"
        );
        let non_strict = lex_order_constraint(&before[..1], &after[..1], false);
        assert_eq!(non_strict, "(a0 < b0) or (a0 = b0)");
    }

    #[test]
    fn test_empty_constraint() {
        assert_eq!(lex_order_constraint(&[], &[], true), "1 = 0");
        assert_eq!(lex_order_constraint(&[], &[], false), "(1 = 1)");
    }

    #[test]
    fn test_lex_map_dim_names() {
        let ctx = Context::alloc();
        let factory = LexOrderRelationFactory::new(&ctx);
        let map = factory.create_lex_order_map(2, None).unwrap();
        assert_eq!(
            map_dim_names(&map, DimType::In),
            vec!["_lp_linchk_lex0'".to_string(), "_lp_linchk_lex1'".to_string()]
        );
        assert_eq!(
            map_dim_names(&map, DimType::Out),
            vec!["_lp_linchk_lex0".to_string(), "_lp_linchk_lex1".to_string()]
        );
    }

    #[test]
    fn test_name_count_must_match_arity() {
        let ctx = Context::alloc();
        let factory = LexOrderRelationFactory::new(&ctx);
        let names = lex_var_names("x", 2);
        assert!(matches!(
            factory.create_lex_order_map(3, Some(&names[..])),
            Err(CheckerError::DimensionMismatch { ref found, .. }) if found.len() == 2
        ));
        assert!(factory.create_lex_order_map(2, Some(&names[..])).is_ok());
    }

    #[test]
    fn test_order_map_with_pinned_and_free_dims() {
        let ctx = Context::alloc();
        let factory = LexOrderRelationFactory::new(&ctx);
        let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let map = factory
            .create_order_map(&names(&["x"]), &names(&["l", "g"]), &names(&["g"]), true)
            .unwrap();
        assert_eq!(
            map_dim_names(&map, DimType::In),
            names(&["x'", "l'", "g'"])
        );
        let expected = Map::read_from_str(&ctx, "{ [x0, l0, g0] -> [x, l, g] : x0 < x and g0 = g }");
        assert!(map.is_equal(&expected));
    }

    #[test]
    fn test_non_strict_order_includes_identity() {
        let ctx = Context::alloc();
        let factory = LexOrderRelationFactory::new(&ctx);
        let names = lex_var_names("y", 2);
        let map = factory.create_order_map(&names, &[], &[], false).unwrap();
        let expected = Map::read_from_str(
            &ctx,
            "{ [a0, a1] -> [b0, b1] : a0 < b0 or (a0 = b0 and a1 <= b1) }",
        );
        assert!(map.is_equal(&expected));
    }
}
