//! Name-based dimension helpers on top of isl-rs
//!
//! Schedules, order relations and dependencies are built independently, so
//! the position of a dimension is never trusted across relations. Before two
//! relations are combined, one is realigned to the other by dimension name:
//! parameters are unified with `align_params` and in/out dimensions are
//! permuted with [`reorder_dims_by_name`].

use isl_rs::{DimType, Map, Set};
use log::debug;

use crate::error::{CheckerError, Result};

/// Names of the `dim_type` dimensions of `map`, in order
pub fn map_dim_names(map: &Map, dim_type: DimType) -> Vec<String> {
    let n = map.dim(dim_type).max(0) as u32;
    (0..n)
        .map(|pos| map.get_dim_name(dim_type, pos).to_string())
        .collect()
}

/// Permute the `dim_type` dimensions of `map` into the order of `desired`.
///
/// Each dimension is moved out to the parameters and back in at its target
/// position. `desired` must name exactly the existing dimensions.
///
/// # Errors
/// `DimensionMismatch` when the names differ as sets.
pub fn reorder_dims_by_name(map: Map, dim_type: DimType, desired: &[String]) -> Result<Map> {
    let current = map_dim_names(&map, dim_type);
    let mut sorted_current = current.clone();
    let mut sorted_desired = desired.to_vec();
    sorted_current.sort();
    sorted_desired.sort();
    if sorted_current != sorted_desired {
        return Err(CheckerError::DimensionMismatch {
            expected: desired.to_vec(),
            found: current,
        });
    }
    if current == desired {
        return Ok(map);
    }

    let mut map = map;
    for (desired_idx, name) in desired.iter().enumerate() {
        let current_idx = map.find_dim_by_name(dim_type, name);
        if current_idx < 0 {
            return Err(CheckerError::DimensionMismatch {
                expected: desired.to_vec(),
                found: map_dim_names(&map, dim_type),
            });
        }
        let current_idx = current_idx as u32;
        if current_idx as usize == desired_idx {
            continue;
        }
        let n_param = map.dim(DimType::Param) as u32;
        map = map.move_dims(DimType::Param, n_param, dim_type, current_idx, 1);
        map = map.move_dims(dim_type, desired_idx as u32, DimType::Param, n_param, 1);
    }
    Ok(map)
}

/// Bring `obj` into the space of `tgt`: same parameters, same in and out
/// dimension order, matched by name.
pub fn ensure_dim_names_match_and_align(obj: Map, tgt: &Map) -> Result<Map> {
    let obj = obj.align_params(tgt.get_space());
    let obj = reorder_dims_by_name(obj, DimType::In, &map_dim_names(tgt, DimType::In))?;
    reorder_dims_by_name(obj, DimType::Out, &map_dim_names(tgt, DimType::Out))
}

/// Append `mark` to the name of every `dim_type` dimension
pub fn append_marker_to_dim_names(map: Map, dim_type: DimType, mark: &str) -> Map {
    let names = map_dim_names(&map, dim_type);
    let mut map = map;
    for (pos, name) in names.iter().enumerate() {
        map = map.set_dim_name(dim_type, pos as u32, &format!("{}{}", name, mark));
    }
    map
}

/// Prepend a dimension named `name` to a set
pub fn insert_named_set_dim(set: Set, name: &str) -> Set {
    set.insert_dims(DimType::Set, 0, 1)
        .set_dim_name(DimType::Set, 0, name)
}

/// Prepend a dimension named `name` fixed to `value` on the `dim_type` side
pub fn insert_fixed_map_dim(map: Map, dim_type: DimType, name: &str, value: i32) -> Map {
    map.insert_dims(dim_type, 0, 1)
        .set_dim_name(dim_type, 0, name)
        .fix_si(dim_type, 0, value)
}

/// Compose `left` with `right` after aligning `right`'s domain to the range
/// of `left` by name. The out dimension names of `left` must already equal
/// the in dimension names of `right`.
pub fn apply_range_aligned(left: Map, right: Map) -> Result<Map> {
    let right = right.align_params(left.get_space());
    let left = left.align_params(right.get_space());
    let right = reorder_dims_by_name(right, DimType::In, &map_dim_names(&left, DimType::Out))?;
    debug!(
        "Composing relations over {:?}",
        map_dim_names(&left, DimType::Out)
    );
    Ok(left.apply_range(right))
}
