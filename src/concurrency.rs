//! Concurrency classification of inames
//!
//! Every iname is either executed sequentially or mapped onto a hardware
//! axis: a lane axis inside one work group (`l.k`) or a group axis (`g.k`).
//! The classifier turns the per-iname tag lookup of a kernel into a
//! partition that the schedule walk and the SIO composer consume:
//!
//! - sequential inames become symbolic coordinates of the lex space
//! - local-parallel inames become `_lp_linchk_lid{k}` coordinates
//! - global-parallel inames become `_lp_linchk_gid{k}` coordinates

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{CheckerError, Result};
use crate::kernel::KernelInfo;
use crate::{GROUP_VAR_PREFIX, LANE_VAR_PREFIX, LIN_CHECK_IDENTIFIER_PREFIX};

/// Hardware axis tag attached to an iname, written `l.k` or `g.k`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IndexTag {
    /// Local (lane) axis k within a work group
    Local(u32),
    /// Group axis k
    Group(u32),
}

impl FromStr for IndexTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, axis) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| format!("expected 'l.<axis>' or 'g.<axis>', got '{}'", s))?;
        let axis: u32 = axis
            .parse()
            .map_err(|_| format!("axis in '{}' is not a non-negative integer", s))?;
        match kind {
            "l" => Ok(IndexTag::Local(axis)),
            "g" => Ok(IndexTag::Group(axis)),
            _ => Err(format!("unknown axis kind '{}' in '{}'", kind, s)),
        }
    }
}

impl TryFrom<String> for IndexTag {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IndexTag> for String {
    fn from(tag: IndexTag) -> Self {
        tag.to_string()
    }
}

impl fmt::Display for IndexTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexTag::Local(k) => write!(f, "l.{}", k),
            IndexTag::Group(k) => write!(f, "g.{}", k),
        }
    }
}

/// Class of a single iname
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyClass {
    Sequential,
    LocalParallel(u32),
    GlobalParallel(u32),
}

/// Result of classification: the inames of a kernel split into three
/// disjoint groups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcurrencyPartition {
    pub sequential: BTreeSet<String>,
    /// iname -> lane axis
    pub local: BTreeMap<String, u32>,
    /// iname -> group axis
    pub global: BTreeMap<String, u32>,
}

impl ConcurrencyPartition {
    pub fn class_of(&self, iname: &str) -> ConcurrencyClass {
        if let Some(axis) = self.local.get(iname) {
            ConcurrencyClass::LocalParallel(*axis)
        } else if let Some(axis) = self.global.get(iname) {
            ConcurrencyClass::GlobalParallel(*axis)
        } else {
            ConcurrencyClass::Sequential
        }
    }

    /// Inames mapped to any hardware axis. Sequential walks skip these.
    pub fn concurrent_inames(&self) -> BTreeSet<String> {
        self.local.keys().chain(self.global.keys()).cloned().collect()
    }

    /// Lane axes used anywhere in the kernel, ascending
    pub fn lane_axes(&self) -> BTreeSet<u32> {
        self.local.values().copied().collect()
    }

    /// Group axes used anywhere in the kernel, ascending
    pub fn group_axes(&self) -> BTreeSet<u32> {
        self.global.values().copied().collect()
    }

    /// Names of the lane coordinates appended to every schedule range
    pub fn lane_var_names(&self) -> Vec<String> {
        self.lane_axes()
            .into_iter()
            .map(|k| format!("{}{}", LANE_VAR_PREFIX, k))
            .collect()
    }

    /// Names of the group coordinates appended after the lane coordinates
    pub fn group_var_names(&self) -> Vec<String> {
        self.group_axes()
            .into_iter()
            .map(|k| format!("{}{}", GROUP_VAR_PREFIX, k))
            .collect()
    }

    /// Lane coordinates followed by group coordinates
    pub fn hw_var_names(&self) -> Vec<String> {
        let mut names = self.lane_var_names();
        names.extend(self.group_var_names());
        names
    }

    /// Hardware coordinate an iname is pinned to, if any
    pub fn hw_var_for(&self, iname: &str) -> Option<String> {
        match self.class_of(iname) {
            ConcurrencyClass::Sequential => None,
            ConcurrencyClass::LocalParallel(k) => Some(format!("{}{}", LANE_VAR_PREFIX, k)),
            ConcurrencyClass::GlobalParallel(k) => Some(format!("{}{}", GROUP_VAR_PREFIX, k)),
        }
    }

    /// Check that no two inames of one statement's domain claim the same
    /// hardware axis.
    pub fn check_statement_axes(&self, statement_id: &str, inames: &[String]) -> Result<()> {
        let mut claimed: BTreeMap<String, &str> = BTreeMap::new();
        for iname in inames {
            if let Some(var) = self.hw_var_for(iname) {
                if let Some(other) = claimed.insert(var.clone(), iname) {
                    return Err(CheckerError::InvalidConcurrencyTag {
                        iname: iname.clone(),
                        reason: format!(
                            "shares hardware axis '{}' with '{}' in statement '{}'",
                            var, other, statement_id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Splits the inames of a kernel into sequential, local-parallel and
/// global-parallel classes.
pub struct ConcurrencyClassifier;

impl ConcurrencyClassifier {
    /// Classify one iname from its full tag list.
    ///
    /// # Errors
    /// `InvalidConcurrencyTag` if the tags mix lane and group axes or name
    /// two different axes of the same kind.
    pub fn classify_iname(iname: &str, tags: &[IndexTag]) -> Result<ConcurrencyClass> {
        let mut class = ConcurrencyClass::Sequential;
        for tag in tags {
            let next = match tag {
                IndexTag::Local(k) => ConcurrencyClass::LocalParallel(*k),
                IndexTag::Group(k) => ConcurrencyClass::GlobalParallel(*k),
            };
            class = match (class, next) {
                (ConcurrencyClass::Sequential, n) => n,
                (c, n) if c == n => c,
                (c, n) => {
                    return Err(CheckerError::InvalidConcurrencyTag {
                        iname: iname.to_string(),
                        reason: format!("tagged as both {:?} and {:?}", c, n),
                    })
                }
            };
        }
        Ok(class)
    }

    /// Classify every iname known to the kernel.
    ///
    /// # Errors
    /// `ReservedName` for inames starting with `_lp_linchk_`, `IslParse` for
    /// unreadable domains, plus the errors of
    /// [`classify_iname`](Self::classify_iname).
    pub fn classify(kernel: &dyn KernelInfo) -> Result<ConcurrencyPartition> {
        let mut partition = ConcurrencyPartition::default();
        for iname in kernel.all_inames()? {
            if iname.starts_with(LIN_CHECK_IDENTIFIER_PREFIX) {
                return Err(CheckerError::ReservedName(iname));
            }
            let tags = kernel.iname_tags(&iname);
            match Self::classify_iname(&iname, &tags)? {
                ConcurrencyClass::Sequential => {
                    partition.sequential.insert(iname);
                }
                ConcurrencyClass::LocalParallel(k) => {
                    partition.local.insert(iname, k);
                }
                ConcurrencyClass::GlobalParallel(k) => {
                    partition.global.insert(iname, k);
                }
            }
        }
        debug!(
            "Classified inames: {} sequential, {} local, {} global",
            partition.sequential.len(),
            partition.local.len(),
            partition.global.len()
        );
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(local: &[(&str, u32)], global: &[(&str, u32)]) -> ConcurrencyPartition {
        ConcurrencyPartition {
            sequential: BTreeSet::new(),
            local: local.iter().map(|(n, k)| (n.to_string(), *k)).collect(),
            global: global.iter().map(|(n, k)| (n.to_string(), *k)).collect(),
        }
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!("l.0".parse::<IndexTag>().unwrap(), IndexTag::Local(0));
        assert_eq!("g.2".parse::<IndexTag>().unwrap(), IndexTag::Group(2));
        assert!("x.0".parse::<IndexTag>().is_err());
        assert!("l".parse::<IndexTag>().is_err());
        assert!("l.-1".parse::<IndexTag>().is_err());
    }

    #[test]
    fn test_tags_serialize_as_strings() {
        let tags: Vec<IndexTag> = serde_json::from_str(r#"["l.1", "g.0"]"#).unwrap();
        assert_eq!(tags, vec![IndexTag::Local(1), IndexTag::Group(0)]);
        assert_eq!(serde_json::to_string(&tags).unwrap(), r#"["l.1","g.0"]"#);
    }

    #[test]
    fn test_classify_iname() {
        assert_eq!(
            ConcurrencyClassifier::classify_iname("i", &[]).unwrap(),
            ConcurrencyClass::Sequential
        );
        assert_eq!(
            ConcurrencyClassifier::classify_iname("i", &[IndexTag::Local(1), IndexTag::Local(1)])
                .unwrap(),
            ConcurrencyClass::LocalParallel(1)
        );
    }

    #[test]
    fn test_conflicting_tags_rejected() {
        let err =
            ConcurrencyClassifier::classify_iname("i", &[IndexTag::Local(0), IndexTag::Group(0)]);
        assert!(matches!(
            err,
            Err(CheckerError::InvalidConcurrencyTag { ref iname, .. }) if iname == "i"
        ));
        let err =
            ConcurrencyClassifier::classify_iname("j", &[IndexTag::Local(0), IndexTag::Local(1)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_hw_var_names_are_sorted_by_axis() {
        let p = partition(&[("j", 1), ("jj", 0)], &[("i", 0)]);
        assert_eq!(
            p.hw_var_names(),
            vec![
                "_lp_linchk_lid0".to_string(),
                "_lp_linchk_lid1".to_string(),
                "_lp_linchk_gid0".to_string()
            ]
        );
        assert_eq!(p.hw_var_for("jj").as_deref(), Some("_lp_linchk_lid0"));
        assert_eq!(p.hw_var_for("k"), None);
    }

    #[test]
    fn test_shared_axis_in_one_statement_rejected() {
        let p = partition(&[("a", 0), ("b", 0)], &[]);
        let inames = vec!["a".to_string(), "b".to_string()];
        assert!(p.check_statement_axes("s", &inames).is_err());
        assert!(p.check_statement_axes("s", &inames[..1]).is_ok());
    }
}
