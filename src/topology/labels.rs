//! File-native labeled sets.
//!
//! Labels group kernel handles under a name, the way a mesh file declares
//! material blocks, element sets, side sets and node sets. The naming
//! convention is `<family>_<label>`:
//!
//! | family    | holds                    |
//! |-----------|--------------------------|
//! | `matset`  | cells of a material block |
//! | `elemset` | cells of an element set  |
//! | `sideset` | faces                    |
//! | `nodeset` | nodes                    |

use std::collections::{BTreeMap, HashSet};

use crate::topology::entity::MType;
use crate::topology::point::PointId;

/// Name of the material-block set carrying `label`.
pub fn matset_name(label: &str) -> String {
    format!("matset_{label}")
}

/// Name of the element set carrying `label`.
pub fn elemset_name(label: &str) -> String {
    format!("elemset_{label}")
}

/// Name of the side set carrying `label`.
pub fn sideset_name(label: &str) -> String {
    format!("sideset_{label}")
}

/// Name of the node set carrying `label`.
pub fn nodeset_name(label: &str) -> String {
    format!("nodeset_{label}")
}

/// One named set of kernel entities of a single dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabeledEntitySet {
    pub mtype: MType,
    members: Vec<PointId>,
    present: HashSet<PointId>,
}

impl LabeledEntitySet {
    fn new(mtype: MType) -> Self {
        Self {
            mtype,
            members: Vec::new(),
            present: HashSet::new(),
        }
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[PointId] {
        &self.members
    }

    pub fn contains(&self, point: PointId) -> bool {
        self.present.contains(&point)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Named labeled sets of a kernel.
#[derive(Clone, Debug, Default)]
pub struct LabelSet {
    sets: BTreeMap<String, LabeledEntitySet>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an (initially empty) set. Existing sets are left alone.
    pub fn declare(&mut self, name: &str, mtype: MType) {
        self.sets
            .entry(name.to_string())
            .or_insert_with(|| LabeledEntitySet::new(mtype));
    }

    /// Adds `point` to set `name`, declaring the set when needed.
    ///
    /// Returns `false` when the point was already a member.
    pub fn add(&mut self, name: &str, mtype: MType, point: PointId) -> bool {
        let set = self
            .sets
            .entry(name.to_string())
            .or_insert_with(|| LabeledEntitySet::new(mtype));
        if !set.present.insert(point) {
            return false;
        }
        set.members.push(point);
        true
    }

    pub fn get(&self, name: &str) -> Option<&LabeledEntitySet> {
        self.sets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    /// Set names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabeledEntitySet)> {
        self.sets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Drops members of dimension `mtype` for which `keep` is false.
    ///
    /// Returns the number of removed memberships.
    pub fn retain(&mut self, mtype: MType, mut keep: impl FnMut(PointId) -> bool) -> usize {
        let mut removed = 0;
        for set in self.sets.values_mut().filter(|s| s.mtype == mtype) {
            let before = set.members.len();
            set.members.retain(|&p| keep(p));
            if set.members.len() != before {
                removed += before - set.members.len();
                set.present = set.members.iter().copied().collect();
            }
        }
        removed
    }

    /// Rewrites members of dimension `mtype` through `map`; unmapped members are dropped.
    pub fn remap(&mut self, mtype: MType, mut map: impl FnMut(PointId) -> Option<PointId>) {
        for set in self.sets.values_mut().filter(|s| s.mtype == mtype) {
            let old = std::mem::take(&mut set.members);
            set.present.clear();
            for p in old.into_iter().filter_map(&mut map) {
                if set.present.insert(p) {
                    set.members.push(p);
                }
            }
        }
    }
}
