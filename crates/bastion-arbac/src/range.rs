//! Admin-role ranges and org-unit pools.

use std::collections::{BTreeMap, BTreeSet};

use bastion_hierarchy::Snapshot;
use bastion_types::{AccessError, AdminRole, OrgUnitName, Result, RoleName};

/// Roles an admin role may administer.
///
/// The range runs from `begin_range` up the hierarchy to `end_range`: every
/// role that is an ascendant of `begin_range` and a descendant of
/// `end_range`, plus each endpoint whose inclusive flag is set. An admin role
/// without a range administers nothing. Equal endpoints name a single role.
///
/// # Errors
///
/// [`AccessError::InvalidRange`] if `end_range` is not an ascendant of
/// `begin_range`.
pub fn authorized_range(
    admin_role: &AdminRole,
    roles: &Snapshot<RoleName>,
) -> Result<BTreeSet<RoleName>> {
    let Some((begin, end)) = admin_role.range() else {
        return Ok(BTreeSet::new());
    };

    if begin == end {
        return Ok(BTreeSet::from([begin.clone()]));
    }

    if !roles.is_ascendant(end, begin) {
        return Err(AccessError::InvalidRange {
            admin_role: admin_role.name.clone(),
            begin: begin.clone(),
            end: end.clone(),
        });
    }

    let below_end = roles.descendants(end);
    let mut range: BTreeSet<RoleName> = roles
        .ascendants(begin)
        .into_iter()
        .filter(|role| below_end.contains(role))
        .collect();

    if admin_role.begin_inclusive {
        range.insert(begin.clone());
    }
    if admin_role.end_inclusive {
        range.insert(end.clone());
    }
    Ok(range)
}

/// True if `ou`, or an org unit enclosing it, is in `pool`.
pub fn in_pool(ou: &OrgUnitName, pool: &BTreeSet<OrgUnitName>, ous: &Snapshot<OrgUnitName>) -> bool {
    pool.contains(ou) || ous.ascendants(ou).iter().any(|enclosing| pool.contains(enclosing))
}

/// Memoizes ranges for one decision, since several predicates may ask about
/// the same admin role.
#[derive(Debug, Default)]
pub(crate) struct RangeCache {
    ranges: BTreeMap<RoleName, BTreeSet<RoleName>>,
}

impl RangeCache {
    pub(crate) fn get(
        &mut self,
        admin_role: &AdminRole,
        roles: &Snapshot<RoleName>,
    ) -> Result<&BTreeSet<RoleName>> {
        if !self.ranges.contains_key(&admin_role.name) {
            let range = authorized_range(admin_role, roles)?;
            self.ranges.insert(admin_role.name.clone(), range);
        }
        self.ranges
            .get(&admin_role.name)
            .ok_or_else(|| AccessError::not_found("admin role range", &admin_role.name))
    }
}
