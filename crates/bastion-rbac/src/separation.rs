//! Static and dynamic separation of duty.
//!
//! An SD set limits how many of its member roles one user may hold at once:
//! at most `cardinality - 1`. Static sets (SSD) count direct assignments.
//! Dynamic sets (DSD) count the session's authorized-role closure, so a
//! member inherited through the hierarchy counts as if it were active.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use bastion_hierarchy::Snapshot;
use bastion_types::{AccessError, Result, RoleName, SdKind, SdSet, User, UserId};
use tracing::debug;

// ============================================================================
// Cardinality checks
// ============================================================================

/// Checks that assigning `candidate` keeps `user` within every SSD set.
pub fn check_assignment<'a, I>(
    user: &UserId,
    candidate: &RoleName,
    assigned: &[RoleName],
    ssd_sets: I,
) -> Result<()>
where
    I: IntoIterator<Item = &'a SdSet>,
{
    let mut held: BTreeSet<&RoleName> = assigned.iter().collect();
    held.insert(candidate);

    for set in ssd_sets {
        if set.kind != SdKind::Ssd || !set.contains(candidate) {
            continue;
        }
        let count = held.iter().filter(|role| set.contains(role)).count();
        if count >= set.cardinality {
            debug!(user = %user, role = %candidate, set = %set.name, count, "SSD violation");
            return Err(AccessError::SsdCardinalityViolation {
                set: set.name.clone(),
                role: candidate.clone(),
                cardinality: set.cardinality,
            });
        }
    }
    Ok(())
}

/// Checks that activating `candidate` keeps the session within every DSD set.
///
/// Both the active roles and the candidate are expanded to their
/// authorized-role closure in `hierarchy` before counting.
pub fn check_activation<'a, I>(
    user: &UserId,
    candidate: &RoleName,
    active: &[RoleName],
    dsd_sets: I,
    hierarchy: &Snapshot<RoleName>,
) -> Result<()>
where
    I: IntoIterator<Item = &'a SdSet>,
{
    let candidate_closure = hierarchy.closure([candidate]);
    let closure = hierarchy.closure(active.iter().chain([candidate]));

    for set in dsd_sets {
        if set.kind != SdKind::Dsd || !candidate_closure.iter().any(|r| set.contains(r)) {
            continue;
        }
        let count = closure.iter().filter(|role| set.contains(role)).count();
        if count >= set.cardinality {
            debug!(user = %user, role = %candidate, set = %set.name, count, "DSD violation");
            return Err(AccessError::DsdCardinalityViolation {
                set: set.name.clone(),
                role: candidate.clone(),
                cardinality: set.cardinality,
            });
        }
    }
    Ok(())
}

/// Checks that no existing user already breaks a (new or tightened) SSD set.
pub fn check_existing_assignments<'a, I>(set: &SdSet, users: I) -> Result<()>
where
    I: IntoIterator<Item = &'a User>,
{
    if set.kind != SdKind::Ssd {
        return Ok(());
    }
    for user in users {
        let count = user
            .role_names()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|role| set.contains(role))
            .count();
        if count >= set.cardinality {
            return Err(AccessError::ValidationFailed(format!(
                "user {} holds {count} roles of SSD set {} (cardinality {})",
                user.user_id, set.name, set.cardinality
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Catalog
// ============================================================================

/// Immutable view of every SD set.
#[derive(Debug, Clone, Default)]
pub struct SdSnapshot {
    sets: BTreeMap<String, SdSet>,
}

impl SdSnapshot {
    pub fn get(&self, name: &str) -> Option<&SdSet> {
        self.sets.get(name)
    }

    pub fn of_kind(&self, kind: SdKind) -> impl Iterator<Item = &SdSet> {
        self.sets.values().filter(move |set| set.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// SD sets published through atomic snapshot swaps.
#[derive(Debug, Default)]
pub struct SdCatalog {
    current: ArcSwap<SdSnapshot>,
    writer: Mutex<()>,
}

impl SdCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from stored sets, validating each one.
    pub fn from_sets<I>(sets: I) -> Result<Self>
    where
        I: IntoIterator<Item = SdSet>,
    {
        let mut snapshot = SdSnapshot::default();
        for set in sets {
            set.validate()?;
            snapshot.sets.insert(set.name.clone(), set);
        }
        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            writer: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<SdSnapshot> {
        self.current.load_full()
    }

    pub fn get(&self, name: &str) -> Option<SdSet> {
        self.current.load().get(name).cloned()
    }

    /// Inserts or replaces `set`.
    ///
    /// `guard` runs under the writer lock after structural validation; it is
    /// where callers re-check existing assignments and persist the set. The
    /// new snapshot is published only if it succeeds.
    pub fn upsert_with<F>(&self, set: SdSet, guard: F) -> Result<()>
    where
        F: FnOnce(&SdSet) -> Result<()>,
    {
        set.validate()?;
        let _lock = self.lock_writer();
        guard(&set)?;
        let mut next = SdSnapshot::clone(&self.current.load());
        debug!(set = %set.name, kind = %set.kind, cardinality = set.cardinality, "SD set published");
        next.sets.insert(set.name.clone(), set);
        self.current.store(Arc::new(next));
        Ok(())
    }

    /// Applies `edit` to a copy of the named set, then upserts it.
    pub fn modify_with<E, F>(&self, name: &str, edit: E, guard: F) -> Result<SdSet>
    where
        E: FnOnce(&mut SdSet),
        F: FnOnce(&SdSet) -> Result<()>,
    {
        let mut set = self
            .get(name)
            .ok_or_else(|| AccessError::not_found("SD set", name))?;
        edit(&mut set);
        self.upsert_with(set.clone(), guard)?;
        Ok(set)
    }

    pub fn remove_with<F>(&self, name: &str, persist: F) -> Result<SdSet>
    where
        F: FnOnce() -> Result<()>,
    {
        let _lock = self.lock_writer();
        let current = self.current.load_full();
        let Some(removed) = current.get(name).cloned() else {
            return Err(AccessError::not_found("SD set", name));
        };
        persist()?;
        let mut next = SdSnapshot::clone(&current);
        next.sets.remove(name);
        self.current.store(Arc::new(next));
        debug!(set = %name, "SD set removed");
        Ok(removed)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_hierarchy::HierarchyGraph;
    use bastion_types::{GraphKind, UserRole};
    use proptest::prelude::*;

    fn r(name: &str) -> RoleName {
        RoleName::new(name)
    }

    fn set(name: &str, kind: SdKind, members: &[&str], cardinality: usize) -> SdSet {
        SdSet::new(name, kind, members.iter().map(|m| r(m)), cardinality)
    }

    fn user() -> UserId {
        UserId::new("jdoe")
    }

    #[test]
    fn ssd_allows_up_to_cardinality_minus_one() {
        let ssd = [set("abc", SdKind::Ssd, &["A", "B", "C"], 2)];

        assert!(check_assignment(&user(), &r("A"), &[], &ssd).is_ok());
        assert!(matches!(
            check_assignment(&user(), &r("B"), &[r("A")], &ssd),
            Err(AccessError::SsdCardinalityViolation { .. })
        ));
    }

    #[test]
    fn ssd_cardinality_three_allows_two() {
        let ssd = [set("abc", SdKind::Ssd, &["A", "B", "C"], 3)];

        assert!(check_assignment(&user(), &r("B"), &[r("A")], &ssd).is_ok());
        assert!(matches!(
            check_assignment(&user(), &r("C"), &[r("A"), r("B")], &ssd),
            Err(AccessError::SsdCardinalityViolation { .. })
        ));
    }

    #[test]
    fn ssd_ignores_sets_without_candidate() {
        let ssd = [set("ab", SdKind::Ssd, &["A", "B"], 2)];
        // Already over the limit, but the candidate is not a member.
        assert!(check_assignment(&user(), &r("Z"), &[r("A"), r("B")], &ssd).is_ok());
    }

    #[test]
    fn ssd_ignores_dsd_sets() {
        let sets = [set("ab", SdKind::Dsd, &["A", "B"], 2)];
        assert!(check_assignment(&user(), &r("B"), &[r("A")], &sets).is_ok());
    }

    #[test]
    fn dsd_counts_inherited_roles() {
        // senior inherits "A": activating senior alongside "B" conflicts.
        let graph = HierarchyGraph::new(GraphKind::Role);
        graph.add_edge(&r("A"), &r("senior")).unwrap();
        let dsd = [set("ab", SdKind::Dsd, &["A", "B"], 2)];

        let result = check_activation(&user(), &r("senior"), &[r("B")], &dsd, &graph.snapshot());

        assert!(matches!(
            result,
            Err(AccessError::DsdCardinalityViolation { .. })
        ));
    }

    #[test]
    fn dsd_allows_unrelated_roles() {
        let graph = HierarchyGraph::new(GraphKind::Role);
        let dsd = [set("ab", SdKind::Dsd, &["A", "B"], 2)];

        assert!(check_activation(&user(), &r("C"), &[r("A")], &dsd, &graph.snapshot()).is_ok());
        assert!(check_activation(&user(), &r("A"), &[], &dsd, &graph.snapshot()).is_ok());
    }

    #[test]
    fn existing_assignments_block_tightening() {
        let mut holder = User::new("jdoe", "ou");
        holder.roles.push(UserRole::new("jdoe", "A"));
        holder.roles.push(UserRole::new("jdoe", "B"));

        let loose = set("abc", SdKind::Ssd, &["A", "B", "C"], 3);
        let tight = set("abc", SdKind::Ssd, &["A", "B", "C"], 2);

        assert!(check_existing_assignments(&loose, [&holder]).is_ok());
        assert!(matches!(
            check_existing_assignments(&tight, [&holder]),
            Err(AccessError::ValidationFailed(_))
        ));
    }

    #[test]
    fn catalog_rejects_invalid_sets_and_failed_guards() {
        let catalog = SdCatalog::new();

        assert!(catalog
            .upsert_with(set("bad", SdKind::Ssd, &["A"], 2), |_| Ok(()))
            .is_err());
        assert!(catalog
            .upsert_with(set("ab", SdKind::Ssd, &["A", "B"], 2), |_| {
                Err(AccessError::ValidationFailed("held".into()))
            })
            .is_err());
        assert!(catalog.snapshot().is_empty());

        catalog
            .upsert_with(set("ab", SdKind::Ssd, &["A", "B"], 2), |_| Ok(()))
            .unwrap();
        assert_eq!(catalog.snapshot().of_kind(SdKind::Ssd).count(), 1);
        assert_eq!(catalog.snapshot().of_kind(SdKind::Dsd).count(), 0);
    }

    #[test]
    fn catalog_modify_and_remove() {
        let catalog =
            SdCatalog::from_sets([set("ab", SdKind::Dsd, &["A", "B"], 2)]).unwrap();

        let updated = catalog
            .modify_with("ab", |s| { s.members.insert(r("C")); }, |_| Ok(()))
            .unwrap();
        assert_eq!(updated.members.len(), 3);

        catalog.remove_with("ab", || Ok(())).unwrap();
        assert!(catalog.get("ab").is_none());
        assert!(matches!(
            catalog.remove_with("ab", || Ok(())),
            Err(AccessError::NotFound { .. })
        ));
    }

    proptest! {
        #[test]
        fn ssd_never_admits_cardinality_members(
            members in 2usize..6,
            cardinality in 2usize..6,
            picks in prop::collection::vec(0usize..6, 0..10),
        ) {
            prop_assume!(cardinality <= members);
            let names: Vec<RoleName> = (0..members).map(|i| RoleName::new(format!("R{i}"))).collect();
            let ssd = [SdSet::new("s", SdKind::Ssd, names.clone(), cardinality)];

            let mut assigned: Vec<RoleName> = Vec::new();
            for pick in picks {
                let candidate = RoleName::new(format!("R{pick}"));
                if assigned.contains(&candidate) {
                    continue;
                }
                if check_assignment(&user(), &candidate, &assigned, &ssd).is_ok() {
                    assigned.push(candidate);
                }
            }

            let held = assigned.iter().filter(|r| names.contains(r)).count();
            prop_assert!(held < cardinality);
        }
    }
}
