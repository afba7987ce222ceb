//! Unit tests for bastion-directory

use std::collections::BTreeSet;

use bastion_types::{
    AccessError, AdminRole, GraphKind, OrgUnit, OrgUnitKind, PasswordFailure, Permission,
    PermissionKey, Role, RoleName, SdKind, SdSet, User, UserId, UserRole,
};
use test_case::test_case;

use crate::{
    Authenticator, BindOutcome, ChangeJournal, DirectoryChange, DirectoryError, DirectoryStore,
    MemoryAuthenticator, MemoryDirectory,
};

fn seeded() -> MemoryDirectory {
    let directory = MemoryDirectory::new();
    directory.store_role(Role::new("teller")).unwrap();
    directory.store_role(Role::new("auditor")).unwrap();
    directory.store_user(User::new("jdoe", "branch-1")).unwrap();
    directory.store_user(User::new("asmith", "branch-2")).unwrap();
    directory
        .store_user_role(UserRole::new("jdoe", "teller"))
        .unwrap();
    directory
}

// ============================================================================
// MemoryDirectory Tests
// ============================================================================

#[test]
fn loads_user_with_assignments() {
    let directory = seeded();
    let user = directory.load_user(&UserId::new("jdoe")).unwrap();

    assert_eq!(user.ou.as_str(), "branch-1");
    assert_eq!(user.roles.len(), 1);
    assert!(user.assigned_role(&RoleName::new("teller")).is_some());
}

#[test]
fn missing_entities_are_not_found() {
    let directory = seeded();

    let result = directory.load_role(&RoleName::new("ghost"));

    assert!(matches!(
        result,
        Err(DirectoryError::NotFound { entity: "role", .. })
    ));
    let access: AccessError = result.unwrap_err().into();
    assert!(matches!(access, AccessError::NotFound { entity: "role", .. }));
}

#[test]
fn role_lookup_ignores_case() {
    let directory = seeded();
    assert!(directory.load_role(&RoleName::new("TELLER")).is_ok());
}

#[test]
fn store_user_keeps_existing_assignments() {
    let directory = seeded();

    directory.store_user(User::new("jdoe", "branch-9")).unwrap();

    let user = directory.load_user(&UserId::new("jdoe")).unwrap();
    assert_eq!(user.ou.as_str(), "branch-9");
    assert_eq!(user.roles.len(), 1);
}

#[test]
fn assignment_to_unknown_user_fails() {
    let directory = seeded();
    let result = directory.store_user_role(UserRole::new("nobody", "teller"));
    assert!(matches!(result, Err(DirectoryError::NotFound { entity: "user", .. })));
}

#[test]
fn removing_assignment_twice_fails() {
    let directory = seeded();
    let jdoe = UserId::new("jdoe");
    let teller = RoleName::new("teller");

    directory.remove_user_role(&jdoe, &teller).unwrap();

    assert!(directory.remove_user_role(&jdoe, &teller).is_err());
    assert!(directory.assigned_users(&teller).unwrap().is_empty());
}

#[test]
fn assigned_users_lists_direct_holders() {
    let directory = seeded();
    directory
        .store_user_role(UserRole::new("asmith", "teller"))
        .unwrap();

    let users = directory.assigned_users(&RoleName::new("teller")).unwrap();

    assert_eq!(users.len(), 2);
    assert!(users.contains(&UserId::new("asmith")));
}

#[test]
fn sd_sets_filter_by_kind() {
    let directory = seeded();
    let members = || [RoleName::new("teller"), RoleName::new("auditor")];
    directory
        .store_sd_set(SdSet::new("ssd-1", SdKind::Ssd, members(), 2))
        .unwrap();
    directory
        .store_sd_set(SdSet::new("dsd-1", SdKind::Dsd, members(), 2))
        .unwrap();

    let ssd = directory.load_sd_sets(SdKind::Ssd).unwrap();

    assert_eq!(ssd.len(), 1);
    assert_eq!(ssd[0].name, "ssd-1");
}

#[test]
fn hierarchy_edges_are_per_graph() {
    let directory = seeded();
    directory
        .store_hierarchy_edge(GraphKind::Role, "teller", "auditor")
        .unwrap();
    directory
        .store_hierarchy_edge(GraphKind::UserOrgUnit, "hq", "branch-1")
        .unwrap();

    assert_eq!(directory.load_hierarchy_edges(GraphKind::Role).unwrap().len(), 1);
    assert!(directory.load_hierarchy_edges(GraphKind::AdminRole).unwrap().is_empty());

    directory
        .remove_hierarchy_edge(GraphKind::Role, "TELLER", "Auditor")
        .unwrap();
    assert!(directory.load_hierarchy_edges(GraphKind::Role).unwrap().is_empty());
    assert!(directory
        .remove_hierarchy_edge(GraphKind::UserOrgUnit, "HQ", "branch-1")
        .is_err());
}

#[test]
fn finds_permissions_by_role_or_user() {
    let directory = seeded();
    directory
        .store_permission(Permission::new("account", "read").granted_to_role("teller"))
        .unwrap();
    directory
        .store_permission(Permission::new("account", "close").granted_to_user("jdoe"))
        .unwrap();
    directory
        .store_permission(Permission::new("ledger", "audit").granted_to_role("auditor"))
        .unwrap();

    let roles: BTreeSet<RoleName> = [RoleName::new("teller")].into_iter().collect();
    let found = directory
        .find_permissions(&roles, &UserId::new("jdoe"))
        .unwrap();

    let keys: BTreeSet<PermissionKey> = found.iter().map(Permission::key).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&PermissionKey::new("account", "close")));
}

#[test]
fn role_permissions_match_grant_lists_only() {
    let directory = seeded();
    directory
        .store_permission(Permission::new("account", "read").granted_to_role("Teller"))
        .unwrap();
    directory
        .store_permission(Permission::new("account", "close").granted_to_user("teller"))
        .unwrap();
    directory
        .store_admin_permission(Permission::new("role", "assign").granted_to_role("teller"))
        .unwrap();

    let found = directory.role_permissions(&RoleName::new("teller")).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].key(), PermissionKey::new("account", "read"));

    let admin = directory
        .admin_role_permissions(&RoleName::new("teller"))
        .unwrap();
    assert_eq!(admin.len(), 1);
}

#[test]
fn org_units_are_separated_by_kind() {
    let directory = seeded();
    directory
        .store_org_unit(OrgUnit::new("finance", OrgUnitKind::Perm))
        .unwrap();

    assert!(directory
        .load_org_unit(OrgUnitKind::Perm, &"finance".into())
        .is_ok());
    assert!(directory
        .load_org_unit(OrgUnitKind::User, &"finance".into())
        .is_err());
}

// ============================================================================
// Journal Tests
// ============================================================================

#[test]
fn journaled_directory_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("directory.jsonl");

    {
        let directory = MemoryDirectory::open(&path).unwrap();
        directory.store_role(Role::new("teller")).unwrap();
        directory
            .store_admin_role(AdminRole::new("branch-admin").with_range("teller", true, "teller", true))
            .unwrap();
        directory.store_user(User::new("jdoe", "branch-1")).unwrap();
        directory
            .store_user_role(UserRole::new("jdoe", "teller"))
            .unwrap();
    }

    let reopened = MemoryDirectory::open(&path).unwrap();
    let user = reopened.load_user(&UserId::new("jdoe")).unwrap();
    assert_eq!(user.roles.len(), 1);
    assert!(reopened.load_admin_role(&RoleName::new("branch-admin")).is_ok());
}

#[test]
fn rejected_change_is_not_journaled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("directory.jsonl");

    let directory = MemoryDirectory::open(&path).unwrap();
    assert!(directory.remove_role(&RoleName::new("ghost")).is_err());

    let journal = ChangeJournal::open(&path).unwrap();
    assert!(journal.replay().unwrap().is_empty());
}

#[test]
fn rejected_writes_leave_state_and_journal_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("directory.jsonl");
    let jdoe = UserId::new("jdoe");
    let teller = RoleName::new("teller");

    let directory = MemoryDirectory::open(&path).unwrap();
    directory.store_role(Role::new("teller")).unwrap();
    directory.store_user(User::new("jdoe", "branch-1")).unwrap();
    directory
        .store_user_role(UserRole::new("jdoe", "teller"))
        .unwrap();

    let rejected = [
        directory.remove_user_role(&jdoe, &RoleName::new("auditor")),
        directory.remove_user_admin_role(&jdoe, &teller),
        directory.store_user_role(UserRole::new("nobody", "teller")),
        directory.remove_hierarchy_edge(GraphKind::Role, "teller", "auditor"),
        directory.remove_org_unit(OrgUnitKind::Perm, &"apps".into()),
        directory.remove_sd_set("ghost"),
        directory.remove_permission(&PermissionKey::new("till", "open")),
    ];

    for result in rejected {
        assert!(matches!(result, Err(DirectoryError::NotFound { .. })));
    }
    assert_eq!(directory.load_user(&jdoe).unwrap().roles.len(), 1);
    let journal = ChangeJournal::open(&path).unwrap();
    assert_eq!(journal.replay().unwrap().len(), 3);
}

#[test]
fn journal_sequence_continues_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");

    {
        let mut journal = ChangeJournal::open(&path).unwrap();
        assert_eq!(journal.append(&DirectoryChange::StoreRole(Role::new("a"))).unwrap(), 0);
        assert_eq!(journal.append(&DirectoryChange::StoreRole(Role::new("b"))).unwrap(), 1);
    }

    let mut journal = ChangeJournal::open(&path).unwrap();
    assert_eq!(journal.append(&DirectoryChange::RemoveRole("a".into())).unwrap(), 2);
    assert_eq!(journal.replay().unwrap().len(), 3);
}

// ============================================================================
// Authenticator Tests
// ============================================================================

#[test]
fn bind_succeeds_with_correct_password() {
    let auth = MemoryAuthenticator::new().with_password("jdoe", "s3cret");
    let result = auth.bind(&UserId::new("jdoe"), "s3cret").unwrap();
    assert_eq!(result.outcome, BindOutcome::Success);
    assert!(result.check().is_ok());
}

#[test_case("wrong", BindOutcome::InvalidCredentials; "wrong password")]
#[test_case("", BindOutcome::InvalidCredentials; "empty password")]
fn bind_rejects_bad_passwords(password: &str, expected: BindOutcome) {
    let auth = MemoryAuthenticator::new().with_password("jdoe", "s3cret");
    let result = auth.bind(&UserId::new("jdoe"), password).unwrap();
    assert_eq!(result.outcome, expected);
}

#[test]
fn unknown_user_is_invalid() {
    let auth = MemoryAuthenticator::new();
    let result = auth.bind(&UserId::new("ghost"), "x").unwrap();
    assert_eq!(result.check(), Err(PasswordFailure::Invalid));
}

#[test]
fn locked_and_must_change_are_reported() {
    let auth = MemoryAuthenticator::new()
        .with_password("jdoe", "pw")
        .with_password("asmith", "pw");
    auth.lock(&UserId::new("jdoe"));
    auth.require_change(&UserId::new("asmith"));

    let locked = auth.bind(&UserId::new("jdoe"), "pw").unwrap();
    let change = auth.bind(&UserId::new("asmith"), "pw").unwrap();

    assert_eq!(locked.check(), Err(PasswordFailure::Locked));
    assert_eq!(change.check(), Err(PasswordFailure::MustChange));
}

#[test]
fn expired_password_consumes_grace_logins() {
    let auth = MemoryAuthenticator::new().with_password("jdoe", "pw");
    let jdoe = UserId::new("jdoe");
    auth.expire(&jdoe, 2);

    assert_eq!(auth.bind(&jdoe, "pw").unwrap().grace_logins, Some(1));
    assert_eq!(auth.bind(&jdoe, "pw").unwrap().grace_logins, Some(0));
    assert_eq!(
        auth.bind(&jdoe, "pw").unwrap().outcome,
        BindOutcome::Expired
    );
}

#[test]
fn expiry_warning_is_passed_through() {
    let auth = MemoryAuthenticator::new().with_password("jdoe", "pw");
    auth.warn_expiry(&UserId::new("jdoe"), 3600);

    let result = auth.bind(&UserId::new("jdoe"), "pw").unwrap();

    assert_eq!(result.outcome, BindOutcome::Success);
    assert_eq!(result.expiration_seconds, Some(3600));
}
