//! Administrative changes and review queries through the facade.

mod common;

use bastion::{
    AccessError, AdminRole, GraphKind, Permission, PermissionKey, Role, SdKind, SdSet, User,
    UserAdminRole, UserId, UserRole,
};
use common::{Fixture, r};

fn alice() -> UserId {
    UserId::new("alice")
}

// ============================================================================
// Entities
// ============================================================================

#[test]
fn duplicate_entities_are_refused() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();

    assert!(matches!(
        admin.add_role(Role::new("Role1")),
        Err(AccessError::AlreadyExists { entity: "role", .. })
    ));
    assert!(matches!(
        admin.add_user(User::new("alice", "hr")),
        Err(AccessError::AlreadyExists { entity: "user", .. })
    ));
    admin.assign_user(UserRole::new("alice", "Role2")).unwrap();
    assert!(matches!(
        admin.assign_user(UserRole::new("alice", "Role2")),
        Err(AccessError::AlreadyExists { .. })
    ));
}

#[test]
fn user_needs_an_existing_org_unit() {
    let fx = Fixture::seeded();

    let result = fx.bastion.admin().add_user(User::new("carol", "nowhere"));

    assert!(matches!(result, Err(AccessError::NotFound { .. })));
}

#[test]
fn deleting_a_user_strips_direct_grants() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin
        .add_permission(Permission::new("payslip", "read").granted_to_user("bob"))
        .unwrap();

    admin.delete_user(&UserId::new("bob")).unwrap();

    let users = fx
        .bastion
        .review()
        .permission_users(&PermissionKey::new("payslip", "read"))
        .unwrap();
    assert!(users.is_empty());
}

// ============================================================================
// Role hierarchy
// ============================================================================

#[test]
fn delete_role_refuses_linked_roles() {
    let fx = Fixture::seeded();

    let result = fx.bastion.admin().delete_role(&r("Role3"));

    assert!(matches!(
        result,
        Err(AccessError::NodeInUse { graph: GraphKind::Role, .. })
    ));
}

#[test]
fn delete_role_cascades_assignments_and_grants() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin.add_role(Role::new("auditor")).unwrap();
    admin.assign_user(UserRole::new("alice", "auditor")).unwrap();
    admin
        .add_permission(Permission::new("ledger", "read").granted_to_role("auditor"))
        .unwrap();

    admin.delete_role(&r("auditor")).unwrap();

    let review = fx.bastion.review();
    assert!(review.assigned_roles(&alice()).unwrap().is_empty());
    assert!(review
        .permission_roles(&PermissionKey::new("ledger", "read"))
        .unwrap()
        .is_empty());
}

#[test]
fn delete_role_refuses_sd_members() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin.add_role(Role::new("A")).unwrap();
    admin.add_role(Role::new("B")).unwrap();
    admin
        .create_sd_set(SdSet::new("ab", SdKind::Dsd, [r("A"), r("B")], 2))
        .unwrap();

    assert!(matches!(
        admin.delete_role(&r("A")),
        Err(AccessError::ValidationFailed(_))
    ));
}

#[test]
fn relinking_delete_preserves_inheritance() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin.assign_user(UserRole::new("alice", "Role1")).unwrap();

    admin.delete_role_relinking(&r("Role3")).unwrap();

    let roles = fx.bastion.review().authorized_roles(&alice()).unwrap();
    assert!(!roles.contains(&r("Role3")));
    assert!(roles.contains(&r("Role4")));
    assert_eq!(roles.len(), 5);
}

#[test]
fn cyclic_inheritance_leaves_graph_unchanged() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin.assign_user(UserRole::new("alice", "Role6")).unwrap();

    let result = admin.add_inheritance(&r("Role1"), &r("Role6"));

    assert!(matches!(result, Err(AccessError::CyclicRelationship { .. })));
    let roles = fx.bastion.review().authorized_roles(&alice()).unwrap();
    assert_eq!(roles.into_iter().collect::<Vec<_>>(), vec![r("Role6")]);
}

#[test]
fn descendant_and_ascendant_create_linked_roles() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();

    admin.add_descendant(&r("Role1"), Role::new("Role0")).unwrap();
    admin.add_ascendant(&r("Role6"), Role::new("Role7")).unwrap();
    admin.assign_user(UserRole::new("alice", "Role0")).unwrap();

    let roles = fx.bastion.review().authorized_roles(&alice()).unwrap();
    assert_eq!(roles.len(), 8);
    assert!(roles.contains(&r("Role7")));
}

#[test]
fn refused_descendant_is_not_created() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();

    let result = admin.add_descendant(&r("Role1"), Role::new("Role1"));

    assert!(matches!(result, Err(AccessError::AlreadyExists { .. })));
    assert!(fx.bastion.review().assigned_users(&r("Role1")).unwrap().is_empty());
}

// ============================================================================
// SD sets
// ============================================================================

#[test]
fn ssd_set_refused_when_a_user_already_breaks_it() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin.add_role(Role::new("A")).unwrap();
    admin.add_role(Role::new("B")).unwrap();
    admin.assign_user(UserRole::new("alice", "A")).unwrap();
    admin.assign_user(UserRole::new("alice", "B")).unwrap();

    let result = admin.create_sd_set(SdSet::new("ab", SdKind::Ssd, [r("A"), r("B")], 2));

    assert!(matches!(result, Err(AccessError::ValidationFailed(_))));
    assert!(fx.bastion.review().sd_set("ab").is_err());
}

#[test]
fn tightening_cardinality_is_checked_against_assignments() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    for role in ["A", "B", "C"] {
        admin.add_role(Role::new(role)).unwrap();
    }
    admin
        .create_sd_set(SdSet::new("abc", SdKind::Ssd, [r("A"), r("B"), r("C")], 3))
        .unwrap();
    admin.assign_user(UserRole::new("alice", "A")).unwrap();
    admin.assign_user(UserRole::new("alice", "B")).unwrap();

    let result = admin.set_sd_cardinality("abc", 2);

    assert!(matches!(result, Err(AccessError::ValidationFailed(_))));
    assert_eq!(fx.bastion.review().sd_set("abc").unwrap().cardinality, 3);
}

#[test]
fn sd_membership_changes() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    for role in ["A", "B", "C"] {
        admin.add_role(Role::new(role)).unwrap();
    }
    admin
        .create_sd_set(SdSet::new("ab", SdKind::Dsd, [r("A"), r("B")], 2))
        .unwrap();

    let set = admin.add_sd_member("ab", &r("C")).unwrap();
    assert_eq!(set.members.len(), 3);
    assert!(matches!(
        admin.add_sd_member("ab", &r("C")),
        Err(AccessError::AlreadyExists { .. })
    ));

    admin.remove_sd_member("ab", &r("C")).unwrap();
    assert!(matches!(
        admin.remove_sd_member("ab", &r("B")),
        Err(AccessError::ValidationFailed(_))
    ));
    assert_eq!(
        fx.bastion.review().sd_sets_with(SdKind::Dsd, &r("A")).len(),
        1
    );

    admin.delete_sd_set("ab").unwrap();
    assert!(fx.bastion.review().sd_sets_with(SdKind::Dsd, &r("A")).is_empty());
}

#[test]
fn sd_set_cardinality_below_two_is_refused() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin.add_role(Role::new("A")).unwrap();
    admin.add_role(Role::new("B")).unwrap();

    let result = admin.create_sd_set(SdSet::new("ab", SdKind::Ssd, [r("A"), r("B")], 1));

    assert!(matches!(result, Err(AccessError::ValidationFailed(_))));
}

// ============================================================================
// Admin roles
// ============================================================================

#[test]
fn admin_role_range_must_follow_hierarchy() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();

    let backwards = AdminRole::new("bad").with_range("Role5", true, "Role2", true);
    assert!(matches!(
        admin.add_admin_role(backwards),
        Err(AccessError::InvalidRange { .. })
    ));

    let half = AdminRole {
        end_range: None,
        ..AdminRole::new("half").with_range("Role2", true, "Role5", true)
    };
    assert!(matches!(
        admin.add_admin_role(half),
        Err(AccessError::ValidationFailed(_))
    ));

    let unknown_pool = AdminRole::new("pool").with_user_pool("nowhere");
    assert!(matches!(
        admin.add_admin_role(unknown_pool),
        Err(AccessError::NotFound { .. })
    ));
}

#[test]
fn delete_admin_role_cascades() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin.add_admin_role(AdminRole::new("ops")).unwrap();
    admin.assign_admin_user(UserAdminRole::new("bob", "ops")).unwrap();
    admin
        .add_admin_permission(Permission::new("user", "add").granted_to_role("ops"))
        .unwrap();

    admin.delete_admin_role(&r("ops")).unwrap();

    let review = fx.bastion.review();
    assert!(review.assigned_admin_roles(&UserId::new("bob")).unwrap().is_empty());
    assert!(matches!(
        review.assigned_admin_users(&r("ops")),
        Err(AccessError::NotFound { .. })
    ));
}

// ============================================================================
// Review
// ============================================================================

#[test]
fn review_queries_follow_the_hierarchy() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin.assign_user(UserRole::new("alice", "Role1")).unwrap();
    admin.assign_user(UserRole::new("bob", "Role4")).unwrap();
    admin
        .add_permission(Permission::new("payslip", "read").granted_to_role("Role5"))
        .unwrap();
    admin
        .add_permission(Permission::new("ledger", "read").granted_to_role("Role2"))
        .unwrap();

    let review = fx.bastion.review();
    assert_eq!(review.assigned_users(&r("Role4")).unwrap(), vec![UserId::new("bob")]);
    assert_eq!(review.authorized_users(&r("Role5")).unwrap().len(), 2);
    assert_eq!(review.authorized_users(&r("Role2")).unwrap().len(), 1);
    assert_eq!(review.role_permissions(&r("Role5")).unwrap().len(), 1);
    assert_eq!(review.user_permissions(&alice()).unwrap().len(), 2);
    assert_eq!(review.user_permissions(&UserId::new("bob")).unwrap().len(), 1);
}

#[test]
fn revoke_missing_grant_is_not_found() {
    let fx = Fixture::seeded();
    let admin = fx.bastion.admin();
    admin.add_permission(Permission::new("payslip", "read")).unwrap();

    let result = admin.revoke_permission(&PermissionKey::new("payslip", "read"), &r("Role1"));

    assert!(matches!(result, Err(AccessError::NotFound { entity: "grant", .. })));
}
