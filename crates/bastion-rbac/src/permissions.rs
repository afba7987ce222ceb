//! Permission sets returned by session queries.

use bastion_types::{Permission, PermissionKey};
use serde::{Deserialize, Serialize};

/// Permissions keyed by `(object, operation)`.
///
/// Keeps first-seen order; granting an already present key merges its role
/// and user grants instead of duplicating the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: Vec<Permission>,
}

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Self {
        let mut set = Self::empty();
        for permission in permissions {
            set.grant(permission);
        }
        set
    }

    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &PermissionKey) -> Option<&Permission> {
        self.permissions
            .iter()
            .find(|p| p.object_name == key.object_name && p.operation_name == key.operation_name)
    }

    /// Adds a permission, merging grants if the key is already present.
    pub fn grant(&mut self, permission: Permission) {
        let key = permission.key();
        match self.permissions.iter_mut().find(|p| p.key() == key) {
            Some(existing) => {
                existing.roles.extend(permission.roles);
                existing.users.extend(permission.users);
            }
            None => self.permissions.push(permission),
        }
    }

    pub fn revoke(&mut self, key: &PermissionKey) {
        self.permissions.retain(|p| &p.key() != key);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = PermissionKey> + '_ {
        self.permissions.iter().map(Permission::key)
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn into_vec(self) -> Vec<Permission> {
        self.permissions
    }
}

impl From<Vec<Permission>> for PermissionSet {
    fn from(permissions: Vec<Permission>) -> Self {
        Self::new(permissions)
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = std::vec::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.permissions.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_set_operations() {
        let read = PermissionKey::new("ledger", "read");
        let mut set = PermissionSet::empty();
        assert!(!set.contains(&read));

        set.grant(Permission::new("ledger", "read").granted_to_role("teller"));
        assert!(set.contains(&read));

        set.grant(Permission::new("ledger", "read").granted_to_role("auditor"));
        assert_eq!(set.len(), 1); // Duplicate key merges
        assert_eq!(set.get(&read).map(|p| p.roles.len()), Some(2));

        set.grant(Permission::new("ledger", "write"));
        assert_eq!(set.len(), 2);

        set.revoke(&read);
        assert!(!set.contains(&read));
        assert!(set.contains(&PermissionKey::new("ledger", "write")));
    }

    #[test]
    fn test_permission_set_keeps_first_seen_order() {
        let set = PermissionSet::from(vec![
            Permission::new("b", "op"),
            Permission::new("a", "op"),
            Permission::new("b", "op"),
        ]);

        let keys: Vec<String> = set.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["b.op", "a.op"]);
    }
}
