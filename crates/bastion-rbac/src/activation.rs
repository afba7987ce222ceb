//! Attribute filters applied when a role is activated.

use std::collections::BTreeMap;

use bastion_types::UserRole;

/// Decides whether an assignment's role constraints admit activation given
/// the session attributes.
///
/// Returning `Err(reason)` skips the role with an
/// [`ActivationRejected`](bastion_types::AccessError::ActivationRejected)
/// warning; it never fails the session as a whole.
pub trait ActivationFilter: Send + Sync {
    fn admit(
        &self,
        assignment: &UserRole,
        attributes: &BTreeMap<String, String>,
    ) -> Result<(), String>;
}

/// Requires every `key = value` role constraint to be present, verbatim, in
/// the session attributes. Assignments without role constraints always pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleConstraintFilter;

impl ActivationFilter for RoleConstraintFilter {
    fn admit(
        &self,
        assignment: &UserRole,
        attributes: &BTreeMap<String, String>,
    ) -> Result<(), String> {
        for rc in &assignment.role_constraints {
            match attributes.get(&rc.key) {
                Some(value) if *value == rc.value => {}
                Some(value) => {
                    return Err(format!(
                        "attribute {} is {value:?}, role requires {:?}",
                        rc.key, rc.value
                    ));
                }
                None => return Err(format!("attribute {} is missing", rc.key)),
            }
        }
        Ok(())
    }
}

/// Admits every assignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ActivationFilter for AllowAll {
    fn admit(&self, _: &UserRole, _: &BTreeMap<String, String>) -> Result<(), String> {
        Ok(())
    }
}
