//! Shared fixture for the facade integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bastion::{
    Bastion, BastionConfig, FixedClock, MemoryAuthenticator, OrgUnit, OrgUnitKind, Role,
    RoleName, User,
};
use chrono::{NaiveDate, NaiveDateTime};

/// Monday 2024-06-03 12:00.
pub fn monday_noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn r(name: &str) -> RoleName {
    RoleName::new(name)
}

pub struct Fixture {
    pub bastion: Bastion,
    pub clock: Arc<FixedClock>,
    pub auth: Arc<MemoryAuthenticator>,
}

impl Fixture {
    /// An empty instance with a fixed clock and in-memory authenticator.
    pub fn empty() -> Self {
        Self::with_config(BastionConfig::testing())
    }

    pub fn with_config(config: BastionConfig) -> Self {
        let clock = Arc::new(FixedClock::new(monday_noon()));
        let auth = Arc::new(MemoryAuthenticator::new());
        let bastion = Bastion::builder(config)
            .with_clock(clock.clone())
            .with_authenticator(auth.clone())
            .build()
            .unwrap();
        Self {
            bastion,
            clock,
            auth,
        }
    }

    /// Org units `corp > sales > sales-east`, `corp > hr` and `apps > payroll`,
    /// the chain `Role6 > Role5 > ... > Role1` (each role inherits from the
    /// one above), and users alice (sales-east) and bob (hr).
    pub fn seeded() -> Self {
        Self::seeded_with(BastionConfig::testing())
    }

    pub fn seeded_with(config: BastionConfig) -> Self {
        let fx = Self::with_config(config);
        let admin = fx.bastion.admin();

        for ou in ["corp", "sales", "sales-east", "hr"] {
            admin.add_org_unit(OrgUnit::new(ou, OrgUnitKind::User)).unwrap();
        }
        for ou in ["apps", "payroll"] {
            admin.add_org_unit(OrgUnit::new(ou, OrgUnitKind::Perm)).unwrap();
        }
        admin
            .add_ou_inheritance(OrgUnitKind::User, &"corp".into(), &"sales".into())
            .unwrap();
        admin
            .add_ou_inheritance(OrgUnitKind::User, &"sales".into(), &"sales-east".into())
            .unwrap();
        admin
            .add_ou_inheritance(OrgUnitKind::User, &"corp".into(), &"hr".into())
            .unwrap();
        admin
            .add_ou_inheritance(OrgUnitKind::Perm, &"apps".into(), &"payroll".into())
            .unwrap();

        for i in 1..=6 {
            admin.add_role(Role::new(format!("Role{i}"))).unwrap();
        }
        for i in 1..6 {
            admin
                .add_inheritance(&r(&format!("Role{}", i + 1)), &r(&format!("Role{i}")))
                .unwrap();
        }

        admin.add_user(User::new("alice", "sales-east")).unwrap();
        admin.add_user(User::new("bob", "hr")).unwrap();
        fx
    }
}
