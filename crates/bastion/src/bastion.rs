//! Main entry point.
//!
//! A [`Bastion`] owns the live hierarchies, the SD-set catalog and the
//! decision engines built over one directory. Handles returned by
//! [`Bastion::access`], [`Bastion::admin`], [`Bastion::delegated`] and
//! [`Bastion::review`] share that state and are cheap to clone.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use bastion_arbac::DelegatedAuthorizer;
use bastion_config::{BastionConfig, ConfigLoader};
use bastion_directory::{Authenticator, DirectoryStore, MemoryAuthenticator, MemoryDirectory};
use bastion_hierarchy::{HierarchyGraph, NodeName};
use bastion_rbac::{
    ActivationFilter, Clock, RoleConstraintFilter, SdCatalog, SessionEngine, SessionPolicy,
    SystemClock,
};
use bastion_types::{AccessError, GraphKind, OrgUnitKind, OrgUnitName, RoleName, SdKind};
use tracing::info;

use crate::access::AccessManager;
use crate::admin::AdminManager;
use crate::delegated::DelegatedManager;
use crate::error::Result;
use crate::review::ReviewManager;

/// Internal state shared across handles.
pub(crate) struct BastionInner {
    pub(crate) config: BastionConfig,
    pub(crate) directory: Arc<dyn DirectoryStore>,
    pub(crate) roles: Arc<HierarchyGraph<RoleName>>,
    pub(crate) admin_roles: Arc<HierarchyGraph<RoleName>>,
    pub(crate) user_ous: Arc<HierarchyGraph<OrgUnitName>>,
    pub(crate) perm_ous: Arc<HierarchyGraph<OrgUnitName>>,
    pub(crate) sd_sets: Arc<SdCatalog>,
    pub(crate) sessions: SessionEngine,
    pub(crate) authorizer: DelegatedAuthorizer,
    /// Serializes administrative writes so assignment checks and SD-set
    /// checks see each other's results.
    writer: Mutex<()>,
}

impl BastionInner {
    pub(crate) fn lock_writer(&self) -> std::result::Result<MutexGuard<'_, ()>, AccessError> {
        self.writer
            .lock()
            .map_err(|_| AccessError::BackingStore("writer lock poisoned".into()))
    }

    pub(crate) fn audit_enabled(&self) -> bool {
        self.config.audit.enabled
    }

    pub(crate) fn ou_graph(&self, kind: OrgUnitKind) -> &HierarchyGraph<OrgUnitName> {
        match kind {
            OrgUnitKind::User => &self.user_ous,
            OrgUnitKind::Perm => &self.perm_ous,
        }
    }
}

/// An access-control engine over one directory.
#[derive(Clone)]
pub struct Bastion {
    pub(crate) inner: Arc<BastionInner>,
}

impl std::fmt::Debug for Bastion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bastion")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Bastion {
    /// Starts building an instance from `config`.
    pub fn builder(config: BastionConfig) -> BastionBuilder {
        BastionBuilder::new(config)
    }

    /// Opens an instance with the in-memory directory and authenticator.
    ///
    /// The directory is journaled when `config.directory.journal` is set.
    pub fn open(config: BastionConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Loads configuration from `project_dir` (see [`ConfigLoader`]) and opens
    /// an instance with it.
    pub fn open_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        let config = ConfigLoader::new().with_project_dir(project_dir).load()?;
        Self::open(config)
    }

    /// A volatile instance with test configuration.
    pub fn in_memory() -> Result<Self> {
        Self::open(BastionConfig::testing())
    }

    pub fn config(&self) -> &BastionConfig {
        &self.inner.config
    }

    /// Sessions and access decisions.
    pub fn access(&self) -> AccessManager {
        AccessManager::new(self.inner.clone())
    }

    /// Security-officer administration: no delegated checks.
    pub fn admin(&self) -> AdminManager {
        AdminManager::new(self.inner.clone())
    }

    /// Administration on behalf of an admin session, checked against its
    /// admin roles' ranges and org-unit pools.
    pub fn delegated(&self) -> DelegatedManager {
        DelegatedManager::new(self.inner.clone())
    }

    /// Read-only queries over assignments and grants.
    pub fn review(&self) -> ReviewManager {
        ReviewManager::new(self.inner.clone())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Wires collaborators into a [`Bastion`].
pub struct BastionBuilder {
    config: BastionConfig,
    directory: Option<Arc<dyn DirectoryStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    clock: Arc<dyn Clock>,
    filter: Arc<dyn ActivationFilter>,
}

impl BastionBuilder {
    fn new(config: BastionConfig) -> Self {
        Self {
            config,
            directory: None,
            authenticator: None,
            clock: Arc::new(SystemClock),
            filter: Arc::new(RoleConstraintFilter),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn DirectoryStore>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_activation_filter(mut self, filter: Arc<dyn ActivationFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Loads hierarchies and SD sets from the directory and builds the engines.
    pub fn build(mut self) -> Result<Bastion> {
        let directory: Arc<dyn DirectoryStore> = match self.directory.take() {
            Some(directory) => directory,
            None => match &self.config.directory.journal {
                Some(path) => Arc::new(MemoryDirectory::open(path)?),
                None => Arc::new(MemoryDirectory::new()),
            },
        };
        let authenticator = self
            .authenticator
            .take()
            .unwrap_or_else(|| Arc::new(MemoryAuthenticator::new()));

        let inner = self.assemble(directory, authenticator)?;
        Ok(Bastion {
            inner: Arc::new(inner),
        })
    }

    fn assemble(
        self,
        directory: Arc<dyn DirectoryStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<BastionInner> {
        let config = self.config;
        let max_depth = config.hierarchy.max_depth;

        let roles = Arc::new(load_graph::<RoleName>(&*directory, GraphKind::Role, max_depth)?);
        let admin_roles = Arc::new(load_graph::<RoleName>(
            &*directory,
            GraphKind::AdminRole,
            max_depth,
        )?);
        let user_ous = Arc::new(load_graph::<OrgUnitName>(
            &*directory,
            GraphKind::UserOrgUnit,
            max_depth,
        )?);
        let perm_ous = Arc::new(load_graph::<OrgUnitName>(
            &*directory,
            GraphKind::PermOrgUnit,
            max_depth,
        )?);

        let mut sets = directory.load_sd_sets(SdKind::Ssd)?;
        sets.extend(directory.load_sd_sets(SdKind::Dsd)?);
        let sd_sets = Arc::new(SdCatalog::from_sets(sets)?);

        let policy = SessionPolicy {
            activate_all_roles: config.session.activate_all_roles,
            revalidate_on_access: config.session.revalidate_on_access,
            trusted_requires_user_constraint: config.session.trusted_requires_user_constraint,
        };
        let mut sessions = SessionEngine::new(
            directory.clone(),
            authenticator,
            roles.clone(),
            admin_roles.clone(),
            sd_sets.clone(),
        )
        .with_clock(self.clock)
        .with_filter(self.filter)
        .with_policy(policy);

        let mut authorizer = DelegatedAuthorizer::new(
            directory.clone(),
            roles.clone(),
            admin_roles.clone(),
            user_ous.clone(),
            perm_ous.clone(),
        );
        if !config.delegation.enabled {
            authorizer = authorizer.disabled();
        }
        if !config.audit.enabled {
            sessions = sessions.without_audit();
            authorizer = authorizer.without_audit();
        }

        info!(
            roles = roles.snapshot().nodes().len(),
            admin_roles = admin_roles.snapshot().nodes().len(),
            sd_sets = sd_sets.snapshot().len(),
            delegation = config.delegation.enabled,
            "Bastion opened"
        );

        Ok(BastionInner {
            config,
            directory,
            roles,
            admin_roles,
            user_ous,
            perm_ous,
            sd_sets,
            sessions,
            authorizer,
            writer: Mutex::new(()),
        })
    }
}

fn load_graph<N>(
    directory: &dyn DirectoryStore,
    kind: GraphKind,
    max_depth: usize,
) -> Result<HierarchyGraph<N>>
where
    N: NodeName + From<String>,
{
    let edges = directory
        .load_hierarchy_edges(kind)?
        .into_iter()
        .map(|(parent, child)| (N::from(parent), N::from(child)));
    Ok(HierarchyGraph::from_edges(kind, max_depth, edges)?)
}
