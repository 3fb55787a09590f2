//! Policy data sources.
//!
//! The evaluator never owns policy content; it reads roles, per-principal
//! grants/denies and the resource hierarchy through [`PolicySource`].
//! [`AccessPolicy`] is the in-memory implementation, loadable from TOML or
//! JSON:
//!
//! ```toml
//! [[roles]]
//! name = "analyst"
//! level = 30
//! permissions = ["reports:read"]
//! conditions = [{ type = "same_organization" }]
//!
//! [[principals]]
//! principal_id = "user-7"
//! denies = [{ permission = "reports:read", resource_id = "rep-secret" }]
//!
//! [[resources]]
//! id = "rep-secret"
//! resource_type = "reports"
//! parent_id = "folder-1"
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::PermissionError;
use super::model::{Permission, Resource, Role, ScopedPermission};

/// Read access to policy content.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Role definition by name.
    async fn role(&self, name: &str) -> Result<Option<Role>, PermissionError>;

    /// Grants attached directly to a principal.
    async fn direct_grants(&self, principal_id: &str)
        -> Result<Vec<ScopedPermission>, PermissionError>;

    /// Denies attached directly to a principal.
    async fn direct_denies(&self, principal_id: &str)
        -> Result<Vec<ScopedPermission>, PermissionError>;

    /// Resource by id, used to walk `parent_id` links.
    async fn resource(&self, id: &str) -> Result<Option<Resource>, PermissionError>;
}

/// Grants and denies for one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalPolicy {
    pub principal_id: String,
    #[serde(default)]
    pub grants: Vec<ScopedPermission>,
    #[serde(default)]
    pub denies: Vec<ScopedPermission>,
}

/// In-memory policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub principals: Vec<PrincipalPolicy>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

fn perm(resource: &str, action: &str) -> Permission {
    Permission::new(resource, action)
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy preloaded with the organization roles:
    ///
    /// | role   | level | grants                                   | inherits |
    /// |--------|-------|------------------------------------------|----------|
    /// | owner  | 100   | `*:*`                                    |          |
    /// | admin  | 80    | `users:*`, `policies:*`, `organizations:update`, `audit:export` (denied `organizations:delete`) | member |
    /// | member | 50    | `policies:create`, `policies:update`, `decisions:create` | viewer |
    /// | viewer | 10    | `*:read`                                 |          |
    ///
    /// Every role's grants require the resource to be in the principal's
    /// organization. Owner inherits nothing so admin's deny on
    /// `organizations:delete` does not reach it.
    pub fn standard_org_roles() -> Self {
        use super::model::RoleCondition::SameOrganization;

        let viewer = Role::new("viewer", 10)
            .grant(perm("*", "read"))
            .when(SameOrganization);
        let member = Role::new("member", 50)
            .grant(perm("policies", "create"))
            .grant(perm("policies", "update"))
            .grant(perm("decisions", "create"))
            .inherit("viewer")
            .when(SameOrganization);
        let admin = Role::new("admin", 80)
            .grant(perm("users", "*"))
            .grant(perm("policies", "*"))
            .grant(perm("organizations", "update"))
            .grant(perm("audit", "export"))
            .deny(perm("organizations", "delete"))
            .inherit("member")
            .when(SameOrganization);
        let owner = Role::new("owner", 100)
            .grant(perm("*", "*"))
            .when(SameOrganization);

        Self {
            roles: vec![owner, admin, member, viewer],
            ..Self::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, PermissionError> {
        let policy: AccessPolicy = toml::from_str(contents)
            .map_err(|e| PermissionError::Configuration(format!("policy TOML: {e}")))?;
        policy.check_unique_roles()?;
        Ok(policy)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, PermissionError> {
        let policy: AccessPolicy = serde_json::from_str(contents)
            .map_err(|e| PermissionError::Configuration(format!("policy JSON: {e}")))?;
        policy.check_unique_roles()?;
        Ok(policy)
    }

    fn check_unique_roles(&self) -> Result<(), PermissionError> {
        let mut seen = std::collections::HashSet::new();
        for role in &self.roles {
            if !seen.insert(role.name.as_str()) {
                return Err(PermissionError::Configuration(format!(
                    "role '{}' defined more than once",
                    role.name
                )));
            }
        }
        Ok(())
    }

    /// Add or replace a role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.retain(|r| r.name != role.name);
        self.roles.push(role);
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.retain(|r| r.id != resource.id);
        self.resources.push(resource);
        self
    }

    fn principal_mut(&mut self, principal_id: &str) -> &mut PrincipalPolicy {
        let idx = match self
            .principals
            .iter()
            .position(|p| p.principal_id == principal_id)
        {
            Some(idx) => idx,
            None => {
                self.principals.push(PrincipalPolicy {
                    principal_id: principal_id.to_string(),
                    ..PrincipalPolicy::default()
                });
                self.principals.len() - 1
            }
        };
        &mut self.principals[idx]
    }

    pub fn grant_to(mut self, principal_id: &str, grant: ScopedPermission) -> Self {
        self.principal_mut(principal_id).grants.push(grant);
        self
    }

    pub fn deny_to(mut self, principal_id: &str, deny: ScopedPermission) -> Self {
        self.principal_mut(principal_id).denies.push(deny);
        self
    }

    fn principal(&self, principal_id: &str) -> Option<&PrincipalPolicy> {
        self.principals
            .iter()
            .find(|p| p.principal_id == principal_id)
    }
}

#[async_trait]
impl PolicySource for AccessPolicy {
    async fn role(&self, name: &str) -> Result<Option<Role>, PermissionError> {
        Ok(self.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn direct_grants(
        &self,
        principal_id: &str,
    ) -> Result<Vec<ScopedPermission>, PermissionError> {
        Ok(self
            .principal(principal_id)
            .map(|p| p.grants.clone())
            .unwrap_or_default())
    }

    async fn direct_denies(
        &self,
        principal_id: &str,
    ) -> Result<Vec<ScopedPermission>, PermissionError> {
        Ok(self
            .principal(principal_id)
            .map(|p| p.denies.clone())
            .unwrap_or_default())
    }

    async fn resource(&self, id: &str) -> Result<Option<Resource>, PermissionError> {
        Ok(self.resources.iter().find(|r| r.id == id).cloned())
    }
}
