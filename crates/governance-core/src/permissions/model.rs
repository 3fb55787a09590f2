//! Access-control data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PermissionError;

/// Matches any resource type or action.
pub const WILDCARD: &str = "*";

/// A `resource:action` pair; either side may be `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    pub resource: String,
    pub action: String,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, PermissionError> {
        match s.split_once(':') {
            Some((resource, action))
                if !resource.is_empty() && !action.is_empty() && !action.contains(':') =>
            {
                Ok(Self::new(resource, action))
            }
            _ => Err(PermissionError::InvalidPermission(s.to_string())),
        }
    }

    pub fn matches(&self, resource_type: &str, action: &str) -> bool {
        (self.resource == WILDCARD || self.resource == resource_type)
            && (self.action == WILDCARD || self.action == action)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl std::str::FromStr for Permission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Permission {
    type Error = PermissionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.to_string()
    }
}

/// A permission granted or denied to one principal, optionally limited to
/// one resource (and, through the resource hierarchy, its descendants).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedPermission {
    pub permission: Permission,
    /// `None` applies to every resource of the permission's type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ScopedPermission {
    pub fn type_wide(permission: Permission) -> Self {
        Self {
            permission,
            resource_id: None,
        }
    }

    pub fn on(permission: Permission, resource_id: impl Into<String>) -> Self {
        Self {
            permission,
            resource_id: Some(resource_id.into()),
        }
    }

    /// Applies to `resource` itself (type-wide or scoped to its id).
    pub fn applies_to(&self, resource: &Resource, action: &str) -> bool {
        self.permission.matches(&resource.resource_type, action)
            && self
                .resource_id
                .as_deref()
                .map_or(true, |id| id == resource.id)
    }

    /// Scoped to `ancestor_id` and covers `resource`'s type and `action`.
    pub fn applies_via(&self, ancestor_id: &str, resource: &Resource, action: &str) -> bool {
        self.resource_id.as_deref() == Some(ancestor_id)
            && self.permission.matches(&resource.resource_type, action)
    }
}

/// Extra requirement a role's grants depend on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoleCondition {
    /// Resource belongs to the principal's organization
    SameOrganization,
    /// Resource type is one of `types`
    ResourceTypeIn { types: Vec<String> },
    /// Resource attribute `key` equals `value`
    AttributeEquals {
        key: String,
        value: serde_json::Value,
    },
}

impl RoleCondition {
    pub fn is_met(&self, principal: &Principal, resource: &Resource) -> bool {
        match self {
            RoleCondition::SameOrganization => {
                resource.organization_id.as_deref() == Some(principal.organization_id.as_str())
            }
            RoleCondition::ResourceTypeIn { types } => {
                types.iter().any(|t| t == &resource.resource_type)
            }
            RoleCondition::AttributeEquals { key, value } => {
                resource.attributes.get(key) == Some(value)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    /// Higher levels carry more authority
    pub level: u32,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Always win over any grant
    #[serde(default)]
    pub explicit_denies: Vec<Permission>,
    /// Parent role whose permissions and denies also apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,
    /// All must hold for this role's grants to apply; denies are unconditional
    #[serde(default)]
    pub conditions: Vec<RoleCondition>,
}

impl Role {
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
            permissions: Vec::new(),
            explicit_denies: Vec::new(),
            inherits: None,
            conditions: Vec::new(),
        }
    }

    pub fn grant(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn deny(mut self, permission: Permission) -> Self {
        self.explicit_denies.push(permission);
        self
    }

    pub fn inherit(mut self, parent: impl Into<String>) -> Self {
        self.inherits = Some(parent.into());
        self
    }

    pub fn when(mut self, condition: RoleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions_met(&self, principal: &Principal, resource: &Resource) -> bool {
        self.conditions.iter().all(|c| c.is_met(principal, resource))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: String,
    pub organization_id: String,
}

impl Principal {
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            organization_id: organization_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Minimum role level for role grants to apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_level: Option<u32>,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Resource {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            organization_id: None,
            parent_id: None,
            required_level: None,
            attributes: serde_json::Map::new(),
        }
    }

    pub fn in_organization(mut self, org: impl Into<String>) -> Self {
        self.organization_id = Some(org.into());
        self
    }

    pub fn child_of(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn requiring_level(mut self, level: u32) -> Self {
        self.required_level = Some(level);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Why a check came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    ExplicitDeny,
    InheritedExplicitDeny,
    DirectGrant,
    RoleGrant,
    InheritedGrant,
    DefaultDeny,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::ExplicitDeny => "explicit_deny",
            ReasonCode::InheritedExplicitDeny => "inherited_explicit_deny",
            ReasonCode::DirectGrant => "direct_grant",
            ReasonCode::RoleGrant => "role_grant",
            ReasonCode::InheritedGrant => "inherited_grant",
            ReasonCode::DefaultDeny => "default_deny",
        }
    }

    pub fn allows(&self) -> bool {
        matches!(
            self,
            ReasonCode::DirectGrant | ReasonCode::RoleGrant | ReasonCode::InheritedGrant
        )
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one permission check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reason: ReasonCode,
    /// Served from cache until this instant
    pub cached_until: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_permission: Option<String>,
    /// Ancestor resource a grant or deny was inherited from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,
}
