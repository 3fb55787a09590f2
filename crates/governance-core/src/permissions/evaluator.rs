//! Deny-priority RBAC evaluation.
//!
//! Order of evaluation for `check(principal, resource, action)`:
//! 1. cached decision for `(principal.id, resource.id, action)`
//! 2. explicit deny on the role chain or on the principal (`explicit_deny`),
//!    then the same deny rules applied to each ancestor resource
//!    (`inherited_explicit_deny`)
//! 3. direct principal grant (`direct_grant`)
//! 4. role grant whose conditions and level requirement hold (`role_grant`)
//! 5. steps 3 and 4 applied to each ancestor, nearest first
//!    (`inherited_grant`)
//! 6. `default_deny`
//!
//! On an ancestor the rules see the ancestor's type, organization, level
//! and attributes. A principal permission scoped to an ancestor id also
//! covers descendants of the type it names.
//!
//! Fresh outcomes are audited as `PERMISSION_GRANTED`/`PERMISSION_DENIED`
//! and then cached. Cache hits are neither re-evaluated nor re-audited.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::audit::{actions, AuditChain, AuditFields};
use crate::config::{ConfigError, PermissionConfig};
use crate::metrics::METRICS;
use crate::obs;

use super::cache::{CacheKey, DecisionCache};
use super::error::PermissionError;
use super::model::{
    Permission, PermissionDecision, Principal, ReasonCode, Resource, Role, ScopedPermission,
};
use super::policy::PolicySource;

/// Result of walking the policy, before caching.
#[derive(Debug, Clone, PartialEq)]
struct Outcome {
    reason: ReasonCode,
    matched_role: Option<String>,
    matched_permission: Option<String>,
    inherited_from: Option<String>,
}

impl Outcome {
    fn new(reason: ReasonCode) -> Self {
        Self {
            reason,
            matched_role: None,
            matched_permission: None,
            inherited_from: None,
        }
    }

    fn role(mut self, role: &Role) -> Self {
        self.matched_role = Some(role.name.clone());
        self
    }

    fn permission(mut self, permission: impl ToString) -> Self {
        self.matched_permission = Some(permission.to_string());
        self
    }

    /// Relabel an outcome found on an ancestor resource.
    fn inherited(mut self, reason: ReasonCode, ancestor_id: &str) -> Self {
        self.reason = reason;
        self.inherited_from = Some(ancestor_id.to_string());
        self
    }
}

pub struct PermissionEvaluator {
    policy: Arc<dyn PolicySource>,
    audit: AuditChain,
    cache: DecisionCache,
    max_depth: usize,
    evaluations: AtomicU64,
}

impl PermissionEvaluator {
    /// Fails when `config` carries a cache TTL outside the accepted range.
    pub fn new(
        policy: Arc<dyn PolicySource>,
        audit: AuditChain,
        config: &PermissionConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            policy,
            audit,
            cache: DecisionCache::new(config.cache_ttl()?, config.cache_max_entries),
            max_depth: config.max_hierarchy_depth.max(1),
            evaluations: AtomicU64::new(0),
        })
    }

    /// Number of checks that walked the policy (cache misses).
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// Forget cached decisions after a principal's role or grants change.
    pub async fn invalidate_principal(&self, principal_id: &str) -> usize {
        self.cache.invalidate_principal(principal_id).await
    }

    /// Decide whether `principal` may perform `action` on `resource`.
    ///
    /// Denial is a normal outcome. Errors mean the policy is misconfigured
    /// or the decision could not be audited.
    pub async fn check(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: &str,
    ) -> Result<PermissionDecision, PermissionError> {
        let now = Utc::now();
        let key = CacheKey::new(&principal.id, &resource.id, action);

        if let Some(hit) = self.cache.get(&key, now).await {
            obs::emit_permission_cache_hit(&principal.id, &resource.id, action);
            METRICS.inc_permission_cache_hits();
            return Ok(hit);
        }

        self.evaluations.fetch_add(1, Ordering::Relaxed);
        METRICS.inc_permission_checks();
        let outcome = self.evaluate(principal, resource, action).await?;
        let allowed = outcome.reason.allows();

        let decision = PermissionDecision {
            allowed,
            reason: outcome.reason,
            cached_until: now.checked_add_signed(self.cache.ttl()).unwrap_or(now),
            matched_role: outcome.matched_role,
            matched_permission: outcome.matched_permission,
            inherited_from: outcome.inherited_from,
        };

        self.audit
            .append(
                AuditFields::new(
                    &principal.id,
                    if allowed {
                        actions::PERMISSION_GRANTED
                    } else {
                        actions::PERMISSION_DENIED
                    },
                    &resource.resource_type,
                    &resource.id,
                    if allowed { "allowed" } else { "denied" },
                )
                .with_metadata(serde_json::json!({
                    "action": action,
                    "reason": decision.reason,
                    "role": principal.role,
                    "organization_id": principal.organization_id,
                    "matched_role": decision.matched_role,
                    "matched_permission": decision.matched_permission,
                    "inherited_from": decision.inherited_from,
                })),
            )
            .await?;

        obs::emit_permission_decided(&principal.id, &resource.id, action, allowed, decision.reason);
        self.cache.insert(key, decision.clone(), now).await;
        Ok(decision)
    }

    /// Like [`check`](Self::check) but turns a denial into
    /// [`PermissionError::Denied`].
    pub async fn require(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: &str,
    ) -> Result<PermissionDecision, PermissionError> {
        let decision = self.check(principal, resource, action).await?;
        if decision.allowed {
            Ok(decision)
        } else {
            Err(PermissionError::Denied {
                principal_id: principal.id.clone(),
                resource_id: resource.id.clone(),
                action: action.to_string(),
                reason: decision.reason,
            })
        }
    }

    /// Principal's role followed by every role it inherits from.
    async fn role_chain(&self, name: &str) -> Result<Vec<Role>, PermissionError> {
        let mut chain: Vec<Role> = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(name.to_string());

        while let Some(current) = next.take() {
            if !seen.insert(current.clone()) {
                return Err(PermissionError::Configuration(format!(
                    "role inheritance cycle through '{current}'"
                )));
            }
            if chain.len() >= self.max_depth {
                return Err(PermissionError::Configuration(format!(
                    "role chain from '{name}' exceeds depth {}",
                    self.max_depth
                )));
            }
            let role = self.policy.role(&current).await?.ok_or_else(|| {
                PermissionError::Configuration(format!("unknown role '{current}'"))
            })?;
            next = role.inherits.clone();
            chain.push(role);
        }
        Ok(chain)
    }

    /// Ancestor resources of `resource`, nearest first. A parent id the
    /// policy does not know ends the walk.
    async fn ancestors(&self, resource: &Resource) -> Result<Vec<Resource>, PermissionError> {
        let mut out: Vec<Resource> = Vec::new();
        let mut seen = HashSet::from([resource.id.clone()]);
        let mut next = resource.parent_id.clone();

        while let Some(parent_id) = next.take() {
            if !seen.insert(parent_id.clone()) {
                return Err(PermissionError::Configuration(format!(
                    "resource hierarchy cycle through '{parent_id}'"
                )));
            }
            if out.len() >= self.max_depth {
                return Err(PermissionError::Configuration(format!(
                    "resource hierarchy above '{}' exceeds depth {}",
                    resource.id, self.max_depth
                )));
            }
            match self.policy.resource(&parent_id).await? {
                Some(parent) => {
                    next = parent.parent_id.clone();
                    out.push(parent);
                }
                None => debug!(parent_id = %parent_id, "resource parent not in policy, stopping walk"),
            }
        }
        Ok(out)
    }

    async fn evaluate(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: &str,
    ) -> Result<Outcome, PermissionError> {
        let roles = self.role_chain(&principal.role).await?;
        let grants = self.policy.direct_grants(&principal.id).await?;
        let denies = self.policy.direct_denies(&principal.id).await?;
        let ancestors = self.ancestors(resource).await?;
        let rules = Rules {
            principal,
            roles: &roles,
            grants: &grants,
            denies: &denies,
            target: resource,
            action,
        };

        // denies anywhere on the hierarchy win over every grant
        if let Some(outcome) = rules.deny_at(resource) {
            return Ok(outcome);
        }
        for ancestor in &ancestors {
            if let Some(outcome) = rules.deny_at(ancestor) {
                return Ok(outcome.inherited(ReasonCode::InheritedExplicitDeny, &ancestor.id));
            }
        }

        if let Some(outcome) = rules.grant_at(resource) {
            return Ok(outcome);
        }
        for ancestor in &ancestors {
            if let Some(outcome) = rules.grant_at(ancestor) {
                return Ok(outcome.inherited(ReasonCode::InheritedGrant, &ancestor.id));
            }
        }

        Ok(Outcome::new(ReasonCode::DefaultDeny))
    }
}

/// Policy content loaded for one check, evaluated against the target
/// resource or one of its ancestors.
struct Rules<'a> {
    principal: &'a Principal,
    roles: &'a [Role],
    grants: &'a [ScopedPermission],
    denies: &'a [ScopedPermission],
    target: &'a Resource,
    action: &'a str,
}

impl Rules<'_> {
    /// Principal permission scoped to `node`, or to an ancestor `node` while
    /// naming the target's type.
    fn scoped(&self, list: &[ScopedPermission], node: &Resource) -> Option<Permission> {
        list.iter()
            .find(|p| {
                p.applies_to(node, self.action)
                    || (node.id != self.target.id
                        && p.applies_via(&node.id, self.target, self.action))
            })
            .map(|p| p.permission.clone())
    }

    /// Explicit deny on the role chain or on the principal. Role denies are
    /// unconditional.
    fn deny_at(&self, node: &Resource) -> Option<Outcome> {
        let rtype = node.resource_type.as_str();
        for role in self.roles {
            if let Some(p) = role.explicit_denies.iter().find(|p| p.matches(rtype, self.action)) {
                return Some(Outcome::new(ReasonCode::ExplicitDeny).role(role).permission(p));
            }
        }
        self.scoped(self.denies, node)
            .map(|p| Outcome::new(ReasonCode::ExplicitDeny).permission(p))
    }

    /// Direct grant, then role grants whose level requirement and
    /// conditions hold for `node`.
    fn grant_at(&self, node: &Resource) -> Option<Outcome> {
        if let Some(p) = self.scoped(self.grants, node) {
            return Some(Outcome::new(ReasonCode::DirectGrant).permission(p));
        }

        // level of the assigned role gates every role grant
        let level_ok = match (node.required_level, self.roles.first()) {
            (Some(required), Some(assigned)) => assigned.level >= required,
            _ => true,
        };
        if !level_ok {
            return None;
        }
        let rtype = node.resource_type.as_str();
        self.roles
            .iter()
            .filter(|role| role.conditions_met(self.principal, node))
            .find_map(|role| {
                role.permissions
                    .iter()
                    .find(|p| p.matches(rtype, self.action))
                    .map(|p| Outcome::new(ReasonCode::RoleGrant).role(role).permission(p))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use crate::permissions::policy::AccessPolicy;
    use governance_state::fakes::MemoryAuditStore;

    async fn evaluator(policy: AccessPolicy) -> PermissionEvaluator {
        let store = Arc::new(MemoryAuditStore::new());
        let chain = AuditChain::open(store, &AuditConfig::default()).await.unwrap();
        PermissionEvaluator::new(Arc::new(policy), chain, &PermissionConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_role_cycle_is_configuration_error() {
        let policy = AccessPolicy::new()
            .with_role(Role::new("a", 1).inherit("b"))
            .with_role(Role::new("b", 1).inherit("a"));
        let eval = evaluator(policy).await;
        let err = eval
            .check(&Principal::new("u", "a", "o"), &Resource::new("r", "t"), "read")
            .await
            .unwrap_err();
        assert!(matches!(err, PermissionError::Configuration(ref m) if m.contains("cycle")));
    }

    #[tokio::test]
    async fn test_resource_cycle_is_configuration_error() {
        let policy = AccessPolicy::new()
            .with_role(Role::new("r", 1))
            .with_resource(Resource::new("x", "folders").child_of("y"))
            .with_resource(Resource::new("y", "folders").child_of("x"));
        let eval = evaluator(policy).await;
        let err = eval
            .check(
                &Principal::new("u", "r", "o"),
                &Resource::new("doc", "docs").child_of("x"),
                "read",
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::domain::error::codes::POLICY_CONFIGURATION);
    }

    #[tokio::test]
    async fn test_unknown_role_is_configuration_error() {
        let eval = evaluator(AccessPolicy::new()).await;
        let err = eval
            .check(&Principal::new("u", "ghost", "o"), &Resource::new("r", "t"), "read")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn test_require_turns_denial_into_error() {
        let policy = AccessPolicy::new().with_role(Role::new("r", 1));
        let eval = evaluator(policy).await;
        let err = eval
            .require(&Principal::new("u", "r", "o"), &Resource::new("x", "t"), "read")
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::domain::error::codes::PERMISSION_DENIED);
    }

    #[tokio::test]
    async fn test_direct_grant_beats_default_deny() {
        let policy = AccessPolicy::new()
            .with_role(Role::new("r", 1))
            .grant_to("u", ScopedPermission::on(Permission::new("t", "read"), "x"));
        let eval = evaluator(policy).await;
        let d = eval
            .check(&Principal::new("u", "r", "o"), &Resource::new("x", "t"), "read")
            .await
            .unwrap();
        assert!(d.allowed);
        assert_eq!(d.reason, ReasonCode::DirectGrant);
        assert_eq!(d.matched_permission.as_deref(), Some("t:read"));
    }
}
