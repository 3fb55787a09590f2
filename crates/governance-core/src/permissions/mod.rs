//! Role-based permission evaluation with deny priority, resource
//! hierarchy inheritance and a TTL decision cache.

pub mod cache;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod policy;

pub use cache::{CacheKey, DecisionCache};
pub use error::PermissionError;
pub use evaluator::PermissionEvaluator;
pub use model::{
    Permission, PermissionDecision, Principal, ReasonCode, Resource, Role, RoleCondition,
    ScopedPermission, WILDCARD,
};
pub use policy::{AccessPolicy, PolicySource, PrincipalPolicy};
