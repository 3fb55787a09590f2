//! Domain models for the governance engine.
//!
//! - `DecisionEvent`: validated, immutable record of one agent decision
//! - `AgentContext`: invocation context supplied by the caller
//! - `digest`: canonical JSON hashing shared by decisions and the audit chain

pub mod context;
pub mod decision;
pub mod digest;
pub mod error;
pub mod validation;

pub use context::{AgentContext, CallerInfo};
pub use decision::{
    default_confidence, Confidence, ConfidenceBand, ConstraintsApplied, DecisionDraft,
    DecisionEvent, DecisionType, TimeWindow, DECISION_SCHEMA_VERSION,
};
pub use error::{codes, FieldViolation, GovernanceError, Result, ValidationError, ViolationCode};
pub use validation::validate_decision_event;
