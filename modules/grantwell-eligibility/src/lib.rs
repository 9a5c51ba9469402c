//! Deterministic, explainable eligibility engine.
//!
//! Pure functions over `(UserProfile, NormalizedGrant)`: no I/O, no shared
//! mutable state, trivially safe to parallelize per grant. Every filter always
//! runs so the full explanation set is available; nothing short-circuits.

pub mod engine;
pub mod filters;
pub mod keywords;
pub mod profile;
pub mod types;

pub use engine::{evaluate, evaluate_many, filter_eligible, EligibilityPartition};
pub use profile::UserProfile;
pub use types::{
    Confidence, EligibilityResult, EngineConfig, FilterName, FullEligibilityResult,
};
