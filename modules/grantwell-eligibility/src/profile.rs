use grantwell_common::types::EntityType;
use serde::{Deserialize, Serialize};

/// Applicant attributes relevant to eligibility filtering. Owned by the
/// profile subsystem; read-only to the engine. Incomplete profiles are legal:
/// absent fields degrade confidence, never correctness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub entity_type: Option<EntityType>,
    /// Two-letter state code.
    pub state: Option<String>,
    #[serde(default)]
    pub industry_tags: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    /// Annual operating budget in dollars, if the applicant shares it.
    pub annual_budget: Option<f64>,
}

impl UserProfile {
    pub fn normalized_state(&self) -> Option<String> {
        self.state
            .as_ref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
    }
}
