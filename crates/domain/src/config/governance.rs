use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Governance (risk policy overrides)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Overrides layered on top of the built-in default risk policy
/// (`conductor_governance::policy::default_policy`). Keys are tool names;
/// values override that tool's baseline risk level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub risk_overrides: HashMap<String, String>,
    /// Role assumed for a caller that did not present one.
    #[serde(default = "d_default_role")]
    pub default_role: String,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            risk_overrides: HashMap::new(),
            default_role: d_default_role(),
        }
    }
}

fn d_default_role() -> String {
    "standard_user".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_role_is_standard_user() {
        assert_eq!(GovernanceConfig::default().default_role, "standard_user");
    }

    #[test]
    fn default_risk_overrides_empty() {
        assert!(GovernanceConfig::default().risk_overrides.is_empty());
    }
}
