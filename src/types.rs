use serde::{Deserialize, Serialize};

/// A feature flag as served by the evaluation endpoint.
///
/// A flag with no tenant overrides is purely global: its `enabled` state
/// applies to every caller. A flag with overrides is tenant-gated: the
/// global `enabled` acts as a kill switch over the per-tenant values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub code: String,
    pub enabled: bool,
    #[serde(default)]
    pub tenants: Vec<TenantOverride>,
}

/// Per-tenant enabled state inside a [`FlagDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantOverride {
    pub code: String,
    pub enabled: bool,
}

impl FlagDefinition {
    /// Resolve the flag for an optional tenant.
    ///
    /// - No overrides: the global `enabled` decides.
    /// - Globally disabled: `false` for every tenant, overrides ignored.
    /// - Globally enabled with overrides: only an exact tenant match can
    ///   enable the flag; no tenant or an unknown tenant resolves to `false`.
    ///
    /// Duplicate tenant codes resolve to the first match.
    pub fn is_enabled_for(&self, tenant: Option<&str>) -> bool {
        if self.tenants.is_empty() {
            return self.enabled;
        }

        if !self.enabled {
            return false;
        }

        let Some(tenant) = tenant else {
            return false;
        };

        self.tenants
            .iter()
            .find(|t| t.code == tenant)
            .map(|t| t.enabled)
            .unwrap_or(false)
    }
}

/// Body of the stats upload request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsRequest {
    pub project: String,
    pub stats: Vec<StatEntry>,
}

/// One per-flag, per-minute counter pair in a [`StatsRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatEntry {
    /// Minute-truncated epoch milliseconds.
    pub bucket: i64,
    pub flag: String,
    pub enabled_hits: i64,
    pub total_hits: i64,
}
