//! Kernel configuration.

use attest_kernel_access::AccessConfig;
use attest_kernel_core::Address;

/// Resource budgets for resolver hook calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverBudgets {
    /// Budget for a primary resolver call without an override.
    pub primary_default: u64,
    /// Budget for an additional resolver call without an override.
    pub additional_default: u64,
    /// No call gets more than this, overrides included.
    pub hard_ceiling: u64,
}

impl ResolverBudgets {
    /// The budget for one call, given the resolver's override if any.
    pub fn budget_for(&self, override_budget: Option<u64>, primary: bool) -> u64 {
        let default = if primary {
            self.primary_default
        } else {
            self.additional_default
        };
        override_budget.unwrap_or(default).min(self.hard_ceiling)
    }
}

impl Default for ResolverBudgets {
    fn default() -> Self {
        Self {
            primary_default: 200_000,
            additional_default: 100_000,
            hard_ceiling: 1_000_000,
        }
    }
}

/// Configuration for the Kernel.
/// Hard cap on additional resolvers per subject, whatever the config says.
pub const MAX_ADDITIONAL_RESOLVERS: usize = 10;

#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Access-control configuration.
    pub access: AccessConfig,
    /// Resolver call budgets.
    pub resolver_budgets: ResolverBudgets,
    /// Maximum additional resolvers per subject. Capped at
    /// [`MAX_ADDITIONAL_RESOLVERS`].
    pub max_additional_resolvers: usize,
    /// Budget for asking a module executor whether it accepts a delegation.
    pub executor_budget: u64,
    /// Actor allowed to unlock locked resolvers until `emergency_expiry`.
    ///
    /// Fixed when the kernel is first created; a restored kernel keeps the
    /// persisted values.
    pub emergency_actor: Option<Address>,
    /// Last instant (Unix ms) at which `emergency_actor` may act.
    pub emergency_expiry: i64,
}

impl KernelConfig {
    /// The effective additional-resolver limit.
    pub fn additional_resolver_limit(&self) -> usize {
        self.max_additional_resolvers.min(MAX_ADDITIONAL_RESOLVERS)
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            access: AccessConfig::default(),
            resolver_budgets: ResolverBudgets::default(),
            max_additional_resolvers: MAX_ADDITIONAL_RESOLVERS,
            executor_budget: 100_000,
            emergency_actor: None,
            emergency_expiry: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_selection() {
        let budgets = ResolverBudgets::default();
        assert_eq!(budgets.budget_for(None, true), 200_000);
        assert_eq!(budgets.budget_for(None, false), 100_000);
        assert_eq!(budgets.budget_for(Some(500), false), 500);
        assert_eq!(budgets.budget_for(Some(u64::MAX), true), 1_000_000);
    }

    #[test]
    fn test_additional_resolver_limit_is_capped() {
        let mut config = KernelConfig::default();
        assert_eq!(config.additional_resolver_limit(), MAX_ADDITIONAL_RESOLVERS);
        config.max_additional_resolvers = 3;
        assert_eq!(config.additional_resolver_limit(), 3);
        config.max_additional_resolvers = 12;
        assert_eq!(config.additional_resolver_limit(), MAX_ADDITIONAL_RESOLVERS);
    }
}
