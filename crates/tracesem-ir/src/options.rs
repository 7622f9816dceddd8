//! Checker configuration.

/// What to do when a construct collects more fragments than it can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum FragmentPolicy {
    /// Abort with an internal-consistency error.
    #[default]
    Fatal,
    /// Report an error diagnostic and continue with the fragments composed
    /// sequentially.
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CheckerOptions {
    /// Simplify computed traces before returning or attaching them.
    pub simplify: bool,
    /// Hide communications on non-interface channels when attaching a
    /// procedure's trace and when checking its contract.
    pub project_interface: bool,
    /// Upper bound on distinct states explored per contract check.
    pub max_refinement_states: usize,
    /// Largest constant replication count that is unrolled; larger counts
    /// are approximated like unknown ones.
    pub max_replication_unroll: usize,
    /// Warn when a contract permits behaviour the procedure never exhibits.
    pub report_restrictive: bool,
    pub fragment_policy: FragmentPolicy,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            simplify: true,
            project_interface: true,
            max_refinement_states: 10_000,
            max_replication_unroll: 64,
            report_restrictive: true,
            fragment_policy: FragmentPolicy::Fatal,
        }
    }
}

impl CheckerOptions {
    /// Options that keep traces exactly as the handlers build them.
    pub fn raw() -> Self {
        Self {
            simplify: false,
            ..Self::default()
        }
    }
}
