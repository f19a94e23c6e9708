//! Workspace access levels, permission sets, and access-mode reconciliation.
//!
//! A team's access to a workspace is either one of the fixed levels
//! (`admin`, `read`, `plan`, `write`), in which case the API decides every
//! individual permission, or `custom`, in which case the `permissions` block
//! is authoritative. The two are never user-authoritative at the same time.
//!
//! [`reconcile`] decides, from the state of a planned change, which of the
//! two the user meant, and [`Reconciliation::apply`] writes that decision
//! back into the [`ResourceDiff`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::ResourceDiff;
use crate::error::ProviderError;
use crate::resources::empty_as_none;

/// Attribute holding the access level.
pub const ACCESS_ATTR: &str = "access";
/// Block holding the individual permissions.
pub const PERMISSIONS_ATTR: &str = "permissions";

/// A team's access level on a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Full control, including workspace settings.
    Admin,
    /// Read runs, variables, and state.
    Read,
    /// Queue plans.
    Plan,
    /// Apply runs and edit variables.
    Write,
    /// The `permissions` block governs.
    Custom,
}

impl AccessLevel {
    /// The levels a user may configure directly.
    pub const FIXED: [AccessLevel; 4] = [Self::Admin, Self::Read, Self::Plan, Self::Write];

    /// The API's name for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Read => "read",
            Self::Plan => "plan",
            Self::Write => "write",
            Self::Custom => "custom",
        }
    }

    /// Whether this is the `custom` sentinel.
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission to queue and apply runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunsPermission {
    /// View runs.
    Read,
    /// Queue plans.
    Plan,
    /// Queue and apply runs.
    Apply,
}

impl RunsPermission {
    /// Every accepted value.
    pub const ALL: [&'static str; 3] = ["read", "plan", "apply"];
}

/// Permission on workspace variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariablesPermission {
    /// No access.
    None,
    /// View variables.
    Read,
    /// Edit variables.
    Write,
}

impl VariablesPermission {
    /// Every accepted value.
    pub const ALL: [&'static str; 3] = ["none", "read", "write"];
}

/// Permission on state versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateVersionsPermission {
    /// No access.
    None,
    /// Read state outputs only.
    ReadOutputs,
    /// Read full state.
    Read,
    /// Create state versions.
    Write,
}

impl StateVersionsPermission {
    /// Every accepted value.
    pub const ALL: [&'static str; 4] = ["none", "read-outputs", "read", "write"];
}

/// Permission to download Sentinel mocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentinelMocksPermission {
    /// No access.
    None,
    /// Download mocks.
    Read,
}

impl SentinelMocksPermission {
    /// Every accepted value.
    pub const ALL: [&'static str; 2] = ["none", "read"];
}

/// Individually settable permissions.
///
/// Every field is tri-state: `None` means "not set by the user, let the API
/// decide". In particular `workspace_locking: Some(false)` is an explicit
/// request and is distinct from `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PermissionSet {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub runs: Option<RunsPermission>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub variables: Option<VariablesPermission>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub state_versions: Option<StateVersionsPermission>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub sentinel_mocks: Option<SentinelMocksPermission>,
    #[serde(default)]
    pub workspace_locking: Option<bool>,
}

impl PermissionSet {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The fields of `self` that are set and differ from `before`.
    ///
    /// Fields cleared since `before` are not sent: an unset permission is
    /// left to the API rather than reset.
    pub fn changed_from(&self, before: &PermissionSet) -> PermissionSet {
        fn pick<T: PartialEq + Copy>(after: Option<T>, before: Option<T>) -> Option<T> {
            after.filter(|_| after != before)
        }
        PermissionSet {
            runs: pick(self.runs, before.runs),
            variables: pick(self.variables, before.variables),
            state_versions: pick(self.state_versions, before.state_versions),
            sentinel_mocks: pick(self.sentinel_mocks, before.sentinel_mocks),
            workspace_locking: pick(self.workspace_locking, before.workspace_locking),
        }
    }
}

/// A fully resolved permission set, as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WorkspacePermissions {
    pub runs: RunsPermission,
    pub variables: VariablesPermission,
    pub state_versions: StateVersionsPermission,
    pub sentinel_mocks: SentinelMocksPermission,
    pub workspace_locking: bool,
}

impl WorkspacePermissions {
    /// The permissions the API grants for an access level. `custom` starts
    /// from the most restrictive set.
    pub fn for_access(access: AccessLevel) -> Self {
        use RunsPermission as R;
        use SentinelMocksPermission as M;
        use StateVersionsPermission as S;
        use VariablesPermission as V;

        let (runs, variables, state_versions, sentinel_mocks, workspace_locking) = match access {
            AccessLevel::Read => (R::Read, V::Read, S::Read, M::None, false),
            AccessLevel::Plan => (R::Plan, V::Read, S::Read, M::None, false),
            AccessLevel::Write | AccessLevel::Admin => (R::Apply, V::Write, S::Write, M::Read, true),
            AccessLevel::Custom => (R::Read, V::None, S::None, M::None, false),
        };
        Self {
            runs,
            variables,
            state_versions,
            sentinel_mocks,
            workspace_locking,
        }
    }

    /// Overlay the explicit fields of `set`.
    pub fn merged(mut self, set: &PermissionSet) -> Self {
        self.runs = set.runs.unwrap_or(self.runs);
        self.variables = set.variables.unwrap_or(self.variables);
        self.state_versions = set.state_versions.unwrap_or(self.state_versions);
        self.sentinel_mocks = set.sentinel_mocks.unwrap_or(self.sentinel_mocks);
        self.workspace_locking = set.workspace_locking.unwrap_or(self.workspace_locking);
        self
    }
}

impl From<WorkspacePermissions> for PermissionSet {
    fn from(p: WorkspacePermissions) -> Self {
        Self {
            runs: Some(p.runs),
            variables: Some(p.variables),
            state_versions: Some(p.state_versions),
            sentinel_mocks: Some(p.sentinel_mocks),
            workspace_locking: Some(p.workspace_locking),
        }
    }
}

/// The parts of a planned change that decide the access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDiff<'a> {
    /// The proposed state has a non-empty access level.
    pub has_access_set: bool,
    /// The access level differs from the prior state.
    pub access_changed: bool,
    /// Prior access level (empty when unset).
    pub access_old: &'a str,
    /// Proposed access level (empty when unset).
    pub access_new: &'a str,
    /// The permissions block differs from the prior state.
    pub permissions_changed: bool,
    /// The proposed state has a non-empty permissions block.
    pub permissions_present: bool,
}

impl<'a> AccessDiff<'a> {
    /// Read the access-mode inputs out of a resource diff.
    pub fn from_diff(diff: &'a ResourceDiff<'_>) -> Self {
        let (old, new) = diff.get_change(ACCESS_ATTR);
        Self {
            has_access_set: diff.get_ok(ACCESS_ATTR).is_some(),
            access_changed: diff.has_change(ACCESS_ATTR),
            access_old: old.and_then(|v| v.as_str()).unwrap_or_default(),
            access_new: new.and_then(|v| v.as_str()).unwrap_or_default(),
            permissions_changed: diff.has_change(PERMISSIONS_ATTR),
            permissions_present: diff.get_ok(PERMISSIONS_ATTR).is_some(),
        }
    }
}

/// The outcome of [`reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Discard the proposed permissions; the API will compute them.
    pub force_compute_permissions: bool,
    /// Replace the proposed access level.
    pub override_access: Option<AccessLevel>,
}

impl Reconciliation {
    /// Whether the diff is left untouched.
    pub fn is_noop(&self) -> bool {
        !self.force_compute_permissions && self.override_access.is_none()
    }

    /// Write the decision into the diff.
    pub fn apply(&self, diff: &mut ResourceDiff<'_>) -> Result<(), ProviderError> {
        if self.force_compute_permissions {
            diff.set_new_computed(PERMISSIONS_ATTR)?;
        }
        if let Some(access) = self.override_access {
            diff.set_new(ACCESS_ATTR, serde_json::Value::from(access.as_str()))?;
        }
        Ok(())
    }
}

/// Decide between fixed and custom access for a planned change.
///
/// - An access level that is set and changing to a fixed value makes the
///   permissions read-only: they are recomputed by the API.
/// - An access level that is set but unchanged while the permissions change
///   means the user switched to a permissions block: access becomes `custom`.
/// - No access level at all with a permissions block (a new resource)
///   also means `custom`.
///
/// Pure and total: the same input always yields the same decision.
pub fn reconcile(diff: &AccessDiff<'_>) -> Reconciliation {
    let custom = AccessLevel::Custom.as_str();

    if diff.has_access_set {
        if diff.access_changed {
            return Reconciliation {
                force_compute_permissions: diff.access_new != custom,
                override_access: None,
            };
        }
        if diff.permissions_changed {
            return Reconciliation {
                force_compute_permissions: false,
                override_access: Some(AccessLevel::Custom),
            };
        }
        return Reconciliation::default();
    }

    if diff.permissions_present {
        return Reconciliation {
            force_compute_permissions: false,
            override_access: Some(AccessLevel::Custom),
        };
    }
    Reconciliation::default()
}

/// Reconcile the access mode of a team access diff in place.
pub fn reconcile_diff(diff: &mut ResourceDiff<'_>) -> Result<Reconciliation, ProviderError> {
    let inputs = AccessDiff::from_diff(diff);
    let decision = reconcile(&inputs);
    if !decision.is_noop() {
        debug!(
            access_old = inputs.access_old,
            access_new = inputs.access_new,
            force_compute_permissions = decision.force_compute_permissions,
            override_access = ?decision.override_access,
            "Reconciled team access mode"
        );
    }
    decision.apply(diff)?;
    Ok(decision)
}
