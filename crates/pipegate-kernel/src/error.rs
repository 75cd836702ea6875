//! Kernel error types.
//!
//! [`KernelError`] covers every failure that can be detected while turning a
//! raw `{type, config}` payload into a running stage or pipeline: missing
//! names, unknown types, malformed configuration, broken references. Control
//! plane failures (name collisions, missing entries, lifecycle violations)
//! belong to the runtime crate.

use thiserror::Error;

/// Definition-time error for plugin and pipeline specs.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum KernelError {
    // ── Identity ────────────────────────────────────────────────────────────
    /// The `name` field is missing, not a string, or blank.
    #[error("config must carry a non-empty string field 'name'")]
    MissingName,

    /// No factory is registered for this plugin type.
    #[error("unknown plugin type '{0}'")]
    UnknownPluginType(String),

    /// No factory is registered for this pipeline type.
    #[error("unknown pipeline type '{0}'")]
    UnknownPipelineType(String),

    // ── Config payload ──────────────────────────────────────────────────────
    /// The config payload does not deserialize into the type's config struct.
    #[error("invalid {kind} config: {reason}")]
    InvalidConfig { kind: String, reason: String },

    /// A single field failed validation after deserialization.
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// A duration string could not be parsed.
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    // ── References ──────────────────────────────────────────────────────────
    /// A pipeline references a plugin that is not registered.
    #[error("pipeline '{pipeline}' references unknown plugin '{plugin}'")]
    UnknownPlugin { pipeline: String, plugin: String },

    /// A pipeline branches on a result its plugin never produces.
    #[error("plugin '{plugin}' never produces result '{result}'")]
    UndeclaredResult { plugin: String, result: String },

    /// A pipeline jump target is not a later plugin in the same pipeline.
    #[error("jump from '{from}' to '{to}' is not a forward jump within the pipeline")]
    InvalidJump { from: String, to: String },

    // ── Lifecycle ───────────────────────────────────────────────────────────
    /// Teardown of a stage or pipeline failed; its resources may still be live.
    #[error("dispose of '{name}' failed: {reason}")]
    DisposeFailed { name: String, reason: String },

    // ── Runtime prerequisites ───────────────────────────────────────────────
    /// A stage needing background work was constructed outside a Tokio runtime.
    #[error("no tokio runtime available to start background work for '{0}'")]
    NoRuntime(String),
}

impl KernelError {
    pub fn invalid_config(kind: impl Into<String>, reason: impl ToString) -> Self {
        KernelError::InvalidConfig {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        KernelError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
