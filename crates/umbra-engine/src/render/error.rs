use thiserror::Error;

/// Errors raised by the render core.
///
/// None of these are retried internally. Allocation failures usually need a
/// policy decision (smaller size, disabling a pass) that belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A target or attachment could not be created at the requested size/format.
    ///
    /// Fatal to the affected target only; the caller may retry with other parameters.
    #[error("allocation failed for `{target}`: {reason}")]
    Allocation { target: String, reason: String },

    /// Binding an incomplete or stale target, or drawing into a target that is not
    /// the active one.
    #[error("cannot bind `{target}`: {reason}")]
    Binding { target: String, reason: String },

    /// A color slot or kernel index outside the configured set.
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A uniform name or value kind not declared by the program.
    #[error("uniform `{name}` rejected by `{program}`: {reason}")]
    UniformMismatch {
        program: String,
        name: String,
        reason: String,
    },
}

impl RenderError {
    pub(crate) fn allocation(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Allocation {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn binding(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Binding {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn uniform(
        program: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UniformMismatch {
            program: program.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for render-core operations.
pub type RenderResult<T> = Result<T, RenderError>;
