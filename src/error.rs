// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use thiserror::Error;

/// Width x height of a plane, in pixels.
pub type Dims = (u32, u32);

#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Composition or save was requested with nothing selected. This is an
    /// expected user-input condition; callers should report it and carry on.
    #[error("No images selected")]
    NoSelection,

    /// Planes that must share a shape do not. Indicates inconsistent
    /// acquisition data and should halt the pipeline.
    #[error("Plane shape mismatch in {context}: expected {}x{}, found {}x{}",
            .expected.0, .expected.1, .found.0, .found.1)]
    ShapeMismatch { context: String, expected: Dims, found: Dims },

    /// A plane with no pixels. Nothing can be projected or aligned from it.
    #[error("Empty plane in {0}")]
    EmptyPlane(String),

    /// The same round or channel was named twice in one run.
    #[error("Duplicate {kind} '{name}'")]
    DuplicateIdentifier { kind: &'static str, name: String },

    #[error("Round '{round}' has no '{channel}' plane to align with")]
    MissingReferencePlane { round: String, channel: String },

    #[error("Reference round '{0}' is not among the supplied rounds")]
    UnknownReferenceRound(String),

    #[error("Round '{0}' has no translation")]
    NoTranslation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl RegistrationError {
    /// Prefixes the context of a `ShapeMismatch` so that the error names the
    /// round/channel it arose from. Other variants pass through unchanged.
    pub fn within(self, outer: &str) -> Self {
        match self {
            RegistrationError::ShapeMismatch { context, expected, found } =>
                RegistrationError::ShapeMismatch {
                    context: format!("{}: {}", outer, context),
                    expected, found },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
