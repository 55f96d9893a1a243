use docrel_core_types::DocId;
use thiserror::Error;

/// Result type alias using DocRelError
pub type Result<T> = std::result::Result<T, DocRelError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing, and log assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Declaration
    ScopeMisconfiguration,
    UnknownModel,
    UnknownAssociation,
    AssociationKindMismatch,

    // Documents
    ValidationFailure,
    NotFound,
    Destroyed,
    NotPersisted,
    InvalidField,

    // Persistence
    PartialFlush,
    Persistence,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::ScopeMisconfiguration => "ERR_SCOPE_MISCONFIGURATION",
            ExErrorKind::UnknownModel => "ERR_UNKNOWN_MODEL",
            ExErrorKind::UnknownAssociation => "ERR_UNKNOWN_ASSOCIATION",
            ExErrorKind::AssociationKindMismatch => "ERR_ASSOCIATION_KIND_MISMATCH",
            ExErrorKind::ValidationFailure => "ERR_VALIDATION_FAILURE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Destroyed => "ERR_DESTROYED",
            ExErrorKind::NotPersisted => "ERR_NOT_PERSISTED",
            ExErrorKind::InvalidField => "ERR_INVALID_FIELD",
            ExErrorKind::PartialFlush => "ERR_PARTIAL_FLUSH",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification fields for programmatic handling plus context for
/// debugging. Built from `DocRelError` at logging boundaries.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    model: Option<String>,
    association: Option<String>,
    entity_id: Option<String>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            model: None,
            association: None,
            entity_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add model context
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add association context
    pub fn with_association(mut self, association: impl Into<String>) -> Self {
        self.association = Some(association.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn association(&self) -> Option<&str> {
        self.association.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(model) = &self.model {
            write!(f, " (model: {})", model)?;
        }
        if let Some(association) = &self.association {
            write!(f, " (association: {})", association)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for registry, session and association operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocRelError {
    // ===== Declaration Errors =====
    /// An association was declared without a required parameter or with an
    /// inconsistent one. Raised while building the registry, never later.
    #[error("Association {model}.{association} is misconfigured: {reason}")]
    ScopeMisconfiguration {
        model: String,
        association: String,
        reason: String,
    },

    /// Model was registered twice
    #[error("Model registered more than once: {model}")]
    DuplicateModel { model: String },

    /// Model is not part of the registry
    #[error("Unknown model: {model}")]
    UnknownModel { model: String },

    /// Association is not declared on the model
    #[error("Unknown association {association} on model {model}")]
    UnknownAssociation { model: String, association: String },

    /// Association exists but was accessed through the wrong proxy kind
    #[error("Association {model}.{association} is not a {expected} association")]
    AssociationKindMismatch {
        model: String,
        association: String,
        expected: &'static str,
    },

    // ===== Document Errors =====
    /// Required keys are missing or blank
    #[error("Validation failed for {model}: {} can't be blank", .missing.join(", "))]
    ValidationFailure { model: String, missing: Vec<String> },

    /// Requested identities are not present within the queried scope
    #[error("Document not found: {model} {ids:?}")]
    NotFound { model: String, ids: Vec<DocId> },

    /// Document was destroyed earlier in this session
    #[error("Document was destroyed: {model} {id}")]
    DocumentDestroyed { model: String, id: DocId },

    /// Operation needs a persisted document but it has no identity yet
    #[error("Document of model {model} has not been saved: cannot {op}")]
    OwnerNotPersisted { model: String, op: &'static str },

    /// A relation-defining field holds a value of the wrong shape
    #[error("Invalid field {model}.{field}: {reason}")]
    InvalidField {
        model: String,
        field: String,
        reason: String,
    },

    /// Handle does not belong to this session
    #[error("Unknown document handle: {handle}")]
    UnknownHandle { handle: usize },

    // ===== Persistence Errors =====
    /// A pending-write flush stopped partway. Writes applied before the
    /// failing peer are not reverted.
    #[error("Flush of {association} stopped after {persisted} peer write(s): {source}")]
    PartialFlushFailure {
        association: String,
        persisted: usize,
        /// Identity of the failing peer, absent when it was never saved
        peer: Option<DocId>,
        #[source]
        source: Box<DocRelError>,
    },

    /// Store-level failure
    #[error("Persistence error: {reason}")]
    Persistence { reason: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl DocRelError {
    /// Returns true when this error is a missing-document condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocRelError::NotFound { .. })
    }
}

/// Conversion from DocRelError to ExError
impl From<DocRelError> for ExError {
    fn from(err: DocRelError) -> Self {
        let message = err.to_string();
        match err {
            DocRelError::ScopeMisconfiguration {
                model, association, ..
            } => ExError::new(ExErrorKind::ScopeMisconfiguration)
                .with_model(model)
                .with_association(association)
                .with_op("registry_build")
                .with_message(message),

            DocRelError::DuplicateModel { model } => {
                ExError::new(ExErrorKind::ScopeMisconfiguration)
                    .with_model(model)
                    .with_op("registry_build")
                    .with_message(message)
            }

            DocRelError::UnknownModel { model } => ExError::new(ExErrorKind::UnknownModel)
                .with_model(model)
                .with_message(message),

            DocRelError::UnknownAssociation { model, association } => {
                ExError::new(ExErrorKind::UnknownAssociation)
                    .with_model(model)
                    .with_association(association)
                    .with_message(message)
            }

            DocRelError::AssociationKindMismatch {
                model, association, ..
            } => ExError::new(ExErrorKind::AssociationKindMismatch)
                .with_model(model)
                .with_association(association)
                .with_message(message),

            DocRelError::ValidationFailure { model, .. } => {
                ExError::new(ExErrorKind::ValidationFailure)
                    .with_model(model)
                    .with_message(message)
            }

            DocRelError::NotFound { model, ids } => {
                let ex = ExError::new(ExErrorKind::NotFound)
                    .with_model(model)
                    .with_message(message);
                match ids.first() {
                    Some(id) => ex.with_entity_id(id.as_str()),
                    None => ex,
                }
            }

            DocRelError::DocumentDestroyed { model, id } => ExError::new(ExErrorKind::Destroyed)
                .with_model(model)
                .with_entity_id(id.as_str())
                .with_message(message),

            DocRelError::OwnerNotPersisted { model, op } => {
                ExError::new(ExErrorKind::NotPersisted)
                    .with_model(model)
                    .with_op(op)
                    .with_message(message)
            }

            DocRelError::InvalidField { model, .. } => ExError::new(ExErrorKind::InvalidField)
                .with_model(model)
                .with_message(message),

            DocRelError::PartialFlushFailure {
                association, peer, ..
            } => {
                let ex = ExError::new(ExErrorKind::PartialFlush)
                    .with_association(association)
                    .with_op("flush")
                    .with_message(message);
                match peer {
                    Some(id) => ex.with_entity_id(id.as_str()),
                    None => ex,
                }
            }

            DocRelError::UnknownHandle { handle } => ExError::new(ExErrorKind::Internal)
                .with_entity_id(handle.to_string())
                .with_message(message),

            DocRelError::Persistence { .. } => {
                ExError::new(ExErrorKind::Persistence).with_message(message)
            }

            DocRelError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to DocRelError
impl From<serde_json::Error> for DocRelError {
    fn from(err: serde_json::Error) -> Self {
        DocRelError::Serialization {
            message: err.to_string(),
        }
    }
}
