use thiserror::Error;

/// Result type alias using AuditError
pub type Result<T> = std::result::Result<T, AuditError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure in the audit pipeline is classified into one of these kinds.
/// The per-identity isolation in the driver keys off the kind: `Encoding`
/// skips the identity, network kinds become `CommitFailure`, and only
/// `Config` ever terminates the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditErrorKind {
    // Snapshot handling
    /// Snapshot has no canonical representation (too deep, wrong root shape)
    Encoding,
    /// The snapshot source could not produce a batch
    Source,

    // Ledger interaction
    /// Timeout or connectivity failure; safe to retry
    TransientNetwork,
    /// Non-success status or malformed body; retrying will not help
    UnexpectedResponse,
    /// A ledger operation failed for good for one identity in one cycle
    CommitFailure,

    // Process plumbing
    Config,
    Io,
    Serialization,

    // Internal
    Internal,
}

impl AuditErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            AuditErrorKind::Encoding => "ERR_ENCODING",
            AuditErrorKind::Source => "ERR_SOURCE",
            AuditErrorKind::TransientNetwork => "ERR_TRANSIENT_NETWORK",
            AuditErrorKind::UnexpectedResponse => "ERR_UNEXPECTED_RESPONSE",
            AuditErrorKind::CommitFailure => "ERR_COMMIT_FAILURE",
            AuditErrorKind::Config => "ERR_CONFIG",
            AuditErrorKind::Io => "ERR_IO",
            AuditErrorKind::Serialization => "ERR_SERIALIZATION",
            AuditErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether a ledger call failing with this kind may be attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuditErrorKind::TransientNetwork)
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus the context an
/// operator needs: which pipeline stage failed, for which identity, after how
/// many ledger attempts.
#[derive(Debug, Clone)]
pub struct AuditError {
    kind: AuditErrorKind,
    op: Option<String>,
    identity: Option<String>,
    itemtype: Option<String>,
    attempts: Option<u32>,
    message: String,
    source: Option<Box<AuditError>>,
}

impl AuditError {
    /// Create a new error with the specified kind
    pub fn new(kind: AuditErrorKind) -> Self {
        Self {
            kind,
            op: None,
            identity: None,
            itemtype: None,
            attempts: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the identity of the audited object
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Add the itemtype of the document involved
    pub fn with_itemtype(mut self, itemtype: impl Into<String>) -> Self {
        self.itemtype = Some(itemtype.into());
        self
    }

    /// Record how many ledger attempts were made
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: AuditError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> AuditErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the identity context, if any
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Get the itemtype context, if any
    pub fn itemtype(&self) -> Option<&str> {
        self.itemtype.as_deref()
    }

    /// Get the number of ledger attempts, if recorded
    pub fn attempts(&self) -> Option<u32> {
        self.attempts
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&AuditError> {
        self.source.as_deref()
    }

    /// Walk the source chain and return the innermost cause
    pub fn root_cause(&self) -> &AuditError {
        let mut current = self;
        while let Some(next) = current.source_error() {
            current = next;
        }
        current
    }
}

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(identity) = &self.identity {
            write!(f, " (identity: {})", identity)?;
        }
        if let Some(itemtype) = &self.itemtype {
            write!(f, " (itemtype: {})", itemtype)?;
        }
        if let Some(attempts) = self.attempts {
            write!(f, " (attempts: {})", attempts)?;
        }
        if let Some(source) = &self.source {
            write!(f, "; caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for AuditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Failures of the canonicalization step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanonicalError {
    /// Nesting deeper than the configured limit
    #[error("snapshot nesting exceeds maximum depth {max_depth} at {path}")]
    DepthExceeded { max_depth: usize, path: String },

    /// A state document needs a mapping at the root
    #[error("snapshot root must be a mapping, found {found}")]
    NonMappingRoot { found: &'static str },

    /// Malformed exclusion or ignore path pattern
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPathPattern { pattern: String, reason: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl From<serde_json::Error> for CanonicalError {
    fn from(err: serde_json::Error) -> Self {
        CanonicalError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<CanonicalError> for AuditError {
    fn from(err: CanonicalError) -> Self {
        match err {
            CanonicalError::DepthExceeded { .. } | CanonicalError::NonMappingRoot { .. } => {
                AuditError::new(AuditErrorKind::Encoding)
                    .with_op("canonicalize")
                    .with_message(err.to_string())
            }
            CanonicalError::InvalidPathPattern { .. } => AuditError::new(AuditErrorKind::Config)
                .with_op("parse_path_pattern")
                .with_message(err.to_string()),
            CanonicalError::Serialization { .. } => {
                AuditError::new(AuditErrorKind::Serialization)
                    .with_op("canonicalize")
                    .with_message(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::new(AuditErrorKind::Serialization).with_message(err.to_string())
    }
}
