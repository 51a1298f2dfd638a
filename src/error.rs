//! Single flat error enum, in the teacher's style: precise one-line domain
//! variants plus `#[from]` passthroughs for genuine collaborator errors.
//! Every variant that corresponds to a documented `spec.md` §6 error code
//! exposes it via [`Error::error_code`]; everything else is an internal
//! condition a transport layer maps to a bare `5xx`.

/// Numeric `error_code` values from `spec.md` §6, carried in the response
/// body under `error_code` by whatever transport sits on top of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    SubjectNotFound = 40401,
    VersionNotFound = 40402,
    SchemaNotFoundInSubject = 40403,
    DoubleSoftDelete = 40404,
    ModeNotSet = 40409,
    KekNotFound = 40470,
    DekNotFound = 40471,
    DuplicateKek = 40970,
    InvalidSchema = 42201,
    InvalidVersion = 42202,
    InvalidCompatibilityLevel = 42203,
    InvalidMode = 42204,
    OperationNotPermitted = 42205,
    ReferenceExists = 42206,
}

impl ErrorCode {
    /// The HTTP status a transport should answer with for this code.
    /// `spec.md` §7 classes: 422 for client validation, 404 for lookup,
    /// 409 for conflicts/duplicates.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::SubjectNotFound
            | ErrorCode::VersionNotFound
            | ErrorCode::SchemaNotFoundInSubject
            | ErrorCode::DoubleSoftDelete
            | ErrorCode::ModeNotSet
            | ErrorCode::KekNotFound
            | ErrorCode::DekNotFound => 404,
            ErrorCode::DuplicateKek => 409,
            ErrorCode::InvalidSchema
            | ErrorCode::InvalidVersion
            | ErrorCode::InvalidCompatibilityLevel
            | ErrorCode::InvalidMode
            | ErrorCode::OperationNotPermitted
            | ErrorCode::ReferenceExists => 422,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[cfg(feature = "avro")]
    #[error(transparent)]
    Avro(#[from] apache_avro::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "proto")]
    #[error("failed to parse protobuf schema: {0}")]
    ProtobufParse(#[from] protobuf_parse::ParseError),

    #[error("subject '{0}' not found")]
    SubjectNotFound(String),

    #[error("version {0} not found for subject '{1}'")]
    VersionNotFound(i32, String),

    #[error("subject '{0}' exists but has no version matching the given schema")]
    SchemaNotFoundInSubject(String),

    #[error("schema with global id {0} not found")]
    SchemaIdNotFound(u32),

    #[error("subject '{0}' is already soft-deleted")]
    DoubleSoftDelete(String),

    #[error("mode is not explicitly set at the requested scope")]
    ModeNotSet,

    #[error("KEK '{0}' not found")]
    KekNotFound(String),

    #[error("DEK not found for kek '{kek}' subject '{subject}' algorithm '{algorithm:?}'")]
    DekNotFound {
        kek: String,
        subject: String,
        algorithm: crate::types::Algorithm,
    },

    #[error("a KEK named '{0}' already exists")]
    DuplicateKek(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid version literal '{0}'")]
    InvalidVersion(String),

    #[error("invalid compatibility level '{0}'")]
    InvalidCompatibilityLevel(String),

    #[error("invalid mode '{0}'")]
    InvalidMode(String),

    #[error("operation not permitted in current mode: {0}")]
    OperationNotPermitted(String),

    #[error("reference-exists conflict: {0}")]
    ReferenceExists(String),

    #[error("schema is incompatible with {against}: {reason}")]
    CompatibilityViolation { against: String, reason: String },

    #[error("'{0}' is reserved and cannot be used as a subject or schema operation target")]
    GlobalContextMisuse(String),

    #[error("empty schema body")]
    EmptySchemaBody,

    #[error("second alias hop to '{0}' is not permitted (aliases resolve one hop only)")]
    AliasDoubleHop(String),

    #[error("store operation failed: {0}")]
    Store(String),
}

impl Error {
    /// The Confluent numeric error code for this condition, if it has one.
    /// `Store` and passthrough variants have none: they surface as a bare
    /// `5xx` from whatever transport wraps this crate, per `spec.md` §7.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Error::SubjectNotFound(_) => Some(ErrorCode::SubjectNotFound),
            Error::VersionNotFound(_, _) => Some(ErrorCode::VersionNotFound),
            Error::SchemaNotFoundInSubject(_) => Some(ErrorCode::SchemaNotFoundInSubject),
            Error::SchemaIdNotFound(_) => Some(ErrorCode::SchemaNotFoundInSubject),
            Error::DoubleSoftDelete(_) => Some(ErrorCode::DoubleSoftDelete),
            Error::ModeNotSet => Some(ErrorCode::ModeNotSet),
            Error::KekNotFound(_) => Some(ErrorCode::KekNotFound),
            Error::DekNotFound { .. } => Some(ErrorCode::DekNotFound),
            Error::DuplicateKek(_) => Some(ErrorCode::DuplicateKek),
            Error::InvalidSchema(_) => Some(ErrorCode::InvalidSchema),
            Error::InvalidVersion(_) => Some(ErrorCode::InvalidVersion),
            Error::InvalidCompatibilityLevel(_) => Some(ErrorCode::InvalidCompatibilityLevel),
            Error::InvalidMode(_) => Some(ErrorCode::InvalidMode),
            Error::OperationNotPermitted(_) => Some(ErrorCode::OperationNotPermitted),
            Error::ReferenceExists(_) => Some(ErrorCode::ReferenceExists),
            #[cfg(feature = "avro")]
            Error::Avro(_) => Some(ErrorCode::InvalidSchema),
            #[cfg(feature = "proto")]
            Error::ProtobufParse(_) => Some(ErrorCode::InvalidSchema),
            Error::Json(_) => Some(ErrorCode::InvalidSchema),
            Error::CompatibilityViolation { .. }
            | Error::GlobalContextMisuse(_)
            | Error::EmptySchemaBody
            | Error::AliasDoubleHop(_)
            | Error::Store(_) => None,
        }
    }

    /// `true` for the one class that isn't a plain error-code mapping: a
    /// compatibility violation answers `409` with no universally agreed
    /// `error_code` body field; transports decide, this crate just flags
    /// the class.
    pub fn is_compatibility_violation(&self) -> bool {
        matches!(self, Error::CompatibilityViolation { .. })
    }
}
