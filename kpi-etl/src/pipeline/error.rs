//! Fatal error taxonomy for a pipeline run

/// Every way a run can fail.
///
/// Per-sheet parse failures are recovered inside the normalizer and never
/// surface here; they only matter when they leave the dataset empty.
#[derive(Debug)]
pub enum PipelineError {
    /// The secret store has no entry for the configured principal
    CredentialUnavailable { service: String, principal: String },
    /// The identity provider rejected the exchange or returned no token
    AuthenticationFailed { detail: String },
    /// The document store answered with a non-success status, or the request
    /// itself failed before a status existed
    RemoteFetchFailed { status: Option<u16>, detail: String },
    /// No sheet survived normalization
    EmptyDataset,
    StagingTruncateFailed { detail: String },
    StagingAppendFailed { detail: String },
    TransformProcedureFailed { detail: String },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::CredentialUnavailable { service, principal } => write!(
                f,
                "no secret found for principal '{principal}' under service '{service}'"
            ),
            PipelineError::AuthenticationFailed { detail } => {
                write!(f, "identity provider rejected the token exchange: {detail}")
            }
            PipelineError::RemoteFetchFailed {
                status: Some(status),
                detail,
            } => write!(f, "document store returned HTTP {status}: {detail}"),
            PipelineError::RemoteFetchFailed {
                status: None,
                detail,
            } => write!(f, "workbook download failed: {detail}"),
            PipelineError::EmptyDataset => {
                write!(f, "workbook contained no non-empty sheets")
            }
            PipelineError::StagingTruncateFailed { detail } => {
                write!(f, "staging truncate failed: {detail}")
            }
            PipelineError::StagingAppendFailed { detail } => {
                write!(f, "staging append failed: {detail}")
            }
            PipelineError::TransformProcedureFailed { detail } => {
                write!(f, "transform procedure failed: {detail}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}
