use std::fmt;

use thiserror::Error;

use crate::model::MutationIntent;
use crate::remote::RemoteError;

/// Stable, machine-readable error codes. Renderers match on these, never on
/// the message text.
pub mod error_code {
    pub const PRECONDITION_NOT_MET: &str = "PRECONDITION_NOT_MET";
    pub const REMOTE_MUTATION_FAILED: &str = "REMOTE_MUTATION_FAILED";
    pub const REMOTE_QUERY_FAILED: &str = "REMOTE_QUERY_FAILED";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const POST_NOT_MOUNTED: &str = "POST_NOT_MOUNTED";
}

/// Why an interaction was refused before anything happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Nobody is signed in.
    NoViewer,
    /// Comment text is empty after trimming.
    EmptyComment,
    /// Post has neither text nor an image.
    EmptyPost,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Precondition::NoViewer => "no viewer signed in",
            Precondition::EmptyComment => "comment is empty",
            Precondition::EmptyPost => "post has no text or image",
        })
    }
}

#[derive(Error, Debug)]
pub enum FeedError {
    /// Nothing changed locally and nothing was sent.
    #[error("precondition not met: {0}")]
    PreconditionNotMet(Precondition),

    /// The remote write was rejected; local state has been reverted.
    #[error("{intent} failed: {source}")]
    RemoteMutationFailed {
        intent: MutationIntent,
        #[source]
        source: RemoteError,
    },

    /// A list fetch failed; the affected view keeps its previous contents.
    #[error("query on {table} failed: {source}")]
    RemoteQueryFailed {
        table: String,
        #[source]
        source: RemoteError,
    },

    #[error("{0}")]
    Validation(String),

    #[error("post {0} is not mounted")]
    PostNotMounted(String),
}

impl FeedError {
    pub(crate) fn query(table: &str, source: RemoteError) -> Self {
        FeedError::RemoteQueryFailed {
            table: table.to_string(),
            source,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            FeedError::PreconditionNotMet(_) => error_code::PRECONDITION_NOT_MET,
            FeedError::RemoteMutationFailed { .. } => error_code::REMOTE_MUTATION_FAILED,
            FeedError::RemoteQueryFailed { .. } => error_code::REMOTE_QUERY_FAILED,
            FeedError::Validation(_) => error_code::VALIDATION_FAILED,
            FeedError::PostNotMounted(_) => error_code::POST_NOT_MOUNTED,
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, FeedError::PreconditionNotMet(_))
    }
}
