use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds per the propagation policy: invariant violations inside CRDT
/// application are fatal for the current transaction, network/cancellation
/// failures are recoverable at the caller.
#[derive(Error, Debug)]
pub enum Error {
    #[error("document is not activated")]
    NotActivated,
    #[error("document is not attached")]
    NotAttached,
    #[error("document is not detached")]
    NotDetached,
    #[error("document has been removed")]
    DocumentRemoved,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("position out of range: {0}")]
    OutOfRange(String),
    #[error("parent not found: {0:?}")]
    ParentNotFound(crate::time::TimeTicket),
    #[error("wrong parent kind: expected {expected}, found {found}")]
    WrongParentKind {
        expected: &'static str,
        found: &'static str,
    },
    #[error("invariant violation: {0}")]
    Unexpected(String),
    #[error("rpc failure: {0}")]
    RpcFailure(String),
    #[error("operation timed out")]
    Timeout,
    #[error("operation canceled")]
    Canceled,
}
