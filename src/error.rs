use thiserror::Error;

/// Failure conditions surfaced by [`Session`](crate::Session) and
/// [`ResultCursor`](crate::ResultCursor).
///
/// Only conditions that prevent returning a promised value become an
/// `Error`. Advisory failures (a liveness probe that does not answer, a
/// numeric field that does not parse) are logged and the operation
/// degrades instead.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation that must produce a value was invoked on a session
    /// without a live connection.
    #[error("session [{id}] is not connected")]
    NotConnected { id: String },

    /// The server rejected a statement.
    #[error("statement execution failed (errno {code}): {message}")]
    Execute { code: u16, message: String },

    /// A field index outside `0..field_count`.
    #[error("field index {index} out of range, the result set has {count} fields")]
    FieldIndex { index: usize, count: usize },

    /// A field name absent from the result set metadata.
    #[error("unknown field name `{name}`")]
    FieldName { name: String },

    /// A row accessor was used while no current row exists, either before
    /// the first `next()`, after exhaustion, or on an affected-rows result.
    #[error("no current row, call next() first")]
    NoCurrentRow,
}

impl Error {
    pub(crate) fn execute(error: &mysql::Error) -> Self {
        let (code, message) = server_detail(error);
        Error::Execute { code, message }
    }
}

/// Extracts the server errno and message, falling back to errno 0 for
/// transport-level failures that never reached the server.
pub(crate) fn server_detail(error: &mysql::Error) -> (u16, String) {
    match error {
        mysql::Error::MySqlError(e) => (e.code, e.message.clone()),
        other => (0, other.to_string()),
    }
}
