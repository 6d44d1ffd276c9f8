use gridlink_net::SessionError;
use gridlink_prediction::InputRejected;

/// Errors returned by [`GameServerClient`](crate::GameServerClient) operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Session-level failure (not connected, transport, encoding).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Local input rejected before anything was sent.
    #[error("input rejected: {0}")]
    Input(#[from] InputRejected),
}
