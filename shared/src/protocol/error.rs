use thiserror::Error;

/// Errors that can occur while interpreting inbound wire values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Broadcast discriminator is not one of the known change kinds
    #[error("Unknown broadcast kind '{kind}'. Expected one of: created, updated, deletedOne, deletedAll")]
    UnknownBroadcastKind {
        kind: String,
    },
}
