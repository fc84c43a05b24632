//! Command failure taxonomy.

use crate::messages::CommandResponse;

/// Ways issuing a command can fail locally, before or instead of a reply.
///
/// Each variant is contained to the request it belongs to; none of them is
/// allowed to escape `send_command` as a fault — they all collapse into a
/// failed [`CommandResponse`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// No active connection for the target client.
    #[error("client not connected")]
    NotConnected,

    /// The transport rejected the outgoing envelope. Treated as a
    /// disconnection: a duplex channel that cannot accept a send is dead.
    #[error("failed to send command")]
    SendFailed,

    /// No matching response arrived within the deadline. Says nothing about
    /// whether the command ran remotely — delivery is at-most-once.
    #[error("command timed out")]
    Timeout,
}

impl From<CommandError> for CommandResponse {
    fn from(err: CommandError) -> Self {
        CommandResponse::fail(err.to_string())
    }
}
