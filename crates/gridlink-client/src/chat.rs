use gridlink_net::{ChatSend, Connector, OutboundCommand};

use crate::client::GameServerClient;
use crate::error::ClientError;

/// Chat. Incoming messages arrive as
/// [`SessionEvent::ChatMessage`](gridlink_net::SessionEvent::ChatMessage).
pub struct ChatApi<'a, C: Connector> {
    client: &'a GameServerClient<C>,
}

impl<'a, C: Connector> ChatApi<'a, C> {
    pub(crate) fn new(client: &'a GameServerClient<C>) -> Self {
        Self { client }
    }

    /// Post to the configured default channel.
    pub fn send_message(&self, message: &str) -> Result<(), ClientError> {
        let channel = &self.client.config.chat.default_channel;
        self.send_to_channel(message, channel)
    }

    /// Post to `channel`.
    pub fn send_to_channel(&self, message: &str, channel: &str) -> Result<(), ClientError> {
        self.client
            .session
            .send(&OutboundCommand::ChatMessage(ChatSend {
                message: message.to_string(),
                channel: channel.to_string(),
            }))?;
        Ok(())
    }
}
