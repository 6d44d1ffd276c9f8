//! Client networking: JSON wire protocol, transports, event dispatch,
//! heartbeat, action sequencing and the session lifecycle.

pub mod liveness;
pub mod messages;
pub mod routing;
pub mod sequencer;
pub mod session;
pub mod transport;

pub use liveness::LivenessMonitor;
pub use messages::{
    ActionType, ChatMessage, ChatSend, Connected, GameAction, InboundMessage, MatchFound,
    MatchmakingRequest, MoveDelta, OutboundCommand, PlayerId, PlayerSnapshot, ProtocolError,
    StateUpdate, WorldState, decode_inbound, encode_command,
};
pub use routing::{
    DisconnectReason, Dispatcher, EventHandler, EventTag, SessionEvent, SessionFault,
};
pub use sequencer::ActionSequencer;
pub use session::{
    ConnectionState, ConnectionStateWatch, DEFAULT_HEARTBEAT_INTERVAL, Session, SessionError,
    SessionOptions,
};
pub use transport::{Connector, Transport, TransportError, WsConnector, WsTransport};
