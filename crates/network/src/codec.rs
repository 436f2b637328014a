//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! All synchronizer messages are SBOR-encoded then LZ4-compressed:
//!
//! ```text
//! [LZ4 compressed SBOR payload]
//! ```
//!
//! # Tag-Based Type Dispatch
//!
//! The message type is determined by the protocol tag the transport carries
//! next to the payload, not by a field inside the message. The reactor
//! hands both to [`decode_message`].

use crate::wire;
use syncline_messages::{
    BlockPartMessage, RoundStateMessage, SyncMessage, VerifyError, VoteListMessage,
};
use syncline_types::Protocol;
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("message too short")]
    MessageTooShort,

    #[error("SBOR decode error: {0}")]
    SborDecode(String),

    #[error("SBOR encode error: {0}")]
    SborEncode(String),

    #[error("decompression error: {0}")]
    Decompress(String),

    #[error("unknown protocol tag: {0:#06x}")]
    UnknownProtocol(u16),
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    BlockPart(BlockPartMessage),
    RoundState(RoundStateMessage),
    VoteList(VoteListMessage),
}

impl Message {
    /// The protocol tag this message travels under.
    pub fn protocol(&self) -> Protocol {
        match self {
            Message::BlockPart(_) => Protocol::BlockPart,
            Message::RoundState(_) => Protocol::RoundState,
            Message::VoteList(_) => Protocol::VoteList,
        }
    }

    /// Run the message's shape checks.
    pub fn verify(&self) -> Result<(), VerifyError> {
        match self {
            Message::BlockPart(msg) => msg.verify(),
            Message::RoundState(msg) => msg.verify(),
            Message::VoteList(msg) => msg.verify(),
        }
    }
}

/// Encode an outbound message to wire format.
///
/// SBOR-encodes the message then LZ4-compresses it.
pub fn encode_message<M: SyncMessage>(message: &M) -> Result<Vec<u8>, CodecError> {
    let sbor_bytes =
        sbor::basic_encode(message).map_err(|e| CodecError::SborEncode(format!("{:?}", e)))?;
    Ok(wire::compress(&sbor_bytes))
}

/// Decode a message from a raw numeric protocol tag.
///
/// Transports that carry the tag as a bare `u16` resolve it here; unknown
/// tags are a decode error the reactor reports back for peer penalties.
pub fn decode_raw(protocol_id: u16, data: &[u8]) -> Result<Message, CodecError> {
    let protocol =
        Protocol::from_id(protocol_id).ok_or(CodecError::UnknownProtocol(protocol_id))?;
    decode_message(protocol, data)
}

/// Decode a message from wire format based on its protocol tag.
///
/// LZ4-decompresses then SBOR-decodes the message.
pub fn decode_message(protocol: Protocol, data: &[u8]) -> Result<Message, CodecError> {
    if data.is_empty() {
        return Err(CodecError::MessageTooShort);
    }

    let payload = wire::decompress(data).map_err(|e| CodecError::Decompress(e.to_string()))?;

    match protocol {
        Protocol::BlockPart => {
            let msg: BlockPartMessage = sbor::basic_decode(&payload)
                .map_err(|e| CodecError::SborDecode(format!("{:?}", e)))?;
            Ok(Message::BlockPart(msg))
        }
        Protocol::RoundState => {
            let msg: RoundStateMessage = sbor::basic_decode(&payload)
                .map_err(|e| CodecError::SborDecode(format!("{:?}", e)))?;
            Ok(Message::RoundState(msg))
        }
        Protocol::VoteList => {
            let msg: VoteListMessage = sbor::basic_decode(&payload)
                .map_err(|e| CodecError::SborDecode(format!("{:?}", e)))?;
            Ok(Message::VoteList(msg))
        }
    }
}
