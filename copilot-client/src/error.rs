use thiserror::Error;

pub type CopilotResult<T> = Result<T, CopilotError>;

#[derive(Debug, Error)]
pub enum CopilotError {
    /// A frame that is neither `pong` nor a JSON message.
    #[error("undecodable message: {0}")]
    Decode(#[from] serde_json::Error),

    /// The driver task is gone; nothing more can be sent.
    #[error("copilot channel is closed")]
    ChannelClosed,

    #[error("configuration error: {0}")]
    Config(String),
}
