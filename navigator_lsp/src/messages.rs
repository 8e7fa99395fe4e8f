//! Message types exchanged between the session thread and its owner.

use lsp_types::MessageType;

/// Requests sent from the owning thread into the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequest {
    /// Ask the server to shut down and the loop to wind down.
    Shutdown,
}

/// Events reported by the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server answered `initialize` and the handshake completed.
    Ready {
        /// Summary of the capabilities the server advertised.
        capabilities: String,
    },
    /// The server process ended.
    Exited { code: Option<i32> },
    /// Server log output, from `window/logMessage` traffic or stderr.
    Log { level: LogLevel, message: String },
}

/// Log level for server messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Log,
}

impl From<MessageType> for LogLevel {
    fn from(typ: MessageType) -> Self {
        match typ {
            MessageType::ERROR => Self::Error,
            MessageType::WARNING => Self::Warning,
            MessageType::INFO => Self::Info,
            _ => Self::Log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_message_types() {
        assert_eq!(LogLevel::from(MessageType::ERROR), LogLevel::Error);
        assert_eq!(LogLevel::from(MessageType::WARNING), LogLevel::Warning);
        assert_eq!(LogLevel::from(MessageType::INFO), LogLevel::Info);
        assert_eq!(LogLevel::from(MessageType::LOG), LogLevel::Log);
    }
}
