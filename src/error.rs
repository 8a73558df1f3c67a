//! Error types for Sockrelay
//!
//! This module defines the error taxonomy of the SOCKS5 session and the
//! mapping from each failure onto the reply code sent back to the client.

use std::fmt;
use std::io;
use thiserror::Error;

/// Main error type for Sockrelay operations
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listener could not be bound
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// Configured listen address
        addr: String,
        /// Underlying bind failure
        source: io::Error,
    },
}

/// Why an outbound connection attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The target actively refused the connection
    Refused,
    /// No route to the target network
    NetworkUnreachable,
    /// The target host could not be reached
    HostUnreachable,
    /// The local system denied the connection
    NotAllowed,
    /// The connect timeout elapsed
    TimedOut,
    /// Anything else
    Other,
}

impl From<&io::Error> for ConnectFailure {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectFailure::Refused,
            io::ErrorKind::NetworkUnreachable => ConnectFailure::NetworkUnreachable,
            io::ErrorKind::HostUnreachable | io::ErrorKind::AddrNotAvailable => {
                ConnectFailure::HostUnreachable
            }
            io::ErrorKind::PermissionDenied => ConnectFailure::NotAllowed,
            io::ErrorKind::TimedOut => ConnectFailure::TimedOut,
            _ => ConnectFailure::Other,
        }
    }
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectFailure::Refused => write!(f, "refused"),
            ConnectFailure::NetworkUnreachable => write!(f, "network unreachable"),
            ConnectFailure::HostUnreachable => write!(f, "host unreachable"),
            ConnectFailure::NotAllowed => write!(f, "not allowed"),
            ConnectFailure::TimedOut => write!(f, "timed out"),
            ConnectFailure::Other => write!(f, "failed"),
        }
    }
}

/// SOCKS5 session errors
#[derive(Error, Debug)]
pub enum SocksError {
    /// Malformed or unexpected bytes on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Peer closed the stream before the expected bytes arrived
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    UnsupportedAddressType(u8),

    /// Command not supported
    #[error("Command not supported: {0}")]
    UnsupportedCommand(u8),

    /// No acceptable authentication method
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Authentication failed
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Target domain could not be resolved
    #[error("Failed to resolve {0}")]
    ResolutionFailed(String),

    /// Outbound connection failed
    #[error("Connection to {target} {reason}")]
    ConnectFailed {
        /// Target that was being connected to
        target: String,
        /// Classified failure reason
        reason: ConnectFailure,
    },

    /// A handshake stage did not complete in time
    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// Transport-level failure on the client stream
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for SocksError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            SocksError::ConnectionClosed
        } else {
            SocksError::Io(err)
        }
    }
}

impl SocksError {
    /// The single closest reply code for this failure
    pub fn reply_code(&self) -> Socks5ReplyCode {
        match self {
            SocksError::UnsupportedAddressType(_) => Socks5ReplyCode::AddressTypeNotSupported,
            SocksError::UnsupportedCommand(_) => Socks5ReplyCode::CommandNotSupported,
            SocksError::ResolutionFailed(_) => Socks5ReplyCode::HostUnreachable,
            SocksError::ConnectFailed { reason, .. } => (*reason).into(),
            _ => Socks5ReplyCode::GeneralFailure,
        }
    }

    /// Whether the client stream itself failed, leaving nothing to report on
    pub fn is_transport(&self) -> bool {
        matches!(self, SocksError::ConnectionClosed | SocksError::Io(_))
    }
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for Socks5ReplyCode {
    type Error = SocksError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Socks5ReplyCode::Succeeded),
            0x01 => Ok(Socks5ReplyCode::GeneralFailure),
            0x02 => Ok(Socks5ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(Socks5ReplyCode::NetworkUnreachable),
            0x04 => Ok(Socks5ReplyCode::HostUnreachable),
            0x05 => Ok(Socks5ReplyCode::ConnectionRefused),
            0x06 => Ok(Socks5ReplyCode::TtlExpired),
            0x07 => Ok(Socks5ReplyCode::CommandNotSupported),
            0x08 => Ok(Socks5ReplyCode::AddressTypeNotSupported),
            _ => Err(SocksError::Protocol(format!("unknown reply code {}", value))),
        }
    }
}

impl From<ConnectFailure> for Socks5ReplyCode {
    fn from(reason: ConnectFailure) -> Self {
        match reason {
            ConnectFailure::Refused => Socks5ReplyCode::ConnectionRefused,
            ConnectFailure::NetworkUnreachable => Socks5ReplyCode::NetworkUnreachable,
            ConnectFailure::HostUnreachable => Socks5ReplyCode::HostUnreachable,
            ConnectFailure::NotAllowed => Socks5ReplyCode::ConnectionNotAllowed,
            ConnectFailure::TimedOut => Socks5ReplyCode::TtlExpired,
            ConnectFailure::Other => Socks5ReplyCode::GeneralFailure,
        }
    }
}

impl From<&io::Error> for Socks5ReplyCode {
    fn from(err: &io::Error) -> Self {
        ConnectFailure::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks5_reply_code_from_u8_valid() {
        for value in 0x00..=0x08u8 {
            let code = Socks5ReplyCode::try_from(value).unwrap();
            assert_eq!(u8::from(code), value);
        }
    }

    #[test]
    fn test_socks5_reply_code_from_u8_invalid() {
        assert!(Socks5ReplyCode::try_from(0xFF).is_err());
        assert!(Socks5ReplyCode::try_from(0x09).is_err());
    }

    #[test]
    fn test_socks5_reply_code_to_u8() {
        assert_eq!(u8::from(Socks5ReplyCode::Succeeded), 0x00);
        assert_eq!(u8::from(Socks5ReplyCode::HostUnreachable), 0x04);
        assert_eq!(u8::from(Socks5ReplyCode::ConnectionRefused), 0x05);
        assert_eq!(u8::from(Socks5ReplyCode::TtlExpired), 0x06);
        assert_eq!(u8::from(Socks5ReplyCode::CommandNotSupported), 0x07);
        assert_eq!(u8::from(Socks5ReplyCode::AddressTypeNotSupported), 0x08);
    }

    #[test]
    fn test_socks5_reply_code_from_io_error() {
        let cases = [
            (io::ErrorKind::ConnectionRefused, Socks5ReplyCode::ConnectionRefused),
            (io::ErrorKind::NetworkUnreachable, Socks5ReplyCode::NetworkUnreachable),
            (io::ErrorKind::HostUnreachable, Socks5ReplyCode::HostUnreachable),
            (io::ErrorKind::AddrNotAvailable, Socks5ReplyCode::HostUnreachable),
            (io::ErrorKind::PermissionDenied, Socks5ReplyCode::ConnectionNotAllowed),
            (io::ErrorKind::TimedOut, Socks5ReplyCode::TtlExpired),
            (io::ErrorKind::Other, Socks5ReplyCode::GeneralFailure),
        ];

        for (kind, expected) in cases {
            let err = io::Error::new(kind, "test");
            assert_eq!(Socks5ReplyCode::from(&err), expected, "{:?}", kind);
        }
    }

    #[test]
    fn test_socks_error_reply_code() {
        assert_eq!(
            SocksError::UnsupportedCommand(2).reply_code(),
            Socks5ReplyCode::CommandNotSupported
        );
        assert_eq!(
            SocksError::UnsupportedAddressType(9).reply_code(),
            Socks5ReplyCode::AddressTypeNotSupported
        );
        assert_eq!(
            SocksError::ResolutionFailed("nowhere.invalid".to_string()).reply_code(),
            Socks5ReplyCode::HostUnreachable
        );
        assert_eq!(
            SocksError::ConnectFailed {
                target: "127.0.0.1:9".to_string(),
                reason: ConnectFailure::TimedOut,
            }
            .reply_code(),
            Socks5ReplyCode::TtlExpired
        );
        assert_eq!(
            SocksError::Protocol("bad".to_string()).reply_code(),
            Socks5ReplyCode::GeneralFailure
        );
        assert_eq!(
            SocksError::Timeout("request").reply_code(),
            Socks5ReplyCode::GeneralFailure
        );
    }

    #[test]
    fn test_socks_error_from_io() {
        let err: SocksError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(err, SocksError::ConnectionClosed));
        assert!(err.is_transport());

        let err: SocksError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert!(matches!(err, SocksError::Io(_)));
        assert!(err.is_transport());

        assert!(!SocksError::AuthenticationFailed.is_transport());
    }

    #[test]
    fn test_socks_error_display() {
        assert_eq!(
            SocksError::UnsupportedCommand(0xFF).to_string(),
            "Command not supported: 255"
        );
        assert_eq!(
            SocksError::NoAcceptableMethod.to_string(),
            "No acceptable authentication method"
        );
        assert_eq!(
            SocksError::ConnectFailed {
                target: "10.0.0.1:80".to_string(),
                reason: ConnectFailure::Refused,
            }
            .to_string(),
            "Connection to 10.0.0.1:80 refused"
        );
        assert_eq!(
            SocksError::Timeout("greeting").to_string(),
            "Timed out during greeting"
        );
    }

    #[test]
    fn test_proxy_error_display() {
        let err = ProxyError::Bind {
            addr: "127.0.0.1:1080".to_string(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("Failed to bind to 127.0.0.1:1080"));

        let err: ProxyError = io::Error::from(io::ErrorKind::NotConnected).into();
        assert!(matches!(err, ProxyError::Io(_)));
        assert_eq!(
            ProxyError::Config("bad".to_string()).to_string(),
            "Configuration error: bad"
        );
    }
}
