//! SOCKS5 protocol constants
//!
//! Defines all constants used in the SOCKS5 protocol implementation.

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

/// SOCKS5 authentication sub-negotiation version
pub const SOCKS5_AUTH_VERSION: u8 = 0x01;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// GSSAPI authentication (not implemented)
pub const SOCKS5_AUTH_METHOD_GSSAPI: u8 = 0x01;
/// Username/password authentication
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Username/password sub-negotiation status
/// Credentials accepted
pub const SOCKS5_AUTH_STATUS_SUCCESS: u8 = 0x00;
/// Credentials rejected
pub const SOCKS5_AUTH_STATUS_FAILURE: u8 = 0x01;

// Commands
/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command (not implemented)
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command (not implemented)
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

/// Length of every reply this server writes: header, IPv4 bound address, port
pub const SOCKS5_REPLY_LEN: usize = 10;
