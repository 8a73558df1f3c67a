//! SOCKS5 authentication module
//!
//! Selects an authentication method from the client's offer and runs
//! the username/password sub-negotiation when it is chosen.

mod password;

pub use password::{authenticate_password, PasswordAuth};

use super::codec::write_method_selection;
use super::consts::*;
use crate::config::SocksConfig;
use crate::error::SocksError;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Authentication method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    None,
    /// Username/password authentication
    Password,
}

impl AuthMethod {
    /// Convert to SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::None => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::Password => SOCKS5_AUTH_METHOD_PASSWORD,
        }
    }

    /// Parse from SOCKS5 method byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_AUTH_METHOD_NONE => Some(AuthMethod::None),
            SOCKS5_AUTH_METHOD_PASSWORD => Some(AuthMethod::Password),
            _ => None,
        }
    }
}

/// Select the authentication method the configured policy demands
///
/// A server requiring credentials only accepts username/password; an open
/// server only accepts no-auth. Anything else yields `None`.
pub fn select_auth_method(methods: &[u8], config: &SocksConfig) -> Option<AuthMethod> {
    let wanted = if config.auth_required {
        AuthMethod::Password
    } else {
        AuthMethod::None
    };

    methods.contains(&wanted.to_byte()).then_some(wanted)
}

/// Negotiate the authentication method and authenticate the client
///
/// Writes exactly one method selection. When no offered method is usable the
/// selection is `0xFF` and [`SocksError::NoAcceptableMethod`] is returned
/// without reading anything further.
pub async fn negotiate<S>(
    stream: &mut S,
    methods: &[u8],
    config: &SocksConfig,
) -> Result<AuthMethod, SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let selected = select_auth_method(methods, config);

    write_method_selection(
        stream,
        selected
            .map(AuthMethod::to_byte)
            .unwrap_or(SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE),
    )
    .await?;

    let method = selected.ok_or(SocksError::NoAcceptableMethod)?;
    debug!("Selected authentication method: {:?}", method);

    if method == AuthMethod::Password {
        authenticate_password(stream, config).await?;
    }

    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn password_config() -> SocksConfig {
        SocksConfig {
            auth_required: true,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_auth_method_bytes() {
        assert_eq!(AuthMethod::None.to_byte(), SOCKS5_AUTH_METHOD_NONE);
        assert_eq!(AuthMethod::Password.to_byte(), SOCKS5_AUTH_METHOD_PASSWORD);
        assert_eq!(AuthMethod::from_byte(2), Some(AuthMethod::Password));
        assert_eq!(AuthMethod::from_byte(SOCKS5_AUTH_METHOD_GSSAPI), None);
    }

    #[test]
    fn test_select_auth_method_open_policy() {
        let config = SocksConfig::default();

        let methods = vec![SOCKS5_AUTH_METHOD_PASSWORD, SOCKS5_AUTH_METHOD_NONE];
        assert_eq!(select_auth_method(&methods, &config), Some(AuthMethod::None));

        let methods = vec![SOCKS5_AUTH_METHOD_PASSWORD];
        assert_eq!(select_auth_method(&methods, &config), None);

        assert_eq!(select_auth_method(&[], &config), None);
    }

    #[test]
    fn test_select_auth_method_auth_required() {
        let config = password_config();

        let methods = vec![SOCKS5_AUTH_METHOD_NONE, SOCKS5_AUTH_METHOD_PASSWORD];
        assert_eq!(
            select_auth_method(&methods, &config),
            Some(AuthMethod::Password)
        );

        let methods = vec![SOCKS5_AUTH_METHOD_NONE];
        assert_eq!(select_auth_method(&methods, &config), None);
    }

    #[tokio::test]
    async fn test_negotiate_no_auth() {
        let mut stream = Builder::new()
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
            .build();

        let method = negotiate(&mut stream, &[SOCKS5_AUTH_METHOD_NONE], &SocksConfig::default())
            .await
            .unwrap();
        assert_eq!(method, AuthMethod::None);
    }

    #[tokio::test]
    async fn test_negotiate_rejects_without_reading() {
        // No reads are scripted: the negotiator must stop after the 0xFF selection.
        let mut stream = Builder::new()
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE])
            .build();

        let err = negotiate(&mut stream, &[SOCKS5_AUTH_METHOD_NONE], &password_config())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::NoAcceptableMethod));
    }

    #[tokio::test]
    async fn test_negotiate_password_success() {
        let mut stream = Builder::new()
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_PASSWORD])
            .read(&[SOCKS5_AUTH_VERSION, 4, b'u', b's', b'e', b'r', 4, b'p', b'a', b's', b's'])
            .write(&[SOCKS5_AUTH_VERSION, SOCKS5_AUTH_STATUS_SUCCESS])
            .build();

        let method = negotiate(
            &mut stream,
            &[SOCKS5_AUTH_METHOD_NONE, SOCKS5_AUTH_METHOD_PASSWORD],
            &password_config(),
        )
        .await
        .unwrap();
        assert_eq!(method, AuthMethod::Password);
    }

    #[tokio::test]
    async fn test_negotiate_password_failure() {
        let mut stream = Builder::new()
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_PASSWORD])
            .read(&[SOCKS5_AUTH_VERSION, 4, b'u', b's', b'e', b'r', 3, b'b', b'a', b'd'])
            .write(&[SOCKS5_AUTH_VERSION, SOCKS5_AUTH_STATUS_FAILURE])
            .build();

        let err = negotiate(&mut stream, &[SOCKS5_AUTH_METHOD_PASSWORD], &password_config())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::AuthenticationFailed));
    }
}
