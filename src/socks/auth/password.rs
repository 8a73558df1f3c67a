//! Username/password authentication handler
//!
//! Implements RFC 1929 username/password authentication for SOCKS5.

use crate::config::SocksConfig;
use crate::error::SocksError;
use crate::socks::codec::{read_auth_user_pass, write_auth_result};
use tokio::io::{AsyncRead, AsyncWrite};

/// Username/password authentication handler
pub struct PasswordAuth;

impl PasswordAuth {
    /// Perform username/password authentication
    ///
    /// Credentials are compared byte for byte. Exactly one status is written
    /// unless the client stream ends first; a rejected client gets no second
    /// attempt.
    pub async fn authenticate<S>(
        stream: &mut S,
        expected_username: &str,
        expected_password: &str,
    ) -> Result<(), SocksError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let creds = match read_auth_user_pass(stream).await {
            Ok(creds) => creds,
            Err(err @ SocksError::Protocol(_)) => {
                write_auth_result(stream, false).await?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let ok = creds.username == expected_username.as_bytes()
            && creds.password == expected_password.as_bytes();
        write_auth_result(stream, ok).await?;

        if ok {
            tracing::debug!("Authentication successful for user: {}", expected_username);
            Ok(())
        } else {
            tracing::debug!(
                "Authentication failed for user: {}",
                String::from_utf8_lossy(&creds.username)
            );
            Err(SocksError::AuthenticationFailed)
        }
    }
}

/// Perform password authentication using SocksConfig
pub async fn authenticate_password<S>(stream: &mut S, config: &SocksConfig) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match (&config.username, &config.password) {
        (Some(username), Some(password)) => {
            PasswordAuth::authenticate(stream, username, password).await
        }
        _ => {
            write_auth_result(stream, false).await?;
            Err(SocksError::AuthenticationFailed)
        }
    }
}
