use uuid::Uuid;

use parlor_common::player::Identity;

pub const NICKNAME_MAX_LEN: usize = 24;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("nickname must be 1-{NICKNAME_MAX_LEN} characters")]
    InvalidNickname,
}

/// Seam for the external identity provider. The gateway authenticates a
/// connection through this trait before any room logic sees it.
pub trait Authenticator: Send + Sync {
    fn authenticate(
        &self,
        nickname: &str,
        avatar_id: Option<String>,
    ) -> Result<Identity, AuthError>;
}

/// Default provider: mints a guest identity per connection, validating
/// only the nickname shape.
pub struct GuestAuthenticator;

impl Authenticator for GuestAuthenticator {
    fn authenticate(
        &self,
        nickname: &str,
        avatar_id: Option<String>,
    ) -> Result<Identity, AuthError> {
        let nickname = nickname.trim();
        if nickname.is_empty() || nickname.chars().count() > NICKNAME_MAX_LEN {
            return Err(AuthError::InvalidNickname);
        }
        Ok(Identity {
            id: Uuid::new_v4(),
            nickname: nickname.to_string(),
            avatar_id: avatar_id.unwrap_or_else(|| "default".into()),
            is_admin: false,
        })
    }
}
