use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::config::SessionConfig;
use crate::domain::Actor;

/// Bearer credential for the payout backend.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn bearer_token(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<SecretString> for Credential {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Seam to whatever issues and holds the signed-in session.
pub trait SessionProvider: Send + Sync {
    fn credential(&self) -> Option<Credential>;
    fn actor(&self) -> Actor;
}

#[derive(Clone, Debug)]
pub struct StaticSession {
    credential: Option<Credential>,
    actor: Actor,
}

impl StaticSession {
    pub fn new(credential: Option<Credential>, actor: Actor) -> Self {
        Self { credential, actor }
    }

    pub fn signed_out(actor: Actor) -> Self {
        Self { credential: None, actor }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            credential: config.token.clone().map(Credential::from),
            actor: Actor::new(config.user.clone(), config.role.clone()),
        }
    }
}

impl SessionProvider for StaticSession {
    fn credential(&self) -> Option<Credential> {
        self.credential.clone()
    }

    fn actor(&self) -> Actor {
        self.actor.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{Credential, SessionProvider, StaticSession};
    use crate::domain::Actor;

    #[test]
    fn credential_debug_does_not_leak_token() {
        let credential = Credential::new("tok-secret-123");
        assert_eq!(credential.bearer_token(), "tok-secret-123");
        assert!(!format!("{credential:?}").contains("tok-secret-123"));
    }

    #[test]
    fn signed_out_session_has_no_credential() {
        let session = StaticSession::signed_out(Actor::manager("m-1"));
        assert!(session.credential().is_none());
        assert!(session.actor().is_manager());
    }
}
