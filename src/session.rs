use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use crate::error::{BirdError, Result};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl Debug for SessionTokens {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionTokens { .. }")
    }
}

/// Claims carried in the payload of an ID token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdClaims {
    pub sub: String,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

pub fn decode_claims(token: &str) -> Result<IdClaims> {
    let payload = token.split('.').nth(1)
        .ok_or_else(|| BirdError::validation("token is not a JWT"))?;
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload)
        .map_err(|e| BirdError::validation(format!("token payload is not base64url: {}", e)))?;
    let claims = serde_json::from_slice(&bytes)?;
    Ok(claims)
}

pub trait SessionStore {
    async fn load(&self) -> Result<Option<SessionTokens>>;
    async fn save(&mut self, tokens: &SessionTokens) -> Result<()>;
    async fn clear(&mut self) -> Result<()>;
}

#[cfg(unix)]
const SESSION_FILE_MODE: u32 = 0o600;

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionTokens>> {
        if !tokio::fs::try_exists(&self.path).await.map_err(BirdError::SessionIo)? {
            return Ok(None);
        }
        let file_str = tokio::fs::read_to_string(&self.path).await
            .map_err(BirdError::SessionIo)?;
        if file_str.trim().is_empty() {
            return Ok(None);
        }
        let tokens = serde_json::from_str(&file_str)?;
        Ok(Some(tokens))
    }

    /// Writes the tokens readable by the owner only.
    async fn save(&mut self, tokens: &SessionTokens) -> Result<()> {
        let serialized = serde_json::to_string(tokens)?;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(SESSION_FILE_MODE);
        let mut file = options.open(&self.path).await.map_err(BirdError::SessionIo)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // mode() only applies when the file is created
            file.set_permissions(std::fs::Permissions::from_mode(SESSION_FILE_MODE)).await
                .map_err(BirdError::SessionIo)?;
        }
        file.write_all(serialized.as_bytes()).await.map_err(BirdError::SessionIo)?;
        file.flush().await.map_err(BirdError::SessionIo)?;
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BirdError::SessionIo(e)),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    tokens: Option<SessionTokens>,
}

impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<Option<SessionTokens>> {
        Ok(self.tokens.clone())
    }

    async fn save(&mut self, tokens: &SessionTokens) -> Result<()> {
        self.tokens = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        self.tokens = None;
        Ok(())
    }
}

/// The signed-in user's credentials, handed to every client that needs them.
///
/// Lives from `begin` (sign-in) to `end` (logout); `open` picks up a session
/// left in the store by an earlier run.
pub struct Session<S: SessionStore> {
    store: S,
    tokens: Option<SessionTokens>,
}

impl<S: SessionStore> Session<S> {
    pub async fn open(store: S) -> Result<Self> {
        let tokens = match store.load().await {
            Ok(tokens) => tokens,
            Err(BirdError::Serialization(e)) => {
                warn!("discarding unreadable session: {}", e);
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self { store, tokens })
    }

    pub async fn begin(&mut self, tokens: SessionTokens) -> Result<()> {
        self.store.save(&tokens).await?;
        self.tokens = Some(tokens);
        info!("session started");
        Ok(())
    }

    pub async fn end(&mut self) -> Result<()> {
        self.store.clear().await?;
        self.tokens = None;
        info!("session ended");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.as_ref().is_some_and(|x| !x.access_token.is_empty() && !x.id_token.is_empty())
    }

    pub fn tokens(&self) -> Option<&SessionTokens> {
        self.tokens.as_ref()
    }

    pub fn id_token(&self) -> Result<&str> {
        self.tokens.as_ref()
            .map(|x| x.id_token.as_str())
            .filter(|x| !x.is_empty())
            .ok_or(BirdError::NotSignedIn)
    }

    pub fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.id_token()?))
    }

    pub fn claims(&self) -> Result<IdClaims> {
        decode_claims(self.id_token()?)
    }

    pub fn user_sub(&self) -> Result<String> {
        Ok(self.claims()?.sub)
    }

    pub fn user_email(&self) -> Result<String> {
        self.claims()?.email.ok_or_else(|| BirdError::validation("ID token carries no email"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn fake_jwt(sub: &str, email: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = serde_json::json!({ "sub": sub, "email": email, "exp": 1900000000, "iat": 1700000000 });
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.sig", header, payload)
    }

    pub fn fake_tokens(sub: &str, email: &str) -> SessionTokens {
        SessionTokens {
            id_token: fake_jwt(sub, email),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        }
    }

    #[test]
    fn test_decode_claims() {
        let claims = decode_claims(&fake_jwt("user-1", "a@b.c")).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("a@b.c"));
        assert!(decode_claims("not-a-jwt").is_err());
    }

    #[test]
    fn test_tokens_are_not_printed() {
        let tokens = fake_tokens("user-1", "a@b.c");
        assert!(!format!("{:?}", tokens).contains("access"));
    }

    #[tokio::test]
    async fn test_in_memory_lifecycle() {
        let mut session = Session::open(InMemorySessionStore::default()).await.unwrap();
        assert!(!session.is_authenticated());
        assert!(matches!(session.bearer(), Err(BirdError::NotSignedIn)));
        session.begin(fake_tokens("user-1", "a@b.c")).await.unwrap();
        assert!(session.is_authenticated());
        assert!(session.bearer().unwrap().starts_with("Bearer "));
        assert_eq!(session.user_sub().unwrap(), "user-1");
        session.end().await.unwrap();
        assert!(!session.is_authenticated());
        assert!(session.tokens().is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = Session::open(FileSessionStore::new(path.clone())).await.unwrap();
        session.begin(fake_tokens("user-2", "x@y.z")).await.unwrap();

        let mut reopened = Session::open(FileSessionStore::new(path.clone())).await.unwrap();
        assert_eq!(reopened.user_email().unwrap(), "x@y.z");
        reopened.end().await.unwrap();
        assert!(!path.exists());

        let after_logout = Session::open(FileSessionStore::new(path)).await.unwrap();
        assert!(!after_logout.is_authenticated());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let mut session = Session::open(FileSessionStore::new(path.clone())).await.unwrap();
        session.begin(fake_tokens("user-3", "q@r.s")).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let other = dir.path().join("fresh.json");
        let mut session = Session::open(FileSessionStore::new(other.clone())).await.unwrap();
        session.begin(fake_tokens("user-3", "q@r.s")).await.unwrap();
        assert_eq!(std::fs::metadata(&other).unwrap().permissions().mode() & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_session_without_id_token_is_not_authenticated() {
        let mut session = Session::open(InMemorySessionStore::default()).await.unwrap();
        let mut tokens = fake_tokens("user-1", "a@b.c");
        tokens.id_token.clear();
        session.begin(tokens).await.unwrap();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_corrupt_session_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let session = Session::open(FileSessionStore::new(path)).await.unwrap();
        assert!(!session.is_authenticated());
    }
}
