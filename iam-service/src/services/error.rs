use iam_core::error::AppError;
use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::models::{Application, RuleParseError, TokenWrapper};

/// How an OAuth failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthErrorKind {
    Client,
    Forbidden,
}

/// Rejections of the authorization-code and refresh flows. Display strings
/// are wire-visible and kept stable for existing clients.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OAuthError {
    #[error("response_type should be \"code\"")]
    UnsupportedResponseType,

    #[error("invalid client_id")]
    InvalidClientId,

    #[error("Redirect URI: \"{redirect_uri}\" doesn't exist in the allowed Redirect URI list")]
    RedirectUriNotAllowed {
        redirect_uri: String,
        /// Secret already cleared.
        application: Box<Application>,
    },

    #[error("Challenge method should be S256")]
    UnsupportedChallengeMethod,

    #[error("the user does not exist")]
    UserNotFound,

    #[error("the user is forbidden to sign in, please contact the administrator")]
    UserForbidden,

    #[error("grant_type should be \"authorization_code\"")]
    ExpectedAuthorizationCodeGrant,

    #[error("grant_type should be \"refresh_token\"")]
    ExpectedRefreshTokenGrant,

    #[error("code should not be empty")]
    EmptyCode,

    #[error("invalid code")]
    InvalidCode,

    #[error("the code has already been used")]
    CodeAlreadyUsed,

    #[error("the token is for wrong application (client_id)")]
    WrongApplication,

    #[error("invalid client_secret")]
    InvalidClientSecret,

    #[error("incorrect code_verifier")]
    IncorrectCodeVerifier,

    #[error("invalid refresh_token")]
    InvalidRefreshToken,

    #[error("the refresh_token has already been used")]
    RefreshTokenReused,

    #[error("{0}")]
    RefreshTokenRejected(String),
}

impl OAuthError {
    pub fn kind(&self) -> OAuthErrorKind {
        match self {
            OAuthError::UserForbidden | OAuthError::UnsupportedChallengeMethod => {
                OAuthErrorKind::Forbidden
            }
            _ => OAuthErrorKind::Client,
        }
    }

    /// `"error: <message>"` wrapper expected by legacy token clients.
    pub fn to_wrapper(&self) -> TokenWrapper {
        TokenWrapper::error(self)
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed private key in cert {cert}: {source}")]
    MalformedPrivateKey {
        cert: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("malformed public key in cert {cert}: {reason}")]
    MalformedPublicKey { cert: String, reason: String },

    #[error("unexpected signing method: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("token lifetime of {0} hours is out of range")]
    LifetimeOutOfRange(i64),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("cert {0} does not exist")]
    CertNotFound(String),

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid policy rules: {0}")]
    Rules(#[from] RuleParseError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        AppError::CryptoError(anyhow::Error::new(err))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::OAuth(e) => match e.kind() {
                OAuthErrorKind::Client => AppError::BadRequest(anyhow::Error::new(e)),
                OAuthErrorKind::Forbidden => AppError::Forbidden(anyhow::Error::new(e)),
            },
            ServiceError::Crypto(e) => e.into(),
            ServiceError::Store(e) => e.into(),
            ServiceError::Rules(e) => AppError::ConfigError(anyhow::Error::new(e)),
        }
    }
}
