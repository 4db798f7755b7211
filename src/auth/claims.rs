use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of JWT: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access", alias = "ACCESS")]
    Access,
    #[serde(alias = "Refresh", alias = "REFRESH")]
    Refresh,
}

impl TokenKind {
    /// Value stored in `jwt_tokens.token_type`.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "ACCESS",
            TokenKind::Refresh => "REFRESH",
        }
    }

    pub fn from_db_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "ACCESS" => Ok(TokenKind::Access),
            "REFRESH" => Ok(TokenKind::Refresh),
            other => anyhow::bail!("unknown token type: {other}"),
        }
    }
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub username: String,
    pub email: String,
    pub iat: i64,        // issued at (unix timestamp)
    pub exp: i64,        // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // token type
    pub jti: Uuid,       // keeps token hashes unique within one second
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
