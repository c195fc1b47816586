//! Copy-pasteable token strings: `ecashA` followed by the token JSON in
//! unpadded base64url. Small enough to paste into a chat message, and the
//! alphabet survives URLs and most messengers' link detection.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::str::FromStr;

use crate::config::TOKEN_PREFIX;

use super::error::TokenError;
use super::types::Token;

impl Token {
    /// Encodes the token as `ecashA<base64url(json)>`.
    pub fn encode(&self) -> Result<String, TokenError> {
        let json = serde_json::to_vec(self).map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(json)))
    }

    /// Parses a token string. Surrounding whitespace is ignored since tokens
    /// usually arrive by copy-paste.
    pub fn decode(s: &str) -> Result<Self, TokenError> {
        let body = s
            .trim()
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| TokenError::Encoding(format!("missing {} prefix", TOKEN_PREFIX)))?;
        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| TokenError::Encoding(format!("bad base64: {}", e)))?;
        serde_json::from_slice(&json).map_err(|e| TokenError::Encoding(format!("bad json: {}", e)))
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Token::decode(s)
    }
}
