//! Post-login redirect handling.
//!
//! After the OAuth exchange the backend redirects to
//! `<frontend>/auth/callback?token=<jwt>`. The token is read once and removed
//! from the URL before the URL is shown anywhere.

use secrecy::SecretString;
use url::Url;

use crate::ClientError;

const TOKEN_PARAM: &str = "token";
const ERROR_PARAM: &str = "error";

#[derive(Debug)]
pub struct AuthCallback {
    pub token: SecretString,
    /// The callback URL without the `token` parameter.
    pub clean_url: Url,
}

impl AuthCallback {
    pub fn parse(url: &Url) -> Result<Self, ClientError> {
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        let token = pairs
            .iter()
            .find(|(key, value)| key == TOKEN_PARAM && !value.trim().is_empty())
            .map(|(_, value)| value.trim().to_string());

        let Some(token) = token else {
            let reason = pairs
                .iter()
                .find(|(key, _)| key == ERROR_PARAM)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| "missing token".to_string());
            return Err(ClientError::AuthCallback(reason));
        };

        let remaining: Vec<&(String, String)> =
            pairs.iter().filter(|(key, _)| key != TOKEN_PARAM).collect();
        let mut clean_url = url.clone();
        if remaining.is_empty() {
            clean_url.set_query(None);
        } else {
            clean_url
                .query_pairs_mut()
                .clear()
                .extend_pairs(remaining.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        Ok(Self {
            token: SecretString::new(token),
            clean_url,
        })
    }
}
