//! Raw authorize-request parameters.
//!
//! An ordered multi-map: order and repeated names survive parsing, storage and
//! re-rendering. The storage form is a JSON array of `[name, value]` pairs.
use serde::{Deserialize, Serialize};

pub mod names {
    pub const CLIENT_ID: &str = "client_id";
    pub const REDIRECT_URI: &str = "redirect_uri";
    pub const RESPONSE_TYPE: &str = "response_type";
    pub const RESPONSE_MODE: &str = "response_mode";
    pub const SCOPE: &str = "scope";
    pub const STATE: &str = "state";
    pub const NONCE: &str = "nonce";
    pub const CODE_CHALLENGE: &str = "code_challenge";
    pub const CODE_CHALLENGE_METHOD: &str = "code_challenge_method";
    pub const PROMPT: &str = "prompt";
    pub const LOGIN_HINT: &str = "login_hint";
    pub const UI_LOCALES: &str = "ui_locales";
    pub const ACR_VALUES: &str = "acr_values";
    pub const MAX_AGE: &str = "max_age";
    pub const REQUEST_URI: &str = "request_uri";
    pub const REQUEST: &str = "request";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationParameters(Vec<(String, String)>);

impl AuthorizationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` string (no leading `?`).
    pub fn from_query(query: &str) -> Self {
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    /// Parameters of the query part of a (possibly relative) URL.
    /// Anything after `#` is ignored.
    pub fn from_url(url: &str) -> Self {
        let without_fragment = url.split('#').next().unwrap_or_default();
        match without_fragment.split_once('?') {
            Some((_, query)) => Self::from_query(query),
            None => Self::new(),
        }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Replace every value of `name` with a single `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.append(name, value);
    }

    /// Remove every value of `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|(n, _)| n != name);
        before - self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    pub fn get_all<'a, 'b>(
        &'a self,
        name: &'b str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'b> {
        self.0
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn count(&self, name: &str) -> usize {
        self.get_all(name).count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl FromIterator<(String, String)> for AuthorizationParameters {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for AuthorizationParameters {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_form_keeps_order_and_repeats() {
        let params: AuthorizationParameters = [
            ("scope", "openid"),
            ("acr_values", "mfa"),
            ("scope", "transaction:1"),
        ]
        .into_iter()
        .collect();

        let json = params.to_json().unwrap();
        assert_eq!(
            json,
            r#"[["scope","openid"],["acr_values","mfa"],["scope","transaction:1"]]"#
        );
        assert_eq!(AuthorizationParameters::from_json(&json).unwrap(), params);
    }

    #[test]
    fn parses_the_query_of_a_relative_url() {
        let params = AuthorizationParameters::from_url(
            "/connect/authorize/callback?client_id=web&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid+profile#frag=1",
        );

        assert_eq!(params.get("client_id"), Some("web"));
        assert_eq!(params.get("redirect_uri"), Some("https://app/cb"));
        assert_eq!(params.get("scope"), Some("openid profile"));
        assert!(!params.contains("frag"));
    }

    #[test]
    fn set_replaces_all_values() {
        let mut params = AuthorizationParameters::from_query("a=1&a=2&b=3");
        params.set("a", "9");
        assert_eq!(params.get_all("a").collect::<Vec<_>>(), vec!["9"]);
        assert_eq!(params.to_query_string(), "b=3&a=9");
    }

    #[test]
    fn url_without_query_has_no_parameters() {
        assert!(AuthorizationParameters::from_url("/connect/authorize").is_empty());
    }
}
