//! Claims and principals.
//!
//! A claim set is an ordered list of `(type, value)` pairs; the same type may
//! appear more than once (e.g. `amr`, `role`). The subject of a principal is
//! the value of its single `sub` claim. Values are kept as strings together
//! with the JSON type they were read as, so rendering gives back `true`
//! rather than `"true"`.
use serde::{Deserialize, Serialize};

pub mod claim_types {
    pub const SUBJECT: &str = "sub";
    pub const CLIENT_ID: &str = "client_id";
    pub const SCOPE: &str = "scope";
    pub const CONFIRMATION: &str = "cnf";
    pub const TRANSACTION_ID: &str = "transaction_id";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
}

/// Claim types that belong to the token protocol rather than to the subject.
/// They are stripped before claims are re-exposed (UserInfo principal, resource APIs).
pub const PROTOCOL_CLAIMS_FILTER: &[&str] = &[
    "at_hash",
    "aud",
    "azp",
    "c_hash",
    "client_id",
    "exp",
    "iat",
    "iss",
    "jti",
    "nonce",
    "nbf",
    "reference_token_id",
    "sid",
    "scope",
    "cnf",
];

pub fn is_protocol_claim(claim_type: &str) -> bool {
    PROTOCOL_CLAIMS_FILTER.contains(&claim_type)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimValueType {
    #[default]
    String,
    Boolean,
    Number,
    /// Compact JSON object, e.g. `cnf` or `address`.
    Json,
}

impl ClaimValueType {
    fn is_string(&self) -> bool {
        *self == ClaimValueType::String
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "ClaimValueType::is_string")]
    pub value_type: ClaimValueType,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::typed(claim_type, value, ClaimValueType::String)
    }

    pub fn typed(
        claim_type: impl Into<String>,
        value: impl Into<String>,
        value_type: ClaimValueType,
    ) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            value_type,
        }
    }

    /// The value as JSON of its recorded type. A value that does not parse
    /// as that type stays a string.
    pub fn json_value(&self) -> serde_json::Value {
        use serde_json::Value;
        let parsed = match self.value_type {
            ClaimValueType::String => None,
            ClaimValueType::Boolean => self.value.parse::<bool>().ok().map(Value::Bool),
            ClaimValueType::Number => self.value.parse::<serde_json::Number>().ok().map(Value::Number),
            ClaimValueType::Json => serde_json::from_str(&self.value).ok(),
        };
        parsed.unwrap_or_else(|| Value::String(self.value.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Vec<Claim>);

impl Claims {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, claim: Claim) {
        self.0.push(claim);
    }

    pub fn add(&mut self, claim_type: impl Into<String>, value: impl Into<String>) {
        self.0.push(Claim::new(claim_type, value));
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Claim>) {
        self.0.extend(other);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values<'a, 'b>(
        &'a self,
        claim_type: &'b str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'b> {
        self.0
            .iter()
            .filter(move |c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    pub fn first(&self, claim_type: &str) -> Option<&str> {
        self.values(claim_type).next()
    }

    /// Value of `claim_type` if it occurs exactly once.
    pub fn single(&self, claim_type: &str) -> Option<&str> {
        let mut it = self.values(claim_type);
        match (it.next(), it.next()) {
            (Some(v), None) => Some(v),
            _ => None,
        }
    }

    pub fn contains_type(&self, claim_type: &str) -> bool {
        self.0.iter().any(|c| c.claim_type == claim_type)
    }

    pub fn without_protocol_claims(&self) -> Claims {
        self.0
            .iter()
            .filter(|c| !is_protocol_claim(&c.claim_type))
            .cloned()
            .collect()
    }

    /// Keep only claims whose type is in `types`.
    pub fn filter_types<S: AsRef<str>>(&self, types: &[S]) -> Claims {
        self.0
            .iter()
            .filter(|c| types.iter().any(|t| t.as_ref() == c.claim_type))
            .cloned()
            .collect()
    }

    /// Build a claim set from a JSON object (JWT payload, directory record).
    ///
    /// Arrays become repeated claims, objects (e.g. `cnf`) are kept as compact JSON.
    /// Every value remembers its JSON type. `null` is dropped.
    pub fn from_json_object(map: &serde_json::Map<String, serde_json::Value>) -> Claims {
        let mut claims = Claims::new();
        for (k, v) in map {
            match v {
                serde_json::Value::Array(items) => {
                    claims.extend(items.iter().filter_map(|item| json_to_claim(k, item)));
                }
                other => claims.extend(json_to_claim(k, other)),
            }
        }
        claims
    }

    /// Render as a JSON object: single values in their own JSON type,
    /// repeated types as arrays.
    pub fn to_json_object(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        for c in &self.0 {
            let value = c.json_value();
            match out.get_mut(&c.claim_type) {
                None => {
                    out.insert(c.claim_type.clone(), value);
                }
                Some(serde_json::Value::Array(arr)) => arr.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = serde_json::Value::Array(vec![first, value]);
                }
            }
        }
        out
    }
}

fn json_to_claim(claim_type: &str, v: &serde_json::Value) -> Option<Claim> {
    use serde_json::Value;
    let (value, value_type) = match v {
        Value::Null => return None,
        Value::String(s) => (s.clone(), ClaimValueType::String),
        Value::Bool(b) => (b.to_string(), ClaimValueType::Boolean),
        Value::Number(n) => (n.to_string(), ClaimValueType::Number),
        other => (other.to_string(), ClaimValueType::Json),
    };
    Some(Claim::typed(claim_type, value, value_type))
}

impl FromIterator<Claim> for Claims {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Claims {
    type Item = Claim;
    type IntoIter = std::vec::IntoIter<Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An authenticated subject as seen by one validation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub authentication_type: String,
    pub claims: Claims,
}

impl Principal {
    pub fn new(authentication_type: impl Into<String>, claims: Claims) -> Self {
        Self {
            authentication_type: authentication_type.into(),
            claims,
        }
    }

    /// Convenience for sessions and tests: a principal carrying only `sub`.
    pub fn from_subject(authentication_type: impl Into<String>, subject_id: &str) -> Self {
        let mut claims = Claims::new();
        claims.add(claim_types::SUBJECT, subject_id);
        Self::new(authentication_type, claims)
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.claims.single(claim_types::SUBJECT)
    }
}
