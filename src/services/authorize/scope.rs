//! Scope parsing, including parameterized scopes such as `transaction:123`.

/// A scope value split into its name and optional parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScope {
    pub raw_value: String,
    pub parsed_name: String,
    pub parsed_parameter: Option<String>,
}

impl ParsedScope {
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            parsed_name: value.clone(),
            raw_value: value,
            parsed_parameter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid scope value '{0}'")]
pub struct ScopeParseError(pub String);

/// Splits `name:parameter` for the configured parameterized scope names; every
/// other value is taken verbatim.
#[derive(Debug, Clone)]
pub struct ScopeParser {
    parameterized: Vec<String>,
}

impl Default for ScopeParser {
    fn default() -> Self {
        Self::new(vec!["transaction".to_string()])
    }
}

impl ScopeParser {
    pub fn new(parameterized: Vec<String>) -> Self {
        Self { parameterized }
    }

    /// Parse a space-delimited `scope` parameter.
    pub fn parse(&self, scope: &str) -> Result<Vec<ParsedScope>, ScopeParseError> {
        let mut out: Vec<ParsedScope> = Vec::new();
        for raw in scope.split_whitespace() {
            let parsed = self.parse_one(raw)?;
            if !out.iter().any(|p| p.raw_value == parsed.raw_value) {
                out.push(parsed);
            }
        }
        Ok(out)
    }

    fn parse_one(&self, raw: &str) -> Result<ParsedScope, ScopeParseError> {
        if let Some((name, parameter)) = raw.split_once(':') {
            if self.parameterized.iter().any(|p| p == name) {
                if parameter.is_empty() {
                    return Err(ScopeParseError(raw.to_string()));
                }
                return Ok(ParsedScope {
                    raw_value: raw.to_string(),
                    parsed_name: name.to_string(),
                    parsed_parameter: Some(parameter.to_string()),
                });
            }
        }
        if self.parameterized.iter().any(|p| p == raw) {
            // A parameterized scope requested without its parameter.
            return Err(ScopeParseError(raw.to_string()));
        }
        Ok(ParsedScope::plain(raw))
    }
}
