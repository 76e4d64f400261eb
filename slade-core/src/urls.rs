//! URL helpers for Slade 360 REST APIs.

use std::collections::BTreeMap;
use url::{Url, form_urlencoded};

/// Path and query of the auth server user profile endpoint.
pub const ME_URL_FRAGMENT: &str = "v1/user/me/?format=json";

/// Query parameters as an ordered multimap.
///
/// Keys encode in sorted order so composed URLs are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryValues(BTreeMap<String, Vec<String>>);

impl QueryValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value of `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// Append `value` to the values of `key`.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Encode as `key=value&...`, sorted by key.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.0 {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (key, value) in iter {
            values.add(key, value);
        }
        values
    }
}

/// Merge query maps; a key in a later map replaces all of its earlier values.
pub fn merge_url_values(values: &[QueryValues]) -> QueryValues {
    let mut merged = BTreeMap::new();
    for value in values {
        for (key, entries) in &value.0 {
            merged.insert(key.clone(), entries.clone());
        }
    }
    QueryValues(merged)
}

/// Build `scheme://host/path?query`.
///
/// `query` is used verbatim and omitted when empty.
pub fn compose_api_url(
    scheme: &str,
    host: &str,
    path: &str,
    query: &str,
) -> Result<String, url::ParseError> {
    let mut url = Url::parse(&format!("{}://{}", scheme, host))?;
    url.set_path(path);
    if !query.is_empty() {
        url.set_query(Some(query));
    }
    Ok(url.to_string())
}

/// Derive the user profile URL from the token URL.
///
/// The token URL's path and query are discarded and replaced with
/// [`ME_URL_FRAGMENT`].
pub fn me_url(token_url: &str) -> Result<String, url::ParseError> {
    let parsed = Url::parse(token_url)?;
    let host = parsed.host_str().ok_or(url::ParseError::EmptyHost)?;
    let authority = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Ok(format!("{}://{}/{}", parsed.scheme(), authority, ME_URL_FRAGMENT))
}
