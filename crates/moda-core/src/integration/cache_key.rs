//! Deterministic cache keys for integration requests.
//!
//! A key has the form `{namespace}:{operation}:{fingerprint}`, where the
//! fingerprint is the first 16 hex characters of the BLAKE3 hash of the
//! canonical parameter string ([`CacheKeyBuilder::canonical_params`]). Two requests that differ only in parameter order,
//! parameter-name casing, surrounding whitespace or list ordering produce the
//! same key.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const FINGERPRINT_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheKeyError {
    #[error("cache key namespace must not be blank")]
    BlankNamespace,

    #[error("cache key operation must not be blank")]
    BlankOperation,

    #[error("cache key parameter names must not be blank")]
    BlankParamName,
}

/// A finished cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    pub namespace: String,
    pub operation: String,
    pub fingerprint: String,
}

impl CacheKey {
    /// Prefix shared by every key of this namespace and operation, handy for
    /// bulk invalidation.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{}:{}:", self.namespace, self.operation)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.operation, self.fingerprint)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamValue {
    Single(String),
    List(BTreeSet<String>),
}

/// Builder for [`CacheKey`].
///
/// ```
/// use moda_core::integration::CacheKeyBuilder;
///
/// let a = CacheKeyBuilder::new("azdo")
///     .operation("work-items")
///     .param("Project", " Payments ")
///     .param_list("ids", ["42", "7", "42"])
///     .build()
///     .unwrap();
/// let b = CacheKeyBuilder::new("AzDO")
///     .operation("work-items")
///     .param_list("IDS", ["7", "42"])
///     .param("project", "Payments")
///     .build()
///     .unwrap();
/// assert_eq!(a, b);
/// assert!(a.to_string().starts_with("azdo:work-items:"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    namespace: String,
    operation: String,
    params: BTreeMap<String, ParamValue>,
    blank_param_name: bool,
}

impl CacheKeyBuilder {
    #[must_use]
    pub fn new(namespace: impl AsRef<str>) -> Self {
        Self {
            namespace: normalize_name(namespace.as_ref()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn operation(mut self, operation: impl AsRef<str>) -> Self {
        self.operation = normalize_name(operation.as_ref());
        self
    }

    /// Add a single-valued parameter. Blank values are dropped; a repeated
    /// name replaces the earlier value.
    #[must_use]
    pub fn param(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let Some(name) = self.param_name(name.as_ref()) else {
            return self;
        };
        let value = value.as_ref().trim();
        if value.is_empty() {
            self.params.remove(&name);
        } else {
            self.params.insert(name, ParamValue::Single(value.to_string()));
        }
        self
    }

    /// Add a list parameter. Values are trimmed, deduplicated and sorted;
    /// an all-blank list is dropped.
    #[must_use]
    pub fn param_list<I, S>(mut self, name: impl AsRef<str>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(name) = self.param_name(name.as_ref()) else {
            return self;
        };
        let values: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            self.params.remove(&name);
        } else {
            self.params.insert(name, ParamValue::List(values));
        }
        self
    }

    /// The normalized parameter string the fingerprint is computed from.
    ///
    /// `name=value` pairs joined by `&` in name order; list values are
    /// bracketed and comma-joined. `%`, `&`, `=`, `,`, `[` and `]` inside
    /// names and values are percent-escaped so distinct parameter sets never
    /// render to the same string.
    #[must_use]
    pub fn canonical_params(&self) -> String {
        self.params
            .iter()
            .map(|(name, value)| match value {
                ParamValue::Single(v) => format!("{}={}", escape(name), escape(v)),
                ParamValue::List(vs) => format!(
                    "{}=[{}]",
                    escape(name),
                    vs.iter().map(|v| escape(v)).collect::<Vec<_>>().join(",")
                ),
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Finish the key.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheKeyError`] for a blank namespace, operation or
    /// parameter name.
    pub fn build(self) -> Result<CacheKey, CacheKeyError> {
        if self.namespace.is_empty() {
            return Err(CacheKeyError::BlankNamespace);
        }
        if self.operation.is_empty() {
            return Err(CacheKeyError::BlankOperation);
        }
        if self.blank_param_name {
            return Err(CacheKeyError::BlankParamName);
        }

        let fingerprint = fingerprint(&self.canonical_params());
        Ok(CacheKey {
            namespace: self.namespace,
            operation: self.operation,
            fingerprint,
        })
    }

    fn param_name(&mut self, raw: &str) -> Option<String> {
        let name = normalize_name(raw);
        if name.is_empty() {
            self.blank_param_name = true;
            return None;
        }
        Some(name)
    }
}

fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// First [`FINGERPRINT_LEN`] hex characters of the BLAKE3 hash of `canonical`.
fn fingerprint(canonical: &str) -> String {
    let hash = blake3::hash(canonical.as_bytes());
    hash.to_hex().as_str()[..FINGERPRINT_LEN].to_string()
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            ',' => out.push_str("%2C"),
            '=' => out.push_str("%3D"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            _ => out.push(c),
        }
    }
    out
}
