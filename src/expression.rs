//! Expression resolution for class names and value sources
//!
//! The container evaluates expression-valued class names
//! ([`ClassRef::Expr`](crate::ClassRef)) and [`ValueSource::Expr`](crate::ValueSource)
//! values through a pluggable [`ExpressionResolver`].

use crate::storage::{self, NameMap};
use crate::value::Value;
use crate::{BeanError, Result};

/// Evaluates an expression string to a value.
pub trait ExpressionResolver: Send + Sync {
    /// `bean_name` names the bean whose definition holds the expression.
    fn evaluate(&self, expression: &str, bean_name: &str) -> Result<Value>;
}

/// Default resolver: the expression text is its own value.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralExpressionResolver;

impl ExpressionResolver for LiteralExpressionResolver {
    fn evaluate(&self, expression: &str, _bean_name: &str) -> Result<Value> {
        Ok(Value::Str(expression.to_owned()))
    }
}

/// Replaces `${key}` and `${key:default}` placeholders from a property map.
///
/// ```rust
/// use bean_container::{ExpressionResolver, PlaceholderResolver};
///
/// let resolver = PlaceholderResolver::new();
/// resolver.set("db.host", "localhost");
///
/// let value = resolver.evaluate("jdbc://${db.host}:${db.port:5432}", "repo").unwrap();
/// assert_eq!(value.as_str(), Some("jdbc://localhost:5432"));
/// ```
#[derive(Debug)]
pub struct PlaceholderResolver {
    properties: NameMap<String>,
    ignore_unresolvable: bool,
}

impl PlaceholderResolver {
    const PREFIX: &'static str = "${";
    const SUFFIX: char = '}';
    const SEPARATOR: char = ':';

    pub fn new() -> Self {
        Self {
            properties: storage::name_map(),
            ignore_unresolvable: false,
        }
    }

    pub fn with_properties<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let resolver = Self::new();
        for (k, v) in properties {
            resolver.set(k, v);
        }
        resolver
    }

    /// Leave unknown placeholders in place instead of failing.
    pub fn ignore_unresolvable(mut self, ignore: bool) -> Self {
        self.ignore_unresolvable = ignore;
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Replace every placeholder in `text`. Values are resolved recursively;
    /// a placeholder that refers back to itself is an error.
    pub fn resolve(&self, text: &str, bean_name: &str) -> Result<String> {
        self.resolve_inner(text, bean_name, &mut Vec::new())
    }

    fn resolve_inner(&self, text: &str, bean_name: &str, visiting: &mut Vec<String>) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(Self::PREFIX) {
            out.push_str(&rest[..start]);
            let after = &rest[start + Self::PREFIX.len()..];
            let Some(end) = Self::find_placeholder_end(after) else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let placeholder = &after[..end];
            // Nested placeholders in the key itself.
            let placeholder = self.resolve_inner(placeholder, bean_name, visiting)?;
            let (key, default) = match placeholder.split_once(Self::SEPARATOR) {
                Some((key, default)) => (key.to_owned(), Some(default.to_owned())),
                None => (placeholder.clone(), None),
            };

            if visiting.contains(&key) {
                return Err(BeanError::definition(
                    bean_name,
                    format!("circular placeholder reference '{key}'"),
                ));
            }

            match storage::get_cloned(&self.properties, &key).or(default) {
                Some(raw) => {
                    visiting.push(key);
                    let resolved = self.resolve_inner(&raw, bean_name, visiting)?;
                    visiting.pop();
                    out.push_str(&resolved);
                }
                None if self.ignore_unresolvable => {
                    out.push_str(Self::PREFIX);
                    out.push_str(&placeholder);
                    out.push(Self::SUFFIX);
                }
                None => {
                    return Err(BeanError::definition(
                        bean_name,
                        format!("could not resolve placeholder '{key}' in value \"{text}\""),
                    ));
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Index of the `}` closing the placeholder that starts at `text[0]`.
    fn find_placeholder_end(text: &str) -> Option<usize> {
        let mut depth = 0usize;
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i..].starts_with(Self::PREFIX.as_bytes()) {
                depth += 1;
                i += Self::PREFIX.len();
                continue;
            }
            if bytes[i] == b'}' {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            i += 1;
        }
        None
    }
}

impl Default for PlaceholderResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionResolver for PlaceholderResolver {
    fn evaluate(&self, expression: &str, bean_name: &str) -> Result<Value> {
        self.resolve(expression, bean_name).map(Value::Str)
    }
}
