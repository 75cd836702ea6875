//! Path rewrite rules.
//!
//! A [`PathAdaptorSpec`] is compiled once into a [`PathAdaptor`]; regular
//! expressions are built at that point so [`PathAdaptor::adapt`] never
//! fails. Rules are not idempotent in general: `add_prefix` applied twice
//! prefixes twice.

use pipegate_kernel::{KernelError, KernelResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Path rewrite strategy, one key per variant:
///
/// ```yaml
/// path:
///   chain:
///     - trim_prefix: /api/v1
///     - regexp_replace: { regexp: "^/users/(\\d+)$", replace: "/u/$1" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathAdaptorSpec {
    /// Replace the whole path.
    Replace(String),
    AddPrefix(String),
    /// Strip a leading prefix; paths without it pass through.
    TrimPrefix(String),
    /// Replace every match of `regexp` with the `replace` template
    /// (`$1`, `${name}` expand capture groups).
    RegexpReplace { regexp: String, replace: String },
    /// Apply rules left to right.
    Chain(Vec<PathAdaptorSpec>),
}

#[derive(Debug)]
enum PathRule {
    Replace(String),
    AddPrefix(String),
    TrimPrefix(String),
    RegexpReplace { re: Regex, replace: String },
    Chain(Vec<PathRule>),
}

impl PathRule {
    fn compile(spec: &PathAdaptorSpec) -> KernelResult<Self> {
        Ok(match spec {
            PathAdaptorSpec::Replace(path) => PathRule::Replace(path.clone()),
            PathAdaptorSpec::AddPrefix(prefix) => PathRule::AddPrefix(prefix.clone()),
            PathAdaptorSpec::TrimPrefix(prefix) => PathRule::TrimPrefix(prefix.clone()),
            PathAdaptorSpec::RegexpReplace { regexp, replace } => {
                let re = Regex::new(regexp)
                    .map_err(|e| KernelError::invalid_field("path.regexp_replace.regexp", e.to_string()))?;
                PathRule::RegexpReplace {
                    re,
                    replace: replace.clone(),
                }
            }
            PathAdaptorSpec::Chain(rules) => {
                PathRule::Chain(rules.iter().map(PathRule::compile).collect::<KernelResult<_>>()?)
            }
        })
    }

    fn apply<'a>(&self, path: Cow<'a, str>) -> Cow<'a, str> {
        match self {
            PathRule::Replace(replacement) => Cow::Owned(replacement.clone()),
            PathRule::AddPrefix(prefix) => Cow::Owned(format!("{prefix}{path}")),
            PathRule::TrimPrefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => Cow::Owned(rest.to_string()),
                None => path,
            },
            PathRule::RegexpReplace { re, replace } => {
                let rewritten = match re.replace_all(&path, replace.as_str()) {
                    Cow::Borrowed(_) => None,
                    Cow::Owned(rewritten) => Some(rewritten),
                };
                rewritten.map_or(path, Cow::Owned)
            }
            PathRule::Chain(rules) => rules.iter().fold(path, |acc, rule| rule.apply(acc)),
        }
    }
}

/// Compiled, immutable path rewriter.
#[derive(Debug)]
pub struct PathAdaptor {
    rule: PathRule,
}

impl PathAdaptor {
    pub fn new(spec: &PathAdaptorSpec) -> KernelResult<Self> {
        Ok(Self {
            rule: PathRule::compile(spec)?,
        })
    }

    /// Rewrite `path`. A rewrite that empties the path yields `/`; a path
    /// left untouched is returned as is, even when empty.
    pub fn adapt(&self, path: &str) -> String {
        let adapted = self.rule.apply(Cow::Borrowed(path));
        if adapted.is_empty() && adapted != path {
            "/".to_string()
        } else {
            adapted.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adaptor(spec: PathAdaptorSpec) -> PathAdaptor {
        PathAdaptor::new(&spec).unwrap()
    }

    #[test]
    fn trim_prefix_strips_version() {
        let pa = adaptor(PathAdaptorSpec::TrimPrefix("/api/v1".into()));
        assert_eq!(pa.adapt("/api/v1/users"), "/users");
        assert_eq!(pa.adapt("/other"), "/other");
        assert_eq!(pa.adapt("/api/v1"), "/");
    }

    #[test]
    fn empty_chain_is_noop() {
        let pa = adaptor(PathAdaptorSpec::Chain(vec![]));
        assert_eq!(pa.adapt("/api/v1/users"), "/api/v1/users");
        assert_eq!(pa.adapt(""), "");
    }

    #[test]
    fn add_prefix_is_not_idempotent() {
        let pa = adaptor(PathAdaptorSpec::AddPrefix("/v2".into()));
        let once = pa.adapt("/users");
        assert_eq!(once, "/v2/users");
        assert_eq!(pa.adapt(&once), "/v2/v2/users");
        // same input, same output
        assert_eq!(pa.adapt("/users"), once);
    }

    #[test]
    fn replace_overwrites_path() {
        let pa = adaptor(PathAdaptorSpec::Replace("/fixed".into()));
        assert_eq!(pa.adapt("/anything"), "/fixed");
    }

    #[test]
    fn regexp_replace_expands_groups() {
        let pa = adaptor(PathAdaptorSpec::RegexpReplace {
            regexp: r"^/users/(\d+)$".into(),
            replace: "/u/$1".into(),
        });
        assert_eq!(pa.adapt("/users/42"), "/u/42");
        assert_eq!(pa.adapt("/users/abc"), "/users/abc");
    }

    #[test]
    fn chain_applies_left_to_right() {
        let pa = adaptor(PathAdaptorSpec::Chain(vec![
            PathAdaptorSpec::TrimPrefix("/api/v1".into()),
            PathAdaptorSpec::AddPrefix("/internal".into()),
        ]));
        assert_eq!(pa.adapt("/api/v1/users"), "/internal/users");
    }

    #[test]
    fn invalid_regexp_fails_compilation() {
        let err = PathAdaptor::new(&PathAdaptorSpec::RegexpReplace {
            regexp: "(".into(),
            replace: "".into(),
        })
        .unwrap_err();
        assert!(matches!(err, KernelError::InvalidField { .. }));
    }

    #[test]
    fn spec_decodes_from_tagged_json() {
        let spec: PathAdaptorSpec = serde_json::from_value(json!({
            "chain": [
                {"trim_prefix": "/api"},
                {"regexp_replace": {"regexp": "^/x", "replace": "/y"}}
            ]
        }))
        .unwrap();
        let pa = adaptor(spec);
        assert_eq!(pa.adapt("/api/x/1"), "/y/1");
    }
}
