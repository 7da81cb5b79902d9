use anyhow::{Result, anyhow, bail};
use std::time::Duration;

use pkg_types::meta::DynamicObject;
use pkg_types::validate::validate_label_token;

/// Filter passed to a lister. Listers are always namespace-scoped; the
/// namespace is a separate argument and never part of the options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Equality-based label selector, e.g. `app=web,tier!=cache,!legacy`.
    pub label_selector: Option<String>,
    /// Field selector over `metadata.name` / `metadata.namespace`.
    pub field_selector: Option<String>,
    /// Minimum store revision the result must reflect.
    pub resource_version: Option<u64>,
    /// Deadline for the list call. Overrides the lister's default.
    pub timeout: Option<Duration>,
}

impl ListOptions {
    pub fn labels(selector: impl Into<String>) -> Self {
        Self {
            label_selector: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn fields(selector: impl Into<String>) -> Self {
        Self {
            field_selector: Some(selector.into()),
            ..Default::default()
        }
    }

    /// Parse both selectors into a matcher.
    pub fn selector(&self) -> Result<Selector> {
        Selector::parse(
            self.label_selector.as_deref().unwrap_or(""),
            self.field_selector.as_deref().unwrap_or(""),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LabelRequirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    NotExists(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldRequirement {
    field: Field,
    equals: bool,
    value: String,
}

/// Parsed label and field selector. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    labels: Vec<LabelRequirement>,
    fields: Vec<FieldRequirement>,
}

impl Selector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(label_selector: &str, field_selector: &str) -> Result<Self> {
        let mut selector = Selector::default();
        for term in terms(label_selector) {
            selector.labels.push(parse_label_term(term)?);
        }
        for term in terms(field_selector) {
            selector.fields.push(parse_field_term(term)?);
        }
        Ok(selector)
    }

    pub fn is_everything(&self) -> bool {
        self.labels.is_empty() && self.fields.is_empty()
    }

    pub fn matches(&self, obj: &DynamicObject) -> bool {
        let labels = &obj.metadata.labels;
        let labels_ok = self.labels.iter().all(|req| match req {
            LabelRequirement::Equals(k, v) => labels.get(k) == Some(v),
            LabelRequirement::NotEquals(k, v) => labels.get(k) != Some(v),
            LabelRequirement::Exists(k) => labels.contains_key(k),
            LabelRequirement::NotExists(k) => !labels.contains_key(k),
        });
        labels_ok
            && self.fields.iter().all(|req| {
                let actual = match req.field {
                    Field::Name => obj.name(),
                    Field::Namespace => obj.namespace(),
                };
                (actual == req.value) == req.equals
            })
    }
}

fn terms(selector: &str) -> impl Iterator<Item = &str> {
    selector.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Split `k!=v`, `k==v` or `k=v` into (key, equals, value).
fn split_operator(term: &str) -> Option<(&str, bool, &str)> {
    if let Some((k, v)) = term.split_once("!=") {
        return Some((k.trim(), false, v.trim()));
    }
    if let Some((k, v)) = term.split_once("==") {
        return Some((k.trim(), true, v.trim()));
    }
    term.split_once('=').map(|(k, v)| (k.trim(), true, v.trim()))
}

fn parse_label_term(term: &str) -> Result<LabelRequirement> {
    if let Some((key, equals, value)) = split_operator(term) {
        validate_label_token(key).map_err(|e| anyhow!("invalid label selector '{}': {}", term, e))?;
        if !value.is_empty() {
            validate_label_token(value)
                .map_err(|e| anyhow!("invalid label selector '{}': {}", term, e))?;
        }
        return Ok(if equals {
            LabelRequirement::Equals(key.to_string(), value.to_string())
        } else {
            LabelRequirement::NotEquals(key.to_string(), value.to_string())
        });
    }
    let (key, exists) = match term.strip_prefix('!') {
        Some(k) => (k.trim(), false),
        None => (term, true),
    };
    validate_label_token(key).map_err(|e| anyhow!("invalid label selector '{}': {}", term, e))?;
    Ok(if exists {
        LabelRequirement::Exists(key.to_string())
    } else {
        LabelRequirement::NotExists(key.to_string())
    })
}

fn parse_field_term(term: &str) -> Result<FieldRequirement> {
    let Some((path, equals, value)) = split_operator(term) else {
        bail!("invalid field selector '{}': expected an operator", term);
    };
    let field = match path {
        "metadata.name" => Field::Name,
        "metadata.namespace" => Field::Namespace,
        other => bail!("field label '{}' is not supported", other),
    };
    Ok(FieldRequirement {
        field,
        equals,
        value: value.to_string(),
    })
}
