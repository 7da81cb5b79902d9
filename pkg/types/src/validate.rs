use anyhow::{Result, bail};

/// Validate a namespace or object name.
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 63 {
        bail!("name '{}' exceeds 63 characters (got {})", name, name.len());
    }
    if name.starts_with('-') || name.ends_with('-') {
        bail!("name '{}' must not start or end with a hyphen", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "name '{}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]",
            name
        );
    }
    Ok(())
}

/// Validate a label key or value as used in selectors.
/// Keys may carry a `prefix/` part; every segment is `[A-Za-z0-9._-]`.
pub fn validate_label_token(token: &str) -> Result<()> {
    if token.is_empty() {
        bail!("label token must not be empty");
    }
    let (prefix, name) = match token.split_once('/') {
        Some((p, n)) => (Some(p), n),
        None => (None, token),
    };
    if let Some(p) = prefix
        && (p.is_empty() || p.contains('/'))
    {
        bail!("label token '{}' has an invalid prefix", token);
    }
    if name.is_empty() || name.len() > 63 {
        bail!("label token '{}' must be 1-63 characters after the prefix", token);
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if !prefix.unwrap_or("").chars().all(allowed) || !name.chars().all(allowed) {
        bail!("label token '{}' contains invalid characters", token);
    }
    Ok(())
}
