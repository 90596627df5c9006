use crate::model::error::ProviderError;

pub const SEPARATOR: char = '/';

/// Namespaces are opaque and flat: they may not be empty or contain the
/// separator, so `<namespace>/<key>` never collides across namespaces.
pub fn validate_namespace(namespace: &str) -> Result<(), ProviderError> {
    if namespace.is_empty() {
        return Err(ProviderError::Configuration(
            "missing key prefix".to_string(),
        ));
    }

    if namespace.contains(SEPARATOR) {
        return Err(ProviderError::Configuration(format!(
            "key prefix may not contain `{}`: {}",
            SEPARATOR, namespace
        )));
    }

    Ok(())
}

/// Listing prefix covering every key of `namespace` and nothing else.
pub fn namespace_prefix(namespace: &str) -> Result<String, ProviderError> {
    validate_namespace(namespace)?;

    Ok(format!("{}{}", namespace, SEPARATOR))
}

pub fn compose_key(namespace: &str, key: &str) -> Result<String, ProviderError> {
    Ok(format!("{}{}", namespace_prefix(namespace)?, key))
}
