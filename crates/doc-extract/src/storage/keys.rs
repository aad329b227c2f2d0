//! Destination artifact keys

const TEXT_SUFFIX: &str = ".txt";
const STRUCTURED_SUFFIX: &str = ".json";

fn with_suffix(identifier: &str, suffix: &str) -> String {
    if identifier.ends_with(suffix) {
        identifier.to_string()
    } else {
        format!("{}{}", identifier, suffix)
    }
}

/// Key of the plain text artifact for `identifier`
pub fn text_key(identifier: &str) -> String {
    with_suffix(identifier, TEXT_SUFFIX)
}

/// Key of the structured (block JSON) artifact for `identifier`
pub fn structured_key(identifier: &str) -> String {
    with_suffix(identifier, STRUCTURED_SUFFIX)
}
