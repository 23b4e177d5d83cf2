//! Base URLs of OpenAI-compatible endpoints.

/// Normalise `base` so it ends in `/v1` and has no trailing slash.
///
/// Ollama and most local servers serve the OpenAI routes under `/v1`, but are
/// often configured with just `http://host:11434`.
pub fn normalize_api_base(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_v1_when_missing() {
        assert_eq!(normalize_api_base("http://localhost:11434"), "http://localhost:11434/v1");
        assert_eq!(normalize_api_base("http://localhost:11434/"), "http://localhost:11434/v1");
    }

    #[test]
    fn keeps_existing_v1() {
        assert_eq!(normalize_api_base("http://gpu:11434/v1"), "http://gpu:11434/v1");
        assert_eq!(normalize_api_base(" http://gpu:11434/v1/ "), "http://gpu:11434/v1");
    }
}
