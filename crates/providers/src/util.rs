use al_domain::error::Error;

/// Map a reqwest error to the shared error type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Classify a provider HTTP failure by status and body.
///
/// Rate limiting is retryable; context-window and content-policy
/// rejections are semantic and must not be retried.
pub(crate) fn classify_provider_error(provider: &str, status: u16, body: &str) -> Error {
    let lower = body.to_lowercase();
    if status == 429 {
        return Error::RateLimited(format!("{provider}: HTTP 429 - {body}"));
    }
    if lower.contains("context length")
        || lower.contains("context window")
        || lower.contains("maximum context")
        || lower.contains("context_length_exceeded")
    {
        return Error::ContextWindow(format!("{provider}: {body}"));
    }
    if lower.contains("content policy")
        || lower.contains("content_filter")
        || lower.contains("content management policy")
    {
        return Error::ContentPolicy(format!("{provider}: {body}"));
    }
    if (500..600).contains(&(status as i32)) {
        // Upstream hiccups are retryable.
        return Error::Http(format!("{provider}: HTTP {status} - {body}"));
    }
    Error::Provider {
        provider: provider.to_string(),
        message: format!("HTTP {status} - {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_retryable() {
        let err = classify_provider_error("openai", 429, "slow down");
        assert!(err.is_retryable());
    }

    #[test]
    fn context_window_is_not_retryable() {
        let err = classify_provider_error(
            "openai",
            400,
            "This model's maximum context length is 128000 tokens",
        );
        assert!(matches!(err, Error::ContextWindow(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn content_filter_is_semantic() {
        let err = classify_provider_error("openai", 400, "blocked by content_filter");
        assert!(matches!(err, Error::ContentPolicy(_)));
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = classify_provider_error("openai", 503, "overloaded");
        assert!(err.is_retryable());
    }

    #[test]
    fn other_client_errors_are_terminal() {
        let err = classify_provider_error("openai", 400, "bad request");
        assert!(matches!(err, Error::Provider { .. }));
        assert!(!err.is_retryable());
    }
}
