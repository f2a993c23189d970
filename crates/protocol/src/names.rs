//! Resource-name helpers.
//!
//! Backend resources are addressed by slash-separated paths such as
//! `projects/<project>/agent/sessions/<session>/contexts/<context>`.

use {once_cell::sync::Lazy, regex::Regex};

#[derive(Debug, thiserror::Error)]
pub enum NameError {
    #[error("resource name \"{0}\" has no agent path, expected \"projects/<project>/agent/...\"")]
    NoAgentPath(String),
}

static AGENT_PATH: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"projects/([a-zA-Z\d_.-]+)/agent").ok());

/// Full name of a context inside a session.
#[must_use]
pub fn context_name(session: &str, context: &str) -> String {
    format!("{session}/contexts/{context}")
}

/// The `projects/<project>/agent` prefix of a resource name.
///
/// # Errors
///
/// Returns [`NameError::NoAgentPath`] if the name does not contain one.
pub fn agent_path(path: &str) -> Result<&str, NameError> {
    AGENT_PATH
        .as_ref()
        .and_then(|re| re.find(path))
        .map(|m| m.as_str())
        .ok_or_else(|| NameError::NoAgentPath(path.to_string()))
}

/// Last segment of a resource path.
#[must_use]
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_path_from_session() {
        let session = "projects/9c4e97ab-13ec/agent/sessions/abc";
        assert_eq!(agent_path(session).unwrap(), "projects/9c4e97ab-13ec/agent");
        assert_eq!(
            agent_path("projects/p_1/agent").unwrap(),
            "projects/p_1/agent"
        );
    }

    #[test]
    fn agent_path_rejects_bare_project() {
        assert!(agent_path("projects/9c4e97ab").is_err());
        assert!(agent_path("9c4e97ab").is_err());
    }

    #[test]
    fn last_segment_of_nested_path() {
        assert_eq!(last_segment("projects/p/agent/sessions/123"), "123");
        assert_eq!(
            last_segment("projects/p/agent/sessions/123/reviews/456"),
            "456"
        );
        assert_eq!(last_segment("plain"), "plain");
    }

    #[test]
    fn context_name_joins_session() {
        assert_eq!(context_name("s/1", "exact_intent"), "s/1/contexts/exact_intent");
    }
}
