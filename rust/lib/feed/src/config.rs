use serde::{Deserialize, Serialize};

/// Client tunables. Every field has a default, so a partial (or empty)
/// config section is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Posts per feed / explore / profile load.
    pub page_size: usize,

    /// Maximum post length in characters.
    pub max_post_len: usize,

    /// Maximum comment length in characters.
    pub max_comment_len: usize,

    /// Handle shown on a provisional comment when the viewer's profile is
    /// not cached, and for authors whose profile row is missing.
    pub placeholder_handle: String,

    /// Avatar color paired with `placeholder_handle`.
    pub placeholder_avatar_color: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_post_len: 2000,
            max_comment_len: 1000,
            placeholder_handle: "Anonymous".to_string(),
            placeholder_avatar_color: "#555".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: FeedConfig = serde_json::from_str(r#"{"page_size": 5}"#).unwrap();
        assert_eq!(config.page_size, 5);
        assert_eq!(config.max_post_len, 2000);
        assert_eq!(config.placeholder_handle, "Anonymous");
    }
}
