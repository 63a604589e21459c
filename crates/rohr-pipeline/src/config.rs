//! Pipeline configuration.

/// Configuration shared by every scope of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Whether [`rescope`](crate::Pipeline::rescope) walks its path from the
    /// root record (`true`) or from the current scope (`false`).
    pub rescope_from_root: bool,
    /// Separator used when rendering scope paths in error records.
    pub scope_separator: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rescope_from_root: true,
            scope_separator: ".".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rescopes_from_root_with_dots() {
        let config = PipelineConfig::default();
        assert!(config.rescope_from_root);
        assert_eq!(config.scope_separator, ".");
    }
}
