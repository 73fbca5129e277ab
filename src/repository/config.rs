//! Repository configuration.

/// Repository options.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Request relevance ranking for every query.
    pub ranking: bool,
    /// Memoize compiled queries.
    pub cache_compiled: bool,
    /// Limit applied to queries that set none.
    pub default_limit: Option<usize>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            ranking: false,
            cache_compiled: true,
            default_limit: None,
        }
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set ranking flag.
    pub fn ranking(mut self, value: bool) -> Self {
        self.ranking = value;
        self
    }

    /// Set cache_compiled flag.
    pub fn cache_compiled(mut self, value: bool) -> Self {
        self.cache_compiled = value;
        self
    }

    pub fn default_limit(mut self, limit: usize) -> Self {
        self.default_limit = Some(limit);
        self
    }
}
