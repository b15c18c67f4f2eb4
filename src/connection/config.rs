use crate::core::{RequestError, Result};
use crate::statement::PlaceholderStyle;
use std::env;

/// Orchestrator configuration
///
/// Built with the builder methods, or read from `MODELKIT_*` environment
/// variables with [`OrmConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrmConfig {
    /// Log every rendered statement at DEBUG level
    pub log_statements: bool,

    /// Placeholder syntax used when rendering statements for logs
    pub placeholder_style: PlaceholderStyle,

    /// Largest page a query may request
    pub max_page_size: Option<u64>,
}

impl OrmConfig {
    pub const ENV_LOG_STATEMENTS: &'static str = "MODELKIT_LOG_STATEMENTS";
    pub const ENV_PLACEHOLDER_STYLE: &'static str = "MODELKIT_PLACEHOLDER_STYLE";
    pub const ENV_MAX_PAGE_SIZE: &'static str = "MODELKIT_MAX_PAGE_SIZE";

    pub fn new() -> Self {
        Self {
            log_statements: false,
            placeholder_style: PlaceholderStyle::Numbered,
            max_page_size: None,
        }
    }

    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    pub fn placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder_style = style;
        self
    }

    pub fn max_page_size(mut self, max: u64) -> Self {
        self.max_page_size = Some(max);
        self
    }

    /// Reads overrides from the environment; unset variables keep defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(raw) = lookup(Self::ENV_LOG_STATEMENTS) {
            config.log_statements = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(RequestError::internal(format!(
                        "{} must be a boolean, got '{}'",
                        Self::ENV_LOG_STATEMENTS,
                        other
                    )));
                }
            };
        }

        if let Some(raw) = lookup(Self::ENV_PLACEHOLDER_STYLE) {
            config.placeholder_style = raw
                .parse()
                .map_err(|err: RequestError| err.context(Self::ENV_PLACEHOLDER_STYLE))?;
        }

        if let Some(raw) = lookup(Self::ENV_MAX_PAGE_SIZE) {
            let max = raw.trim().parse::<u64>().map_err(|_| {
                RequestError::internal(format!(
                    "{} must be a positive integer, got '{}'",
                    Self::ENV_MAX_PAGE_SIZE,
                    raw
                ))
            })?;
            config.max_page_size = Some(max);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == Some(0) {
            return Err(RequestError::internal("max_page_size must be > 0"));
        }
        Ok(())
    }
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self::new()
    }
}
