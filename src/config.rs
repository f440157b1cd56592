//! Runtime configuration.
use std::env;
use std::path::PathBuf;

use tracing::Level;

pub const ENV_CLASSPATH: &str = "POUROVER_CLASSPATH";
pub const ENV_STRICT_MAGIC: &str = "POUROVER_STRICT_MAGIC";
pub const ENV_MAX_STACK_DEPTH: &str = "POUROVER_MAX_STACK_DEPTH";
pub const ENV_LOG: &str = "POUROVER_LOG";

const DEFAULT_LOG_LEVEL: Level = Level::WARN;

/// Default limit on the number of frames on the call stack.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 4096;

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Directories searched for `<name>.class` files.
    pub class_path: Vec<PathBuf>,
    /// Reject class files with a bad magic value instead of warning.
    pub strict_magic: bool,
    /// Maximum number of frames on the call stack.
    pub max_stack_depth: usize,
    /// Short class names registered under a bootstrap name, so that
    /// self-referential system classes resolve to themselves while loading.
    pub bootstrap_aliases: Vec<(String, String)>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            class_path: Vec::new(),
            strict_magic: false,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            bootstrap_aliases: vec![
                ("System".to_string(), "java/lang/System".to_string()),
                ("PrintStream".to_string(), "java/io/PrintStream".to_string()),
            ],
        }
    }
}

impl VmConfig {
    /// Defaults overridden by the `POUROVER_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(paths) = env::var_os(ENV_CLASSPATH) {
            config.class_path = env::split_paths(&paths).collect();
        }
        if let Ok(strict) = env::var(ENV_STRICT_MAGIC) {
            config.strict_magic = matches!(strict.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(depth) = env::var(ENV_MAX_STACK_DEPTH)
            .ok()
            .and_then(|depth| depth.parse().ok())
        {
            config.max_stack_depth = depth;
        }
        config
    }

    /// Log level named by `POUROVER_LOG`, `WARN` if unset or unknown.
    pub fn log_level() -> Level {
        env::var(ENV_LOG)
            .ok()
            .and_then(|level| parse_level(&level))
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn with_class_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.class_path.push(path.into());
        self
    }

    pub fn with_strict_magic(mut self, strict: bool) -> Self {
        self.strict_magic = strict;
        self
    }

    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Bootstrap name for `name`, if it is aliased.
    pub fn alias_for(&self, name: &str) -> Option<&str> {
        self.bootstrap_aliases
            .iter()
            .find(|(short, _)| short == name)
            .map(|(_, full)| full.as_str())
    }
}

fn parse_level(name: &str) -> Option<Level> {
    if name == "*" {
        return Some(Level::TRACE);
    }
    match name.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}
