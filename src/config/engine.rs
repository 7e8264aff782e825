use std::path::{Path, PathBuf};

use crate::diagnostic::Diagnostic;
use crate::runtime::namespace::DEFAULT_MAX_RECURSION;
use crate::span::Span;

pub const CONFIG_FILE: &str = "fastats.toml";

/// Environment variable that turns on pass tracing (`1`, `true`, `yes`).
pub const DEBUG_ENV: &str = "FASTATS_DEBUG";

/// How a specialization pass makes rewritten callees visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Isolation {
    /// Each pass gets a private overlay; shared namespaces are never written.
    Private,
    /// Passes write into the shared namespace under its pass lock and
    /// restore it afterwards.
    Shared,
}

impl Isolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Isolation::Private => "private",
            Isolation::Shared => "shared",
        }
    }
}

/// Engine settings from the `[engine]` section of fastats.toml.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub isolation: Isolation,
    /// Memoize compiled specializations by fingerprint.
    pub cache: bool,
    /// Pre-specialize function-valued overrides in parallel.
    pub parallel: bool,
    /// Trace passes to stderr.
    pub debug: bool,
    /// Reject overrides that match no call site.
    pub strict_overrides: bool,
    /// Interpreter recursion limit.
    pub max_recursion: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            isolation: Isolation::Private,
            cache: true,
            parallel: true,
            debug: false,
            strict_overrides: false,
            max_recursion: DEFAULT_MAX_RECURSION,
        }
    }
}

impl EngineConfig {
    /// Load from a fastats.toml file.
    pub fn load(toml_path: &Path) -> Result<EngineConfig, Diagnostic> {
        let content = std::fs::read_to_string(toml_path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read '{}': {}", toml_path.display(), e),
                Span::dummy(),
            )
        })?;
        Self::parse(&content).map_err(|d| {
            d.with_note(format!("while reading '{}'", toml_path.display()))
        })
    }

    /// Section-aware minimal TOML parsing; only `[engine]` is read.
    pub fn parse(content: &str) -> Result<EngineConfig, Diagnostic> {
        let mut config = EngineConfig::default();
        let mut current_section = String::new();

        for (line_no, line) in content.lines().enumerate() {
            let trimmed = strip_comment(line).trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            if current_section != "engine" {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(config_error(line_no, format!("expected `key = value`, found '{}'", trimmed)));
            };
            let key = key.trim().trim_matches('"');
            let value = value.trim();
            match key {
                "isolation" => {
                    config.isolation = match value.trim_matches('"') {
                        "private" => Isolation::Private,
                        "shared" => Isolation::Shared,
                        other => {
                            return Err(config_error(
                                line_no,
                                format!("unknown isolation mode '{}'", other),
                            )
                            .with_help("use \"private\" or \"shared\"".to_string()))
                        }
                    }
                }
                "cache" => config.cache = parse_bool(line_no, key, value)?,
                "parallel" => config.parallel = parse_bool(line_no, key, value)?,
                "debug" => config.debug = parse_bool(line_no, key, value)?,
                "strict_overrides" => config.strict_overrides = parse_bool(line_no, key, value)?,
                "max_recursion" => {
                    config.max_recursion = value.parse::<usize>().map_err(|_| {
                        config_error(line_no, format!("max_recursion must be a positive integer, found '{}'", value))
                    })?;
                }
                other => {
                    return Err(config_error(line_no, format!("unknown key '{}' in [engine]", other))
                        .with_help(
                            "known keys: isolation, cache, parallel, debug, strict_overrides, max_recursion"
                                .to_string(),
                        ))
                }
            }
        }
        Ok(config)
    }

    /// Try to find a fastats.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// The nearest fastats.toml above `start_dir`, or defaults, with the
    /// environment applied on top.
    pub fn discover(start_dir: &Path) -> Result<EngineConfig, Diagnostic> {
        let config = match Self::find(start_dir) {
            Some(path) => Self::load(&path)?,
            None => EngineConfig::default(),
        };
        Ok(config.with_env())
    }

    /// Apply `FASTATS_DEBUG`.
    pub fn with_env(mut self) -> Self {
        if let Ok(value) = std::env::var(DEBUG_ENV) {
            self.debug = matches!(value.trim(), "1" | "true" | "yes");
        }
        self
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_bool(line_no: usize, key: &str, value: &str) -> Result<bool, Diagnostic> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(config_error(
            line_no,
            format!("{} must be true or false, found '{}'", key, other),
        )),
    }
}

fn config_error(line_no: usize, message: String) -> Diagnostic {
    Diagnostic::error(format!("{}: line {}: {}", CONFIG_FILE, line_no + 1, message), Span::dummy())
}
