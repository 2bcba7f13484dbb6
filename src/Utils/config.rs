//! TOML configuration:
//! ```toml
//! [logging]
//! level = "info"        # trace | debug | info | warn | error | off
//! file = "auto"         # a path, or "auto" for a timestamped log_<date>.txt
//!
//! [evaluation]
//! identity_policy = "alias"           # alias | copy
//! warn_on_transposed_collapse = true
//! ```
//! Missing sections and keys keep their defaults.
use crate::Utils::logger::{init_logger, parse_level, timestamped_log_name};
use crate::block::block_error::{BlockError, BlockResult};
use crate::block::block_mat::{BlockMat, IdentityPolicy};
use crate::block::collapse::{Collapsed, collapse_with};
use crate::block::operand::Operand;
use log::LevelFilter;
use std::fs;
use toml::{Table, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct BlockConfig {
    pub log_level: LevelFilter,
    pub log_file: Option<String>,
    pub identity_policy: IdentityPolicy,
    pub warn_on_transposed_collapse: bool,
}

impl Default for BlockConfig {
    fn default() -> Self {
        BlockConfig {
            log_level: LevelFilter::Info,
            log_file: None,
            identity_policy: IdentityPolicy::Alias,
            warn_on_transposed_collapse: true,
        }
    }
}

fn section<'a>(table: &'a Table, name: &str) -> BlockResult<Option<&'a Table>> {
    match table.get(name) {
        None => Ok(None),
        Some(Value::Table(t)) => Ok(Some(t)),
        Some(other) => Err(BlockError::Configuration(format!(
            "[{}] must be a table, got {}",
            name, other
        ))),
    }
}

fn string_key<'a>(table: &'a Table, section: &str, key: &str) -> BlockResult<Option<&'a str>> {
    match table.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(BlockError::Configuration(format!(
            "{}.{} must be a string, got {}",
            section, key, other
        ))),
    }
}

impl BlockConfig {
    pub fn from_toml_str(text: &str) -> BlockResult<Self> {
        let table: Table = text
            .parse()
            .map_err(|e| BlockError::Configuration(format!("invalid TOML: {}", e)))?;
        let mut config = BlockConfig::default();

        if let Some(logging) = section(&table, "logging")? {
            if let Some(level) = string_key(logging, "logging", "level")? {
                config.log_level = parse_level(level)?;
            }
            config.log_file = match string_key(logging, "logging", "file")? {
                Some("auto") => Some(timestamped_log_name()),
                Some(path) => Some(path.to_string()),
                None => None,
            };
        }

        if let Some(evaluation) = section(&table, "evaluation")? {
            if let Some(policy) = string_key(evaluation, "evaluation", "identity_policy")? {
                config.identity_policy = policy.parse().map_err(|_| {
                    BlockError::Configuration(format!(
                        "evaluation.identity_policy must be alias or copy, got {}",
                        policy
                    ))
                })?;
            }
            match evaluation.get("warn_on_transposed_collapse") {
                None => {}
                Some(Value::Boolean(flag)) => config.warn_on_transposed_collapse = *flag,
                Some(other) => {
                    return Err(BlockError::Configuration(format!(
                        "evaluation.warn_on_transposed_collapse must be true or false, got {}",
                        other
                    )));
                }
            }
        }
        Ok(config)
    }

    pub fn from_file(path: &str) -> BlockResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| BlockError::Configuration(format!("can't read {}: {}", path, e)))?;
        BlockConfig::from_toml_str(&text)
    }

    pub fn init_logging(&self) -> bool {
        init_logger(self.log_level, self.log_file.as_deref())
    }

    /// sets the identity policy of `mat`
    pub fn configure(&self, mat: &mut BlockMat) {
        mat.set_identity_policy(self.identity_policy);
    }

    pub fn collapse(&self, x: &Operand) -> BlockResult<Collapsed> {
        collapse_with(x, self.warn_on_transposed_collapse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_gives_defaults() {
        assert_eq!(BlockConfig::from_toml_str("").unwrap(), BlockConfig::default());
    }

    #[test]
    fn all_keys_are_read() {
        let text = r#"
            [logging]
            level = "debug"
            file = "blocks.log"

            [evaluation]
            identity_policy = "copy"
            warn_on_transposed_collapse = false
        "#;
        let config = BlockConfig::from_toml_str(text).unwrap();
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.log_file.as_deref(), Some("blocks.log"));
        assert_eq!(config.identity_policy, IdentityPolicy::Copy);
        assert!(!config.warn_on_transposed_collapse);

        let mut m = BlockMat::new(1, 1);
        config.configure(&mut m);
        assert_eq!(m.identity_policy(), IdentityPolicy::Copy);
    }

    #[test]
    fn auto_log_file_is_timestamped() {
        let config = BlockConfig::from_toml_str("[logging]\nfile = \"auto\"").unwrap();
        assert!(config.log_file.unwrap().starts_with("log_"));
    }

    #[test]
    fn malformed_values_are_configuration_errors() {
        for text in [
            "[evaluation]\nidentity_policy = \"view\"",
            "[evaluation]\nwarn_on_transposed_collapse = \"yes\"",
            "[logging]\nlevel = 3",
            "logging = 1",
            "[logging\nlevel = \"info\"",
        ] {
            assert!(
                matches!(BlockConfig::from_toml_str(text), Err(BlockError::Configuration(_))),
                "accepted: {}",
                text
            );
        }
        assert!(BlockConfig::from_file("/nonexistent/blocks.toml").is_err());
    }
}
