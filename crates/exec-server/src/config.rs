use anyhow::Context;
use script_runner::{InterpreterConfig, LimitsConfig};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ServerConfig {
    pub(crate) interpreter: InterpreterConfig,
    pub(crate) limits: LimitsConfig,
    pub(crate) server: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct HttpConfig {
    pub(crate) max_request_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl ServerConfig {
    pub(crate) fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: ServerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.interpreter.program.trim().is_empty() {
            anyhow::bail!("interpreter.program must not be empty");
        }
        if self.limits.timeout_ms == 0 {
            anyhow::bail!("limits.timeout_ms must be greater than zero");
        }
        if self.limits.max_output_chars == 0 {
            anyhow::bail!("limits.max_output_chars must be greater than zero");
        }
        if self.server.max_request_bytes == 0 {
            anyhow::bail!("server.max_request_bytes must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ServerConfig::parse("").expect("parse");
        assert_eq!(config.interpreter, InterpreterConfig::default());
        assert_eq!(config.limits, LimitsConfig::default());
        assert_eq!(config.server.max_request_bytes, 1024 * 1024);
    }

    #[test]
    fn sections_override_defaults() {
        let raw = r#"
            [interpreter]
            program = "/usr/bin/python3.12"
            args = ["-I", "-c"]
            cwd = "/srv/scratch"

            [limits]
            timeout_ms = 5000
        "#;
        let config = ServerConfig::parse(raw).expect("parse");
        assert_eq!(config.interpreter.program, "/usr/bin/python3.12");
        assert_eq!(config.interpreter.args, vec!["-I", "-c"]);
        assert_eq!(config.interpreter.cwd, Some(PathBuf::from("/srv/scratch")));
        assert_eq!(config.limits.timeout_ms, 5000);
        assert_eq!(config.limits.max_output_chars, 10_000);
    }

    #[test]
    fn rejects_zero_limits_and_blank_program() {
        let err = ServerConfig::parse("[limits]\ntimeout_ms = 0\n").expect_err("zero timeout");
        assert!(err.to_string().contains("timeout_ms"));

        let err =
            ServerConfig::parse("[limits]\nmax_output_chars = 0\n").expect_err("zero output cap");
        assert!(err.to_string().contains("max_output_chars"));

        let err = ServerConfig::parse("[interpreter]\nprogram = \" \"\n").expect_err("blank");
        assert!(err.to_string().contains("program"));
    }

    #[test]
    fn missing_path_means_defaults() {
        let config = ServerConfig::load_or_default(None).expect("defaults");
        assert_eq!(config.limits.timeout_ms, 30_000);
    }

    #[test]
    fn unreadable_file_reports_path() {
        let path = Path::new("/nonexistent/exec-server.toml");
        let err = ServerConfig::load(path).expect_err("missing file");
        assert!(format!("{err:#}").contains("/nonexistent/exec-server.toml"));
    }
}
