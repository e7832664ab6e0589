#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::logging::LogFormat;
use crate::upstream::{DEFAULT_API_ENDPOINT, DEFAULT_USER_AGENT};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_TIKSAVE_PORT: u16 = 3000;
pub const DEFAULT_TIKSAVE_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub api_endpoint: String,
    pub user_agent: String,
    /// `None` leaves outbound calls unbounded.
    pub upstream_timeout: Option<Duration>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub api_endpoint: Option<String>,
    pub upstream_timeout_secs: Option<u64>,
    pub log_format: Option<LogFormat>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_settings_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<Settings> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let host = non_blank(overrides.host)
        .or_else(|| lookup("TIKSAVE_HOST"))
        .unwrap_or_else(|| DEFAULT_TIKSAVE_HOST.to_string());
    let port = overrides
        .port
        .or_else(|| lookup("TIKSAVE_PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_TIKSAVE_PORT);
    let api_endpoint = non_blank(overrides.api_endpoint)
        .or_else(|| lookup("TIKSAVE_API_ENDPOINT"))
        .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());
    let user_agent = lookup("TIKSAVE_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
    let upstream_timeout = overrides
        .upstream_timeout_secs
        .or_else(|| {
            lookup("TIKSAVE_UPSTREAM_TIMEOUT_SECS").and_then(|value| value.parse::<u64>().ok())
        })
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);
    let log_format = match overrides.log_format {
        Some(format) => format,
        None => match lookup("TIKSAVE_LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .with_context(|| format!("TIKSAVE_LOG_FORMAT={raw}"))?,
            None => LogFormat::default(),
        },
    };

    Ok(Settings {
        host,
        port,
        api_endpoint,
        user_agent,
        upstream_timeout,
        log_format,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_var_string(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| non_blank(file_vars.get(key).cloned()))
}

/// Reads `KEY=value` lines. Comments, blank lines, `export` prefixes and
/// surrounding quotes are tolerated; a missing file yields no values.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn settings_from(contents: &str) -> Settings {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_settings(&vars, |_| None).unwrap()
    }

    #[test]
    fn defaults_when_nothing_is_configured() {
        let settings = build_settings(&HashMap::new(), |_| None).unwrap();
        assert_eq!(settings.host, DEFAULT_TIKSAVE_HOST);
        assert_eq!(settings.port, DEFAULT_TIKSAVE_PORT);
        assert_eq!(settings.api_endpoint, DEFAULT_API_ENDPOINT);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(settings.upstream_timeout, None);
        assert_eq!(settings.log_format, LogFormat::Text);
    }

    #[test]
    fn reads_values_from_env_file() {
        let settings = settings_from(
            "TIKSAVE_PORT=\"4242\"\nTIKSAVE_HOST=0.0.0.0\nTIKSAVE_API_ENDPOINT='http://localhost:9000/api/'\nTIKSAVE_UPSTREAM_TIMEOUT_SECS=15\nTIKSAVE_LOG_FORMAT=json\n",
        );
        assert_eq!(settings.port, 4242);
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.api_endpoint, "http://localhost:9000/api/");
        assert_eq!(settings.upstream_timeout, Some(Duration::from_secs(15)));
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn zero_or_invalid_timeout_means_unbounded() {
        assert_eq!(
            settings_from("TIKSAVE_UPSTREAM_TIMEOUT_SECS=0\n").upstream_timeout,
            None
        );
        assert_eq!(
            settings_from("TIKSAVE_UPSTREAM_TIMEOUT_SECS=soon\n").upstream_timeout,
            None
        );
    }

    #[test]
    fn invalid_port_defaults() {
        assert_eq!(settings_from("TIKSAVE_PORT=nope\n").port, DEFAULT_TIKSAVE_PORT);
    }

    #[test]
    fn unknown_log_format_is_an_error() {
        let vars = read_env_file(make_config("TIKSAVE_LOG_FORMAT=xml\n").path()).unwrap();
        let err = build_settings(&vars, |_| None).unwrap_err();
        assert!(err.to_string().contains("TIKSAVE_LOG_FORMAT"));
    }

    #[test]
    fn env_wins_over_file() {
        let vars = read_env_file(make_config("TIKSAVE_PORT=4000\n").path()).unwrap();
        let settings = build_settings(&vars, |key| {
            (key == "TIKSAVE_PORT").then(|| "5000".to_string())
        })
        .unwrap();
        assert_eq!(settings.port, 5000);
    }

    #[test]
    fn overrides_win_over_env_and_file() {
        let mut vars = HashMap::new();
        vars.insert("TIKSAVE_HOST".to_string(), "file-host".to_string());
        vars.insert("TIKSAVE_PORT".to_string(), "7000".to_string());
        vars.insert("TIKSAVE_API_ENDPOINT".to_string(), "http://file/".to_string());

        let overrides = SettingsOverrides {
            host: Some("override-host".into()),
            port: Some(9000),
            api_endpoint: None,
            upstream_timeout_secs: Some(3),
            log_format: Some(LogFormat::Json),
            env_path: None,
        };

        let settings = build_settings_with_overrides(
            &vars,
            |key| match key {
                "TIKSAVE_PORT" => Some("8000".to_string()),
                "TIKSAVE_API_ENDPOINT" => Some("http://env/".to_string()),
                _ => None,
            },
            overrides,
        )
        .unwrap();

        assert_eq!(settings.host, "override-host");
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.api_endpoint, "http://env/");
        assert_eq!(settings.upstream_timeout, Some(Duration::from_secs(3)));
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_host_override_is_ignored() {
        let settings = build_settings_with_overrides(
            &HashMap::new(),
            |_| None,
            SettingsOverrides {
                host: Some("   ".into()),
                ..SettingsOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(settings.host, DEFAULT_TIKSAVE_HOST);
    }

    #[test]
    fn read_env_file_handles_export_quotes_and_comments() {
        let cfg = make_config(
            r#"
            export TIKSAVE_HOST="0.0.0.0"
            TIKSAVE_USER_AGENT='curl/8'
            TIKSAVE_PORT =  "9090"
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("TIKSAVE_HOST").unwrap(), "0.0.0.0");
        assert_eq!(vars.get("TIKSAVE_USER_AGENT").unwrap(), "curl/8");
        assert_eq!(vars.get("TIKSAVE_PORT").unwrap(), "9090");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn resolve_settings_uses_explicit_env_path() {
        let cfg = make_config("TIKSAVE_USER_AGENT=from-file/1.0\n");
        let settings = resolve_settings(SettingsOverrides {
            env_path: Some(cfg.path().to_path_buf()),
            ..SettingsOverrides::default()
        })
        .unwrap();
        // A real TIKSAVE_USER_AGENT in the environment takes precedence.
        if env::var("TIKSAVE_USER_AGENT").is_err() {
            assert_eq!(settings.user_agent, "from-file/1.0");
        }
    }
}
