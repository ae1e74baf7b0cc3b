//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::BakesyncConfig;
use super::secret::secret_string;
use crate::domain::errors::SyncError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Substitutes `${VAR}` placeholders from the environment
/// 3. Parses the TOML into [`BakesyncConfig`]
/// 4. Applies `BAKESYNC_<SECTION>_<KEY>` environment overrides
/// 5. Validates the result
///
/// # Errors
///
/// Returns [`SyncError::Configuration`] if the file cannot be read or
/// parsed, a referenced variable is not set, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use bakesync::config::load_config;
///
/// let config = load_config("bakesync.toml").expect("Failed to load config");
/// println!("serving on {}", config.server.bind_address());
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BakesyncConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SyncError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SyncError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parse, override and validate configuration text
pub fn parse_config(contents: &str) -> Result<BakesyncConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: BakesyncConfig = toml::from_str(&contents)
        .map_err(|e| SyncError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        SyncError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched. All missing variables are reported at
/// once.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| SyncError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |cap: &regex::Captures<'_>| {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(SyncError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env(key: &str) -> Option<String> {
    std::env::var(format!("BAKESYNC_{key}")).ok()
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env(key).and_then(|v| v.parse().ok())
}

/// Applies environment variable overrides using the `BAKESYNC_` prefix
///
/// Variables follow the pattern `BAKESYNC_<SECTION>_<KEY>`, for example
/// `BAKESYNC_JDE_PASSWORD` or `BAKESYNC_SERVER_PORT`. Values that fail to
/// parse are ignored.
fn apply_env_overrides(config: &mut BakesyncConfig) {
    if let Some(val) = env("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Server
    if let Some(val) = env("SERVER_HOST") {
        config.server.host = val;
    }
    if let Some(port) = env_parsed("SERVER_PORT") {
        config.server.port = port;
    }
    if let Some(val) = env("SERVER_CORS_ORIGINS") {
        config.server.cors_origins = val.split(',').map(|s| s.trim().to_string()).collect();
    }

    // JDE
    if let Some(val) = env("JDE_CARDEX_URL") {
        config.jde.cardex_url = val;
    }
    if let Some(val) = env("JDE_ITEM_MASTER_URL") {
        config.jde.item_master_url = val;
    }
    if let Some(val) = env("JDE_INVENTORY_ADJUSTMENT_URL") {
        config.jde.inventory_adjustment_url = Some(val);
    }
    if let Some(val) = env("JDE_USERNAME") {
        config.jde.username = Some(val);
    }
    if let Some(val) = env("JDE_PASSWORD") {
        config.jde.password = Some(secret_string(val));
    }
    if let Some(val) = env("JDE_BUSINESS_UNIT") {
        config.jde.business_unit = val;
    }
    if let Some(tls) = env_parsed("JDE_TLS_VERIFY") {
        config.jde.tls_verify = tls;
    }

    // Bakery-ops
    if let Some(val) = env("BAKERY_OPS_BASE_URL") {
        config.bakery_ops.base_url = val;
    }
    if let Some(val) = env("BAKERY_OPS_OUTLET_ID") {
        config.bakery_ops.outlet_id = val;
    }
    if let Some(val) = env("BAKERY_OPS_TOKEN") {
        config.bakery_ops.token = secret_string(val);
    }
    if let Some(tls) = env_parsed("BAKERY_OPS_TLS_VERIFY") {
        config.bakery_ops.tls_verify = tls;
    }

    // PostgreSQL
    if let Some(val) = env("POSTGRESQL_CONNECTION_STRING") {
        config.postgresql.connection_string = secret_string(val);
    }
    if let Some(val) = env("POSTGRESQL_SCHEMA") {
        config.postgresql.schema = Some(val);
    }
    if let Some(max) = env_parsed("POSTGRESQL_MAX_CONNECTIONS") {
        config.postgresql.max_connections = max;
    }

    // Data lake
    if let Some(enabled) = env_parsed("DATA_LAKE_ENABLED") {
        config.data_lake.enabled = enabled;
    }
    if let Some(val) = env("DATA_LAKE_BUCKET") {
        config.data_lake.bucket = val;
    }
    if let Some(val) = env("DATA_LAKE_REGION") {
        config.data_lake.region = Some(val);
    }

    // Auth
    if let Some(enabled) = env_parsed("AUTH_ENABLED") {
        config.auth.enabled = enabled;
    }
    if let Some(val) = env("AUTH_SECRET_KEY") {
        config.auth.secret_key = Some(secret_string(val));
    }
    if let Some(val) = env("AUTH_ALGORITHM") {
        config.auth.algorithm = val;
    }

    // Review
    if let Some(ttl) = env_parsed("REVIEW_SESSION_TTL_MINUTES") {
        config.review.session_ttl_minutes = ttl;
    }

    // Logging
    if let Some(enabled) = env_parsed("LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = enabled;
    }
    if let Some(val) = env("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[jde]
cardex_url = "https://jde.example.com/cardex"
item_master_url = "https://jde.example.com/items"

[bakery_ops]
base_url = "https://api.bakery.example/v1"
outlet_id = "204"
token = "tok"

[postgresql]
connection_string = "postgresql://u:p@localhost:5432/bakery"

[auth]
secret_key = "signing-key"
"#;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("BAKESYNC_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${BAKESYNC_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("BAKESYNC_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_reports_all_missing() {
        let input = "a = \"${BAKESYNC_MISSING_ONE}\"\nb = \"${BAKESYNC_MISSING_TWO}\"";
        let err = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err.contains("BAKESYNC_MISSING_ONE, BAKESYNC_MISSING_TWO"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# token = \"${BAKESYNC_NEVER_SET}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("nonexistent-bakesync.toml").unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[test]
    fn test_load_config_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.bakery_ops.outlet_id, "204");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.review.session_ttl_minutes, 60);
        assert_eq!(
            config.auth.secret_key.as_ref().unwrap().expose_secret().as_ref(),
            "signing-key"
        );
    }

    #[test]
    fn test_parse_config_validation_error() {
        let broken = MINIMAL.replace("https://api.bakery.example/v1", "api.bakery.example");
        let err = parse_config(&broken).unwrap_err().to_string();
        assert!(err.contains("Configuration validation failed"));
        assert!(err.contains("bakery_ops.base_url"));
    }
}
