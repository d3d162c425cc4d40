//! Connection configuration normalization.
//!
//! Callers hand the adapter a connection string, a structured
//! [`StorageOptions`] value, or nothing at all. Every field is then resolved
//! with a fixed precedence: explicit value, then the matching
//! `BOTKIT_STORAGE_POSTGRES_*` environment variable (optionally loaded from a
//! `.env` file via `dotenvy`), then a built-in default. The result is a
//! [`StorageConfig`] that can always produce driver connect options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use url::Url;

use crate::error::{StorageError, StorageResult};

/// Environment variable for the database user.
pub const ENV_USER: &str = "BOTKIT_STORAGE_POSTGRES_USER";
/// Environment variable for the target database name.
pub const ENV_DATABASE: &str = "BOTKIT_STORAGE_POSTGRES_DATABASE";
/// Environment variable for the database password.
pub const ENV_PASSWORD: &str = "BOTKIT_STORAGE_POSTGRES_PASSWORD";
/// Environment variable for the server host.
pub const ENV_HOST: &str = "BOTKIT_STORAGE_POSTGRES_HOST";
/// Environment variable for the server port.
pub const ENV_PORT: &str = "BOTKIT_STORAGE_POSTGRES_PORT";
/// Environment variable for the maximum pool size.
pub const ENV_MAX_CLIENTS: &str = "BOTKIT_STORAGE_POSTGRES_MAX_CLIENTS";
/// Environment variable for the idle connection timeout in milliseconds.
pub const ENV_IDLE_TIMEOUT_MILLIS: &str = "BOTKIT_STORAGE_POSTGRES_IDLE_TIMEOUT_MILLIS";
/// Environment variable holding a full connection string. Only consulted
/// when the caller supplies no explicit configuration.
pub const ENV_CONNECTION_STRING: &str = "BOTKIT_STORAGE_POSTGRES_CONNECTIONSTRING";

const DEFAULT_USER: &str = "botkit";
const DEFAULT_DATABASE: &str = "botkit";
const DEFAULT_PASSWORD: &str = "botkit";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_IDLE_TIMEOUT_MILLIS: u64 = 30_000;

/// Database that exists on every PostgreSQL server.
pub const DEFAULT_MAINTENANCE_DATABASE: &str = "postgres";

/// Raw configuration input, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigInput {
    /// No explicit configuration: use the connection-string variable if
    /// set, otherwise per-field environment variables and defaults.
    #[default]
    Environment,
    /// A `postgres://` or `postgresql://` URI.
    ConnectionString(String),
    /// Structured options; unset fields fall back to environment/defaults.
    Options(StorageOptions),
}

impl ConfigInput {
    /// Interprets a dynamically-typed JSON value as configuration input.
    ///
    /// A JSON string is a connection string, a JSON object is
    /// [`StorageOptions`] and `null` means "environment only".
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfiguration`] for any other JSON
    /// type, or for an object whose fields have the wrong type.
    pub fn from_value(value: serde_json::Value) -> StorageResult<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::Environment),
            serde_json::Value::String(url) => Ok(Self::ConnectionString(url)),
            obj @ serde_json::Value::Object(_) => serde_json::from_value(obj)
                .map(Self::Options)
                .map_err(|e| StorageError::InvalidConfiguration(e.to_string())),
            other => Err(StorageError::InvalidConfiguration(format!(
                "can only accept a connection string or a configuration object, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

impl From<&str> for ConfigInput {
    fn from(url: &str) -> Self {
        Self::ConnectionString(url.to_string())
    }
}

impl From<String> for ConfigInput {
    fn from(url: String) -> Self {
        Self::ConnectionString(url)
    }
}

impl From<StorageOptions> for ConfigInput {
    fn from(options: StorageOptions) -> Self {
        Self::Options(options)
    }
}

/// Structured connection options. Every field is optional.
///
/// Deserializes from both `snake_case` keys and the camelCase keys used by
/// botkit configuration files (`maxClients`, `idleTimeoutMillis`). Numeric
/// fields accept numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Database user.
    pub user: Option<String>,
    /// Database password.
    pub password: Option<String>,
    /// Server host name or address.
    pub host: Option<String>,
    /// Server port.
    #[serde(deserialize_with = "de_opt_number")]
    pub port: Option<u16>,
    /// Target database name.
    pub database: Option<String>,
    /// Maximum number of pooled connections.
    #[serde(alias = "maxClients", alias = "max", deserialize_with = "de_opt_number")]
    pub max_clients: Option<u32>,
    /// Idle pooled connections are closed after this many milliseconds.
    #[serde(alias = "idleTimeoutMillis", deserialize_with = "de_opt_number")]
    pub idle_timeout_millis: Option<u64>,
    /// Database used for administrative statements during setup.
    #[serde(alias = "maintenanceDatabase")]
    pub maintenance_database: Option<String>,
    /// Extra driver parameters (e.g. `sslmode`), as found in a URI query.
    pub params: Vec<(String, String)>,
}

impl StorageOptions {
    /// Parses a `postgres://` / `postgresql://` connection string.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfiguration`] when the string is
    /// not a URI, uses another scheme, or carries an unparsable component.
    pub fn from_url(raw: &str) -> StorageResult<Self> {
        let url = Url::parse(raw).map_err(|e| {
            StorageError::InvalidConfiguration(format!("malformed connection string: {e}"))
        })?;

        match url.scheme() {
            "postgres" | "postgresql" => {}
            other => {
                return Err(StorageError::InvalidConfiguration(format!(
                    "unsupported connection string scheme '{other}'"
                )));
            }
        }

        let user = decode_component(url.username())?;
        let password = url.password().map(decode_component).transpose()?;
        let database = decode_component(url.path().trim_start_matches('/'))?;
        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string());

        let mut options = Self {
            user: non_empty(user),
            password: password.and_then(non_empty),
            host: host.and_then(non_empty),
            port: url.port(),
            database: non_empty(database),
            ..Self::default()
        };

        // Query parameters override the authority, as libpq does.
        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            match &*key {
                "host" => options.host = non_empty(value).or(options.host),
                "port" => {
                    if let Some(raw) = non_empty(value) {
                        options.port = Some(raw.parse().map_err(|_| {
                            StorageError::InvalidConfiguration(format!("'{raw}' is not a valid port"))
                        })?);
                    }
                }
                "user" => options.user = non_empty(value).or(options.user),
                "password" => options.password = non_empty(value).or(options.password),
                "dbname" => options.database = non_empty(value).or(options.database),
                _ => options.params.push((key.into_owned(), value)),
            }
        }

        Ok(options)
    }

    fn resolve<F>(self, env: &F) -> StorageResult<StorageConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = StorageConfig {
            user: pick_string(self.user, env, ENV_USER, DEFAULT_USER),
            password: pick_string(self.password, env, ENV_PASSWORD, DEFAULT_PASSWORD),
            host: pick_string(self.host, env, ENV_HOST, DEFAULT_HOST),
            port: pick_number(self.port, env, ENV_PORT, DEFAULT_PORT),
            database: pick_string(self.database, env, ENV_DATABASE, DEFAULT_DATABASE),
            max_connections: pick_number(
                self.max_clients,
                env,
                ENV_MAX_CLIENTS,
                DEFAULT_MAX_CONNECTIONS,
            ),
            idle_timeout: Duration::from_millis(pick_number(
                self.idle_timeout_millis,
                env,
                ENV_IDLE_TIMEOUT_MILLIS,
                DEFAULT_IDLE_TIMEOUT_MILLIS,
            )),
            maintenance_database: self
                .maintenance_database
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_MAINTENANCE_DATABASE.to_string()),
            params: self.params,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Overrides applied to every connection and pool the adapter builds.
///
/// Passed explicitly to the adapter rather than mutating any process-wide
/// driver state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientDefaults {
    /// Reported as `application_name` to the server.
    pub application_name: Option<String>,
    /// TLS mode (`disable`, `prefer`, `require`, ...).
    pub ssl_mode: Option<String>,
    /// Server-side `statement_timeout`, in milliseconds.
    pub statement_timeout_ms: Option<u64>,
    /// How long a caller waits for a free pooled connection, in
    /// milliseconds. The driver default applies when unset.
    pub acquire_timeout_ms: Option<u64>,
}

/// Canonical, fully-resolved connection configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Target database name.
    pub database: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Idle pooled connections are closed after this long.
    pub idle_timeout: Duration,
    /// Database used for the existence check and `CREATE DATABASE`.
    pub maintenance_database: String,
    /// Extra driver parameters.
    pub params: Vec<(String, String)>,
}

impl StorageConfig {
    /// Normalizes `input` against the process environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` first so a `.env` file can supply the
    /// `BOTKIT_STORAGE_POSTGRES_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfiguration`] for malformed input.
    pub fn from_input(input: ConfigInput) -> StorageResult<Self> {
        dotenvy::dotenv().ok();
        Self::resolve(input, |key| std::env::var(key).ok())
    }

    /// Normalizes with no explicit input: environment variables and
    /// defaults only.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfiguration`] if the
    /// connection-string variable is set but malformed.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_input(ConfigInput::Environment)
    }

    /// Normalizes `input` using `env` to look up environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfiguration`] for malformed input.
    pub fn resolve<F>(input: ConfigInput, env: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let options = match input {
            ConfigInput::Options(options) => options,
            ConfigInput::ConnectionString(url) => StorageOptions::from_url(&url)?,
            ConfigInput::Environment => match env(ENV_CONNECTION_STRING).and_then(non_empty) {
                Some(url) => StorageOptions::from_url(&url)?,
                None => StorageOptions::default(),
            },
        };
        options.resolve(&env)
    }

    fn validate(&self) -> StorageResult<()> {
        let invalid = |msg: &str| Err(StorageError::InvalidConfiguration(msg.to_string()));
        if self.port == 0 {
            return invalid("port must be non-zero");
        }
        if self.max_connections == 0 {
            return invalid("max pool size must be at least 1");
        }
        if self.database.len() > 63 {
            return invalid("database name exceeds 63 bytes");
        }
        for (key, value) in &self.params {
            if key == "options" {
                parse_server_options(value)?;
            }
        }
        self.connect_timeout()?;
        Ok(())
    }

    /// Timeout for opening a connection, from the `connect_timeout`
    /// parameter in seconds. Zero or negative means wait indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfiguration`] if the value is not
    /// an integer.
    pub fn connect_timeout(&self) -> StorageResult<Option<Duration>> {
        let Some((_, raw)) = self.params.iter().rev().find(|(key, _)| key == "connect_timeout")
        else {
            return Ok(None);
        };
        let seconds: i64 = raw.trim().parse().map_err(|_| {
            StorageError::InvalidConfiguration(format!("connect_timeout '{raw}' is not an integer"))
        })?;
        Ok(u64::try_from(seconds)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs))
    }

    /// Connect options targeting the configured database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfiguration`] if an extra parameter
    /// or client default has an invalid value.
    pub fn connect_options(&self, defaults: &ClientDefaults) -> StorageResult<PgConnectOptions> {
        self.connect_options_for(&self.database, defaults)
    }

    /// Connect options targeting the maintenance database.
    ///
    /// # Errors
    ///
    /// Same as [`StorageConfig::connect_options`].
    pub fn maintenance_connect_options(
        &self,
        defaults: &ClientDefaults,
    ) -> StorageResult<PgConnectOptions> {
        self.connect_options_for(&self.maintenance_database, defaults)
    }

    fn connect_options_for(
        &self,
        database: &str,
        defaults: &ClientDefaults,
    ) -> StorageResult<PgConnectOptions> {
        let mut options = PgConnectOptions::new();
        // A leading slash names a Unix socket directory.
        options = if self.host.starts_with('/') {
            options.socket(&self.host)
        } else {
            options.host(&self.host)
        };
        options = options
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(database);

        for (key, value) in &self.params {
            options = apply_param(options, key, value)?;
        }

        if let Some(name) = &defaults.application_name {
            options = options.application_name(name);
        }
        if let Some(mode) = &defaults.ssl_mode {
            options = options.ssl_mode(parse_ssl_mode(mode)?);
        }
        if let Some(ms) = defaults.statement_timeout_ms {
            options = options.options([("statement_timeout", ms)]);
        }

        Ok(options)
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("maintenance_database", &self.maintenance_database)
            .field("params", &self.params)
            .finish()
    }
}

fn apply_param(options: PgConnectOptions, key: &str, value: &str) -> StorageResult<PgConnectOptions> {
    let options = match key {
        "sslmode" | "ssl-mode" => options.ssl_mode(parse_ssl_mode(value)?),
        "sslrootcert" | "ssl-root-cert" => options.ssl_root_cert(value),
        "application_name" => options.application_name(value),
        "sslcert" | "ssl-cert" => options.ssl_client_cert(value),
        "sslkey" | "ssl-key" => options.ssl_client_key(value),
        "statement_timeout" => options.options([("statement_timeout", value)]),
        "options" => options.options(parse_server_options(value)?),
        // Enforced by bootstrap around connection setup.
        "connect_timeout" => options,
        _ => {
            tracing::warn!(%key, "ignoring unrecognized connection parameter");
            options
        }
    };
    Ok(options)
}

/// Splits a libpq `options` value (`-c name=value`, `-cname=value` or
/// `--name=value`, whitespace separated) into server settings.
fn parse_server_options(value: &str) -> StorageResult<Vec<(String, String)>> {
    let mut settings = Vec::new();
    let mut tokens = value.split_whitespace();
    while let Some(token) = tokens.next() {
        let setting = if token == "-c" {
            tokens.next()
        } else {
            token.strip_prefix("--").or_else(|| token.strip_prefix("-c"))
        };
        let Some((name, setting)) = setting.and_then(|s| s.split_once('=')) else {
            return Err(StorageError::InvalidConfiguration(format!(
                "unsupported server option '{token}'"
            )));
        };
        settings.push((name.to_string(), setting.to_string()));
    }
    Ok(settings)
}

fn parse_ssl_mode(value: &str) -> StorageResult<PgSslMode> {
    PgSslMode::from_str(value)
        .map_err(|_| StorageError::InvalidConfiguration(format!("unknown sslmode '{value}'")))
}

fn decode_component(raw: &str) -> StorageResult<String> {
    percent_encoding::percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| StorageError::InvalidConfiguration(format!("connection string is not UTF-8: {e}")))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn pick_string<F>(explicit: Option<String>, env: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .and_then(non_empty)
        .or_else(|| env(key).and_then(non_empty))
        .unwrap_or_else(|| default.to_string())
}

/// Explicit value, then `key` parsed as `T`, then `default`. Unparsable
/// environment values are logged and ignored.
fn pick_number<T, F>(explicit: Option<T>, env: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = explicit {
        return value;
    }
    match env(key).and_then(non_empty) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(%key, value = %raw, "ignoring non-numeric environment value");
            default
        }),
        None => default,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn de_opt_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => T::try_from(n)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("number {n} is out of range"))),
        Some(NumberOrString::Text(s)) if s.is_empty() => Ok(None),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("'{s}' is not a valid number"))),
    }
}

const fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
