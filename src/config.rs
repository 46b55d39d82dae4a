/// Configuration Module
///
/// Connection settings, read once at startup and passed to the connector.
use std::env;

/// Database driver this loader speaks
pub const DRIVER: &str = "postgres";

const DEFAULT_PORT: u16 = 5432;

pub const SERVER_VAR: &str = "DB_SERVER";
pub const DATABASE_VAR: &str = "DB_NAME";
pub const USER_VAR: &str = "DB_USER";
pub const PASSWORD_VAR: &str = "DB_PASSWORD";

/// Connection settings for the target database
///
/// Missing values are left empty on purpose; they surface as a
/// connection failure rather than a startup error.
#[derive(Clone)]
pub struct DbConfig {
    /// `host` or `host:port`
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub driver: String,
}

impl DbConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).unwrap_or_default();

        Self {
            server: get(SERVER_VAR),
            database: get(DATABASE_VAR),
            username: get(USER_VAR),
            password: get(PASSWORD_VAR),
            driver: DRIVER.to_string(),
        }
    }

    /// Split the server address into host and port
    ///
    /// An unparseable port is kept as part of the host so the connect
    /// attempt reports it.
    pub fn host_and_port(&self) -> (&str, u16) {
        match self.server.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => (host, port),
                Err(_) => (self.server.as_str(), DEFAULT_PORT),
            },
            None => (self.server.as_str(), DEFAULT_PORT),
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("driver", &self.driver)
            .finish()
    }
}
