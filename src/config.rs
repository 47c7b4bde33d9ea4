use serde::{Deserialize, Serialize};

/// Connection parameters for a single MySQL instance.
///
/// Plain data: the session core consumes it as-is and never validates it.
/// [`DbConfig::is_valid`] exists for the layer that assembles
/// configuration, typically before handing it to a pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
    /// Relative weight for a load balancing layer, higher means picked
    /// more often.
    pub weight: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
            port: 3306,
            weight: 1,
        }
    }
}

impl DbConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// A complete configuration has a host, a user, a database and a
    /// nonzero port. The password may legitimately be empty.
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty() && !self.database.is_empty() && self.port > 0
    }

    /// `user@host:port/database`, safe for logs: never the password.
    pub fn connection_str(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// Two configurations address the same database when host, port, user and
/// database coincide. The password necessarily matches then, and the
/// weight is a balancing hint, not an identity.
impl PartialEq for DbConfig {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.user == other.user
            && self.database == other.database
    }
}
impl Eq for DbConfig {}

/// Everything a connection pool built on top of [`Session`](crate::Session)
/// needs: the database instances to reach, sizing, timeouts and reconnect
/// policy. All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Default instance for the single-database mode.
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
    /// Instances for the multi-database mode, takes precedence over the
    /// single-database fields when non-empty.
    pub instances: Vec<DbConfig>,
    pub min_connections: u32,
    pub max_connections: u32,
    pub init_connections: u32,
    /// How long an acquire may wait for a free connection.
    pub connection_timeout_ms: u64,
    /// Idle time after which a connection is evicted.
    pub max_idle_ms: u64,
    pub health_check_period_ms: u64,
    pub reconnect_interval_ms: u64,
    pub reconnect_attempts: u32,
    pub log_queries: bool,
    pub performance_stats: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
            port: 3306,
            instances: Vec::new(),
            min_connections: 5,
            max_connections: 20,
            init_connections: 5,
            connection_timeout_ms: 5_000,
            max_idle_ms: 600_000,
            health_check_period_ms: 30_000,
            reconnect_interval_ms: 1_000,
            reconnect_attempts: 3,
            log_queries: false,
            performance_stats: true,
        }
    }
}

impl PoolConfig {
    /// Single-database convenience constructor.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.instances.is_empty() {
            if self.host.is_empty()
                || self.user.is_empty()
                || self.database.is_empty()
                || self.port == 0
            {
                return false;
            }
        } else if self.instances.iter().any(|instance| !instance.is_valid()) {
            return false;
        }
        if self.min_connections == 0
            || self.max_connections == 0
            || self.min_connections > self.max_connections
            || self.init_connections > self.max_connections
        {
            return false;
        }
        self.connection_timeout_ms > 0 && self.max_idle_ms > 0 && self.health_check_period_ms > 0
    }

    /// Registers an instance for the multi-database mode, silently
    /// ignoring incomplete configurations.
    pub fn add_database(&mut self, config: DbConfig) {
        if config.is_valid() {
            self.instances.push(config);
        }
    }

    pub fn database_count(&self) -> usize {
        if self.instances.is_empty() {
            1
        } else {
            self.instances.len()
        }
    }

    pub fn set_connection_limits(&mut self, min: u32, max: u32, init: u32) {
        assert!(min > 0, "min_connections must be greater than 0");
        assert!(max > 0, "max_connections must be greater than 0");
        self.min_connections = min;
        self.max_connections = max;
        self.init_connections = if init == 0 { min } else { init.min(max) };
    }

    pub fn set_timeouts(&mut self, connection_ms: u64, idle_ms: u64, health_check_ms: u64) {
        assert!(connection_ms > 0, "connection_timeout_ms must be greater than 0");
        assert!(idle_ms > 0, "max_idle_ms must be greater than 0");
        assert!(health_check_ms > 0, "health_check_period_ms must be greater than 0");
        self.connection_timeout_ms = connection_ms;
        self.max_idle_ms = idle_ms;
        self.health_check_period_ms = health_check_ms;
    }

    /// One-line description for startup logs.
    pub fn summary(&self) -> String {
        format!(
            "PoolConfig{{connections:[{}, {}], timeout:{}ms, databases:{}}}",
            self.min_connections,
            self.max_connections,
            self.connection_timeout_ms,
            self.database_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.port, 3306);
        assert_eq!(config.weight, 1);
        assert!(!config.is_valid());
    }

    #[test]
    fn db_config_validity() {
        let config = DbConfig::new("localhost", "app", "", "inventory");
        assert!(config.is_valid());
        assert!(!DbConfig::new("", "app", "", "inventory").is_valid());
        assert!(!DbConfig::new("localhost", "", "", "inventory").is_valid());
        assert!(!DbConfig::new("localhost", "app", "", "").is_valid());
        assert!(!config.clone().with_port(0).is_valid());
    }

    #[test]
    fn db_config_identity_ignores_password_and_weight() {
        let a = DbConfig::new("db1", "app", "secret", "inventory").with_weight(3);
        let b = DbConfig::new("db1", "app", "other", "inventory");
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_port(3307));
        assert_ne!(a, DbConfig::new("db2", "app", "secret", "inventory"));
    }

    #[test]
    fn connection_str_excludes_password() {
        let config = DbConfig::new("db1", "app", "secret", "inventory");
        let rendered = config.connection_str();
        assert_eq!(rendered, "app@db1:3306/inventory");
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn pool_config_defaults_are_valid_given_a_database() {
        assert!(!PoolConfig::default().is_valid());
        assert!(PoolConfig::new("localhost", "app", "", "inventory").is_valid());
    }

    #[test]
    fn pool_config_rejects_inconsistent_sizing() {
        let mut config = PoolConfig::new("localhost", "app", "", "inventory");
        config.min_connections = 30;
        assert!(!config.is_valid());
        config.min_connections = 5;
        config.init_connections = 25;
        assert!(!config.is_valid());
        config.init_connections = 20;
        assert!(config.is_valid());
    }

    #[test]
    fn pool_config_multi_database_mode() {
        let mut config = PoolConfig::default();
        config.add_database(DbConfig::new("db1", "app", "", "inventory"));
        config.add_database(DbConfig::new("db2", "app", "", "inventory"));
        config.add_database(DbConfig::default()); // incomplete, ignored
        assert_eq!(config.database_count(), 2);
        assert!(config.is_valid());
    }

    #[test]
    fn set_connection_limits_defaults_init_to_min() {
        let mut config = PoolConfig::default();
        config.set_connection_limits(2, 10, 0);
        assert_eq!(config.init_connections, 2);
        config.set_connection_limits(2, 10, 50);
        assert_eq!(config.init_connections, 10);
    }

    #[test]
    fn summary_mentions_sizing_and_databases() {
        let config = PoolConfig::new("localhost", "app", "", "inventory");
        assert_eq!(
            config.summary(),
            "PoolConfig{connections:[5, 20], timeout:5000ms, databases:1}"
        );
    }
}
