use std::time::Duration;

/// Origins the CORS layer will accept. The source of this value is the
/// `CORS_ALLOW_ORIGIN` environment variable; absent or `*` means any origin.
#[derive(Debug, Clone)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Budget for a single database call, also used as the pool acquire timeout.
    pub db_timeout: Duration,
    /// Budget for a single MX lookup.
    pub dns_timeout: Duration,
    pub cors_origins: CorsOrigins,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        // Local fallback matches the docker-compose database service.
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres:postgres@db:5432/postgres".into());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let db_timeout = Duration::from_secs(
            std::env::var("DB_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
        );
        let dns_timeout = Duration::from_secs(
            std::env::var("DNS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
        );
        let cors_origins = parse_origins(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref());
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse::<u16>()?;

        Ok(Self {
            database_url,
            max_connections,
            db_timeout,
            dns_timeout,
            cors_origins,
            host,
            port,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(value: Option<&str>) -> CorsOrigins {
    match value {
        None => CorsOrigins::Any,
        Some(v) if v.trim() == "*" => CorsOrigins::Any,
        Some(v) => {
            let list: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if list.is_empty() {
                CorsOrigins::Any
            } else {
                CorsOrigins::List(list)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_joins_host_and_port() {
        let config = AppConfig {
            database_url: "postgres://localhost/test".into(),
            max_connections: 10,
            db_timeout: Duration::from_secs(5),
            dns_timeout: Duration::from_secs(5),
            cors_origins: CorsOrigins::Any,
            host: "127.0.0.1".into(),
            port: 8080,
        };
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn missing_or_star_origin_allows_any() {
        assert!(matches!(parse_origins(None), CorsOrigins::Any));
        assert!(matches!(parse_origins(Some("*")), CorsOrigins::Any));
        assert!(matches!(parse_origins(Some("  * ")), CorsOrigins::Any));
    }

    #[test]
    fn origin_list_is_split_and_trimmed() {
        let parsed = parse_origins(Some("https://a.example, https://b.example"));
        match parsed {
            CorsOrigins::List(origins) => {
                assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
            }
            CorsOrigins::Any => panic!("expected a list"),
        }
    }

    #[test]
    fn empty_origin_value_allows_any() {
        assert!(matches!(parse_origins(Some("")), CorsOrigins::Any));
        assert!(matches!(parse_origins(Some(" , ")), CorsOrigins::Any));
    }
}
