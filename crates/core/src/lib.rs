pub mod domain;
pub mod ingest;
pub mod service;
pub mod session;
pub mod storage;
pub mod time;
pub mod view;

/// Currency every upstream rate is quoted in.
pub const BASE_CURRENCY: &str = "RUB";

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_DAILY_URL: &str = "https://www.cbr.ru/scripts/XML_daily.asp";
    pub const DEFAULT_DYNAMIC_URL: &str = "https://www.cbr.ru/scripts/XML_dynamic.asp";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_RETRIES: u32 = 3;
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
    pub const DEFAULT_SESSION_IDLE_SECS: u64 = 1800;
    pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub daily_url: String,
        pub dynamic_url: String,
        pub timeout_secs: u64,
        pub retries: u32,
        pub cache_ttl_secs: u64,
        pub session_idle_secs: u64,
        pub max_sessions: usize,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                daily_url: DEFAULT_DAILY_URL.to_string(),
                dynamic_url: DEFAULT_DYNAMIC_URL.to_string(),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                retries: DEFAULT_RETRIES,
                cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
                session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
                max_sessions: DEFAULT_MAX_SESSIONS,
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();
            Ok(Self {
                daily_url: non_empty_var("CBR_DAILY_URL").unwrap_or(defaults.daily_url),
                dynamic_url: non_empty_var("CBR_DYNAMIC_URL").unwrap_or(defaults.dynamic_url),
                timeout_secs: parsed_var("CBR_TIMEOUT_SECS")?.unwrap_or(defaults.timeout_secs),
                retries: parsed_var("CBR_RETRIES")?.unwrap_or(defaults.retries),
                cache_ttl_secs: parsed_var("CBR_CACHE_TTL_SECS")?
                    .unwrap_or(defaults.cache_ttl_secs),
                session_idle_secs: parsed_var("SESSION_IDLE_SECS")?
                    .unwrap_or(defaults.session_idle_secs),
                max_sessions: parsed_var("MAX_SESSIONS")?.unwrap_or(defaults.max_sessions),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn cache_ttl(&self) -> chrono::Duration {
            seconds(self.cache_ttl_secs)
        }

        pub fn session_idle_ttl(&self) -> chrono::Duration {
            seconds(self.session_idle_secs)
        }
    }

    /// Longer durations would overflow timestamp arithmetic.
    const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

    fn seconds(secs: u64) -> chrono::Duration {
        chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn parsed_var<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let Some(raw) = non_empty_var(key) else {
            return Ok(None);
        };
        let v = raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a number (got {raw:?})"))?;
        Ok(Some(v))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn defaults_point_at_cbr() {
            let s = Settings::default();
            assert_eq!(s.daily_url, DEFAULT_DAILY_URL);
            assert_eq!(s.dynamic_url, DEFAULT_DYNAMIC_URL);
            assert_eq!(s.retries, 3);
            assert_eq!(s.cache_ttl(), chrono::Duration::hours(1));
            assert_eq!(s.session_idle_ttl(), chrono::Duration::minutes(30));
            assert_eq!(s.max_sessions, 10_000);
        }

        #[test]
        fn rejects_non_numeric_values() {
            std::env::set_var("CBR_TEST_NOT_A_NUMBER", "soon");
            let res = parsed_var::<u64>("CBR_TEST_NOT_A_NUMBER");
            assert!(res.is_err());

            std::env::set_var("CBR_TEST_A_NUMBER", " 42 ");
            assert_eq!(parsed_var::<u64>("CBR_TEST_A_NUMBER").unwrap(), Some(42));
            assert_eq!(parsed_var::<u64>("CBR_TEST_UNSET_KEY").unwrap(), None);
        }
    }
}
