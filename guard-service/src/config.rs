//! Environment-driven configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;
use guard_core::GuardPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub guard: GuardPolicy,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let port: u16 = env_or("PORT", 8083);
        let host: IpAddr = std::env::var("HOST")
            .ok()
            .and_then(|s| {
                s.parse()
                    .map_err(|e| {
                        tracing::warn!("Invalid HOST value '{}': {}", s, e);
                        e
                    })
                    .ok()
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let edit_window_hours: i64 = env_or("GUARD_EDIT_WINDOW_HOURS", 24);
        let delete_window_minutes: i64 = env_or("GUARD_DELETE_WINDOW_MINUTES", 60);
        let create_limit: u32 = env_or("GUARD_CREATE_RATE_LIMIT", 10);
        let create_window_secs: u64 = env_or("GUARD_CREATE_RATE_WINDOW_SECS", 3600);

        let config = Self {
            bind_addr: SocketAddr::new(host, port),
            guard: GuardPolicy {
                owner_edit_window: Duration::hours(edit_window_hours),
                owner_delete_window: Duration::minutes(delete_window_minutes),
                create_limit,
                create_window: std::time::Duration::from_secs(create_window_secs),
            },
        };
        tracing::info!(
            bind_addr = %config.bind_addr,
            edit_window_hours,
            delete_window_minutes,
            create_limit,
            "configuration loaded"
        );
        config
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
