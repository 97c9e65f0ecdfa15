use anyhow::{Context, anyhow};
use std::time::Duration;

use crate::services::assembler::AssemblyFailurePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerKind {
    FanOut,
    Joined,
}

impl AssemblerKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fanout" => Some(AssemblerKind::FanOut),
            "joined" => Some(AssemblerKind::Joined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub secret_key: String,
    pub message_poll_interval: Duration,
    pub change_feed_capacity: usize,
    pub assembler: AssemblerKind,
    pub assembly_failure: AssemblyFailurePolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let secret_key = lookup("SECRET_KEY").ok_or_else(|| anyhow!("SECRET_KEY not set"))?;

        let poll_secs: u64 = match lookup("MESSAGE_POLL_INTERVAL_SECS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid MESSAGE_POLL_INTERVAL_SECS: {}", v))?,
            None => 5,
        };
        if poll_secs == 0 {
            return Err(anyhow!("MESSAGE_POLL_INTERVAL_SECS must be at least 1"));
        }

        let change_feed_capacity = match lookup("CHANGE_FEED_CAPACITY") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid CHANGE_FEED_CAPACITY: {}", v))?,
            None => 1000,
        };

        let assembler = match lookup("CHAT_ASSEMBLER") {
            Some(v) => AssemblerKind::parse(&v)
                .ok_or_else(|| anyhow!("CHAT_ASSEMBLER must be 'fanout' or 'joined', got {}", v))?,
            None => AssemblerKind::FanOut,
        };

        let assembly_failure = match lookup("CHAT_ASSEMBLY_FAILURE") {
            Some(v) => AssemblyFailurePolicy::parse(&v).ok_or_else(|| {
                anyhow!("CHAT_ASSEMBLY_FAILURE must be 'abort' or 'skip', got {}", v)
            })?,
            None => AssemblyFailurePolicy::Abort,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://huddle.db?mode=rwc".to_string()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            secret_key,
            message_poll_interval: Duration::from_secs(poll_secs),
            change_feed_capacity,
            assembler,
            assembly_failure,
        })
    }
}
