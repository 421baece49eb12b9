use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use wc_configurator_core::refresh::DEFAULT_AUTO_REFRESH_MS;
use wc_storage::DEFAULT_QUOTA_BYTES;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STORE_PATH: &str = "./catalog-store.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceConfig {
    pub(crate) listen_addr: SocketAddr,
    pub(crate) store_path: PathBuf,
    pub(crate) quota_bytes: usize,
    pub(crate) auto_refresh_ms: u64,
}

impl ServiceConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let listen_addr = read("WC_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned())
            .parse()
            .context("WC_LISTEN_ADDR must be a socket address")?;

        let quota_bytes = match read("WC_STORAGE_QUOTA_BYTES") {
            Some(value) => value
                .parse()
                .context("WC_STORAGE_QUOTA_BYTES must be a byte count")?,
            None => DEFAULT_QUOTA_BYTES,
        };

        let auto_refresh_ms = match read("WC_AUTO_REFRESH_MS") {
            Some(value) => value
                .parse()
                .context("WC_AUTO_REFRESH_MS must be milliseconds")?,
            None => DEFAULT_AUTO_REFRESH_MS,
        };

        Ok(Self {
            listen_addr,
            store_path: read("WC_STORE_PATH")
                .unwrap_or_else(|| DEFAULT_STORE_PATH.to_owned())
                .into(),
            quota_bytes,
            auto_refresh_ms,
        })
    }
}
