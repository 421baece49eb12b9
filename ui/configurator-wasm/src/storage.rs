//! `localStorage` backend for the catalog persistence layer.

use gloo_storage::{LocalStorage, Storage};
use wasm_bindgen::{JsCast, JsValue};
use wc_storage::{KeyValueStore, StorageError};
use web_sys::DomException;

pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

impl LocalStorageStore {
    pub fn open() -> Self {
        Self {
            storage: LocalStorage::raw(),
        }
    }

    fn entries(&self) -> impl Iterator<Item = (String, String)> + '_ {
        let len = self.storage.length().unwrap_or_default();
        (0..len).filter_map(move |i| {
            let key = self.storage.key(i).ok().flatten()?;
            let value = self.storage.get_item(&key).ok().flatten()?;
            Some((key, value))
        })
    }
}

fn describe(err: &JsValue) -> String {
    err.dyn_ref::<DomException>()
        .map(|dom| format!("{}: {}", dom.name(), dom.message()))
        .unwrap_or_else(|| format!("{err:?}"))
}

fn is_quota_error(err: &JsValue) -> bool {
    err.dyn_ref::<DomException>().is_some_and(|dom| {
        matches!(
            dom.name().as_str(),
            "QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED"
        )
    })
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(|err| {
            if is_quota_error(&err) {
                StorageError::QuotaExceeded {
                    key: key.to_owned(),
                    bytes: value.len(),
                }
            } else {
                StorageError::Backend(describe(&err))
            }
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.storage
            .remove_item(key)
            .map_err(|err| StorageError::Backend(describe(&err)))
    }

    fn bytes_used(&self) -> usize {
        self.entries().map(|(k, v)| k.len() + v.len()).sum()
    }
}
