//! Per-tenant database registry.
//!
//! Each tenant is one SQLite file under the root directory, created on first
//! reference and kept open for the life of the registry. Tenants are fully
//! isolated; queries against distinct tenants proceed independently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::info;

use super::{StoreAdapter, StoreError};
use crate::config::EngineConfig;
use crate::executor::QueryEngine;

pub struct GraphDb {
    /// None means every tenant lives in memory (used by tests).
    root: Option<PathBuf>,
    config: EngineConfig,
    tenants: Mutex<HashMap<String, Arc<QueryEngine>>>,
}

impl GraphDb {
    /// Open (or create) a database root directory on disk.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_config(root, EngineConfig::default())
    }

    pub fn open_with_config(
        root: impl Into<PathBuf>,
        config: EngineConfig,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(GraphDb {
            root: Some(root),
            config,
            tenants: Mutex::new(HashMap::new()),
        })
    }

    /// A registry whose tenants live entirely in memory.
    pub fn in_memory() -> Self {
        Self::in_memory_with_config(EngineConfig::default())
    }

    pub fn in_memory_with_config(config: EngineConfig) -> Self {
        GraphDb {
            root: None,
            config,
            tenants: Mutex::new(HashMap::new()),
        }
    }

    /// Get the query engine for a tenant, creating its database on first
    /// reference.
    pub fn tenant(&self, name: &str) -> Result<Arc<QueryEngine>, StoreError> {
        validate_tenant_name(name)?;

        let mut tenants = self.tenants.lock().unwrap();
        if let Some(engine) = tenants.get(name) {
            return Ok(Arc::clone(engine));
        }

        let adapter = match &self.root {
            Some(root) => {
                let path = root.join(format!("{name}.db"));
                info!("opening tenant database '{name}' at {}", path.display());
                StoreAdapter::open(path)?
            }
            None => StoreAdapter::open_in_memory()?,
        };

        let engine = Arc::new(QueryEngine::new(Arc::new(adapter), self.config.clone()));
        tenants.insert(name.to_string(), Arc::clone(&engine));
        Ok(engine)
    }
}

fn validate_tenant_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTenantName(name.to_string()))
    }
}
