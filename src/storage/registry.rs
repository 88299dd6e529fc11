use super::dataset::{Dataset, TableInfo};
use crate::config::{StagingConfig, StorageMode};
use crate::core::{Result, StageError};
use crate::gateway::{GatewayResult, SqlGateway};
use crate::json::{ProcessingSummary, StagingEngine};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Listing entry for one dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub access_id: String,
    pub created_at: DateTime<Utc>,
    pub file_backed: bool,
}

/// Dataset registry
///
/// Owns every live dataset. Each dataset has its own connection behind a
/// mutex; distinct datasets can be used from different threads.
pub struct DatasetRegistry {
    config: StagingConfig,
    engine: StagingEngine,
    gateway: SqlGateway,
    datasets: RwLock<HashMap<String, Arc<Mutex<Dataset>>>>,
}

impl DatasetRegistry {
    pub fn new(config: StagingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: StagingEngine::with_config(&config),
            gateway: SqlGateway::with_config(&config),
            config,
            datasets: RwLock::new(HashMap::new()),
        })
    }

    pub fn in_memory() -> Self {
        let config = StagingConfig::default();
        Self {
            engine: StagingEngine::with_config(&config),
            gateway: SqlGateway::with_config(&config),
            config,
            datasets: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StagingConfig {
        &self.config
    }

    /// Create an empty dataset and return its access id
    pub fn create(&self) -> Result<String> {
        let dataset = match &self.config.storage {
            StorageMode::InMemory => Dataset::open_in_memory()?,
            StorageMode::Directory { path } => Dataset::create_in(path)?,
        };
        let access_id = dataset.access_id().to_string();

        self.datasets
            .write()?
            .insert(access_id.clone(), Arc::new(Mutex::new(dataset)));
        info!("Created dataset {}", access_id);
        Ok(access_id)
    }

    /// Stage a document into a new dataset. The dataset is discarded again
    /// when staging fails.
    pub fn stage(&self, document: &JsonValue) -> Result<ProcessingSummary> {
        StagingEngine::validate_document(document)?;

        let access_id = self.create()?;
        let staged = {
            let handle = self.get(&access_id)?;
            let dataset = handle.lock()?;
            self.engine.stage(&dataset, document)
        };

        if let Err(e) = &staged {
            warn!("Staging into {} failed: {}", access_id, e);
            if let Err(cleanup) = self.delete(&access_id) {
                warn!("Failed to discard dataset {}: {}", access_id, cleanup);
            }
        }
        staged
    }

    /// Run a statement through the gateway
    pub fn query(&self, access_id: &str, sql: &str) -> Result<GatewayResult> {
        let handle = self.get(access_id)?;
        let dataset = handle.lock()?;
        self.gateway.execute(&*dataset, sql)
    }

    /// Tables of a dataset with their columns and row counts
    pub fn describe(&self, access_id: &str) -> Result<Vec<TableInfo>> {
        let handle = self.get(access_id)?;
        let dataset = handle.lock()?;
        dataset.describe()
    }

    /// Drop a dataset, removing its file if it has one
    pub fn delete(&self, access_id: &str) -> Result<()> {
        let handle = self
            .datasets
            .write()?
            .remove(access_id)
            .ok_or_else(|| StageError::DatasetNotFound(access_id.to_string()))?;

        let path = {
            let dataset = handle.lock()?;
            dataset.delete_all()?;
            dataset.path().map(|p| p.to_path_buf())
        };
        drop(handle);

        if let Some(path) = path {
            std::fs::remove_file(path)?;
        }
        info!("Deleted dataset {}", access_id);
        Ok(())
    }

    /// All live datasets, oldest first
    pub fn list(&self) -> Result<Vec<DatasetInfo>> {
        let datasets = self.datasets.read()?;
        let mut infos = Vec::with_capacity(datasets.len());
        for handle in datasets.values() {
            let dataset = handle.lock()?;
            infos.push(DatasetInfo {
                access_id: dataset.access_id().to_string(),
                created_at: dataset.created_at(),
                file_backed: dataset.path().is_some(),
            });
        }
        infos.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.access_id.cmp(&b.access_id))
        });
        Ok(infos)
    }

    pub fn contains(&self, access_id: &str) -> Result<bool> {
        Ok(self.datasets.read()?.contains_key(access_id))
    }

    fn get(&self, access_id: &str) -> Result<Arc<Mutex<Dataset>>> {
        self.datasets
            .read()?
            .get(access_id)
            .cloned()
            .ok_or_else(|| StageError::DatasetNotFound(access_id.to_string()))
    }
}
