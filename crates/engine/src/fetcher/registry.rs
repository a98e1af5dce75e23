use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use common::AssetClass;

use super::Fetcher;

/// Routes an asset class to its fetcher. Built once at startup.
#[derive(Clone, Default)]
pub struct FetcherRegistry {
    fetchers: HashMap<AssetClass, Arc<dyn Fetcher>>,
}

impl FetcherRegistry {
    /// A later fetcher for the same class replaces an earlier one.
    pub fn new(fetchers: Vec<Arc<dyn Fetcher>>) -> Self {
        let mut map = HashMap::new();
        for fetcher in fetchers {
            info!(class = %fetcher.asset_class(), "Registered fetcher");
            map.insert(fetcher.asset_class(), fetcher);
        }
        Self { fetchers: map }
    }

    pub fn get(&self, class: AssetClass) -> Option<Arc<dyn Fetcher>> {
        self.fetchers.get(&class).cloned()
    }
}
