use dashmap::DashMap;

/// Memoised unit prices for one process run, keyed like `ebs_gp3_eu-west-1`.
/// Misses are cached too, so an unknown price is looked up once.
#[derive(Debug, Default)]
pub struct PriceCache {
    prices: DashMap<String, Option<f64>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with<F>(&self, key: &str, lookup: F) -> Option<f64>
    where
        F: FnOnce() -> Option<f64>,
    {
        if let Some(hit) = self.prices.get(key) {
            return *hit;
        }
        *self.prices.entry(key.to_string()).or_insert_with(lookup)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
