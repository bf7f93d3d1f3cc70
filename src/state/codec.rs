//! JSON item codec for sources whose items are serde types

use super::traits::{ItemCodec, StateResult};
use crate::source::Item;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::type_name;
use std::marker::PhantomData;
use tracing::debug;

/// Saves items as a JSON array of `T`.
///
/// Items holding anything other than a `T` are skipped.
pub struct JsonCodec<T> {
    _item: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self { _item: PhantomData }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ItemCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn save(&self, _page: usize, items: &[Item]) -> StateResult<Value> {
        let values: Vec<&T> = items.iter().filter_map(Item::downcast_ref::<T>).collect();
        if values.len() < items.len() {
            debug!(
                skipped = items.len() - values.len(),
                item = type_name::<T>(),
                "skipping items of another type"
            );
        }
        Ok(serde_json::to_value(values)?)
    }

    fn restore(&self, _page: usize, blob: &Value) -> StateResult<Vec<Item>> {
        let values: Vec<T> = serde_json::from_value(blob.clone())?;
        Ok(values.into_iter().map(Item::new).collect())
    }
}
