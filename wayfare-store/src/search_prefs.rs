use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use wayfare_shared::{CabinClass, PassengerCounts, PassengerType, TripType};

use crate::kv::{load_json, save_json, KeyValueStore};
use crate::{StoreResult, SEARCH_NAMESPACE};

const PREFERENCES_KEY: &str = "preferences";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecentSearch {
    pub from: String,
    pub to: String,
    pub date: String,
}

/// Last-used search form values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchPreferences {
    pub from: String,
    pub to: String,
    pub departure_date: String,
    pub return_date: Option<String>,
    pub passengers: PassengerCounts,
    pub cabin_class: CabinClass,
    pub trip_type: TripType,
    pub recent_searches: Vec<RecentSearch>,
}

#[derive(Clone)]
pub struct SearchPrefsStore {
    backend: Arc<dyn KeyValueStore>,
    recent_limit: usize,
    write_lock: Arc<Mutex<()>>,
}

impl SearchPrefsStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, recent_limit: usize) -> Self {
        Self { backend, recent_limit, write_lock: Arc::new(Mutex::new(())) }
    }

    pub async fn load(&self) -> StoreResult<SearchPreferences> {
        Ok(load_json(self.backend.as_ref(), SEARCH_NAMESPACE, PREFERENCES_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_from(&self, from: &str) -> StoreResult<SearchPreferences> {
        let from = from.to_string();
        self.update(move |p| p.from = from).await
    }

    pub async fn set_to(&self, to: &str) -> StoreResult<SearchPreferences> {
        let to = to.to_string();
        self.update(move |p| p.to = to).await
    }

    pub async fn set_departure_date(&self, date: &str) -> StoreResult<SearchPreferences> {
        let date = date.to_string();
        self.update(move |p| p.departure_date = date).await
    }

    pub async fn set_return_date(&self, date: Option<&str>) -> StoreResult<SearchPreferences> {
        let date = date.map(str::to_string);
        self.update(move |p| p.return_date = date).await
    }

    pub async fn set_passengers(&self, kind: PassengerType, count: u32) -> StoreResult<SearchPreferences> {
        self.update(move |p| match kind {
            PassengerType::Adult => p.passengers.adult = count,
            PassengerType::Child => p.passengers.child = count,
            PassengerType::Infant => p.passengers.infant = count,
        })
        .await
    }

    pub async fn set_cabin_class(&self, cabin: CabinClass) -> StoreResult<SearchPreferences> {
        self.update(move |p| p.cabin_class = cabin).await
    }

    /// Switching to one-way drops any return date.
    pub async fn set_trip_type(&self, trip_type: TripType) -> StoreResult<SearchPreferences> {
        self.update(move |p| {
            p.trip_type = trip_type;
            if trip_type == TripType::OneWay {
                p.return_date = None;
            }
        })
        .await
    }

    pub async fn add_recent_search(&self, search: RecentSearch) -> StoreResult<SearchPreferences> {
        let limit = self.recent_limit;
        self.update(move |p| {
            p.recent_searches.insert(0, search);
            p.recent_searches.truncate(limit);
        })
        .await
    }

    pub async fn swap_locations(&self) -> StoreResult<SearchPreferences> {
        self.update(|p| std::mem::swap(&mut p.from, &mut p.to)).await
    }

    pub async fn reset(&self) -> StoreResult<SearchPreferences> {
        self.update(|p| *p = SearchPreferences::default()).await
    }

    pub async fn clear(&self) -> StoreResult<()> {
        self.backend.clear(SEARCH_NAMESPACE).await
    }

    async fn update<F>(&self, apply: F) -> StoreResult<SearchPreferences>
    where
        F: FnOnce(&mut SearchPreferences) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut prefs = self.load().await?;
        apply(&mut prefs);
        save_json(self.backend.as_ref(), SEARCH_NAMESPACE, PREFERENCES_KEY, &prefs).await?;
        Ok(prefs)
    }
}
