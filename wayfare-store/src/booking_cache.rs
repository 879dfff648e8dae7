use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use wayfare_shared::{BookingStatus, CachedBooking};

use crate::kv::{load_json, save_json, KeyValueStore};
use crate::{StoreResult, BOOKING_NAMESPACE};

const BOOKINGS_KEY: &str = "bookings";

/// Newest-first list of the traveller's bookings
#[derive(Clone)]
pub struct BookingCache {
    backend: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl BookingCache {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend, write_lock: Arc::new(Mutex::new(())) }
    }

    pub async fn list(&self) -> StoreResult<Vec<CachedBooking>> {
        Ok(load_json(self.backend.as_ref(), BOOKING_NAMESPACE, BOOKINGS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<CachedBooking>> {
        Ok(self.list().await?.into_iter().find(|b| b.id == id))
    }

    pub async fn add(&self, booking: CachedBooking) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut bookings = self.list().await?;
        debug!(booking_id = %booking.id, "caching booking");
        bookings.insert(0, booking);
        self.save(&bookings).await
    }

    /// Returns false when no booking has that id.
    pub async fn cancel(&self, id: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut bookings = self.list().await?;
        let Some(booking) = bookings.iter_mut().find(|b| b.id == id) else {
            warn!(booking_id = %id, "cancel requested for unknown booking");
            return Ok(false);
        };
        booking.status = BookingStatus::Cancelled;
        self.save(&bookings).await?;
        Ok(true)
    }

    pub async fn clear(&self) -> StoreResult<()> {
        self.backend.clear(BOOKING_NAMESPACE).await
    }

    async fn save(&self, bookings: &[CachedBooking]) -> StoreResult<()> {
        save_json(self.backend.as_ref(), BOOKING_NAMESPACE, BOOKINGS_KEY, &bookings).await
    }
}
