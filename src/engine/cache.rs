use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use tracing::debug;

use crate::model::{Booking, DropCounts, Month};

/// Loaded month windows: per `(property, month)`, the property's bookings
/// whose stay touches that month. A month is loaded for every property at
/// once, so `loaded` records which months are complete along with the rows
/// the load dropped.
///
/// `generation` is bumped by every invalidation. Fills and invalidations
/// hold its lock, so a load that started before an invalidation can never
/// land after it.
#[derive(Default)]
pub struct WindowCache {
    windows: DashMap<(String, Month), Arc<Vec<Booking>>>,
    loaded: DashMap<Month, DropCounts>,
    generation: Mutex<u64>,
}

impl WindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Capture before reading the store; hand back to [`WindowCache::fill_if_current`].
    pub fn generation(&self) -> u64 {
        *self.lock()
    }

    /// The month's windows if every property's window is still present.
    pub fn month(&self, month: Month, properties: &[&str]) -> Option<(Vec<Arc<Vec<Booking>>>, DropCounts)> {
        let hit = self.lookup(month, properties);
        match &hit {
            Some(_) => {
                metrics::counter!(crate::observability::CACHE_HITS_TOTAL).increment(1);
                debug!(%month, "month window cache hit");
            }
            None => {
                metrics::counter!(crate::observability::CACHE_MISSES_TOTAL).increment(1);
                debug!(%month, "month window cache miss");
            }
        }
        hit
    }

    fn lookup(&self, month: Month, properties: &[&str]) -> Option<(Vec<Arc<Vec<Booking>>>, DropCounts)> {
        let dropped = *self.loaded.get(&month)?;
        let mut parts = Vec::with_capacity(properties.len());
        for property in properties {
            let window = self.windows.get(&(property.to_string(), month))?;
            parts.push(window.value().clone());
        }
        Some((parts, dropped))
    }

    /// Store a month unconditionally and hand back the shared windows in
    /// the order given. `windows` must hold an entry (possibly empty) for
    /// every property.
    pub fn fill(
        &self,
        month: Month,
        windows: impl IntoIterator<Item = (String, Vec<Booking>)>,
        dropped: DropCounts,
    ) -> Vec<Arc<Vec<Booking>>> {
        let _guard = self.lock();
        self.insert(month, windows, dropped)
    }

    /// Like [`WindowCache::fill`], but only stores the month when nothing
    /// was invalidated since `seen` was captured. The windows are handed
    /// back either way.
    pub fn fill_if_current(
        &self,
        month: Month,
        windows: impl IntoIterator<Item = (String, Vec<Booking>)>,
        dropped: DropCounts,
        seen: u64,
    ) -> Vec<Arc<Vec<Booking>>> {
        let guard = self.lock();
        if *guard == seen {
            return self.insert(month, windows, dropped);
        }
        drop(guard);
        debug!(%month, "month window went stale while loading, not cached");
        windows.into_iter().map(|(_, bookings)| Arc::new(bookings)).collect()
    }

    fn insert(
        &self,
        month: Month,
        windows: impl IntoIterator<Item = (String, Vec<Booking>)>,
        dropped: DropCounts,
    ) -> Vec<Arc<Vec<Booking>>> {
        let mut parts = Vec::new();
        for (property, bookings) in windows {
            let window = Arc::new(bookings);
            self.windows.insert((property, month), window.clone());
            parts.push(window);
        }
        self.loaded.insert(month, dropped);
        parts
    }

    /// Drop the named property's windows for `months`. Those months stop
    /// counting as loaded until the next fill.
    pub fn invalidate(&self, property: &str, months: &[Month]) {
        let mut generation = self.lock();
        *generation += 1;
        for month in months {
            self.loaded.remove(month);
            if self.windows.remove(&(property.to_string(), *month)).is_some() {
                debug!(property, %month, "invalidated month window");
            }
        }
    }

    pub fn clear(&self) {
        let mut generation = self.lock();
        *generation += 1;
        self.windows.clear();
        self.loaded.clear();
    }

    /// Every loaded month with its windows, in month order.
    pub fn loaded_months(&self) -> Vec<Month> {
        let mut months: Vec<Month> = self.loaded.iter().map(|e| *e.key()).collect();
        months.sort();
        months
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn march() -> Month {
        Month::new(2025, 3).unwrap()
    }

    #[test]
    fn miss_until_filled_then_hit() {
        let cache = WindowCache::new();
        let props = ["A", "B"];
        assert!(cache.month(march(), &props).is_none());
        cache.fill(
            march(),
            [("A".to_string(), vec![]), ("B".to_string(), vec![])],
            DropCounts {
                bad_dates: 2,
                ..DropCounts::default()
            },
        );
        let (parts, dropped) = cache.month(march(), &props).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(dropped.bad_dates, 2);
    }

    #[test]
    fn invalidating_one_property_forces_reload() {
        let cache = WindowCache::new();
        let props = ["A", "B"];
        cache.fill(
            march(),
            [("A".to_string(), vec![]), ("B".to_string(), vec![])],
            DropCounts::default(),
        );
        cache.invalidate("B", &[march(), Month::new(2025, 4).unwrap()]);
        assert!(cache.month(march(), &props).is_none());
        cache.clear();
        assert!(cache.loaded_months().is_empty());
    }

    #[test]
    fn invalidated_month_is_no_longer_loaded() {
        let cache = WindowCache::new();
        let april = Month::new(2025, 4).unwrap();
        for month in [march(), april] {
            cache.fill(month, [("A".to_string(), vec![])], DropCounts::default());
        }
        assert_eq!(cache.loaded_months(), vec![march(), april]);
        cache.invalidate("A", &[march()]);
        assert_eq!(cache.loaded_months(), vec![april]);
    }

    #[test]
    fn load_that_raced_an_invalidation_is_not_cached() {
        let cache = WindowCache::new();
        let props = ["A"];
        let seen = cache.generation();
        cache.invalidate("A", &[march()]);
        let parts = cache.fill_if_current(march(), [("A".to_string(), vec![])], DropCounts::default(), seen);
        assert_eq!(parts.len(), 1);
        assert!(cache.month(march(), &props).is_none());

        let seen = cache.generation();
        cache.fill_if_current(march(), [("A".to_string(), vec![])], DropCounts::default(), seen);
        assert!(cache.month(march(), &props).is_some());

        let seen = cache.generation();
        cache.clear();
        cache.fill_if_current(march(), [("A".to_string(), vec![])], DropCounts::default(), seen);
        assert!(cache.loaded_months().is_empty());
    }
}
