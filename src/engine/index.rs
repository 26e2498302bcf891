use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::warn;

use super::EngineError;
use super::resolver::resolve;
use crate::catalogue::{Property, PropertyCatalogue};
use crate::limits::MAX_RANGE_DAYS;
use crate::model::*;

#[derive(Debug, Default)]
struct DayState<'a> {
    /// Occupants per slot, primary first.
    cells: HashMap<SlotId, Vec<&'a Booking>>,
    /// Physical slots with at least one occupant.
    sold: usize,
}

/// Slot occupancy per `(property, night)`, folded from a booking set.
///
/// Borrows the bookings and the catalogue it was built from. Bookings are
/// placed in precedence order, so the first occupant of a cell is the
/// primary and everyone after it is an overbooking. Building never fails.
pub struct OccupancyIndex<'a> {
    catalogue: &'a PropertyCatalogue,
    days: HashMap<(&'a str, NaiveDate), DayState<'a>>,
    resolved: Vec<(&'a Booking, Placement)>,
    by_key: HashMap<BookingKey, usize>,
}

impl<'a> OccupancyIndex<'a> {
    pub fn build(catalogue: &'a PropertyCatalogue, bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        let start = Instant::now();
        let mut ordered: Vec<&'a Booking> = bookings.into_iter().collect();
        ordered.sort_by(|a, b| a.precedence().cmp(&b.precedence()));

        let mut index = Self {
            catalogue,
            days: HashMap::new(),
            resolved: Vec::with_capacity(ordered.len()),
            by_key: HashMap::with_capacity(ordered.len()),
        };
        for booking in ordered {
            if index.by_key.contains_key(&booking.key()) {
                continue;
            }
            index.place(booking);
        }

        metrics::histogram!(crate::observability::INDEX_BUILD_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
        index
    }

    fn place(&mut self, booking: &'a Booking) {
        let catalogue = self.catalogue;
        let property = catalogue.lookup(&booking.property);
        let placement = resolve(booking, property, |slot| {
            property.is_some_and(|p| {
                booking
                    .stay
                    .dates()
                    .all(|d| self.cell(p.name(), d, slot).is_empty())
            })
        });

        if let (Some(property), Placement::Slots(slots)) = (property, &placement) {
            let mut contended = Vec::new();
            for night in booking.stay.dates() {
                let day = self.days.entry((property.name(), night)).or_default();
                for slot in slots {
                    let cell = day.cells.entry(slot.clone()).or_default();
                    if cell.is_empty() {
                        if property.kind_of(slot) == Some(SlotKind::Physical) {
                            day.sold += 1;
                        }
                    } else {
                        metrics::counter!(crate::observability::OVERBOOKINGS_TOTAL).increment(1);
                        contended.push((slot.clone(), night, cell[0].booking_id.clone()));
                    }
                    cell.push(booking);
                }
            }
            if let Some((slot, night, primary)) = contended.first() {
                warn!(
                    booking_id = %booking.booking_id,
                    property = %property.name(),
                    %slot,
                    %night,
                    %primary,
                    cells = contended.len(),
                    "overbooking detected"
                );
            }
        }

        self.by_key.insert(booking.key(), self.resolved.len());
        self.resolved.push((booking, placement));
    }

    fn cell(&self, property: &'a str, date: NaiveDate, slot: &SlotId) -> &[&'a Booking] {
        self.days
            .get(&(property, date))
            .and_then(|day| day.cells.get(slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn property(&self, name: &str) -> Result<&'a Property, EngineError> {
        let catalogue = self.catalogue;
        catalogue.get(name)
    }

    /// Every slot of the property in catalogue order with its primary occupant.
    pub fn state_on(&self, property: &str, date: NaiveDate) -> Result<Vec<(&'a SlotId, Option<&'a Booking>)>, EngineError> {
        let p = self.property(property)?;
        Ok(p
            .slots()
            .map(|slot| (slot, self.cell(p.name(), date, slot).first().copied()))
            .collect())
    }

    /// All occupants of one cell, primary first.
    pub fn occupants(&self, property: &str, date: NaiveDate, slot: &SlotId) -> Result<Vec<&'a Booking>, EngineError> {
        let p = self.property(property)?;
        Ok(self.cell(p.name(), date, slot).to_vec())
    }

    /// Free physical slots, in catalogue order.
    pub fn available(&self, property: &str, date: NaiveDate) -> Result<Vec<SlotId>, EngineError> {
        let p = self.property(property)?;
        Ok(p
            .physical()
            .iter()
            .filter(|slot| self.cell(p.name(), date, slot).is_empty())
            .cloned()
            .collect())
    }

    pub fn sold_count(&self, property: &str, date: NaiveDate) -> Result<usize, EngineError> {
        let p = self.property(property)?;
        Ok(self.days.get(&(p.name(), date)).map_or(0, |day| day.sold))
    }

    /// Cells with more than one occupant, in catalogue slot order.
    pub fn overbookings(&self, property: &str, date: NaiveDate) -> Result<Vec<Overbooking>, EngineError> {
        let p = self.property(property)?;
        Ok(p
            .slots()
            .filter_map(|slot| match self.cell(p.name(), date, slot) {
                [primary, rest @ ..] if !rest.is_empty() => Some(Overbooking {
                    slot: slot.clone(),
                    date,
                    primary: primary.booking_id.clone(),
                    contenders: rest.iter().map(|b| b.booking_id.clone()).collect(),
                }),
                _ => None,
            })
            .collect())
    }

    /// Daily sold/unsold counts over `[from, to]`, both ends included.
    pub fn range(&self, property: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DayCount>, EngineError> {
        let p = self.property(property)?;
        if to < from {
            return Err(EngineError::InvalidQuery(format!("range ends before it starts: {from}..{to}")));
        }
        if to.signed_duration_since(from).num_days() >= MAX_RANGE_DAYS {
            return Err(EngineError::LimitExceeded("date range too wide"));
        }
        let total = p.total_physical();
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| {
                let sold = self.days.get(&(p.name(), date)).map_or(0, |day| day.sold);
                DayCount {
                    date,
                    sold,
                    unsold: total.saturating_sub(sold),
                }
            })
            .collect())
    }

    pub fn placement_of(&self, key: &BookingKey) -> Option<&Placement> {
        self.by_key.get(key).map(|&i| &self.resolved[i].1)
    }

    /// Every indexed booking with its placement, in precedence order.
    pub fn resolved(&self) -> impl Iterator<Item = (&'a Booking, &Placement)> {
        self.resolved.iter().map(|(b, p)| (*b, p))
    }

    pub fn bookings(&self) -> impl Iterator<Item = &'a Booking> + '_ {
        self.resolved.iter().map(|(b, _)| *b)
    }

    /// Bookings that came out OVERBOOKED.
    pub fn unresolved_count(&self) -> usize {
        self.resolved.iter().filter(|(_, p)| p.is_overbooked()).count()
    }

    /// Index over the union of both booking sets. Equivalent to building
    /// from the union directly.
    pub fn merge(self, other: OccupancyIndex<'a>) -> OccupancyIndex<'a> {
        let catalogue = self.catalogue;
        let union = self.bookings().chain(other.bookings()).collect::<Vec<_>>();
        OccupancyIndex::build(catalogue, union)
    }
}
