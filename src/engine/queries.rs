use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::limits::MAX_RANGE_DAYS;
use crate::model::*;
use crate::store::Filter;

use super::accounting::{self, round2};
use super::{Engine, EngineError};

/// Months covering `[from, to]`.
fn months_between(from: NaiveDate, to: NaiveDate) -> Vec<Month> {
    let last = Month::of(to);
    let mut months = vec![Month::of(from)];
    while let Some(next) = months.last().filter(|m| **m < last).and_then(Month::next) {
        months.push(next);
    }
    months
}

/// The month holding `date`, if it lies in the supported year window.
fn month_of(date: NaiveDate) -> Result<Month, EngineError> {
    let month = Month::of(date);
    if !month.in_range() {
        return Err(EngineError::InvalidQuery(format!("date out of range: {date}")));
    }
    Ok(month)
}

fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), EngineError> {
    month_of(from)?;
    month_of(to)?;
    if to < from {
        return Err(EngineError::InvalidQuery(format!("range ends before it starts: {from}..{to}")));
    }
    if to.signed_duration_since(from).num_days() >= MAX_RANGE_DAYS {
        return Err(EngineError::LimitExceeded("date range too wide"));
    }
    Ok(())
}

impl Engine {
    /// Every property's slot board for one night, properties in name order
    /// and slots in catalogue order.
    pub async fn daily_board(&self, date: NaiveDate) -> Result<Report<Vec<BoardRow>>, EngineError> {
        let window = self.window([month_of(date)?]).await?;
        let index = window.index(&self.catalogue);

        let mut rows = Vec::with_capacity(self.catalogue.len());
        for property in self.catalogue.all() {
            let name = property.name();
            let mut slots = Vec::new();
            for slot in property.slots() {
                let occupants = index.occupants(name, date, slot)?;
                let primary = occupants.first();
                slots.push(SlotDetail {
                    slot: slot.clone(),
                    kind: property.kind_of(slot).unwrap_or(SlotKind::Physical),
                    booking_id: primary.map(|b| b.booking_id.clone()),
                    guest_name: primary.map(|b| b.guest_name.clone()),
                    check_out: primary.map(|b| b.check_out()),
                    contenders: occupants.iter().skip(1).map(|b| b.booking_id.clone()).collect(),
                });
            }
            let sold = index.sold_count(name, date)?;
            rows.push(BoardRow {
                property: name.to_string(),
                total_physical: property.total_physical(),
                sold,
                unsold: property.total_physical().saturating_sub(sold),
                slots,
            });
        }
        Ok(window.report(&index, rows))
    }

    /// Per-property daily sold/unsold counts with a totals row and column.
    pub async fn monthly_matrix(&self, year: i32, month: u32) -> Result<Report<MonthlyMatrix>, EngineError> {
        let month = Self::month(year, month)?;
        let window = self.window([month]).await?;
        let index = window.index(&self.catalogue);

        let mut totals: Vec<DayCount> = month
            .days()
            .map(|date| DayCount {
                date,
                sold: 0,
                unsold: 0,
            })
            .collect();
        let mut rows = Vec::with_capacity(self.catalogue.len());
        for property in self.catalogue.all() {
            let days = index.range(property.name(), month.first_day(), month.last_day())?;
            for (total, day) in totals.iter_mut().zip(&days) {
                total.sold += day.sold;
                total.unsold += day.unsold;
            }
            rows.push(MatrixRow {
                property: property.name().to_string(),
                total_physical: property.total_physical(),
                sold: days.iter().map(|d| d.sold).sum(),
                unsold: days.iter().map(|d| d.unsold).sum(),
                days,
            });
        }
        let matrix = MonthlyMatrix {
            month,
            sold: rows.iter().map(|r| r.sold).sum(),
            unsold: rows.iter().map(|r| r.unsold).sum(),
            rows,
            totals,
        };
        Ok(window.report(&index, matrix))
    }

    pub async fn month_accounting(&self, year: i32, month: u32) -> Result<Report<MonthAccounting>, EngineError> {
        let month = Self::month(year, month)?;
        let window = self.window([month]).await?;
        let index = window.index(&self.catalogue);
        let data = accounting::month_accounting(&index, &self.catalogue, month, self.settings.tds_rate);
        Ok(window.report(&index, data))
    }

    /// Arrivals report: bookings whose stay starts on `date`, any status.
    pub async fn bookings_checking_in_on(&self, date: NaiveDate) -> Result<Report<Vec<BookingListing>>, EngineError> {
        let window = self.window([month_of(date)?]).await?;
        let index = window.index(&self.catalogue);
        let mut listings: Vec<BookingListing> = index
            .resolved()
            .filter(|(b, _)| b.check_in() == date)
            .map(|(b, p)| BookingListing {
                booking: b.clone(),
                placement: Some(p.clone()),
            })
            .collect();
        listings.sort_by(|a, b| {
            (a.booking.property.as_str(), a.booking.precedence())
                .cmp(&(b.booking.property.as_str(), b.booking.precedence()))
        });
        Ok(window.report(&index, listings))
    }

    /// Bookings taken on `date`, placed against the months their stays touch.
    pub async fn bookings_booked_on(&self, date: NaiveDate) -> Result<Report<Vec<BookingListing>>, EngineError> {
        let (mut booked, fetch_dropped) = self.fetch_bookings(&Filter::booked_on(date)).await?;
        let months: BTreeSet<Month> = booked.iter().flat_map(|b| Month::touching(&b.stay)).collect();
        let window = self.window(months).await?;
        let index = window.index(&self.catalogue);

        booked.sort_by(|a, b| (a.property.as_str(), a.precedence()).cmp(&(b.property.as_str(), b.precedence())));
        let listings = booked
            .into_iter()
            .map(|booking| {
                let placement = index.placement_of(&booking.key()).cloned();
                BookingListing { booking, placement }
            })
            .collect();
        let mut report = window.report(&index, listings);
        report.dropped.merge(&fetch_dropped);
        Ok(report)
    }

    /// Free physical slots at one property on one night.
    pub async fn availability(&self, property: &str, date: NaiveDate) -> Result<Report<Vec<SlotId>>, EngineError> {
        self.catalogue.get(property)?;
        let window = self.window([month_of(date)?]).await?;
        let index = window.index(&self.catalogue);
        let free = index.available(property, date)?;
        Ok(window.report(&index, free))
    }

    /// Daily sold/unsold counts over `[from, to]`, both ends included.
    pub async fn occupancy_range(
        &self,
        property: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Report<Vec<DayCount>>, EngineError> {
        self.catalogue.get(property)?;
        validate_range(from, to)?;
        let window = self.window(months_between(from, to)).await?;
        let index = window.index(&self.catalogue);
        let days = index.range(property, from, to)?;
        Ok(window.report(&index, days))
    }

    /// Contended cells at one property on one night.
    pub async fn overbookings(&self, property: &str, date: NaiveDate) -> Result<Report<Vec<Overbooking>>, EngineError> {
        self.catalogue.get(property)?;
        let window = self.window([month_of(date)?]).await?;
        let index = window.index(&self.catalogue);
        let cells = index.overbookings(property, date)?;
        Ok(window.report(&index, cells))
    }

    pub async fn property_summary(
        &self,
        property: &str,
        year: i32,
        month: u32,
    ) -> Result<Report<PropertySummary>, EngineError> {
        let p = self.catalogue.get(property)?;
        let month = Self::month(year, month)?;
        let window = self.window([month]).await?;
        let index = window.index(&self.catalogue);

        let days = index.range(p.name(), month.first_day(), month.last_day())?;
        let room_nights_sold: usize = days.iter().map(|d| d.sold).sum();
        let room_nights_available = p.total_physical() * days.len();
        let occupancy_pct = if room_nights_available == 0 {
            Decimal::ZERO
        } else {
            round2(Decimal::from(room_nights_sold) * Decimal::ONE_HUNDRED / Decimal::from(room_nights_available))
        };

        let mut overbooked_cells = 0;
        for date in month.days() {
            overbooked_cells += index.overbookings(p.name(), date)?.len();
        }
        let unresolved_bookings = index
            .resolved()
            .filter(|(b, placement)| b.property == p.name() && placement.is_overbooked())
            .count();
        let ledger = accounting::property_ledger(&index, p, month, self.settings.tds_rate);

        let summary = PropertySummary {
            property: p.name().to_string(),
            month,
            total_physical: p.total_physical(),
            room_nights_sold,
            room_nights_available,
            occupancy_pct,
            accounting: ledger.total,
            unresolved_bookings,
            overbooked_cells,
        };
        Ok(window.report(&index, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn months_between_spans_year_end() {
        let months = months_between(d(2024, 11, 20), d(2025, 1, 5));
        let labels: Vec<_> = months.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["2024-11", "2024-12", "2025-01"]);
        assert_eq!(months_between(d(2025, 3, 1), d(2025, 3, 31)).len(), 1);
    }

    #[test]
    fn range_validation() {
        assert!(validate_range(d(2025, 3, 1), d(2025, 3, 1)).is_ok());
        assert!(matches!(
            validate_range(d(2025, 3, 2), d(2025, 3, 1)),
            Err(EngineError::InvalidQuery(_))
        ));
        assert!(matches!(
            validate_range(d(2025, 1, 1), d(2026, 1, 2)),
            Err(EngineError::LimitExceeded(_))
        ));
        assert!(matches!(
            validate_range(d(2025, 1, 1), NaiveDate::MAX),
            Err(EngineError::InvalidQuery(_))
        ));
    }

    #[test]
    fn dates_outside_year_window_are_invalid() {
        assert!(month_of(d(2025, 6, 15)).is_ok());
        assert!(matches!(month_of(NaiveDate::MAX), Err(EngineError::InvalidQuery(_))));
        assert!(matches!(month_of(NaiveDate::MIN), Err(EngineError::InvalidQuery(_))));
    }
}
