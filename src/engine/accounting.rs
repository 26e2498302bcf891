use rust_decimal::{Decimal, RoundingStrategy};

use super::index::OccupancyIndex;
use crate::catalogue::{Property, PropertyCatalogue};
use crate::model::*;

pub(crate) fn round2(m: Money) -> Money {
    m.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Daily ledger for one property over `month`.
///
/// Occupancy lands on every night of a stay that falls in the month.
/// Charges land whole on the check-in night, so a stay straddling a month
/// boundary bills only the month it starts in. Cancelled and unknown
/// statuses contribute nothing; a booking that could not be placed still
/// bills.
pub fn property_ledger(index: &OccupancyIndex<'_>, property: &Property, month: Month, tds_rate: Decimal) -> PropertyLedger {
    let mut days: Vec<AccountingRow> = month.days().map(AccountingRow::dated).collect();
    let row = |date: chrono::NaiveDate| date.signed_duration_since(month.first_day()).num_days() as usize;

    for (booking, placement) in index.resolved() {
        if booking.property != property.name() || !booking.status.is_active() {
            continue;
        }
        let physical = placement
            .slots()
            .iter()
            .filter(|slot| property.kind_of(slot) == Some(SlotKind::Physical))
            .count() as u64;

        for night in booking.stay.dates().filter(|d| month.contains(*d)) {
            let sold = &mut days[row(night)].rooms_sold;
            *sold = sold.saturating_add(physical);
        }

        if month.contains(booking.check_in()) {
            let slot_nights = physical.saturating_mul(booking.stay.nights().max(0) as u64).max(1);
            let receivable = booking
                .total_tariff
                .saturating_add(booking.gst)
                .saturating_sub(booking.commission);
            let per_night = round2(receivable / Decimal::from(slot_nights));
            let first = &mut days[row(booking.check_in())];
            first.room_charges = first.room_charges.saturating_add(booking.total_tariff);
            first.gst = first.gst.saturating_add(booking.gst);
            first.commission = first.commission.saturating_add(booking.commission);
            first.per_night_receivable = first.per_night_receivable.saturating_add(per_night);
        }
    }

    let mut total = AccountingRow::default();
    for day in &mut days {
        day.total = day.room_charges.saturating_add(day.gst);
        day.receivable = day.total.saturating_sub(day.commission);
        day.tax_deduction = round2(day.receivable.saturating_mul(tds_rate));
        total.add(day);
    }

    PropertyLedger {
        property: property.name().to_string(),
        days,
        total,
    }
}

/// Every property's ledger plus the cross-property daily roll-up.
pub fn month_accounting(
    index: &OccupancyIndex<'_>,
    catalogue: &PropertyCatalogue,
    month: Month,
    tds_rate: Decimal,
) -> MonthAccounting {
    let properties: Vec<PropertyLedger> = catalogue
        .all()
        .map(|p| property_ledger(index, p, month, tds_rate))
        .collect();

    let mut combined: Vec<AccountingRow> = month.days().map(AccountingRow::dated).collect();
    let mut grand_total = AccountingRow::default();
    for ledger in &properties {
        for (sum, day) in combined.iter_mut().zip(&ledger.days) {
            sum.add(day);
        }
        grand_total.add(&ledger.total);
    }

    MonthAccounting {
        month,
        properties,
        combined,
        grand_total,
    }
}
