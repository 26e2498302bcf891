use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::warn;

use crate::canon::NameKind;
use crate::catalogue::PropertyCatalogue;
use crate::limits::{MAX_AMOUNT, MAX_STAY_NIGHTS, MAX_YEAR, MIN_YEAR};
use crate::model::*;
use crate::record::{DirectRecord, OnlineRecord, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    BadDate,
    EmptyStay,
    StayTooLong,
    UnknownProperty(String),
    MissingId,
    AmountOutOfRange,
}

impl RejectReason {
    /// Metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::BadDate => "bad_date",
            RejectReason::EmptyStay => "empty_stay",
            RejectReason::StayTooLong => "stay_too_long",
            RejectReason::UnknownProperty(_) => "unknown_property",
            RejectReason::MissingId => "missing_id",
            RejectReason::AmountOutOfRange => "amount_out_of_range",
        }
    }
}

/// A row the normaliser refused. Returned, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedBooking {
    pub booking_id: String,
    pub source: Source,
    pub reason: RejectReason,
}

impl std::fmt::Display for MalformedBooking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (id, source) = (&self.booking_id, self.source.as_str());
        match &self.reason {
            RejectReason::BadDate => write!(f, "{source} booking {id}: unparseable stay dates"),
            RejectReason::EmptyStay => write!(f, "{source} booking {id}: check-in not before check-out"),
            RejectReason::StayTooLong => write!(f, "{source} booking {id}: stay too long"),
            RejectReason::UnknownProperty(p) => write!(f, "{source} booking {id}: unknown property {p:?}"),
            RejectReason::MissingId => write!(f, "{source} booking without id"),
            RejectReason::AmountOutOfRange => write!(f, "{source} booking {id}: amount out of range"),
        }
    }
}

impl std::error::Error for MalformedBooking {}

/// Both record shapes flattened to the columns the normaliser reads.
struct Fields<'a> {
    source: Source,
    booking_id: &'a str,
    property: Option<&'a str>,
    room_no: Option<&'a str>,
    room_type: Option<&'a str>,
    guest_name: Option<&'a str>,
    guest_phone: Option<&'a str>,
    total_pax: Option<&'a str>,
    adults: Option<&'a str>,
    children: Option<&'a str>,
    infants: Option<&'a str>,
    check_in: Option<&'a str>,
    check_out: Option<&'a str>,
    booking_date: Option<&'a str>,
    status: Option<&'a str>,
    payment_status: Option<&'a str>,
    remarks: Option<&'a str>,
    total_tariff: Money,
    advance: Money,
    gst: Money,
    ota_tax: Money,
    commission: Money,
}

impl<'a> Fields<'a> {
    fn direct(r: &'a DirectRecord) -> Self {
        Self {
            source: Source::Direct,
            booking_id: r.booking_id.trim(),
            property: r.property_name.as_deref(),
            room_no: r.room_no.as_deref(),
            room_type: r.room_type.as_deref(),
            guest_name: r.guest_name.as_deref(),
            guest_phone: r.mobile_no.as_deref(),
            total_pax: r.total_pax.as_deref(),
            adults: r.adults.as_deref(),
            children: r.children.as_deref(),
            infants: r.infants.as_deref(),
            check_in: r.check_in.as_deref(),
            check_out: r.check_out.as_deref(),
            booking_date: r.booking_date.as_deref(),
            status: r.plan_status.as_deref(),
            payment_status: r.payment_status.as_deref(),
            remarks: r.remarks.as_deref(),
            total_tariff: parse_money(r.total_tariff.as_deref()),
            advance: parse_money(r.advance_amount.as_deref()),
            gst: Money::ZERO,
            ota_tax: Money::ZERO,
            commission: Money::ZERO,
        }
    }

    fn online(r: &'a OnlineRecord) -> Self {
        let booking_amount = parse_money(r.booking_amount.as_deref());
        let gst = parse_money(r.gst.as_deref());
        let ota_tax = parse_money(r.ota_tax.as_deref());
        let commission = parse_money(r.ota_commission.as_deref());
        // The hotel's receivable slice of what the guest paid the OTA.
        let total_tariff = booking_amount
            .saturating_sub(gst)
            .saturating_sub(ota_tax)
            .saturating_sub(commission)
            .max(Money::ZERO);
        Self {
            source: Source::Online,
            booking_id: r.booking_id.trim(),
            property: r.property.as_deref(),
            room_no: r.room_no.as_deref(),
            room_type: r.room_type.as_deref(),
            guest_name: r.guest_name.as_deref(),
            guest_phone: r.guest_phone.as_deref(),
            total_pax: r.total_pax.as_deref(),
            adults: r.adults.as_deref(),
            children: r.children.as_deref(),
            infants: r.infants.as_deref(),
            check_in: r.check_in.as_deref(),
            check_out: r.check_out.as_deref(),
            booking_date: r.booking_date.as_deref(),
            status: r.booking_status.as_deref(),
            payment_status: r.payment_status.as_deref(),
            remarks: r.remarks.as_deref(),
            total_tariff,
            advance: parse_money(r.total_payment_made.as_deref()),
            gst,
            ota_tax,
            commission,
        }
    }
}

/// Convert one raw row into a [`Booking`], or say why it cannot be one.
pub fn normalise(record: &Record, catalogue: &PropertyCatalogue) -> Result<Booking, MalformedBooking> {
    let f = match record {
        Record::Direct(r) => Fields::direct(r),
        Record::Online(r) => Fields::online(r),
    };
    let reject = |reason| MalformedBooking {
        booking_id: f.booking_id.to_string(),
        source: f.source,
        reason,
    };

    let (Some(check_in), Some(check_out)) = (parse_date(f.check_in), parse_date(f.check_out)) else {
        return Err(reject(RejectReason::BadDate));
    };
    let stay = Stay::try_new(check_in, check_out).ok_or_else(|| reject(RejectReason::EmptyStay))?;
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(reject(RejectReason::StayTooLong));
    }

    let property = catalogue.canon(NameKind::Property, f.property.unwrap_or_default());
    if catalogue.lookup(&property).is_none() {
        return Err(reject(RejectReason::UnknownProperty(property)));
    }
    if f.booking_id.is_empty() {
        return Err(reject(RejectReason::MissingId));
    }

    let ceiling = Money::from(MAX_AMOUNT);
    if [f.total_tariff, f.advance, f.gst, f.ota_tax, f.commission]
        .iter()
        .any(|m| *m > ceiling)
    {
        return Err(reject(RejectReason::AmountOutOfRange));
    }

    let status = BookingStatus::from_canonical(&catalogue.canon(NameKind::Status, f.status.unwrap_or_default()));

    let components = [f.adults, f.children, f.infants].map(parse_count);
    let [adults, children, infants] = if components.iter().all(Option::is_none) {
        [parse_count(f.total_pax).unwrap_or(0), 0, 0]
    } else {
        components.map(|c| c.unwrap_or(0))
    };

    let balance = (f.total_tariff - f.advance).max(Money::ZERO);
    let payment_status = f
        .payment_status
        .and_then(PaymentStatus::parse)
        .unwrap_or_else(|| PaymentStatus::from_amounts(f.advance, balance));

    Ok(Booking {
        booking_id: f.booking_id.to_string(),
        source: f.source,
        property,
        room_token: f.room_no.unwrap_or_default().trim().to_string(),
        room_type: f.room_type.unwrap_or_default().trim().to_string(),
        guest_name: f.guest_name.unwrap_or_default().to_string(),
        guest_phone: f.guest_phone.unwrap_or_default().to_string(),
        stay,
        booking_date: parse_date(f.booking_date),
        status,
        payment_status,
        total_tariff: f.total_tariff,
        advance: f.advance,
        balance,
        gst: f.gst,
        ota_tax: f.ota_tax,
        commission: f.commission,
        adults,
        children,
        infants,
        pax: adults + children + infants,
        remarks: f.remarks.unwrap_or_default().to_string(),
    })
}

/// Normalise a batch, dropping and counting rejected rows.
pub fn normalise_all<'r>(
    records: impl IntoIterator<Item = &'r Record>,
    catalogue: &PropertyCatalogue,
) -> (Vec<Booking>, DropCounts) {
    let mut bookings = Vec::new();
    let mut dropped = DropCounts::default();
    for record in records {
        match normalise(record, catalogue) {
            Ok(booking) => bookings.push(booking),
            Err(rejected) => {
                warn!(booking_id = %rejected.booking_id, reason = rejected.reason.label(), "rejected booking row: {rejected}");
                metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL, "reason" => rejected.reason.label())
                    .increment(1);
                match rejected.reason {
                    RejectReason::BadDate => dropped.bad_dates += 1,
                    RejectReason::EmptyStay => dropped.empty_stay += 1,
                    RejectReason::StayTooLong => dropped.stay_too_long += 1,
                    RejectReason::UnknownProperty(_) => dropped.unknown_property += 1,
                    RejectReason::MissingId => dropped.missing_id += 1,
                    RejectReason::AmountOutOfRange => dropped.bad_amount += 1,
                }
            }
        }
    }
    metrics::counter!(crate::observability::BOOKINGS_LOADED_TOTAL).increment(bookings.len() as u64);
    (bookings, dropped)
}

impl Booking {
    /// Write the booking back in its source's persistence shape. Normalising
    /// the result yields the same booking.
    pub fn to_record(&self) -> Record {
        to_record(self)
    }
}

fn to_record(booking: &Booking) -> Record {
    let money = |m: Money| Some(m.normalize().to_string());
    let count = |c: u32| Some(c.to_string());
    let date = |d: NaiveDate| Some(d.format("%Y-%m-%d").to_string());
    let text = |s: &str| (!s.is_empty()).then(|| s.to_string());
    match booking.source {
        Source::Direct => Record::Direct(DirectRecord {
            booking_id: booking.booking_id.clone(),
            property_name: Some(booking.property.clone()),
            room_no: text(&booking.room_token),
            room_type: text(&booking.room_type),
            guest_name: text(&booking.guest_name),
            mobile_no: text(&booking.guest_phone),
            total_pax: count(booking.pax),
            adults: count(booking.adults),
            children: count(booking.children),
            infants: count(booking.infants),
            check_in: date(booking.stay.check_in),
            check_out: date(booking.stay.check_out),
            no_of_days: Some(booking.stay.nights().to_string()),
            total_tariff: money(booking.total_tariff),
            advance_amount: money(booking.advance),
            balance_amount: money(booking.balance),
            plan_status: text(booking.status.as_str()),
            payment_status: Some(booking.payment_status.as_str().to_string()),
            remarks: text(&booking.remarks),
            inventory_no: None,
            booking_date: booking.booking_date.and_then(date),
        }),
        Source::Online => Record::Online(OnlineRecord {
            booking_id: booking.booking_id.clone(),
            property: Some(booking.property.clone()),
            room_no: text(&booking.room_token),
            room_type: text(&booking.room_type),
            guest_name: text(&booking.guest_name),
            guest_phone: text(&booking.guest_phone),
            total_pax: count(booking.pax),
            adults: count(booking.adults),
            children: count(booking.children),
            infants: count(booking.infants),
            check_in: date(booking.stay.check_in),
            check_out: date(booking.stay.check_out),
            booking_amount: money(
                booking
                    .total_tariff
                    .saturating_add(booking.gst)
                    .saturating_add(booking.ota_tax)
                    .saturating_add(booking.commission),
            ),
            gst: money(booking.gst),
            ota_tax: money(booking.ota_tax),
            ota_commission: money(booking.commission),
            total_payment_made: money(booking.advance),
            balance_due: money(booking.balance),
            booking_status: text(booking.status.as_str()),
            payment_status: Some(booking.payment_status.as_str().to_string()),
            remarks: text(&booking.remarks),
            booking_date: booking.booking_date.and_then(date),
        }),
    }
}

/// ISO calendar date; an ISO datetime contributes its date part.
pub(crate) fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let s = raw?.trim();
    let s = match s.as_bytes().get(10) {
        Some(b'T' | b' ') => &s[..10],
        _ => s,
    };
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .filter(|d| (MIN_YEAR..=MAX_YEAR).contains(&d.year()))
}

/// Empty, non-numeric and negative amounts are all zero.
pub(crate) fn parse_money(raw: Option<&str>) -> Money {
    let Some(s) = raw else { return Money::ZERO };
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned)
        .map(|m| m.max(Money::ZERO))
        .unwrap_or(Money::ZERO)
}

fn parse_count(raw: Option<&str>) -> Option<u32> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<u32>().ok().or_else(|| {
        Decimal::from_str(s)
            .ok()
            .map(|d| d.max(Decimal::ZERO).trunc())
            .and_then(|d| d.to_u32())
    })
}
