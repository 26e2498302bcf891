use std::borrow::Borrow;
use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::limits::{MAX_YEAR, MIN_YEAR};

/// All money is decimal rupees; no currency symbol is carried.
pub type Money = Decimal;

/// Half-open stay `[check_in, check_out)`: one entry per night slept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "Stay check_in must be before check_out");
        Self { check_in, check_out }
    }

    /// `None` for zero-night and inverted stays.
    pub fn try_new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    pub fn nights(&self) -> i64 {
        self.check_out.signed_duration_since(self.check_in).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// The last night slept (`check_out - 1`).
    pub fn last_night(&self) -> NaiveDate {
        self.check_out - Days::new(1)
    }

    /// Every night of the stay, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < end)
    }
}

/// A calendar month, represented by its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Month(NaiveDate);

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn of(date: NaiveDate) -> Self {
        Self(date - Days::new(u64::from(date.day0())))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().map_or(NaiveDate::MAX, |next| next.0 - Days::new(1))
    }

    /// `None` past the end of the calendar.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(Self)
    }

    /// Whether the month lies in the supported year window.
    pub fn in_range(&self) -> bool {
        (MIN_YEAR..=MAX_YEAR).contains(&self.year())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let last = self.last_day();
        self.0.iter_days().take_while(move |d| *d <= last)
    }

    /// Months containing at least one night of `stay`, in order.
    pub fn touching(stay: &Stay) -> Vec<Month> {
        let last = Self::of(stay.last_night());
        let mut months = vec![Self::of(stay.check_in)];
        while let Some(next) = months.last().filter(|m| **m < last).and_then(Month::next) {
            months.push(next);
        }
        months
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// A physical (or pseudo) inventory slot at a property, e.g. `101` or `Day Use 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SlotId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SlotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    Physical,
    DayUse,
    NoShow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    Direct,
    Online,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Direct => "direct",
            Source::Online => "online",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Pending,
    FollowUp,
    Cancelled,
    Completed,
    NoShow,
    /// Anything else after canonicalisation. Listed, never counted.
    Unknown(String),
}

impl BookingStatus {
    /// Map an already-canonicalised status string.
    pub fn from_canonical(s: &str) -> Self {
        match s {
            "Confirmed" => BookingStatus::Confirmed,
            "Pending" => BookingStatus::Pending,
            "Follow-up" => BookingStatus::FollowUp,
            "Cancelled" => BookingStatus::Cancelled,
            "Completed" => BookingStatus::Completed,
            "No-Show" => BookingStatus::NoShow,
            other => BookingStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Pending => "Pending",
            BookingStatus::FollowUp => "Follow-up",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::Completed => "Completed",
            BookingStatus::NoShow => "No-Show",
            BookingStatus::Unknown(s) => s,
        }
    }

    /// Contributes to occupancy and accounting.
    pub fn is_active(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::Unknown(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    NotPaid,
    PartiallyPaid,
    FullyPaid,
}

impl PaymentStatus {
    /// Lenient parse; `None` when the text names no known status.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        match lowered.as_str() {
            "not paid" | "unpaid" | "not-paid" => Some(PaymentStatus::NotPaid),
            "partially paid" | "partial" | "partially" | "part paid" => {
                Some(PaymentStatus::PartiallyPaid)
            }
            "fully paid" | "paid" | "full" | "fully-paid" => Some(PaymentStatus::FullyPaid),
            _ => None,
        }
    }

    /// Derived from money when the recorded status is unusable.
    pub fn from_amounts(advance: Money, balance: Money) -> Self {
        if advance.is_zero() {
            PaymentStatus::NotPaid
        } else if balance.is_zero() {
            PaymentStatus::FullyPaid
        } else {
            PaymentStatus::PartiallyPaid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::NotPaid => "Not Paid",
            PaymentStatus::PartiallyPaid => "Partially Paid",
            PaymentStatus::FullyPaid => "Fully Paid",
        }
    }
}

/// Identity of a booking across both sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingKey {
    pub source: Source,
    pub booking_id: String,
}

/// A normalised booking; both record shapes end up here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: String,
    pub source: Source,
    /// Canonical property name, present in the catalogue.
    pub property: String,
    pub room_token: String,
    pub room_type: String,
    pub guest_name: String,
    pub guest_phone: String,
    pub stay: Stay,
    pub booking_date: Option<NaiveDate>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub total_tariff: Money,
    pub advance: Money,
    pub balance: Money,
    pub gst: Money,
    pub ota_tax: Money,
    pub commission: Money,
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub pax: u32,
    pub remarks: String,
}

impl Booking {
    pub fn key(&self) -> BookingKey {
        BookingKey {
            source: self.source,
            booking_id: self.booking_id.clone(),
        }
    }

    pub fn check_in(&self) -> NaiveDate {
        self.stay.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.stay.check_out
    }

    /// Precedence when several bookings contend for one slot: earliest
    /// check-in, then smallest booking id, then direct before online.
    pub fn precedence(&self) -> (NaiveDate, &str, Source) {
        (self.stay.check_in, self.booking_id.as_str(), self.source)
    }
}

/// Why a booking could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unresolved {
    UnknownProperty,
    UnknownToken,
    DayUseFull,
}

/// Resolver output for one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Occupies these slots for every night of the stay.
    Slots(Vec<SlotId>),
    /// Listed but occupies nothing (cancelled or unrecognised status).
    Unplaced,
    /// The OVERBOOKED sentinel.
    Overbooked(Unresolved),
}

impl Placement {
    pub fn slots(&self) -> &[SlotId] {
        match self {
            Placement::Slots(slots) => slots,
            Placement::Unplaced | Placement::Overbooked(_) => &[],
        }
    }

    pub fn is_overbooked(&self) -> bool {
        matches!(self, Placement::Overbooked(_))
    }
}

// ── Query result types ───────────────────────────────────────────

/// Rows dropped while loading, by cause. Carried on every report so the UI
/// can warn about a partial load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounts {
    pub bad_dates: u64,
    pub empty_stay: u64,
    pub stay_too_long: u64,
    pub unknown_property: u64,
    pub missing_id: u64,
    pub bad_amount: u64,
    /// Loaded, but placed as OVERBOOKED.
    pub unresolved: u64,
}

impl DropCounts {
    pub fn rejected(&self) -> u64 {
        self.bad_dates
            + self.empty_stay
            + self.stay_too_long
            + self.unknown_property
            + self.missing_id
            + self.bad_amount
    }

    pub fn merge(&mut self, other: &DropCounts) {
        self.bad_dates += other.bad_dates;
        self.empty_stay += other.empty_stay;
        self.stay_too_long += other.stay_too_long;
        self.unknown_property += other.unknown_property;
        self.missing_id += other.missing_id;
        self.bad_amount += other.bad_amount;
        self.unresolved += other.unresolved;
    }

    pub fn is_clean(&self) -> bool {
        self.rejected() == 0 && self.unresolved == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report<T> {
    pub data: T,
    pub dropped: DropCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDetail {
    pub slot: SlotId,
    pub kind: SlotKind,
    /// Primary occupant.
    pub booking_id: Option<String>,
    pub guest_name: Option<String>,
    pub check_out: Option<NaiveDate>,
    /// Other occupants of the same cell.
    pub contenders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRow {
    pub property: String,
    pub total_physical: usize,
    pub sold: usize,
    pub unsold: usize,
    pub slots: Vec<SlotDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub sold: usize,
    pub unsold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub property: String,
    pub total_physical: usize,
    pub days: Vec<DayCount>,
    pub sold: usize,
    pub unsold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyMatrix {
    pub month: Month,
    pub rows: Vec<MatrixRow>,
    /// Column totals across properties, one per day.
    pub totals: Vec<DayCount>,
    pub sold: usize,
    pub unsold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overbooking {
    pub slot: SlotId,
    pub date: NaiveDate,
    pub primary: String,
    pub contenders: Vec<String>,
}

/// One accounting line. `date` is `None` on total rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingRow {
    pub date: Option<NaiveDate>,
    pub rooms_sold: u64,
    pub room_charges: Money,
    pub gst: Money,
    pub total: Money,
    pub commission: Money,
    pub tax_deduction: Money,
    pub receivable: Money,
    pub per_night_receivable: Money,
}

impl AccountingRow {
    pub fn dated(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    /// Element-wise sum; the date is kept. Money saturates instead of
    /// overflowing.
    pub fn add(&mut self, other: &AccountingRow) {
        self.rooms_sold = self.rooms_sold.saturating_add(other.rooms_sold);
        self.room_charges = self.room_charges.saturating_add(other.room_charges);
        self.gst = self.gst.saturating_add(other.gst);
        self.total = self.total.saturating_add(other.total);
        self.commission = self.commission.saturating_add(other.commission);
        self.tax_deduction = self.tax_deduction.saturating_add(other.tax_deduction);
        self.receivable = self.receivable.saturating_add(other.receivable);
        self.per_night_receivable = self.per_night_receivable.saturating_add(other.per_night_receivable);
    }

}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyLedger {
    pub property: String,
    pub days: Vec<AccountingRow>,
    pub total: AccountingRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthAccounting {
    pub month: Month,
    pub properties: Vec<PropertyLedger>,
    /// Per-day sum across properties.
    pub combined: Vec<AccountingRow>,
    pub grand_total: AccountingRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingListing {
    pub booking: Booking,
    /// `None` when the booking's stay window could not be indexed.
    pub placement: Option<Placement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySummary {
    pub property: String,
    pub month: Month,
    pub total_physical: usize,
    pub room_nights_sold: usize,
    pub room_nights_available: usize,
    /// Percent, two decimal places.
    pub occupancy_pct: Decimal,
    pub accounting: AccountingRow,
    pub unresolved_bookings: usize,
    pub overbooked_cells: usize,
}
