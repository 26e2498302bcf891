//! Raw booking rows as the persistence layer stores them.
//!
//! Every column is optional text: rows arrive from spreadsheets, the OTA
//! gateway and hand edits, so coercion is left to the normaliser.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    Direct,
    Online,
}

impl Table {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Some(Table::Direct),
            "online" | "ota" => Some(Table::Online),
            _ => None,
        }
    }
}

/// A booking taken at the front desk or over the phone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectRecord {
    pub booking_id: String,
    pub property_name: Option<String>,
    pub room_no: Option<String>,
    pub room_type: Option<String>,
    pub guest_name: Option<String>,
    pub mobile_no: Option<String>,
    pub total_pax: Option<String>,
    pub adults: Option<String>,
    pub children: Option<String>,
    pub infants: Option<String>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub no_of_days: Option<String>,
    pub total_tariff: Option<String>,
    pub advance_amount: Option<String>,
    pub balance_amount: Option<String>,
    pub plan_status: Option<String>,
    pub payment_status: Option<String>,
    pub remarks: Option<String>,
    pub inventory_no: Option<String>,
    pub booking_date: Option<String>,
}

/// A booking pushed by the OTA gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineRecord {
    pub booking_id: String,
    pub property: Option<String>,
    pub room_no: Option<String>,
    pub room_type: Option<String>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub total_pax: Option<String>,
    pub adults: Option<String>,
    pub children: Option<String>,
    pub infants: Option<String>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub booking_amount: Option<String>,
    pub gst: Option<String>,
    pub ota_tax: Option<String>,
    pub ota_commission: Option<String>,
    pub total_payment_made: Option<String>,
    pub balance_due: Option<String>,
    pub booking_status: Option<String>,
    pub payment_status: Option<String>,
    pub remarks: Option<String>,
    pub booking_date: Option<String>,
}

/// A row from either table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Direct(DirectRecord),
    Online(OnlineRecord),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::Direct(_) => Table::Direct,
            Record::Online(_) => Table::Online,
        }
    }

    pub fn booking_id(&self) -> &str {
        match self {
            Record::Direct(r) => &r.booking_id,
            Record::Online(r) => &r.booking_id,
        }
    }

    pub fn set_booking_id(&mut self, id: String) {
        match self {
            Record::Direct(r) => r.booking_id = id,
            Record::Online(r) => r.booking_id = id,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            Record::Direct(r) => r.plan_status.as_deref(),
            Record::Online(r) => r.booking_status.as_deref(),
        }
    }

    pub fn check_in(&self) -> Option<&str> {
        match self {
            Record::Direct(r) => r.check_in.as_deref(),
            Record::Online(r) => r.check_in.as_deref(),
        }
    }

    pub fn check_out(&self) -> Option<&str> {
        match self {
            Record::Direct(r) => r.check_out.as_deref(),
            Record::Online(r) => r.check_out.as_deref(),
        }
    }

    pub fn booking_date(&self) -> Option<&str> {
        match self {
            Record::Direct(r) => r.booking_date.as_deref(),
            Record::Online(r) => r.booking_date.as_deref(),
        }
    }

    /// Build a record from a loosely-typed JSON object. Numbers and booleans
    /// become their text form, nulls and unknown keys are ignored.
    pub fn from_json_row(table: Table, row: &Map<String, Value>) -> Record {
        let text = |key: &str| -> Option<String> {
            match row.get(key)? {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                other => Some(other.to_string()),
            }
        };
        let id = text("booking_id").unwrap_or_default();
        match table {
            Table::Direct => Record::Direct(DirectRecord {
                booking_id: id,
                property_name: text("property_name"),
                room_no: text("room_no"),
                room_type: text("room_type"),
                guest_name: text("guest_name"),
                mobile_no: text("mobile_no"),
                total_pax: text("total_pax"),
                adults: text("adults"),
                children: text("children"),
                infants: text("infants"),
                check_in: text("check_in"),
                check_out: text("check_out"),
                no_of_days: text("no_of_days"),
                total_tariff: text("total_tariff"),
                advance_amount: text("advance_amount"),
                balance_amount: text("balance_amount"),
                plan_status: text("plan_status"),
                payment_status: text("payment_status"),
                remarks: text("remarks"),
                inventory_no: text("inventory_no"),
                booking_date: text("booking_date"),
            }),
            Table::Online => Record::Online(OnlineRecord {
                booking_id: id,
                property: text("property"),
                room_no: text("room_no"),
                room_type: text("room_type"),
                guest_name: text("guest_name"),
                guest_phone: text("guest_phone"),
                total_pax: text("total_pax"),
                adults: text("adults"),
                children: text("children"),
                infants: text("infants"),
                check_in: text("check_in"),
                check_out: text("check_out"),
                booking_amount: text("booking_amount"),
                gst: text("gst"),
                ota_tax: text("ota_tax"),
                ota_commission: text("ota_commission"),
                total_payment_made: text("total_payment_made"),
                balance_due: text("balance_due"),
                booking_status: text("booking_status"),
                payment_status: text("payment_status"),
                remarks: text("remarks"),
                booking_date: text("booking_date"),
            }),
        }
    }
}
