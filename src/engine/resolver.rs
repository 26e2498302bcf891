use crate::canon::collapse_whitespace;
use crate::catalogue::Property;
use crate::model::*;

/// Room types that mean "no room assigned yet".
const UNASSIGNED_ROOM_TYPES: &[&str] = &["unassigned", "other", "others", "day use"];

/// Decide which slots `booking` occupies at `property`.
///
/// `day_use_free` reports whether a day-use slot is still empty on every
/// night of the booking; the index supplies it while placing bookings in
/// precedence order. Occupancy conflicts on ordinary slots are not checked
/// here.
pub fn resolve(
    booking: &Booking,
    property: Option<&Property>,
    day_use_free: impl Fn(&SlotId) -> bool,
) -> Placement {
    let Some(property) = property else {
        return Placement::Overbooked(Unresolved::UnknownProperty);
    };
    match booking.status {
        BookingStatus::NoShow => return Placement::Slots(vec![property.no_show().clone()]),
        BookingStatus::Cancelled | BookingStatus::Unknown(_) => return Placement::Unplaced,
        _ => {}
    }

    let token = booking.room_token.trim();
    if token.is_empty() || is_day_use_marker(token) {
        return place_day_use(property, token, &day_use_free);
    }
    if let Some(slots) = property.special(token).or_else(|| property.alias(token)) {
        return Placement::Slots(slots.to_vec());
    }
    if is_unassigned_type(&booking.room_type) {
        return place_day_use(property, token, &day_use_free);
    }
    Placement::Overbooked(Unresolved::UnknownToken)
}

fn is_day_use_marker(token: &str) -> bool {
    collapse_whitespace(token).to_lowercase().starts_with("day use")
}

fn is_unassigned_type(room_type: &str) -> bool {
    let t = collapse_whitespace(room_type).to_lowercase();
    UNASSIGNED_ROOM_TYPES.contains(&t.as_str())
}

/// A token naming a day-use slot tries that slot first, then the rest in
/// catalogue order.
fn place_day_use(property: &Property, token: &str, day_use_free: &impl Fn(&SlotId) -> bool) -> Placement {
    let wanted = collapse_whitespace(token).to_lowercase();
    let named = property
        .day_use()
        .iter()
        .find(|slot| slot.as_str().to_lowercase() == wanted);
    named
        .into_iter()
        .chain(property.day_use().iter())
        .find(|slot| day_use_free(slot))
        .map(|slot| Placement::Slots(vec![slot.clone()]))
        .unwrap_or(Placement::Overbooked(Unresolved::DayUseFull))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::PropertyCatalogue;
    use chrono::NaiveDate;

    fn catalogue() -> PropertyCatalogue {
        PropertyCatalogue::builtin().unwrap()
    }

    fn booking(property: &str, token: &str, status: BookingStatus) -> Booking {
        let d = |day| NaiveDate::from_ymd_opt(2025, 4, day).unwrap();
        Booking {
            booking_id: "B1".into(),
            source: Source::Direct,
            property: property.into(),
            room_token: token.into(),
            room_type: String::new(),
            guest_name: "Guest".into(),
            guest_phone: String::new(),
            stay: Stay::new(d(1), d(3)),
            booking_date: None,
            status,
            payment_status: PaymentStatus::NotPaid,
            total_tariff: Money::ZERO,
            advance: Money::ZERO,
            balance: Money::ZERO,
            gst: Money::ZERO,
            ota_tax: Money::ZERO,
            commission: Money::ZERO,
            adults: 2,
            children: 0,
            infants: 0,
            pax: 2,
            remarks: String::new(),
        }
    }

    fn slots(ids: &[&str]) -> Placement {
        Placement::Slots(ids.iter().map(|s| SlotId::from(*s)).collect())
    }

    fn all_free(_: &SlotId) -> bool {
        true
    }

    #[test]
    fn plain_room_resolves_to_itself() {
        let cat = catalogue();
        let b = booking("Le Poshe Beach view", "101", BookingStatus::Confirmed);
        assert_eq!(resolve(&b, cat.lookup(&b.property), all_free), slots(&["101"]));
    }

    #[test]
    fn combined_unit_alias_keeps_order() {
        let cat = catalogue();
        let b = booking("Le Poshe Luxury", "101&102", BookingStatus::Confirmed);
        assert_eq!(resolve(&b, cat.lookup(&b.property), all_free), slots(&["101", "102"]));
        let b = booking("Le Poshe Luxury", "203-205", BookingStatus::Pending);
        assert_eq!(
            resolve(&b, cat.lookup(&b.property), all_free),
            slots(&["203", "204", "205"])
        );
    }

    #[test]
    fn special_tokens_are_per_property() {
        let cat = catalogue();
        let b = booking("Le Poshe Luxury", "D3", BookingStatus::Confirmed);
        assert_eq!(resolve(&b, cat.lookup(&b.property), all_free), slots(&["205"]));
        let b = booking("Le Poshe Beach view", "D3", BookingStatus::Confirmed);
        assert_eq!(
            resolve(&b, cat.lookup(&b.property), all_free),
            Placement::Overbooked(Unresolved::UnknownToken)
        );
    }

    #[test]
    fn no_show_parks_in_no_show_slot() {
        let cat = catalogue();
        let b = booking("Le Poshe Beach view", "101", BookingStatus::NoShow);
        assert_eq!(resolve(&b, cat.lookup(&b.property), all_free), slots(&["No Show"]));
    }

    #[test]
    fn cancelled_and_unknown_occupy_nothing() {
        let cat = catalogue();
        let b = booking("Le Poshe Beach view", "101", BookingStatus::Cancelled);
        assert_eq!(resolve(&b, cat.lookup(&b.property), all_free), Placement::Unplaced);
        let b = booking("Le Poshe Beach view", "101", BookingStatus::Unknown("Hold".into()));
        assert_eq!(resolve(&b, cat.lookup(&b.property), all_free), Placement::Unplaced);
    }

    #[test]
    fn empty_token_takes_first_free_day_use() {
        let cat = catalogue();
        let b = booking("Le Poshe Beach view", "", BookingStatus::Confirmed);
        let p = cat.lookup(&b.property);
        assert_eq!(resolve(&b, p, all_free), slots(&["Day Use 1"]));
        assert_eq!(resolve(&b, p, |s| s.as_str() != "Day Use 1"), slots(&["Day Use 2"]));
        assert_eq!(
            resolve(&b, p, |_| false),
            Placement::Overbooked(Unresolved::DayUseFull)
        );
    }

    #[test]
    fn named_day_use_slot_is_preferred() {
        let cat = catalogue();
        let b = booking("Le Poshe Beach view", "day  use 2", BookingStatus::Confirmed);
        let p = cat.lookup(&b.property);
        assert_eq!(resolve(&b, p, all_free), slots(&["Day Use 2"]));
        assert_eq!(resolve(&b, p, |s| s.as_str() != "Day Use 2"), slots(&["Day Use 1"]));
    }

    #[test]
    fn unassigned_room_type_falls_back_to_day_use() {
        let cat = catalogue();
        let mut b = booking("Le Poshe Beach view", "TBD", BookingStatus::Confirmed);
        b.room_type = "Other".into();
        assert_eq!(resolve(&b, cat.lookup(&b.property), all_free), slots(&["Day Use 1"]));
        // A resolvable token wins over the room type.
        b.room_token = "102".into();
        assert_eq!(resolve(&b, cat.lookup(&b.property), all_free), slots(&["102"]));
    }

    #[test]
    fn unknown_token_and_property_are_overbooked() {
        let cat = catalogue();
        let b = booking("Le Poshe Beach view", "999", BookingStatus::Confirmed);
        assert_eq!(
            resolve(&b, cat.lookup(&b.property), all_free),
            Placement::Overbooked(Unresolved::UnknownToken)
        );
        assert_eq!(
            resolve(&b, None, all_free),
            Placement::Overbooked(Unresolved::UnknownProperty)
        );
    }

    #[test]
    fn placed_slots_belong_to_the_property() {
        let cat = catalogue();
        for property in cat.all() {
            for token in ["101", "101&102", "D1", "D5", "", "Day Use 1", "Villa 1"] {
                let b = booking(property.name(), token, BookingStatus::Confirmed);
                for slot in resolve(&b, Some(property), all_free).slots() {
                    assert!(property.kind_of(slot).is_some(), "{} {token} -> {slot}", property.name());
                }
            }
        }
    }
}
