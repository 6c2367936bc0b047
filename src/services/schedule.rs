use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::Lazy;

use crate::entities::{booking, offer, vendor};
use crate::entities::offer::OfferModality;

/// Everything printed in a fixed civil timezone so the rendered time matches
/// the vendor's wall-clock commitment regardless of server locale. Platform
/// civil time is UTC+01:00 (the platform's registered seat).
pub static PLATFORM_CIVIL_TIME: Lazy<FixedOffset> =
    Lazy::new(|| FixedOffset::east_opt(3600).expect("UTC+01:00 is a valid offset"));

/// Meeting locations shorter than this are treated as absent: a one-letter
/// "location" is noise from the booking form, not an address.
pub const MIN_MEETING_LOCATION_LEN: usize = 5;

pub const DATE_TO_BE_SCHEDULED: &str = "To be scheduled with the vendor";
pub const DATE_PENDING: &str = "Date pending";
pub const LOCATION_ADDRESS_TO_CONFIRM: &str = "Address to be confirmed with the member";
pub const LOCATION_TO_BE_CONFIRMED: &str = "Location to be confirmed by the vendor";
pub const ONLINE_LINK_PENDING: &str = "Connection link to be shared by the vendor";

/// Human-readable schedule and venue facts for one booking, ready to embed in
/// confirmation messages and the invoice cover email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleFacts {
    pub date_display: String,
    pub location_display: String,
}

fn format_civil(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&*PLATFORM_CIVIL_TIME)
        .format("%d/%m/%Y at %H:%M")
        .to_string()
}

// Each fallback tier is its own function so the priority order below stays
// independently testable.

type DateRule = fn(&booking::Model, &offer::Model) -> Option<String>;

fn booking_scheduled_at(booking: &booking::Model, _offer: &offer::Model) -> Option<String> {
    booking.scheduled_at.as_ref().map(format_civil)
}

fn offer_event_start(_booking: &booking::Model, offer: &offer::Model) -> Option<String> {
    offer.event_start.as_ref().map(format_civil)
}

fn scheduling_required_sentinel(_booking: &booking::Model, offer: &offer::Model) -> Option<String> {
    offer
        .requires_scheduling()
        .then(|| DATE_TO_BE_SCHEDULED.to_string())
}

const DATE_RULES: &[DateRule] = &[
    booking_scheduled_at,
    offer_event_start,
    scheduling_required_sentinel,
];

type LocationRule = fn(&booking::Model, &offer::Model, &vendor::Model) -> Option<String>;

fn booking_meeting_location(
    booking: &booking::Model,
    _offer: &offer::Model,
    _vendor: &vendor::Model,
) -> Option<String> {
    booking
        .meeting_location
        .as_deref()
        .map(str::trim)
        .filter(|loc| loc.len() >= MIN_MEETING_LOCATION_LEN)
        .map(str::to_string)
}

fn at_home_sentinel(
    _booking: &booking::Model,
    offer: &offer::Model,
    _vendor: &vendor::Model,
) -> Option<String> {
    (offer.modality_kind() == OfferModality::AtHome)
        .then(|| LOCATION_ADDRESS_TO_CONFIRM.to_string())
}

fn vendor_business_address(
    _booking: &booking::Model,
    _offer: &offer::Model,
    vendor: &vendor::Model,
) -> Option<String> {
    let address = vendor.address.trim();
    (!address.is_empty()).then(|| address.to_string())
}

const LOCATION_RULES: &[LocationRule] = &[
    booking_meeting_location,
    at_home_sentinel,
    vendor_business_address,
];

pub fn resolve_date(booking: &booking::Model, offer: &offer::Model) -> String {
    DATE_RULES
        .iter()
        .find_map(|rule| rule(booking, offer))
        .unwrap_or_else(|| DATE_PENDING.to_string())
}

pub fn resolve_location(
    booking: &booking::Model,
    offer: &offer::Model,
    vendor: &vendor::Model,
) -> String {
    // Online offers bypass venue resolution entirely and surface the
    // connection link instead.
    if offer.modality_kind() == OfferModality::Online {
        return offer
            .connection_link
            .clone()
            .unwrap_or_else(|| ONLINE_LINK_PENDING.to_string());
    }

    LOCATION_RULES
        .iter()
        .find_map(|rule| rule(booking, offer, vendor))
        .unwrap_or_else(|| LOCATION_TO_BE_CONFIRMED.to_string())
}

/// Produces the one date string and one location string for a booking.
/// Pure: no clock reads, no I/O.
pub fn resolve_schedule(
    booking: &booking::Model,
    offer: &offer::Model,
    vendor: &vendor::Model,
) -> ScheduleFacts {
    ScheduleFacts {
        date_display: resolve_date(booking, offer),
        location_display: resolve_location(booking, offer, vendor),
    }
}
