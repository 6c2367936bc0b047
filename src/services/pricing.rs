use rust_decimal::Decimal;

use crate::entities::{booking, offer_variant};

/// Computes the single authoritative charged amount for a booking.
///
/// Priority, first non-null wins:
/// 1. the amount actually captured on the booking row (ground truth from the
///    payment event),
/// 2. the variant's configured price,
/// 3. zero.
///
/// The offer's catalog list price is deliberately not part of the chain: it
/// is a display default, not a charge record.
pub fn authoritative_amount(
    booking: &booking::Model,
    variant: Option<&offer_variant::Model>,
) -> Decimal {
    booking
        .amount
        .or_else(|| variant.and_then(|v| v.price))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn booking_with_amount(amount: Option<Decimal>) -> booking::Model {
        booking::Model {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            offer_id: Uuid::new_v4(),
            variant_id: None,
            vendor_id: Uuid::new_v4(),
            idempotency_key: "evt_price".to_string(),
            amount,
            currency: "EUR".to_string(),
            status: "paid".to_string(),
            created_at: Utc::now(),
            scheduled_at: None,
            meeting_location: None,
            cancelled_by: None,
        }
    }

    fn variant_with_price(price: Option<Decimal>) -> offer_variant::Model {
        offer_variant::Model {
            id: Uuid::new_v4(),
            offer_id: Uuid::new_v4(),
            name: "Solo session".to_string(),
            price,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn captured_amount_beats_variant_price() {
        let booking = booking_with_amount(Some(dec!(42)));
        let variant = variant_with_price(Some(dec!(30)));
        assert_eq!(authoritative_amount(&booking, Some(&variant)), dec!(42));
    }

    #[test]
    fn variant_price_used_when_nothing_captured() {
        let booking = booking_with_amount(None);
        let variant = variant_with_price(Some(dec!(30)));
        assert_eq!(authoritative_amount(&booking, Some(&variant)), dec!(30));
    }

    #[test]
    fn defaults_to_zero_when_both_absent() {
        let booking = booking_with_amount(None);
        assert_eq!(authoritative_amount(&booking, None), Decimal::ZERO);

        let variant = variant_with_price(None);
        assert_eq!(authoritative_amount(&booking, Some(&variant)), Decimal::ZERO);
    }

    #[test]
    fn zero_capture_is_a_real_charge_record() {
        // A captured zero (fully discounted purchase) must not fall through
        // to the variant price.
        let booking = booking_with_amount(Some(Decimal::ZERO));
        let variant = variant_with_price(Some(dec!(30)));
        assert_eq!(authoritative_amount(&booking, Some(&variant)), Decimal::ZERO);
    }
}
