use rust_decimal::Decimal;

use crate::config::PlatformIdentity;
use crate::entities::{booking, offer, offer_variant, vendor};
use crate::services::pricing;
use crate::services::resolver::BuyerContact;
use crate::services::schedule::PLATFORM_CIVIL_TIME;

/// Renders the mandated invoice for a booking: a fixed single-page document
/// issued by the platform in the name and on behalf of the vendor.
///
/// Rendering is deterministic: the same booking and resolved entities always
/// produce byte-identical output, which is what makes invoices re-derivable
/// for audit. No clock reads, no randomness; the issue date comes from the
/// booking's own creation timestamp.
#[derive(Clone)]
pub struct InvoiceRenderer {
    platform: PlatformIdentity,
}

impl InvoiceRenderer {
    pub fn new(platform: PlatformIdentity) -> Self {
        Self { platform }
    }

    /// Stable invoice reference derived from the booking id.
    pub fn invoice_reference(booking_id: uuid::Uuid) -> String {
        let hex = booking_id.simple().to_string();
        format!("CHB-{}", hex[..12].to_uppercase())
    }

    pub fn render(
        &self,
        booking: &booking::Model,
        buyer: &BuyerContact,
        offer: &offer::Model,
        variant: Option<&offer_variant::Model>,
        vendor: &vendor::Model,
    ) -> Vec<u8> {
        let reference = Self::invoice_reference(booking.id);
        let issue_date = booking
            .created_at
            .with_timezone(&*PLATFORM_CIVIL_TIME)
            .format("%d/%m/%Y")
            .to_string();

        // Two decimal places regardless of the stored scale.
        let amount = format!("{:.2}", pricing::authoritative_amount(booking, variant));
        let line_label = match variant {
            Some(v) => format!("{} ({})", offer.title, v.name),
            None => offer.title.clone(),
        };

        let buyer_email = buyer.email.as_deref().unwrap_or("—");
        let vendor_vat = vendor.vat_number.as_deref().unwrap_or("—");

        let html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Invoice {reference}</title>
<style>
body {{ font-family: Helvetica, Arial, sans-serif; font-size: 12px; color: #1a1a1a; margin: 40px; }}
h1 {{ font-size: 20px; margin-bottom: 2px; }}
.meta {{ color: #555; margin-bottom: 24px; }}
.parties {{ width: 100%; border-collapse: collapse; margin-bottom: 24px; }}
.parties td {{ width: 50%; vertical-align: top; border: 1px solid #ccc; padding: 10px; }}
.parties h2 {{ font-size: 12px; text-transform: uppercase; margin: 0 0 6px 0; color: #555; }}
.buyer {{ margin-bottom: 24px; }}
.lines {{ width: 100%; border-collapse: collapse; }}
.lines th, .lines td {{ border: 1px solid #ccc; padding: 8px; text-align: left; }}
.lines .amount {{ text-align: right; white-space: nowrap; }}
.total td {{ font-weight: bold; }}
footer {{ margin-top: 32px; font-size: 10px; color: #555; }}
</style>
</head>
<body>
<h1>Invoice {reference}</h1>
<p class="meta">Issued on {issue_date}</p>
<table class="parties">
<tr>
<td>
<h2>Seller</h2>
<p>{vendor_name}<br>{vendor_address}<br>SIRET: {vendor_siret}<br>VAT: {vendor_vat}</p>
</td>
<td>
<h2>Issuer (billing mandatary)</h2>
<p>{platform_name}<br>{platform_address}<br>SIRET: {platform_siret}<br>VAT: {platform_vat}</p>
</td>
</tr>
</table>
<div class="buyer">
<h2>Billed to</h2>
<p>{buyer_name}<br>{buyer_email}</p>
</div>
<table class="lines">
<tr><th>Description</th><th class="amount">Amount</th></tr>
<tr><td>{line_label}</td><td class="amount">{amount} {currency}</td></tr>
<tr class="total"><td>Total</td><td class="amount">{amount} {currency}</td></tr>
</table>
<footer>
<p>This invoice is issued by {platform_name} in the name and on behalf of {vendor_name}
under a billing mandate. {vendor_name} remains the seller of record.</p>
<p>For questions about the delivery of this booking, contact the seller. For technical or
billing questions, contact {support_email}.</p>
</footer>
</body>
</html>
"#,
            reference = reference,
            issue_date = issue_date,
            vendor_name = escape_html(&vendor.legal_name),
            vendor_address = escape_html(&vendor.address),
            vendor_siret = escape_html(&vendor.siret),
            vendor_vat = escape_html(vendor_vat),
            platform_name = escape_html(&self.platform.legal_name),
            platform_address = escape_html(&self.platform.address),
            platform_siret = escape_html(&self.platform.siret),
            platform_vat = escape_html(&self.platform.vat_number),
            buyer_name = escape_html(&buyer.display_name),
            buyer_email = escape_html(buyer_email),
            line_label = escape_html(&line_label),
            amount = amount,
            currency = escape_html(&booking.currency),
            support_email = escape_html(&self.platform.support_email),
        );

        html.into_bytes()
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Total equals the single line amount; multi-item invoices are out of scope.
pub fn invoice_total(
    booking: &booking::Model,
    variant: Option<&offer_variant::Model>,
) -> Decimal {
    pricing::authoritative_amount(booking, variant).round_dp(2)
}
