use std::fmt::Write as _;

use crate::domain::dispatch::DispatchBatch;
use crate::domain::order::Party;

// ============================================================================
// Invoice Rendering
// ============================================================================
//
// Turns a committed dispatch into its invoice document. Rendering is a pure
// function of the batch, so regenerating a past invoice always yields the
// same text.
//
// ============================================================================

/// A rendered invoice, ready to be served or archived
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDocument {
    pub dispatch_id: uuid::Uuid,
    pub invoice_number: String,
    pub content_type: &'static str,
    pub body: String,
}

pub trait InvoiceRenderer: Send + Sync {
    fn render(&self, batch: &DispatchBatch) -> InvoiceDocument;
}

/// Plain-text tax invoice
#[derive(Debug, Default, Clone, Copy)]
pub struct TextInvoiceRenderer;

impl TextInvoiceRenderer {
    fn party(out: &mut String, title: &str, party: Option<&Party>) {
        let Some(party) = party else { return };

        let _ = writeln!(out, "{}: {}", title, party.name);
        if let Some(address) = &party.address {
            let _ = writeln!(out, "  {}", address);
        }
        if let Some(gstin) = &party.gstin {
            let _ = writeln!(out, "  GSTIN: {}", gstin);
        }
    }
}

impl InvoiceRenderer for TextInvoiceRenderer {
    fn render(&self, batch: &DispatchBatch) -> InvoiceDocument {
        let mut out = String::new();

        let _ = writeln!(out, "TAX INVOICE");
        let _ = writeln!(out, "Invoice No: {}", batch.invoice_number);
        let _ = writeln!(out, "Order No:   {}", batch.order_no);
        let _ = writeln!(out, "Date:       {}", batch.created_at.format("%Y-%m-%d"));
        let _ = writeln!(out);

        Self::party(&mut out, "Consignee", batch.metadata.consignee.as_ref());
        Self::party(&mut out, "Buyer", batch.metadata.buyer.as_ref());

        let logistics = &batch.metadata.logistics;
        for (label, value) in [
            ("Transporter", &logistics.transporter),
            ("Vehicle No", &logistics.vehicle_number),
            ("LR No", &logistics.lr_number),
            ("Destination", &logistics.destination),
        ] {
            if let Some(value) = value {
                let _ = writeln!(out, "{}: {}", label, value);
            }
        }
        let _ = writeln!(out);

        let _ = writeln!(
            out,
            "{:<4} {:<36} {:>12} {:<12} {:>12} {:>14}",
            "#", "Product", "Quantity", "Unit", "Rate", "Amount"
        );
        for (index, line) in batch.lines.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:<4} {:<36} {:>12} {:<12} {:>12} {:>14}",
                index + 1,
                line.product_id,
                line.quantity,
                line.unit_type.as_str(),
                line.rate,
                line.amount
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Taxable Amount: {}", batch.taxable_amount());
        if let Some(rate) = batch.gst_rate {
            let _ = writeln!(out, "GST @ {}%: {}", rate, batch.gst_amount());
        }
        let _ = writeln!(out, "Total: {}", batch.total_amount());

        InvoiceDocument {
            dispatch_id: batch.id,
            invoice_number: batch.invoice_number.clone(),
            content_type: "text/plain; charset=utf-8",
            body: out,
        }
    }
}
