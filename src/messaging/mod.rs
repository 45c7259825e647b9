mod invoice_archive;
mod publisher;

pub use invoice_archive::InvoiceArchive;
pub use publisher::{EventPublisher, PublishError};
