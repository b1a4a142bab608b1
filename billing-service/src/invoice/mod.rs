pub mod assembler;
pub mod document;
pub mod repository;
pub mod service;

pub use assembler::{CreateInvoice, InvoiceAssembler};
pub use document::invoice_document;
pub use repository::{BillingRepository, PgBillingRepository};
pub use service::InvoiceService;
