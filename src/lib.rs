pub mod config;
pub mod error;
pub mod extract;
pub mod invoice;
pub mod pipeline;
pub mod progress;
pub mod ratelimit;

pub use error::{ParseError, ParseWarning};
pub use invoice::{CustomCharge, InvoiceDefaults, InvoiceDraft, InvoiceLine, Party};
pub use pipeline::{ParseOutcome, ParsePipeline, ParseRequest};
