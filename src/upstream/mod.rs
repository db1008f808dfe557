//! Clients for the upstream recipient directory and template services.
//!
//! Both services are plain HTTP collaborators returning `{"data": ...}`
//! envelopes. The traits are the seams the resolvers (and tests) program
//! against; the HTTP implementations are only ever invoked through a
//! circuit breaker.

mod directory;
mod templates;

pub use directory::{HttpRecipientDirectory, Recipient, RecipientDirectory};
pub use templates::{HttpTemplateSource, Template, TemplateSource};
