//! Source registry and per-source-kind providers: resolve a (company,
//! source-kind) pair to candidate URLs and a provider that returns a
//! normalized item stream.

pub mod curated;
pub mod press;
pub mod registry;
pub mod traits;
pub mod universal;

pub use registry::SourceRegistry;
pub use traits::{CompanyContext, NormalizedItem, Provider, ProviderOptions};
