//! Building test suites from benchmark files and the product catalog

pub mod benchmark;
pub mod catalog;
pub mod template;

pub use benchmark::{BenchmarkConfig, EventGroup, EventTemplate};
pub use catalog::{Catalog, CatalogAssembler, EventGenerator, StaticCatalog};
pub use template::{process_payload, RandomTemplates, TemplateEngine, VerbatimTemplates};
