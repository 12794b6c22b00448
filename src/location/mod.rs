pub mod query;

pub use query::LocationQueryService;
