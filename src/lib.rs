pub mod enrich;
pub mod ingest;
pub mod model;
pub mod providers;
pub mod store;
pub mod tracing;

pub mod util {
    pub mod env;
}
