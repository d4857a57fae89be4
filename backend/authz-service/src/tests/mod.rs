/// Service-level tests for authz-service
///
/// Everything here runs over `InMemoryDb` and `MemoryStore`; no Postgres or
/// Redis is required.
pub mod fixtures;

mod pipeline_tests;
