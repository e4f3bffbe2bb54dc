pub mod query_tests;
pub mod concurrency_tests;
