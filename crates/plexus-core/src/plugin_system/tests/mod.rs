pub mod mock_plugin;

pub mod spec_tests;
