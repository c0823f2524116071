//! Test suites for the lintbridge service.

mod process_behaviour;
pub(crate) mod support;
