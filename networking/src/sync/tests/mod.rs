mod harness;
mod states_tests;
mod validation_tests;
