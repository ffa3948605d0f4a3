
mod value_tests;
