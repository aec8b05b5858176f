//! Suite definitions
//!
//! Data structures for deserializing YAML suite files, plus the loader
//! that turns one named file into an immutable [`SuiteDefinition`].

mod definition;

pub use definition::{
    load_suite, CallRef, RawInputDecl, RawOption, RequestSpec, StepDefinition, SuiteDefinition,
};
