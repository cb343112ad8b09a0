//! Validation module for pre-execution checking.
//!
//! The validation pipeline runs before execution to catch errors early.
//! It only reads the definition; the data-dependent column checks done
//! during a run live in [`schema`].

pub mod pipeline;
pub mod stages;
pub mod schema;

pub use pipeline::ValidationPipeline;
pub use stages::{
    ConfigValidation, ConnectivityValidation, CycleValidation, EdgeValidation,
    IdentityValidation, StructureValidation, ValidationStage,
};
pub use schema::{check_input_schema, compatibility_issues, sample_source};
