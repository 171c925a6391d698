pub mod bridge;
pub mod diag;
pub mod driver;
pub mod expr;
pub mod offsets;
pub mod span;
pub mod subparser;
pub mod target;
pub mod token;
pub mod typeck;

pub use driver::{
    AsmArtifact, AsmSession, AsmSessionError, AsmSessionInputs, OperandRecord, SessionState,
    run_asm_session,
};
