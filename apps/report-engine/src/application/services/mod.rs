//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `ReportAssembler`: Builds fresh, cached and live reports on top of the metadata store

mod report_assembler;

pub use report_assembler::ReportAssembler;
