// src/lib.rs
pub mod retimer {
    pub use crate::report::RetimeSummary;
    pub use crate::types::{Input, Options, ReportFormat};

    /// Blocking entry-point; returns when the input ends, the packet limit
    /// is reached, or a fatal error occurs
    pub fn run(opts: Options) -> anyhow::Result<RetimeSummary> {
        crate::engine::run(opts)
    }
}

pub mod constants;
pub mod error;
pub mod fields;
pub mod network;
pub mod packet;
pub mod processor;
pub mod report;
pub mod source;
pub mod stats;
pub mod timing;
pub mod types;

mod engine;

#[cfg(test)]
mod test_support;
