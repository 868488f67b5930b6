//! Debug toolbar for previewing experiment variations, rendered with
//! `abtest-core`.

mod preview;
mod toolbar;

pub use preview::{experiment_preview, Experiment};
pub use toolbar::{toolbar, SelectHandler, ToolbarConfig, Variation};
