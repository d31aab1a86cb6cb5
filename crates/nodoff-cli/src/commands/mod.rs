pub mod auto;
pub mod config;
pub mod presets;
pub mod progress;
pub mod simulate;
