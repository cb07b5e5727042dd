pub mod plan;
pub mod presets;
pub mod run;
pub mod source;
