/// Whitespace and truncation helpers.
pub mod text;
/// TOML configuration (`research.toml`).
pub mod toml_config;
