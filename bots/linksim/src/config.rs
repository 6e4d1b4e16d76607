use anyhow::Result;
use config::{Config, Environment, File};
use outreach_core::OutreachConfig;

/// Layered config load: optional TOML file, then `OUTREACH_*` environment
/// overrides, then the baked-in defaults for anything still unset.
pub fn load_config(path: &str) -> Result<OutreachConfig> {
    let settings = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix("OUTREACH"))
        .build()?;

    settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_config("does-not-exist").unwrap();
        assert_eq!(cfg.daily_limit, 20);
        assert_eq!(cfg.username, "admin");
        assert!(cfg.templates.connect_note.contains("{{name}}"));
    }
}
