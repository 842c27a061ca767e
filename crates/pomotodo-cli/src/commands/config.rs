use clap::Subcommand;
use pomotodo_core::{Config, ConfigError};
use serde_json::Value;

use super::CmdResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting
    Get {
        /// Dotted key, e.g. `auto_advance` or `session.default_study_minutes`
        key: String,
    },
    /// Change one setting
    Set { key: String, value: String },
    /// Print every setting as `key = value`
    List {
        /// Print the whole config as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Restore defaults, for one key or for everything
    Reset { key: Option<String> },
}

pub fn run(action: ConfigAction) -> CmdResult {
    // A full reset must work even when the file no longer parses.
    let mut config = match action {
        ConfigAction::Reset { key: None } => Config::default(),
        _ => Config::load()?,
    };

    match action {
        ConfigAction::Get { key } => println!("{}", lookup(&config, &key)?),
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            println!("{key} = {}", lookup(&config, &key)?);
        }
        ConfigAction::List { json } => {
            let value = serde_json::to_value(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                for (key, value) in flatten("", &value) {
                    println!("{key} = {value}");
                }
            }
        }
        ConfigAction::Reset { key: Some(key) } => {
            let default = lookup(&Config::default(), &key)?;
            config.set(&key, &default)?;
            println!("{key} = {default}");
        }
        ConfigAction::Reset { key: None } => {
            config.save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}

fn lookup(config: &Config, key: &str) -> Result<String, ConfigError> {
    config
        .get(key)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}

/// Leaf values of a nested object, keyed by dotted path, in key order.
fn flatten(prefix: &str, value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .flat_map(|(k, v)| {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(&key, v)
            })
            .collect(),
        Value::String(s) => vec![(prefix.to_string(), s.clone())],
        other => vec![(prefix.to_string(), other.to_string())],
    }
}
