//! Unknown-key detection with "did you mean?" suggestions.
//!
//! The raw TOML is walked before serde sees it. Keys that no config field
//! reads are reported as warnings; they never fail loading.

use std::collections::HashSet;

/// A non-fatal config warning.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

/// Every dotted key path [`AppConfig`](super::AppConfig) reads.
///
/// Must be kept in step with the section structs in `app_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [server]
        "server",
        "server.addr",
        "server.cors_origins",
        // [forecast]
        "forecast",
        "forecast.model_dir",
        "forecast.time_step",
        "forecast.horizon",
        "forecast.test_fraction",
        "forecast.degenerate_policy",
        "forecast.model",
        "forecast.reservoir",
        "forecast.reservoir.units",
        "forecast.reservoir.seed",
        "forecast.reservoir.ridge",
        "forecast.reservoir.input_scale",
        "forecast.reservoir.recurrent_scale",
        "forecast.reservoir.dt",
        // [dataset]
        "dataset",
        "dataset.path",
        "dataset.start",
        "dataset.hours",
        "dataset.seed",
        // [thingspeak]
        "thingspeak",
        "thingspeak.enabled",
        "thingspeak.base_url",
        "thingspeak.channel_id",
        "thingspeak.read_key",
        "thingspeak.timeout_secs",
        "thingspeak.fields",
        "thingspeak.fields.pm25",
        "thingspeak.fields.pm10",
        "thingspeak.fields.no2",
        "thingspeak.fields.co",
        "thingspeak.fields.temperature",
        // [history]
        "history",
        "history.seed_records",
        "history.max_records",
    ];
    keys.iter().copied().collect()
}

/// Collect all dotted key paths of a TOML tree.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3, ties broken alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|&(dist, _)| dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

/// Warnings for every unknown key in `raw_toml`. Unparseable input yields
/// no warnings; serde reports it instead.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(&key, &known),
            field: key,
        })
        .collect()
}
