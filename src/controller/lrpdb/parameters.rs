//! Contents of the parameter and code ConfigMaps

use k8s_openapi::api::core::v1::ConfigMap;

/// One `alter system set` request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterSetting {
    pub name: String,
    pub value: String,
    pub scope: String,
}

impl ParameterSetting {
    /// Parse a `name;value;scope` token (`,` works as separator too)
    pub fn parse(token: &str) -> Option<Self> {
        let parts: Vec<&str> = token
            .split([';', ','])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [name, value, scope] => Some(Self {
                name: (*name).to_string(),
                value: (*value).to_string(),
                scope: (*scope).to_string(),
            }),
            _ => None,
        }
    }
}

/// Parsed settings plus the tokens that could not be read
pub fn parameter_settings(config_map: &ConfigMap) -> (Vec<ParameterSetting>, Vec<String>) {
    let mut settings = Vec::new();
    let mut malformed = Vec::new();
    let Some(data) = &config_map.data else {
        return (settings, malformed);
    };
    for token in data.values().flat_map(|v| v.split_whitespace()) {
        match ParameterSetting::parse(token) {
            Some(setting) => settings.push(setting),
            None => malformed.push(token.to_string()),
        }
    }
    (settings, malformed)
}

/// Named SQL blocks in key order, each as its non-empty lines
pub fn code_blocks(config_map: &ConfigMap) -> Vec<(String, Vec<String>)> {
    config_map
        .data
        .iter()
        .flatten()
        .map(|(key, block)| {
            let lines = block
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect();
            (key.clone(), lines)
        })
        .collect()
}
