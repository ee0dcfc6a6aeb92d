//! Short model aliases.
//!
//! Callers of the prompt-style entry points can say `deepseek-v3` instead of the
//! full upstream id. Unknown keys are treated as literal upstream ids.

use std::collections::BTreeMap;

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("deepseek-v3", "deepseek-ai/DeepSeek-V3"),
    ("deepseek-r1", "deepseek-ai/DeepSeek-R1"),
    ("qwen-coder", "Qwen/Qwen2.5-Coder-32B-Instruct"),
    ("kimi", "moonshotai/Moonshot-v1-8k"),
    ("gpt-4o", "meta-llama/Meta-Llama-3.1-70B-Instruct"),
];

/// Read-only alias table, built once at startup.
#[derive(Debug, Clone)]
pub struct ModelAliases {
    map: BTreeMap<String, String>,
}

impl ModelAliases {
    pub fn builtin() -> Self {
        Self {
            map: BUILTIN_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Built-in table with `overrides` layered on top.
    pub fn with_overrides<'a>(
        overrides: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        let mut aliases = Self::builtin();
        for (alias, target) in overrides {
            aliases.map.insert(alias.clone(), target.clone());
        }
        aliases
    }

    /// Map an alias to its upstream id; anything unknown passes through.
    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        self.map.get(key).map(String::as_str).unwrap_or(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for ModelAliases {
    fn default() -> Self {
        Self::builtin()
    }
}
