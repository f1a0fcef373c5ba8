use std::collections::HashMap;

use aula_common::EnvVars;

const ENV_KEYS: &[&str] = &["PORT", "DATABASE_URL", "EXCHANGE_RATE_API_URL"];

pub struct ApiServerEnv {
    vars: HashMap<String, String>,
}

impl EnvVars for ApiServerEnv {
    fn load() -> Self {
        let mut vars = HashMap::new();
        for key in ENV_KEYS {
            if let Ok(value) = std::env::var(key) {
                vars.insert(key.to_string(), value);
            }
        }
        Self { vars }
    }

    fn get_env_var(&self, key: &str) -> String {
        self.vars.get(key).cloned().unwrap_or_default()
    }
}
