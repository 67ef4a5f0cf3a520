use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(default_config_path())
    }

    /// Load with an explicit rc-file path. Environment variables still win.
    pub fn load_from(config_path: PathBuf) -> Self {
        let mut map = default_map();

        // Read .plotgptrc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    pub fn get_u16(&self, key: &str) -> Option<u16> {
        self.get(key).and_then(|v| v.parse::<u16>().ok())
    }

    /// Engine credential; `None` means the endpoint runs in its
    /// not-configured failure mode.
    pub fn api_key(&self) -> Option<String> {
        self.get("GOOGLE_API_KEY").filter(|s| !s.trim().is_empty())
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.get("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "GOOGLE_API_KEY",
        "API_BASE_URL",
        "DEFAULT_MODEL",
        "REQUEST_TIMEOUT",
        "SERVER_HOST",
        "SERVER_PORT",
        "ALLOWED_ORIGINS",
    ];

    KEYS.contains(&k) || k.starts_with("PLOTGPT_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("plotgpt").join(".plotgptrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    m.insert(
        "API_BASE_URL".into(),
        "https://generativelanguage.googleapis.com".into(),
    );
    m.insert("DEFAULT_MODEL".into(), "gemini-1.5-flash".into());
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("SERVER_HOST".into(), "127.0.0.1".into());
    m.insert("SERVER_PORT".into(), "8000".into());
    // Local development frontends (React and Vite defaults)
    m.insert(
        "ALLOWED_ORIGINS".into(),
        "http://localhost,http://localhost:3000,http://localhost:5173".into(),
    );

    m
}
