use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Local development ports probed when no base URL is configured. The first
/// entry is the default; the rest double as failover alternates.
pub const LOCAL_ENDPOINTS: [&str; 3] = [
    "http://localhost:5000/api",
    "http://localhost:8000/api",
    "http://localhost:3001/api",
];

/// Backend base URL: TALENT_API_URL when set, otherwise the first local port.
pub fn base_url() -> String {
    env::var("TALENT_API_URL")
        .ok()
        .map(|s| s.trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| LOCAL_ENDPOINTS[0].to_string())
}

/// Alternate endpoints for the one-shot failover probe, excluding the base.
pub fn alternate_endpoints(base: &str) -> Vec<String> {
    LOCAL_ENDPOINTS
        .iter()
        .filter(|e| **e != base)
        .map(|e| e.to_string())
        .collect()
}

/// Where the bearer token is persisted between runs.
pub fn token_path() -> PathBuf {
    if let Ok(path) = env::var("TALENT_TOKEN_FILE") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "talent") {
        proj_dirs.data_dir().join("token")
    } else {
        PathBuf::from(".talent-token")
    }
}

pub fn load_token(path: &PathBuf) -> Option<String> {
    let token = fs::read_to_string(path).ok()?;
    let token = token.trim().to_string();
    if token.is_empty() { None } else { Some(token) }
}

pub fn save_token(path: &PathBuf, token: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, token).with_context(|| format!("Failed to write token file: {:?}", path))
}

/// Removes the stored token. Missing file is not an error: a 401 may race a
/// logout that already cleared it.
pub fn clear_token(path: &PathBuf) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove token file: {:?}", path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_save_load_clear() {
        let path = env::temp_dir().join(format!("talent-token-test-{}", std::process::id()));

        assert_eq!(load_token(&path), None);
        save_token(&path, "abc123\n").unwrap();
        assert_eq!(load_token(&path), Some("abc123".to_string()));
        clear_token(&path).unwrap();
        assert_eq!(load_token(&path), None);
        // Clearing an already-missing token is fine
        clear_token(&path).unwrap();
    }

    #[test]
    fn test_alternates_exclude_base() {
        let alts = alternate_endpoints(LOCAL_ENDPOINTS[0]);
        assert_eq!(alts.len(), LOCAL_ENDPOINTS.len() - 1);
        assert!(!alts.contains(&LOCAL_ENDPOINTS[0].to_string()));

        // Custom base keeps every local port as a candidate
        let alts = alternate_endpoints("https://api.example.com");
        assert_eq!(alts.len(), LOCAL_ENDPOINTS.len());
    }
}
