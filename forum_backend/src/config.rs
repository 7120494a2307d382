use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const MAX_SESSION_TTL_SECS: i64 = 365 * 24 * 60 * 60;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone)]
pub struct ForumConfig {
    pub api_port: u16,
    pub paths: ForumPaths,
    pub session: SessionConfig,
    pub upload: UploadConfig,
    pub cors_origin: String,
}

impl ForumConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("FORUM_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => ForumPaths::from_base_dir(dir.trim())?,
            _ => ForumPaths::discover()?,
        };
        let api_port = env::var("FORUM_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let cors_origin = env::var("FORUM_CORS_ORIGIN")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
        Ok(Self {
            api_port,
            paths,
            session: SessionConfig::from_env()?,
            upload: UploadConfig::from_env(),
            cors_origin,
        })
    }

    /// Builds a config rooted at `paths` with defaults for everything else.
    /// Used by tests and tooling that do not want to read the environment.
    pub fn new(api_port: u16, paths: ForumPaths) -> Self {
        Self {
            api_port,
            paths,
            session: SessionConfig::default(),
            upload: UploadConfig::default(),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 32-byte signing key. `None` means a random key is generated at startup.
    pub secret: Option<[u8; 32]>,
    pub ttl_secs: i64,
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
            secure_cookies: false,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self> {
        let secret = match env::var("FORUM_SESSION_SECRET") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                parse_secret(raw.trim()).context("FORUM_SESSION_SECRET is invalid")?,
            ),
            _ => None,
        };
        let ttl_secs = parse_ttl(env::var("FORUM_SESSION_TTL_SECS").ok().as_deref());
        let secure_cookies = env::var("FORUM_SECURE_COOKIES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(Self {
            secret,
            ttl_secs,
            secure_cookies,
        })
    }
}

/// Session lifetime in seconds: positive, at most one year, default one week.
fn parse_ttl(raw: Option<&str>) -> i64 {
    raw.and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|ttl| *ttl > 0)
        .map(|ttl| ttl.min(MAX_SESSION_TTL_SECS))
        .unwrap_or(DEFAULT_SESSION_TTL_SECS)
}

/// Parses a 64 character hex string into a 32-byte key.
pub fn parse_secret(raw: &str) -> Result<[u8; 32]> {
    if !raw.is_ascii() {
        bail!("secret must be hex digits only");
    }
    if raw.len() != 64 {
        bail!("expected 64 hex characters, got {}", raw.len());
    }
    let mut key = [0u8; 32];
    for (byte, pair) in key.iter_mut().zip(raw.as_bytes().chunks(2)) {
        let pair = std::str::from_utf8(pair)?;
        *byte = u8::from_str_radix(pair, 16)
            .map_err(|_| anyhow!("invalid hex digit pair {pair:?}"))?;
    }
    Ok(key)
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_upload_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = env::var("FORUM_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        Self { max_upload_bytes }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForumPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl ForumPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("forum.db");

        Ok(Self {
            base,
            data_dir,
            db_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_at_base_dir() {
        let paths = ForumPaths::from_base_dir("/srv/forum").unwrap();
        assert_eq!(paths.db_path, PathBuf::from("/srv/forum/data/forum.db"));
        assert_eq!(paths.data_dir, PathBuf::from("/srv/forum/data"));
    }

    #[test]
    fn secret_parsing_accepts_hex_and_rejects_garbage() {
        let hex = "00ff".repeat(16);
        let key = parse_secret(&hex).unwrap();
        assert_eq!(key[0], 0x00);
        assert_eq!(key[1], 0xff);
        assert!(parse_secret("abc").is_err());
        assert!(parse_secret(&"zz".repeat(32)).is_err());
        assert!(parse_secret(&format!("€{}", "a".repeat(61))).is_err());
    }

    #[test]
    fn ttl_is_bounded() {
        assert_eq!(parse_ttl(None), DEFAULT_SESSION_TTL_SECS);
        assert_eq!(parse_ttl(Some("-5")), DEFAULT_SESSION_TTL_SECS);
        assert_eq!(parse_ttl(Some("3600")), 3600);
        assert_eq!(parse_ttl(Some(&i64::MAX.to_string())), MAX_SESSION_TTL_SECS);
    }
}
