use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::warn;

const DEFAULT_OWNER: &str = "local";

pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Identity every entry and catalog item is scoped to.
    pub owner: String,
    pub base_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os("NUTRILOG_DATA_DIR") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => ProjectDirs::from("", "", "nutrilog")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };

        Self::from_parts(
            data_dir,
            std::env::var("NUTRILOG_OWNER").ok(),
            std::env::var("NUTRILOG_BASE_URL").ok(),
        )
    }

    fn from_parts(
        data_dir: PathBuf,
        owner: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("nutrilog.db");

        let owner = match owner.as_deref().map(str::trim) {
            None => DEFAULT_OWNER.to_string(),
            Some("") => {
                warn!("NUTRILOG_OWNER is blank, using '{DEFAULT_OWNER}'");
                DEFAULT_OWNER.to_string()
            }
            Some(o) => o.to_string(),
        };

        let base_url = base_url.and_then(|url| {
            let url = url.trim().trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                Some(url.to_string())
            } else {
                warn!(%url, "ignoring NUTRILOG_BASE_URL, it must start with http:// or https://");
                None
            }
        });

        Ok(Config {
            data_dir,
            db_path,
            owner,
            base_url,
        })
    }

    /// Load the API key from disk, or generate a new one.
    pub fn load_or_create_api_key(&self) -> Result<String> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok(key)
    }
}
