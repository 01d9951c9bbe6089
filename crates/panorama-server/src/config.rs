use std::path::PathBuf;

/// Runtime settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub static_dir: PathBuf,
    /// Seconds between orphan blob sweeps; 0 turns the sweep off.
    pub sweep_secs: u64,
    pub readers: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db_path: PathBuf = var("PANORAMA_DB_PATH")
            .unwrap_or_else(|| "panorama.db".into())
            .into();
        let static_dir: PathBuf = var("PANORAMA_STATIC_DIR")
            .unwrap_or_else(|| "./static".into())
            .into();
        let sweep_secs: u64 = var("PANORAMA_SWEEP_SECS")
            .unwrap_or_else(|| "3600".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("PANORAMA_SWEEP_SECS: {}", e))?;
        let readers: usize = var("PANORAMA_READERS")
            .unwrap_or_else(|| "4".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("PANORAMA_READERS: {}", e))?;
        if readers == 0 {
            anyhow::bail!("PANORAMA_READERS must be at least 1");
        }

        Ok(Self {
            db_path,
            static_dir,
            sweep_secs,
            readers,
        })
    }
}
