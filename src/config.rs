use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureSettings,
    pub segments: SegmentSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CaptureSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SegmentSettings {
    pub threshold_bytes: usize,
    pub export_path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
