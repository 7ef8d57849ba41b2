use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Full pipeline configuration. Every section has usable defaults, so an
/// empty TOML file (or `AnalysisConfig::default()`) yields the documented
/// tuning: split at 15 pages into chunks of 12, confidence floor 0.4,
/// overall-rate floor 0.3, 90s timeouts for AI-heavy calls.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub intervals: IntervalConfig,
    #[serde(default)]
    pub aliases: AliasConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Documents with more pages than this are split.
    #[serde(default = "default_split_threshold")]
    pub split_threshold: u32,
    /// Maximum pages per chunk once splitting kicks in.
    #[serde(default = "default_max_chunk_pages")]
    pub max_chunk_pages: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            split_threshold: default_split_threshold(),
            max_chunk_pages: default_max_chunk_pages(),
        }
    }
}

fn default_split_threshold() -> u32 {
    15
}
fn default_max_chunk_pages() -> u32 {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct QualityConfig {
    /// Minimum model-reported confidence for automatic processing.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Minimum fraction of all declared fields that must be non-empty.
    #[serde(default = "default_min_overall_rate")]
    pub min_overall_rate: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            min_overall_rate: default_min_overall_rate(),
        }
    }
}

fn default_min_confidence() -> f64 {
    0.4
}
fn default_min_overall_rate() -> f64 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    /// Per-chunk OCR call timeout.
    #[serde(default = "default_ocr_timeout_secs")]
    pub timeout_secs: u64,
    /// Timeout for the best-effort header/footer scan.
    #[serde(default = "default_region_timeout_secs")]
    pub region_timeout_secs: u64,
    /// Concurrent chunk calls; size to the OCR service's rate limit.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_ocr_timeout_secs(),
            region_timeout_secs: default_region_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_ocr_timeout_secs() -> u64 {
    90
}
fn default_region_timeout_secs() -> u64 {
    20
}
fn default_max_concurrent() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Field-extraction completion call timeout.
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
    /// Completion model identifier passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extraction_timeout_secs(),
            model: default_model(),
        }
    }
}

fn default_extraction_timeout_secs() -> u64 {
    90
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Equipment-to-service-interval table for test-report due dates.
///
/// Injected into the normalizer rather than living as module state; keys
/// are matched as lowercase substrings of the extracted equipment name.
#[derive(Debug, Deserialize, Clone)]
pub struct IntervalConfig {
    #[serde(default = "default_interval_months")]
    pub months: BTreeMap<String, u32>,
    /// Interval applied when no equipment key matches.
    #[serde(default = "default_fallback_months")]
    pub fallback_months: u32,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            months: default_interval_months(),
            fallback_months: default_fallback_months(),
        }
    }
}

fn default_interval_months() -> BTreeMap<String, u32> {
    let mut m = BTreeMap::new();
    m.insert("liferaft".to_string(), 12);
    m.insert("lifeboat".to_string(), 12);
    m.insert("rescue boat".to_string(), 12);
    m.insert("fire extinguisher".to_string(), 12);
    m.insert("epirb".to_string(), 12);
    m.insert("co2".to_string(), 24);
    m.insert("foam".to_string(), 24);
    m.insert("immersion suit".to_string(), 36);
    m
}

fn default_fallback_months() -> u32 {
    12
}

/// Issuing-authority alias table; keys compared case-insensitively.
#[derive(Debug, Deserialize, Clone)]
pub struct AliasConfig {
    #[serde(default = "default_alias_table")]
    pub canonical: BTreeMap<String, String>,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            canonical: default_alias_table(),
        }
    }
}

fn default_alias_table() -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("DNV GL".to_string(), "DNV".to_string());
    m.insert("DNV-GL".to_string(), "DNV".to_string());
    m.insert("DET NORSKE VERITAS".to_string(), "DNV".to_string());
    m.insert("LR".to_string(), "Lloyd's Register".to_string());
    m.insert("LLOYDS REGISTER".to_string(), "Lloyd's Register".to_string());
    m.insert(
        "LLOYD'S REGISTER".to_string(),
        "Lloyd's Register".to_string(),
    );
    m.insert(
        "ABS".to_string(),
        "American Bureau of Shipping".to_string(),
    );
    m.insert("BV".to_string(), "Bureau Veritas".to_string());
    m.insert(
        "CCS".to_string(),
        "China Classification Society".to_string(),
    );
    m.insert("NK".to_string(), "ClassNK".to_string());
    m.insert("NIPPON KAIJI KYOKAI".to_string(), "ClassNK".to_string());
    m.insert("KR".to_string(), "Korean Register".to_string());
    m
}

pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AnalysisConfig =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.split_threshold == 0 {
        anyhow::bail!("chunking.split_threshold must be > 0");
    }
    if config.chunking.max_chunk_pages == 0 {
        anyhow::bail!("chunking.max_chunk_pages must be > 0");
    }
    if !(0.0..=1.0).contains(&config.quality.min_confidence) {
        anyhow::bail!("quality.min_confidence must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.quality.min_overall_rate) {
        anyhow::bail!("quality.min_overall_rate must be in [0.0, 1.0]");
    }
    if config.ocr.timeout_secs == 0 || config.extraction.timeout_secs == 0 {
        anyhow::bail!("ocr.timeout_secs and extraction.timeout_secs must be > 0");
    }
    if config.ocr.max_concurrent == 0 {
        anyhow::bail!("ocr.max_concurrent must be >= 1");
    }
    if config.intervals.fallback_months == 0 {
        anyhow::bail!("intervals.fallback_months must be > 0");
    }

    Ok(config)
}
