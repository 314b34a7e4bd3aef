use regex::Regex;
use std::sync::OnceLock;

const PARTITION_PREFIX: &str = "music-cache";

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"url:\s*"([^"]+)""#).expect("valid manifest pattern"))
}

/// Pull every `url: "<URL>"` token out of the manifest text, in order.
/// Nothing else about the file's structure is interpreted.
pub fn extract_urls(manifest: &str) -> Vec<String> {
    url_pattern()
        .captures_iter(manifest)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Partition name for a manifest: identical URL lists map to the same
/// name, any change produces a new one
pub fn partition_name(urls: &[String]) -> String {
    let digest = md5::compute(urls.join("|").as_bytes());
    format!("{}-{:x}", PARTITION_PREFIX, digest)
}

/// Fresh name for the partition used when the manifest could not be read
pub fn empty_partition_name() -> String {
    format!("{}-empty-{}", PARTITION_PREFIX, uuid::Uuid::new_v4().simple())
}
