//! Canonical path form shared by the cache producer, the table and every query.
//!
//! Canonical paths are ASCII-lowercased, backslash-separated, carry no
//! leading, trailing or doubled separators, and (with a virtual root
//! configured) always start with the root marker, e.g. `data\meshes\x.nif`.

use ldx_config::NormalizationConfig;

/// Separator used by canonical paths
pub const SEPARATOR: char = '\\';

/// Root convention: every path lives under `marker\`, and `sentinel` names
/// the root itself in traversal requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualRoot {
    /// `marker` followed by the separator, e.g. `data\`
    marker_prefix: String,
    /// `marker\sentinel`, e.g. `data\root`
    rooted_sentinel: String,
    sentinel: String,
}

impl VirtualRoot {
    pub fn new(marker: &str, sentinel: &str) -> Self {
        let marker_prefix = format!("{}{}", marker.to_ascii_lowercase(), SEPARATOR);
        let sentinel = sentinel.to_ascii_lowercase();
        Self {
            rooted_sentinel: format!("{}{}", marker_prefix, sentinel),
            marker_prefix,
            sentinel,
        }
    }

    pub fn marker_prefix(&self) -> &str {
        &self.marker_prefix
    }

    fn is_sentinel(&self, normalized: &str) -> bool {
        normalized == self.sentinel || normalized == self.rooted_sentinel
    }
}

/// Pure path canonicalizer.
///
/// Cheap to clone and safe to share; it holds only the root convention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathNormalizer {
    root: Option<VirtualRoot>,
}

impl PathNormalizer {
    /// Normalizer without a virtual root
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Normalizer that roots every path under `marker`
    pub fn with_root(marker: &str, sentinel: &str) -> Self {
        Self {
            root: Some(VirtualRoot::new(marker, sentinel)),
        }
    }

    /// Build from config; an empty marker disables the root convention
    pub fn from_config(config: &NormalizationConfig) -> Self {
        if config.root_marker.trim().is_empty() {
            Self::new()
        } else {
            Self::with_root(config.root_marker.trim(), config.root_sentinel.trim())
        }
    }

    pub fn root(&self) -> Option<&VirtualRoot> {
        self.root.as_ref()
    }

    /// Canonicalize a raw path.
    ///
    /// Returns the empty string for empty input and for the root sentinel,
    /// which callers treat as "match everything".
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim_matches(|c| c == ' ' || c == '\t');
        let extra = self
            .root
            .as_ref()
            .map_or(0, |root| root.marker_prefix.len());
        // One spare byte for the traversal separator
        let mut out = String::with_capacity(trimmed.len() + extra + 1);

        let mut previous_was_separator = false;
        for c in trimmed.chars() {
            let c = if c == '/' { SEPARATOR } else { c.to_ascii_lowercase() };
            if c == SEPARATOR {
                if previous_was_separator || out.is_empty() {
                    previous_was_separator = true;
                    continue;
                }
                previous_was_separator = true;
            } else {
                previous_was_separator = false;
            }
            out.push(c);
        }
        if out.ends_with(SEPARATOR) {
            out.pop();
        }

        if out.is_empty() {
            return out;
        }

        if let Some(root) = &self.root {
            if root.is_sentinel(&out) {
                out.clear();
            } else if !out.starts_with(root.marker_prefix.as_str()) {
                out.insert_str(0, &root.marker_prefix);
            }
        }
        out
    }

    /// Canonicalize a traversal prefix.
    ///
    /// Non-empty results end in exactly one separator so that `textures`
    /// never matches `textures2\...`.
    pub fn normalize_prefix(&self, raw: &str) -> String {
        let mut prefix = self.normalize(raw);
        if !prefix.is_empty() {
            prefix.push(SEPARATOR);
        }
        prefix
    }
}

impl From<&NormalizationConfig> for PathNormalizer {
    fn from(config: &NormalizationConfig) -> Self {
        Self::from_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooted() -> PathNormalizer {
        PathNormalizer::with_root("data", "root")
    }

    #[test]
    fn test_plain_normalization() {
        let n = PathNormalizer::new();
        assert_eq!(n.normalize("  Meshes//Armor/Iron\\Helmet.NIF\t"), r"meshes\armor\iron\helmet.nif");
        assert_eq!(n.normalize(r"\\textures\\"), "textures");
        assert_eq!(n.normalize(""), "");
        assert_eq!(n.normalize(" \t "), "");
        assert_eq!(n.normalize("///"), "");
    }

    #[test]
    fn test_root_marker_inserted_once() {
        let n = rooted();
        assert_eq!(n.normalize("textures/face.dds"), r"data\textures\face.dds");
        assert_eq!(n.normalize(r"Data\Textures\Example.DDS"), r"data\textures\example.dds");
        assert_eq!(n.normalize("/DATA//meshes/x.nif"), r"data\meshes\x.nif");
    }

    #[test]
    fn test_marker_alone_is_not_the_root() {
        // Only `data\...` counts as already rooted
        assert_eq!(rooted().normalize("data"), r"data\data");
    }

    #[test]
    fn test_sentinel_means_everything() {
        let n = rooted();
        assert_eq!(n.normalize("ROOT"), "");
        assert_eq!(n.normalize(r"data\root"), "");
        assert_eq!(n.normalize(""), "");
        assert_eq!(n.normalize(r"data\root\x"), r"data\root\x");
    }

    #[test]
    fn test_prefix_variant() {
        let n = rooted();
        assert_eq!(n.normalize_prefix("textures"), r"data\textures\");
        assert_eq!(n.normalize_prefix("Textures/Actors/"), r"data\textures\actors\");
        assert_eq!(n.normalize_prefix(""), "");
        assert_eq!(n.normalize_prefix("root"), "");
    }

    #[test]
    fn test_non_ascii_passes_through() {
        let n = PathNormalizer::new();
        assert_eq!(n.normalize("Sound/Ünïcode/Ä.wav"), r"sound\Ünïcode\Ä.wav");
    }

    #[test]
    fn test_idempotent() {
        let n = rooted();
        for raw in ["Meshes/X.nif", r"data\\a\\b", " root ", "a/b/c/"] {
            let once = n.normalize(raw);
            assert_eq!(n.normalize(&once), once);
        }
    }

    #[test]
    fn test_from_config() {
        let n = PathNormalizer::from_config(&NormalizationConfig::default());
        assert_eq!(n.root().unwrap().marker_prefix(), r"data\");

        let plain = PathNormalizer::from_config(&NormalizationConfig {
            root_marker: String::new(),
            root_sentinel: "root".to_string(),
        });
        assert!(plain.root().is_none());
        assert_eq!(plain.normalize("root"), "root");
    }
}
