use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SplitError};
use crate::naming::UnsafeNamePolicy;

/// How the partition filter treats a feature that lacks the group property key.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingPropertyPolicy {
    /// Fail the group being written.
    #[default]
    Fail,
    /// Treat the feature as belonging to no group.
    Skip,
}

/// A GeoJSON document taking part in a split, tagged by its role.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum SourceConfig {
    /// The document whose features are split into per-group files.
    Features {
        source_path: PathBuf,
        group_property: String,
    },
    /// The document supplying the list of group names.
    Groups {
        source_path: PathBuf,
        group_property: String,
    },
}

impl SourceConfig {
    pub fn source_path(&self) -> &Path {
        match self {
            SourceConfig::Features { source_path, .. } | SourceConfig::Groups { source_path, .. } => {
                source_path
            }
        }
    }

    pub fn group_property(&self) -> &str {
        match self {
            SourceConfig::Features { group_property, .. }
            | SourceConfig::Groups { group_property, .. } => group_property,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_pretty() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    pub sources: Vec<SourceConfig>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
    #[serde(default)]
    pub unsafe_names: UnsafeNamePolicy,
    #[serde(default)]
    pub missing_property: MissingPropertyPolicy,
}

impl SplitConfig {
    pub fn new(features: SourceConfig, groups: Option<SourceConfig>) -> Self {
        Self {
            sources: std::iter::once(features).chain(groups).collect(),
            output_dir: default_output_dir(),
            pretty: default_pretty(),
            unsafe_names: UnsafeNamePolicy::default(),
            missing_property: MissingPropertyPolicy::default(),
        }
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SplitError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }
        let contents = read_to_string(path).map_err(|source| SplitError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SplitConfig =
            serde_yaml::from_str(&contents).map_err(|source| SplitError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that there is exactly one feature source and at most one group source.
    pub fn validate(&self) -> Result<()> {
        self.feature_source()?;
        let group_sources = self
            .sources
            .iter()
            .filter(|s| matches!(s, SourceConfig::Groups { .. }))
            .count();
        if group_sources > 1 {
            return Err(SplitError::Config(format!(
                "expected at most one groups source, found {}",
                group_sources
            )));
        }
        Ok(())
    }

    pub fn feature_source(&self) -> Result<&SourceConfig> {
        let mut features = self
            .sources
            .iter()
            .filter(|s| matches!(s, SourceConfig::Features { .. }));
        match (features.next(), features.next()) {
            (Some(source), None) => Ok(source),
            (None, _) => Err(SplitError::Config("no features source configured".to_string())),
            (Some(_), Some(_)) => Err(SplitError::Config(
                "expected exactly one features source".to_string(),
            )),
        }
    }

    /// The group-name source. Falls back to the feature source when none is configured.
    pub fn group_source(&self) -> Result<&SourceConfig> {
        match self
            .sources
            .iter()
            .find(|s| matches!(s, SourceConfig::Groups { .. }))
        {
            Some(source) => Ok(source),
            None => self.feature_source(),
        }
    }

    /// Replaces the source with the same role, or adds it.
    pub fn set_source(&mut self, source: SourceConfig) {
        let same_role = |s: &SourceConfig| std::mem::discriminant(s) == std::mem::discriminant(&source);
        self.sources.retain(|s| !same_role(s));
        self.sources.push(source);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use rstest::rstest;
    use testdir::testdir;

    use super::{MissingPropertyPolicy, SourceConfig, SplitConfig};
    use crate::error::SplitError;
    use crate::naming::UnsafeNamePolicy;

    fn features_source(path: &str) -> SourceConfig {
        SourceConfig::Features {
            source_path: PathBuf::from(path),
            group_property: "district".to_string(),
        }
    }

    #[test]
    fn test_read_full_yaml_config() {
        let dir = testdir!();
        let config_path = dir.join("split.yaml");
        fs::write(
            &config_path,
            r#"
output_dir: out
pretty: false
unsafe_names: replace
missing_property: skip
sources:
  - role: features
    source_path: alle.geojson
    group_property: district
  - role: groups
    source_path: ortsteile.json
    group_property: Name
"#,
        )
        .unwrap();

        let config = SplitConfig::from_yaml_file(&config_path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert!(!config.pretty);
        assert_eq!(config.unsafe_names, UnsafeNamePolicy::Replace);
        assert_eq!(config.missing_property, MissingPropertyPolicy::Skip);
        assert_eq!(config.feature_source().unwrap(), &features_source("alle.geojson"));
        let groups = config.group_source().unwrap();
        assert_eq!(groups.source_path(), Path::new("ortsteile.json"));
        assert_eq!(groups.group_property(), "Name");
    }

    #[test]
    fn test_yaml_defaults() {
        let dir = testdir!();
        let config_path = dir.join("split.yaml");
        fs::write(
            &config_path,
            "sources:\n  - role: features\n    source_path: alle.geojson\n    group_property: district\n",
        )
        .unwrap();

        let config = SplitConfig::from_yaml_file(&config_path).unwrap();
        assert_eq!(config, SplitConfig::new(features_source("alle.geojson"), None));
        assert!(config.pretty);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.group_source().unwrap(), config.feature_source().unwrap());
    }

    #[test]
    fn test_missing_config_file() {
        let dir = testdir!();
        let err = SplitConfig::from_yaml_file(&dir.join("absent.yaml")).unwrap_err();
        assert!(matches!(err, SplitError::Config(_)));
    }

    #[test]
    fn test_unknown_role_is_a_parse_error() {
        let dir = testdir!();
        let config_path = dir.join("split.yaml");
        fs::write(
            &config_path,
            "sources:\n  - role: pumps\n    source_path: alle.geojson\n    group_property: district\n",
        )
        .unwrap();
        let err = SplitConfig::from_yaml_file(&config_path).unwrap_err();
        assert!(matches!(err, SplitError::ConfigParse { .. }));
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![features_source("a.geojson"), features_source("b.geojson")])]
    #[case(vec![
        features_source("a.geojson"),
        SourceConfig::Groups { source_path: "g1.json".into(), group_property: "name".into() },
        SourceConfig::Groups { source_path: "g2.json".into(), group_property: "name".into() },
    ])]
    fn test_invalid_source_combinations(#[case] sources: Vec<SourceConfig>) {
        let mut config = SplitConfig::new(features_source("a.geojson"), None);
        config.sources = sources;
        assert!(matches!(config.validate(), Err(SplitError::Config(_))));
    }

    #[test]
    fn test_set_source_replaces_same_role() {
        let mut config = SplitConfig::new(features_source("a.geojson"), None);
        config.set_source(features_source("b.geojson"));
        config.set_source(SourceConfig::Groups {
            source_path: "g.json".into(),
            group_property: "name".into(),
        });
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.feature_source().unwrap().source_path(), Path::new("b.geojson"));
        assert_eq!(config.group_source().unwrap().group_property(), "name");
    }
}
