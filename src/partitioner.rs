use std::collections::BTreeSet;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use geojson::{JsonObject, JsonValue};

use crate::config::{MissingPropertyPolicy, SplitConfig};
use crate::error::{Result, SplitError};
use crate::naming::output_stem;

/// Outcome of writing a single group.
#[derive(Debug)]
pub enum GroupOutcome {
    Written {
        group: String,
        path: PathBuf,
        feature_count: usize,
    },
    Failed {
        group: String,
        error: SplitError,
    },
}

impl GroupOutcome {
    pub fn group(&self) -> &str {
        match self {
            GroupOutcome::Written { group, .. } | GroupOutcome::Failed { group, .. } => group,
        }
    }
}

#[derive(Debug, Default)]
pub struct SplitSummary {
    pub outcomes: Vec<GroupOutcome>,
}

impl SplitSummary {
    pub fn written(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, GroupOutcome::Written { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, GroupOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

// Function to load the features array of a GeoJSON document
pub fn load_features(file_path: &Path) -> Result<Vec<JsonValue>> {
    log::info!("Loading file: {}", file_path.display());
    let file = File::open(file_path).map_err(|source| SplitError::Io {
        path: file_path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let root: JsonValue = serde_json::from_reader(reader).map_err(|source| SplitError::Parse {
        path: file_path.to_path_buf(),
        source,
    })?;
    let schema_error = |reason: &str| SplitError::Schema {
        path: file_path.to_path_buf(),
        reason: reason.to_string(),
    };

    let features = match root {
        JsonValue::Object(mut object) => match object.remove("features") {
            Some(JsonValue::Array(features)) => features,
            Some(_) => return Err(schema_error("'features' is not an array")),
            None => return Err(schema_error("document has no 'features' member")),
        },
        _ => return Err(schema_error("document is not a JSON object")),
    };
    log::info!("Found {} features in file", features.len());
    Ok(features)
}

/// Text value of a group property. `None` for null, arrays and objects.
pub fn group_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn property<'a>(feature: &'a JsonValue, name: &str) -> Option<&'a JsonValue> {
    feature.get("properties")?.as_object()?.get(name)
}

/// Distinct values of `property` across `features`, in ascending order.
pub fn group_names(property_name: &str, features: &[JsonValue]) -> Vec<String> {
    features
        .iter()
        .filter_map(|feature| property(feature, property_name))
        .filter_map(group_value)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Features whose `property` equals `group`, in input order.
pub fn filter_by_group<'a>(
    property_name: &str,
    group: &str,
    features: &'a [JsonValue],
    policy: MissingPropertyPolicy,
) -> Result<Vec<&'a JsonValue>> {
    let mut matching = Vec::new();
    for (index, feature) in features.iter().enumerate() {
        let value = match (property(feature, property_name), policy) {
            (Some(value), _) => value,
            (None, MissingPropertyPolicy::Skip) => continue,
            (None, MissingPropertyPolicy::Fail) => {
                return Err(SplitError::MissingProperty {
                    index,
                    property: property_name.to_string(),
                })
            }
        };
        if group_value(value).as_deref() == Some(group) {
            matching.push(feature);
        }
    }
    Ok(matching)
}

/// Wraps already serialized features into a FeatureCollection document.
fn feature_collection_document(features: &[String]) -> String {
    format!(
        r#"{{"type":"FeatureCollection","features":[{}]}}"#,
        features.join(",")
    )
}

/// Serializes `features`, wraps them and parses the result back as plain JSON.
///
/// Returns the parsed collection object. Features pass through as opaque JSON.
fn collect_group(features: &[&JsonValue]) -> Result<JsonObject> {
    let serialized = features
        .iter()
        .map(|feature| serde_json::to_string(feature))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let document = feature_collection_document(&serialized);

    let collection = match serde_json::from_str::<JsonValue>(&document) {
        Ok(JsonValue::Object(collection)) => collection,
        Ok(_) => return Err(SplitError::Consistency("collection is not a JSON object".to_string())),
        Err(e) => return Err(SplitError::Consistency(e.to_string())),
    };
    let parsed = collection
        .get("features")
        .and_then(JsonValue::as_array)
        .map(Vec::len);
    match parsed {
        Some(count) if count == features.len() => Ok(collection),
        Some(count) => Err(SplitError::Consistency(format!(
            "expected {} features, found {}",
            features.len(),
            count
        ))),
        None => Err(SplitError::Consistency("collection has no 'features' array".to_string())),
    }
}

fn write_collection(collection: &JsonObject, output_path: &Path, pretty: bool) -> Result<()> {
    let write_error = |source: std::io::Error| SplitError::Write {
        path: output_path.to_path_buf(),
        source,
    };
    let file = File::create(output_path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, collection)?;
    } else {
        serde_json::to_writer(&mut writer, collection)?;
    }
    writer.flush().map_err(write_error)
}

/// Filters `features` down to `group` and writes them to the group's output file.
///
/// Returns the absolute path written and the number of features in it.
pub fn write_group(
    config: &SplitConfig,
    group: &str,
    features: &[JsonValue],
) -> Result<(PathBuf, usize)> {
    let source = config.feature_source()?;
    let matching = filter_by_group(
        source.group_property(),
        group,
        features,
        config.missing_property,
    )?;
    let collection = collect_group(&matching)?;

    let stem = output_stem(group, config.unsafe_names)?;
    let output_path = config.output_dir.join(format!("{}.geojson", stem));
    write_collection(&collection, &output_path, config.pretty)?;

    let absolute_path = output_path.canonicalize().unwrap_or(output_path);
    log::info!("{} written", absolute_path.display());
    Ok((absolute_path, matching.len()))
}

pub fn split(config: &SplitConfig) -> Result<SplitSummary> {
    log::info!("=== Starting split ===");
    config.validate()?;

    let output_dir = &config.output_dir;
    create_dir_all(output_dir).map_err(|source| SplitError::Write {
        path: output_dir.clone(),
        source,
    })?;
    log::info!("Using output directory: {}", output_dir.display());

    let feature_source = config.feature_source()?;
    let features = load_features(feature_source.source_path())?;

    let group_source = config.group_source()?;
    let names = if group_source == feature_source {
        group_names(group_source.group_property(), &features)
    } else {
        let group_features = load_features(group_source.source_path())?;
        group_names(group_source.group_property(), &group_features)
    };
    log::info!("Found {} distinct groups", names.len());

    let mut summary = SplitSummary::default();
    for name in names {
        let outcome = match write_group(config, &name, &features) {
            Ok((path, feature_count)) => {
                log::debug!("{}: {} features", name, feature_count);
                GroupOutcome::Written {
                    group: name,
                    path,
                    feature_count,
                }
            }
            Err(error) => {
                log::warn!("{}: {}", name, error);
                GroupOutcome::Failed { group: name, error }
            }
        };
        summary.outcomes.push(outcome);
    }

    log::info!(
        "=== Split complete: {} written, {} failed ===",
        summary.written().count(),
        summary.failed().count()
    );
    Ok(summary)
}
