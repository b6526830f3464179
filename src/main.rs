use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use geojson_splitter::{
    process_files, MissingPropertyPolicy, SourceConfig, SplitConfig,
    UnsafeNamePolicy,
};

fn command() -> Command {
    Command::new("GeoJSON Splitter")
        .version("1.0")
        .author("Jesper Fjellin")
        .about("Splits a GeoJSON FeatureCollection into one file per group property value")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .num_args(1)
                .help("YAML config file; command line flags override its values"),
        )
        .arg(
            Arg::new("features")
                .short('f')
                .long("features")
                .num_args(1)
                .help("GeoJSON file whose features are split"),
        )
        .arg(
            Arg::new("property")
                .short('p')
                .long("property")
                .num_args(1)
                .help("Feature property holding the group name"),
        )
        .arg(
            Arg::new("groups")
                .short('g')
                .long("groups")
                .num_args(1)
                .help("GeoJSON file listing the group names (defaults to the features file)"),
        )
        .arg(
            Arg::new("group-property")
                .long("group-property")
                .num_args(1)
                .help("Property holding the group name in the groups file (defaults to --property)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .num_args(1)
                .help("Output directory"),
        )
        .arg(
            Arg::new("compact")
                .long("compact")
                .action(ArgAction::SetTrue)
                .help("Write compact instead of pretty-printed JSON"),
        )
        .arg(
            Arg::new("replace-unsafe")
                .long("replace-unsafe")
                .action(ArgAction::SetTrue)
                .help("Replace path separators in group names instead of failing the group"),
        )
        .arg(
            Arg::new("skip-missing")
                .long("skip-missing")
                .action(ArgAction::SetTrue)
                .help("Treat features without the group property as belonging to no group"),
        )
}

fn build_config(matches: &ArgMatches) -> anyhow::Result<SplitConfig> {
    let features = matches.get_one::<String>("features").map(PathBuf::from);
    let property = matches.get_one::<String>("property").cloned();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => SplitConfig::from_yaml_file(&PathBuf::from(path))?,
        None => {
            let (Some(source_path), Some(group_property)) = (features.clone(), property.clone())
            else {
                return Err(anyhow!(
                    "either --config or both --features and --property are required"
                ));
            };
            SplitConfig::new(
                SourceConfig::Features {
                    source_path,
                    group_property,
                },
                None,
            )
        }
    };

    if features.is_some() || property.is_some() {
        let current = config.feature_source()?.clone();
        config.set_source(SourceConfig::Features {
            source_path: features.unwrap_or_else(|| current.source_path().to_path_buf()),
            group_property: property
                .unwrap_or_else(|| current.group_property().to_string()),
        });
    }

    let groups = matches.get_one::<String>("groups").map(PathBuf::from);
    let group_property = matches.get_one::<String>("group-property").cloned();
    if groups.is_some() || group_property.is_some() {
        let current = config.group_source()?.clone();
        config.set_source(SourceConfig::Groups {
            source_path: groups.unwrap_or_else(|| current.source_path().to_path_buf()),
            group_property: group_property
                .unwrap_or_else(|| current.group_property().to_string()),
        });
    }

    if let Some(output) = matches.get_one::<String>("output") {
        config.output_dir = PathBuf::from(output);
    }
    if matches.get_flag("compact") {
        config.pretty = false;
    }
    if matches.get_flag("replace-unsafe") {
        config.unsafe_names = UnsafeNamePolicy::Replace;
    }
    if matches.get_flag("skip-missing") {
        config.missing_property = MissingPropertyPolicy::Skip;
    }

    config.validate()?;
    Ok(config)
}

fn try_main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();

    let matches = command().get_matches();
    let config = build_config(&matches)?;

    let summary = process_files(&config).context("Error processing files")?;
    println!(
        "Processing completed: {} group files written, {} groups failed",
        summary.written().count(),
        summary.failed().count()
    );
    Ok(())
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{build_config, command};
    use geojson_splitter::{MissingPropertyPolicy, UnsafeNamePolicy};

    fn config_from(args: &[&str]) -> anyhow::Result<geojson_splitter::SplitConfig> {
        let matches = command().try_get_matches_from(args.iter().copied())?;
        build_config(&matches)
    }

    #[test]
    fn test_flags_only() {
        let config = config_from(&[
            "geojson-splitter",
            "-f",
            "alle.geojson",
            "-p",
            "district",
            "--groups",
            "ortsteile.json",
            "-o",
            "out",
            "--compact",
            "--skip-missing",
        ])
        .unwrap();
        let features = config.feature_source().unwrap();
        assert_eq!(features.source_path(), Path::new("alle.geojson"));
        assert_eq!(features.group_property(), "district");
        let groups = config.group_source().unwrap();
        assert_eq!(groups.source_path(), Path::new("ortsteile.json"));
        assert_eq!(groups.group_property(), "district");
        assert_eq!(config.output_dir, Path::new("out"));
        assert!(!config.pretty);
        assert_eq!(config.missing_property, MissingPropertyPolicy::Skip);
        assert_eq!(config.unsafe_names, UnsafeNamePolicy::Reject);
    }

    #[test]
    fn test_features_and_property_required_without_config() {
        assert!(config_from(&["geojson-splitter", "-f", "alle.geojson"]).is_err());
    }
}
