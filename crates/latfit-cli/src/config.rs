pub mod defaults;

use crate::cli::{AggregationArg, RefineArgs};
use crate::error::{CliError, Result};
use clap::ValueEnum;
use defaults::DefaultsConfig;
use latfit::engine::config::{ErrorAggregation, RefineConfig, RefineConfigBuilder};
use latfit::engine::symmetry::CellType;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialOptimizationConfig {
    #[serde(rename = "max-iterations")]
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
    #[serde(rename = "initial-lambda")]
    initial_lambda: Option<f64>,
    #[serde(rename = "lambda-up")]
    lambda_up: Option<f64>,
    #[serde(rename = "lambda-down")]
    lambda_down: Option<f64>,
    #[serde(rename = "max-lambda")]
    max_lambda: Option<f64>,
    #[serde(rename = "finite-difference-step")]
    finite_difference_step: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRefineConfig {
    #[serde(rename = "cell-type")]
    cell_type: Option<String>,
    aggregation: Option<ErrorAggregation>,
    optimization: Option<PartialOptimizationConfig>,
}

impl PartialRefineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Resolves the final configuration with precedence
    /// CLI flags > `--set` values > config file > defaults.
    pub fn merge_with_cli(mut self, args: &RefineArgs) -> Result<RefineConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let file_cell_type = self
            .cell_type
            .as_deref()
            .map(|name| CellType::from_str(name).map_err(|e| CliError::Config(e.to_string())))
            .transpose()?;
        let cell_type = args.cell_type.or(file_cell_type).ok_or_else(|| {
            CliError::Config(
                "A value for 'cell-type' is required either in the config file or via --cell-type."
                    .to_string(),
            )
        })?;

        let aggregation = args
            .aggregation
            .map(ErrorAggregation::from)
            .or(self.aggregation)
            .unwrap_or(defaults.aggregation);

        let opt = self.optimization.take().unwrap_or_default();
        let builder = RefineConfigBuilder::new()
            .cell_type(cell_type)
            .aggregation(aggregation)
            .max_iterations(
                args.max_iterations
                    .or(opt.max_iterations)
                    .unwrap_or(defaults.max_iterations),
            )
            .tolerance(args.tolerance.or(opt.tolerance).unwrap_or(defaults.tolerance))
            .initial_lambda(opt.initial_lambda.unwrap_or(defaults.initial_lambda))
            .lambda_up(opt.lambda_up.unwrap_or(defaults.lambda_up))
            .lambda_down(opt.lambda_down.unwrap_or(defaults.lambda_down))
            .max_lambda(opt.max_lambda.unwrap_or(defaults.max_lambda))
            .finite_difference_step(
                opt.finite_difference_step
                    .unwrap_or(defaults.finite_difference_step),
            );

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "cell-type" => {
                    CellType::from_str(value_str).map_err(|e| CliError::Config(e.to_string()))?;
                    self.cell_type = Some(value_str.to_string());
                }
                "aggregation" => {
                    let arg = <AggregationArg as ValueEnum>::from_str(value_str, true)
                        .map_err(|_| {
                            CliError::Config(format!("Invalid value for {}: {}", key, value_str))
                        })?;
                    self.aggregation = Some(arg.into());
                }
                _ => {
                    let opt = self.optimization.get_or_insert_with(Default::default);
                    match key {
                        "optimization.max-iterations" => {
                            opt.max_iterations = Some(parse_value(key, value_str, "integer")?);
                        }
                        "optimization.tolerance" => {
                            opt.tolerance = Some(parse_value(key, value_str, "float")?);
                        }
                        "optimization.initial-lambda" => {
                            opt.initial_lambda = Some(parse_value(key, value_str, "float")?);
                        }
                        "optimization.lambda-up" => {
                            opt.lambda_up = Some(parse_value(key, value_str, "float")?);
                        }
                        "optimization.lambda-down" => {
                            opt.lambda_down = Some(parse_value(key, value_str, "float")?);
                        }
                        "optimization.max-lambda" => {
                            opt.max_lambda = Some(parse_value(key, value_str, "float")?);
                        }
                        "optimization.finite-difference-step" => {
                            opt.finite_difference_step =
                                Some(parse_value(key, value_str, "float")?);
                        }
                        _ => {
                            return Err(CliError::Config(format!(
                                "Unsupported configuration key for --set: '{}'",
                                key
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    fn write_config_file(dir: &TempDir, content: &str) -> PathBuf {
        let file_path = dir.path().join("refine.toml");
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn refine_args(extra: &[&str]) -> RefineArgs {
        let mut argv = vec!["latfit", "refine", "-i", "peaks.csv"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Refine(args) => args,
            _ => panic!("Expected 'refine' subcommand"),
        }
    }

    #[test]
    fn file_values_are_merged_with_defaults() {
        let dir = tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
            cell-type = "Monoclinic ( b unique )"
            aggregation = "mean-square"

            [optimization]
            max-iterations = 40
            initial-lambda = 0.01
            "#,
        );

        let config = PartialRefineConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&refine_args(&[]))
            .unwrap();

        assert_eq!(config.cell_type, CellType::MonoclinicB);
        assert_eq!(config.aggregation, ErrorAggregation::MeanSquare);
        assert_eq!(config.optimization.max_iterations, 40);
        assert_eq!(config.optimization.initial_lambda, 0.01);
        assert_eq!(config.optimization.tolerance, DefaultsConfig::default().tolerance);
    }

    #[test]
    fn cli_flags_override_file_values() {
        let dir = tempdir().unwrap();
        let path = write_config_file(
            &dir,
            "cell-type = \"cubic\"\n[optimization]\nmax-iterations = 40\ntolerance = 1e-6\n",
        );
        let args = refine_args(&["-t", "hexagonal", "--max-iterations", "7"]);

        let config = PartialRefineConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.cell_type, CellType::Hexagonal);
        assert_eq!(config.optimization.max_iterations, 7);
        assert_eq!(config.optimization.tolerance, 1e-6);
    }

    #[test]
    fn set_values_override_file_but_not_flags() {
        let dir = tempdir().unwrap();
        let path = write_config_file(
            &dir,
            "cell-type = \"cubic\"\naggregation = \"mean-square\"\n[optimization]\nmax-iterations = 40\n",
        );
        let args = refine_args(&[
            "--max-iterations",
            "7",
            "-S",
            "optimization.max-iterations=99",
            "-S",
            "cell-type=tetragonal",
            "-S",
            "aggregation=root-mean-square",
            "-S",
            "optimization.lambda-down=0.5",
        ]);

        let config = PartialRefineConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.cell_type, CellType::Tetragonal);
        assert_eq!(config.aggregation, ErrorAggregation::RootMeanSquare);
        assert_eq!(config.optimization.max_iterations, 7);
        assert_eq!(config.optimization.lambda_down, 0.5);
    }

    #[test]
    fn missing_cell_type_is_a_config_error() {
        let result = PartialRefineConfig::default().merge_with_cli(&refine_args(&[]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("cell-type")));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = write_config_file(&dir, "cell-type = \"cubic\"\nspace-group = \"Fm-3m\"\n");

        assert!(matches!(
            PartialRefineConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        for bad in ["optimization.tolerance", "optimization.tolerance=abc", "colour=red"] {
            let args = refine_args(&["-t", "cubic", "-S", bad]);
            let result = PartialRefineConfig::default().merge_with_cli(&args);
            assert!(matches!(result, Err(CliError::Config(_))), "{bad}");
        }
    }

    #[test]
    fn invalid_optimizer_values_surface_from_the_builder() {
        let args = refine_args(&["-t", "cubic", "-S", "optimization.lambda-up=0.5"]);
        let result = PartialRefineConfig::default().merge_with_cli(&args);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("lambda_up")));
    }
}
