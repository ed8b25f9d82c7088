use crate::config_file::TrainConfigFile;
use crate::error::{Result, ZeroDceError};
use clap::ArgMatches;
use log::info;
use std::fs;
use std::path::Path;

pub fn generate_config(app_m: &ArgMatches) -> Result<()> {
    let output_path = app_m.value_of("OUTPUT_FILE").unwrap_or("training_config.toml");
    let format = app_m.value_of("FORMAT").unwrap_or("toml");
    write_config(Path::new(output_path), format, app_m.is_present("EXAMPLE"), app_m.is_present("FORCE"))?;

    info!("You can now edit the configuration file and use it with:");
    info!("  zerodce --config {}", output_path);
    Ok(())
}

pub fn write_config(output_path: &Path, format: &str, example: bool, force: bool) -> Result<()> {
    if output_path.exists() && !force {
        return Err(ZeroDceError::InvalidParameter(format!(
            "File {} already exists. Use --force to overwrite",
            output_path.display()
        )));
    }

    if example {
        if format != "toml" {
            return Err(ZeroDceError::InvalidParameter(
                "Example configuration with comments is only available in TOML format".to_string(),
            ));
        }
        fs::write(output_path, TrainConfigFile::create_example_toml())?;
        info!("Generated example configuration file with comments: {}", output_path.display());
        return Ok(());
    }

    let config = TrainConfigFile::generate_default();
    match format {
        "toml" => config.to_toml_file(output_path)?,
        "json" => config.to_json_file(output_path)?,
        _ => {
            return Err(ZeroDceError::InvalidParameter(format!(
                "Unknown format: {}. Use 'toml' or 'json'",
                format
            )))
        }
    }
    info!("Generated {} configuration file: {}", format.to_uppercase(), output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        write_config(&path, "toml", false, false).unwrap();
        assert!(write_config(&path, "toml", false, false).is_err());
        write_config(&path, "toml", true, true).unwrap();
        assert!(TrainConfigFile::from_file(&path).is_ok());
    }

    #[test]
    fn test_example_is_toml_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        assert!(write_config(&path, "json", true, false).is_err());
        write_config(&path, "json", false, false).unwrap();
        let config = TrainConfigFile::from_file(&path).unwrap().to_train_config().unwrap();
        assert!(config.validate().is_ok());
    }
}
