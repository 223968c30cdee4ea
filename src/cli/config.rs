use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::{Path, PathBuf};

pub fn init(stdout: bool, path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = match path {
        Some(path) => path,
        None => default_init_path(),
    };

    write_config(&config_content, &config_path)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// ~/.config/logwindow/config.yml, falling back to /etc/logwindow/config.yml
fn default_init_path() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/logwindow/config.yml");
        if let Some(parent) = user_config.parent() {
            match fs::create_dir_all(parent) {
                Ok(()) => return user_config,
                Err(_) => {
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to /etc/logwindow/config.yml");
                }
            }
        }
    }

    PathBuf::from("/etc/logwindow/config.yml")
}

/// Write a config file, refusing to overwrite an existing one.
pub fn write_config(config_content: &str, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() {
        return Err(format!(
            "Config file already exists at {}. Remove it first or use --stdout to print the config",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(config_path, config_content)?;
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    match crate::config::load_config(&path) {
        Ok(_) => {
            println!("✓ Config is valid");
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Config validation failed:\n{}", e);
            Err(e.into())
        }
    }
}
