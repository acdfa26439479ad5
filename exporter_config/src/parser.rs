use crate::config::{Config, ConfigFile};
use anyhow::Result;
use std::path::Path;
use tracing::debug;

pub async fn parse_config_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("config load failed: {}: {}", path.display(), e))?;

    let extension = path.extension().and_then(|s| s.to_str());

    let config = match extension {
        Some("yaml") | Some("yml") => parse_yaml(&contents),
        Some("toml") => parse_toml(&contents),
        Some("json") => parse_json(&contents),
        _ => Err(anyhow::anyhow!(
            "Unsupported file format. Use .yaml, .yml, .toml, or .json"
        )),
    }?;

    debug!(
        "Loaded {} script(s) from {}",
        config.scripts.len(),
        path.display()
    );
    Ok(config)
}

pub fn parse_config_from_str(content: &str, format: &str) -> Result<Config> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "toml" => parse_toml(content),
        "json" => parse_json(content),
        _ => Err(anyhow::anyhow!("Unsupported format: {}", format)),
    }
}

fn parse_yaml(content: &str) -> Result<Config> {
    // An empty YAML document deserializes to unit, not to an empty map.
    if content.trim().is_empty() {
        return Ok(ConfigFile::default().resolve()?);
    }
    let file: ConfigFile = serde_yaml::from_str(content)?;
    Ok(file.resolve()?)
}

fn parse_toml(content: &str) -> Result<Config> {
    let file: ConfigFile = toml::from_str(content)?;
    Ok(file.resolve()?)
}

fn parse_json(content: &str) -> Result<Config> {
    let file: ConfigFile = serde_json::from_str(content)?;
    Ok(file.resolve()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exporter_core::Command;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
startup:
  script: |
    echo preparing
scripts:
  - name: echo
    command: /bin/echo foo 1
  - name: list
    command: ["/bin/echo", "bar 2"]
    timeout: 5
  - name: inline
    timeout: 1500ms
    script: |
      echo 'baz{a="b"} 3'
  - name: raw
    raw: true
    command: [cat, /etc/hostname]
"#;

        let config = parse_yaml(yaml).unwrap();
        assert!(config.startup.is_some());
        assert_eq!(config.scripts.len(), 4);
        assert_eq!(
            config.scripts[0].command(),
            &Command::argv(["/bin/echo", "foo", "1"])
        );
        assert_eq!(
            config.scripts[1].command(),
            &Command::argv(["/bin/echo", "bar 2"])
        );
        assert_eq!(config.scripts[1].timeout(), Duration::from_secs(5));
        assert_eq!(config.scripts[2].timeout(), Duration::from_millis(1500));
        assert!(config.scripts[2].command().stdin_body().is_some());
        assert!(config.scripts[3].raw_output());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[[scripts]]
name = "echo"
command = ["/bin/echo", "foo 1"]
timeout = 3
"#;

        let config = parse_toml(toml).unwrap();
        assert_eq!(config.scripts[0].name(), "echo");
        assert_eq!(config.scripts[0].timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_json() {
        let json = r#"
{
  "scripts": [
    { "name": "echo", "command": "/bin/echo foo 1" }
  ]
}
"#;

        let config = parse_json(json).unwrap();
        assert_eq!(config.scripts[0].name(), "echo");
        assert!(config.startup.is_none());
    }

    #[test]
    fn test_parse_yaml_rejects_invalid_script() {
        let yaml = r#"
scripts:
  - command: /bin/true
"#;
        let err = parse_yaml(yaml).unwrap_err().to_string();
        assert!(err.contains("no name provided"));
    }

    #[test]
    fn test_empty_yaml_is_empty_config() {
        let config = parse_yaml("").unwrap();
        assert!(config.scripts.is_empty());
    }

    #[tokio::test]
    async fn test_parse_config_from_file_uses_extension() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "scripts:\n  - name: a\n    command: /bin/true").unwrap();

        let config = parse_config_from_file(file.path()).await.unwrap();
        assert_eq!(config.scripts[0].name(), "a");

        let unknown = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(parse_config_from_file(unknown.path()).await.is_err());
    }
}
