//! Output formatting: JSON, compact JSON, YAML.
//!
//! Everything goes through serde so the CLI prints exactly what the store
//! holds. Diagnostics and logs go to stderr; stdout carries only values.

use std::io::{self, Write};

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render a single serde-serializable item in the chosen format.
pub fn render<T: Serialize + ?Sized>(format: OutputFormat, data: &T) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(render_err)?,
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(render_err)?,
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(render_err)?,
    };
    // serde_yaml ends documents with a newline; `print_output` adds its own.
    Ok(rendered.trim_end().to_owned())
}

fn render_err(e: impl std::fmt::Display) -> CliError {
    CliError::Render(e.to_string())
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) -> Result<(), CliError> {
    if quiet || output.is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{output}")?;
    stdout.flush()?;
    Ok(())
}

/// Parse the configured default format (`defaults.output`), falling back
/// to pretty JSON for anything unrecognised.
pub fn format_from_config(name: &str) -> OutputFormat {
    clap::ValueEnum::from_str(name, true).unwrap_or(OutputFormat::Json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_each_format() {
        let value = json!({"theme": "dark", "size": 3});
        assert_eq!(
            render(OutputFormat::JsonCompact, &value).unwrap(),
            r#"{"size":3,"theme":"dark"}"#
        );
        assert_eq!(
            render(OutputFormat::Json, &value).unwrap(),
            "{\n  \"size\": 3,\n  \"theme\": \"dark\"\n}"
        );
        assert_eq!(
            render(OutputFormat::Yaml, &value).unwrap(),
            "size: 3\ntheme: dark"
        );
    }

    #[test]
    fn config_format_names() {
        assert_eq!(format_from_config("yaml"), OutputFormat::Yaml);
        assert_eq!(format_from_config("json-compact"), OutputFormat::JsonCompact);
        assert_eq!(format_from_config("table"), OutputFormat::Json);
    }
}
