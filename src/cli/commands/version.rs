//! Version command implementation.

use serde::Serialize;

use crate::error::Result;

#[derive(Serialize)]
struct VersionOutput<'a> {
    name: &'a str,
    version: &'a str,
    build: &'a str,
}

fn current() -> VersionOutput<'static> {
    VersionOutput {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) { "dev" } else { "release" },
    }
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = current();

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} version {} ({})", output.name, output.version, output.build);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_json_shape() {
        let value = serde_json::to_value(current()).unwrap();
        assert_eq!(value["name"], "cloudsave");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert!(value["build"] == "dev" || value["build"] == "release");
    }
}
