use anyhow::{Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

use crate::prompt::SourceFile;

/// Reads every file handed to debug mode. A missing file is a usage error.
pub fn collect_sources(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.is_file() {
            bail!("File not found: {}", path.display());
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => bail!("Failed to read {}: {}", path.display(), err),
        };
        sources.push(SourceFile {
            name: path.display().to_string(),
            content,
        });
    }
    Ok(sources)
}

/// Runs `script` with `interpreter` and returns stdout followed by stderr.
/// A script that cannot be started is reported in the output, not as an error.
pub fn run_script(interpreter: &str, script: &Path) -> String {
    debug!(interpreter, script = %script.display(), "running script for debug mode");
    match Command::new(interpreter).arg(script).output() {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            format!("{}\n{}", stdout.trim(), stderr.trim())
                .trim()
                .to_string()
        }
        Err(err) => {
            warn!(interpreter, error = %err, "failed to run script");
            format!("Error running script: {err}")
        }
    }
}
