//! put command - Write a file into the staging area

use std::io::Read;

use anyhow::{Context as _, Result};
use base64::Engine;

use super::{stage_path, Workspace};
use crate::cli::args::PutSource;
use crate::cli::Context;
use crate::ui::output;

/// Stage `path` with content from `source`, or from standard input.
pub fn put(ctx: &Context, path: &str, source: &PutSource) -> Result<()> {
    let path = stage_path(path)?;
    let content = read_source(source)?;

    let workspace = Workspace::open(ctx)?;
    let _lock = workspace.lock()?;
    let tracker = workspace.load_tracker()?;
    let staging = workspace.staging(tracker.clone());

    staging
        .write(&path, &content)
        .with_context(|| format!("Failed to stage '{}'", path))?;
    workspace.save_tracker(&tracker)?;

    output::success(
        format!("staged {} ({} bytes)", path, content.len()),
        ctx.verbosity(),
    );
    Ok(())
}

fn read_source(source: &PutSource) -> Result<Vec<u8>> {
    if let Some(file) = &source.from {
        return std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()));
    }
    if let Some(text) = &source.content {
        return Ok(text.clone().into_bytes());
    }
    if let Some(encoded) = &source.base64 {
        return base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .context("Invalid base64 content");
    }

    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("Failed to read standard input")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_source() {
        let source = PutSource {
            content: Some("hello".to_string()),
            ..Default::default()
        };
        assert_eq!(read_source(&source).unwrap(), b"hello");
    }

    #[test]
    fn base64_source_is_binary_safe() {
        let source = PutSource {
            base64: Some("AP8K".to_string()),
            ..Default::default()
        };
        assert_eq!(read_source(&source).unwrap(), vec![0x00, 0xff, 0x0a]);
    }

    #[test]
    fn invalid_base64_rejected() {
        let source = PutSource {
            base64: Some("not base64!".to_string()),
            ..Default::default()
        };
        assert!(read_source(&source).is_err());
    }

    #[test]
    fn file_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("in.bin");
        std::fs::write(&file, [1u8, 2, 3]).unwrap();
        let source = PutSource {
            from: Some(file),
            ..Default::default()
        };
        assert_eq!(read_source(&source).unwrap(), vec![1, 2, 3]);
    }
}
