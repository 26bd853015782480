//! CLI command implementations.

pub(crate) mod convert;
pub(crate) mod uml;

pub(crate) use convert::ConvertArgs;
pub(crate) use uml::UmlArgs;

use std::path::Path;

use c2md_cache::{AttachmentStore, CacheManifest, MANIFEST_FILENAME};
use c2md_config::{CliSettings, Config, DiagramsConfig, OutputConfig, RendererKind};
use c2md_diagrams::{DiagramRenderer, KrokiRenderer, PlantUmlCommand};

use crate::error::CliError;

/// Load the configuration file (explicit or discovered) with CLI overrides.
fn load_config(path: Option<&Path>, settings: &CliSettings) -> Result<Config, CliError> {
    let config = Config::load(path, Some(settings))?;
    match &config.config_path {
        Some(path) => tracing::info!("Using configuration {}", path.display()),
        None => tracing::debug!("No configuration file found, using defaults"),
    }
    Ok(config)
}

/// Resolve `--caching` / `--no-caching` into a config override.
fn cache_override(caching: bool, no_caching: bool) -> Option<bool> {
    if no_caching {
        Some(false)
    } else if caching {
        Some(true)
    } else {
        None
    }
}

/// Attachment store below `root`, with a persistent manifest inside the
/// attachment folder when caching is enabled.
fn open_store(root: &Path, output: &OutputConfig) -> AttachmentStore {
    let manifest = if output.cache_enabled {
        CacheManifest::load(&root.join(&output.attachments_dir).join(MANIFEST_FILENAME))
    } else {
        CacheManifest::in_memory()
    };
    AttachmentStore::new(root, &output.attachments_dir, manifest)
}

/// Create the configured diagram renderer.
fn create_renderer(diagrams: &DiagramsConfig) -> Result<Box<dyn DiagramRenderer>, CliError> {
    match diagrams.renderer {
        RendererKind::PlantUml => Ok(Box::new(PlantUmlCommand::new(&diagrams.plantuml_command))),
        RendererKind::Kroki => {
            let url = diagrams.kroki_url.as_deref().ok_or_else(|| {
                CliError::Validation("diagrams.kroki_url is required for the kroki renderer".to_owned())
            })?;
            Ok(Box::new(KrokiRenderer::new(url)))
        }
    }
}
