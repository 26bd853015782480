//! `PlantUML` diagram rendering for c2md.
//!
//! Confluence pages embed `PlantUML` sources in macros. This crate turns such a
//! source into PNG bytes through a pluggable [`DiagramRenderer`]:
//!
//! - [`PlantUmlCommand`]: runs a local `plantuml` executable in pipe mode
//! - [`KrokiRenderer`]: posts the source to a Kroki server
//!
//! Sources are prepared first ([`prepare_diagram_source`]): `!include`
//! directives are resolved from configured directories and the DPI is
//! injected after `@startuml`. [`DiagramKey`] gives the content-addressed
//! file name the PNG is stored under.
//!
//! # Example
//!
//! ```no_run
//! use c2md_diagrams::{DiagramKey, DiagramRenderer, PlantUmlCommand, prepare_diagram_source};
//!
//! let renderer = PlantUmlCommand::new("plantuml");
//! let prepared = prepare_diagram_source("@startuml\nA -> B\n@enduml", &[], 192);
//! let png = renderer.render_png(&prepared.source)?;
//! let file_name = DiagramKey::new(&prepared.source).file_name();
//! # Ok::<(), c2md_diagrams::DiagramError>(())
//! ```

mod consts;
mod error;
mod key;
mod kroki;
mod plantuml;
mod process;

pub use consts::DEFAULT_DPI;
pub use error::DiagramError;
pub use key::DiagramKey;
pub use kroki::KrokiRenderer;
pub use plantuml::{PrepareResult, is_plantuml_source, prepare_diagram_source};
pub use process::PlantUmlCommand;

/// Renders a prepared `PlantUML` source to PNG bytes.
pub trait DiagramRenderer {
    /// Render `source` and return the PNG image data.
    ///
    /// # Errors
    ///
    /// Returns [`DiagramError`] if the renderer cannot be reached or rejects
    /// the diagram.
    fn render_png(&self, source: &str) -> Result<Vec<u8>, DiagramError>;
}

impl<T: DiagramRenderer + ?Sized> DiagramRenderer for Box<T> {
    fn render_png(&self, source: &str) -> Result<Vec<u8>, DiagramError> {
        (**self).render_png(source)
    }
}

impl<T: DiagramRenderer + ?Sized> DiagramRenderer for &T {
    fn render_png(&self, source: &str) -> Result<Vec<u8>, DiagramError> {
        (**self).render_png(source)
    }
}
