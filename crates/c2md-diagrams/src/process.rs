//! Local `PlantUML` executable renderer.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::DiagramRenderer;
use crate::error::DiagramError;
use crate::kroki::ensure_png;

/// Runs `PlantUML` in pipe mode (`-pipe -tpng`): source on stdin, PNG on stdout.
#[derive(Debug, Clone)]
pub struct PlantUmlCommand {
    program: String,
    args: Vec<String>,
}

impl PlantUmlCommand {
    /// Create a renderer from a command line such as `plantuml` or
    /// `java -jar /opt/plantuml.jar`. Words are split on whitespace.
    #[must_use]
    pub fn new(command_line: &str) -> Self {
        let mut words = command_line.split_whitespace().map(str::to_owned);
        let program = words.next().unwrap_or_else(|| "plantuml".to_owned());
        Self {
            program,
            args: words.collect(),
        }
    }

    /// Program that will be started.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn_error(&self, source: std::io::Error) -> DiagramError {
        DiagramError::Spawn {
            command: self.program.clone(),
            source,
        }
    }
}

impl DiagramRenderer for PlantUmlCommand {
    fn render_png(&self, source: &str) -> Result<Vec<u8>, DiagramError> {
        tracing::info!("Rendering diagram with {}", self.program);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(["-pipe", "-tpng", "-charset", "UTF-8"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Feed stdin from a separate thread so a chatty child cannot block on
        // a full stdout pipe while we are still writing.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.spawn_error(std::io::Error::other("stdin not captured")))?;
        let input = source.as_bytes().to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output().map_err(|e| self.spawn_error(e))?;
        let written = writer
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer thread panicked")));

        // A failing child usually closes stdin early; its exit status is the
        // more useful error.
        if !output.status.success() {
            return Err(DiagramError::Process {
                command: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        written.map_err(|e| self.spawn_error(e))?;

        ensure_png(output.stdout)
    }
}
