//! `c2md convert` command implementation.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use c2md_config::{CliSettings, Config, Credentials};
use c2md_confluence::{
    ConfluenceClient, InputMode, OfflineTree, PageTree, Source, TraversalDepth, url_origin,
};
use c2md_markdown::{ConversionReport, Converter, DiagramSettings, RenderOptions};
use clap::{ArgAction, Args, ValueEnum};

use super::{cache_override, create_renderer, load_config, open_store};
use crate::error::CliError;
use crate::output::Output;

/// How `INPUT` is interpreted.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum Mode {
    /// Confluence page ID.
    #[default]
    Wiki,
    /// Local JSON file with a page or a page list.
    File,
    /// URL returning a page or a page list as JSON.
    Url,
}

impl From<Mode> for InputMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Wiki => Self::Wiki,
            Mode::File => Self::File,
            Mode::Url => Self::Url,
        }
    }
}

/// Arguments for the convert command.
#[derive(Args)]
pub(crate) struct ConvertArgs {
    /// Page ID, JSON file or URL, depending on --mode.
    input: String,

    /// Input mode.
    #[arg(short, long, value_enum, default_value_t = Mode::Wiki)]
    mode: Mode,

    /// Write Markdown to FILE, replacing its content (default: stdout).
    #[arg(short, long, value_name = "FILE", conflicts_with = "append")]
    output: Option<PathBuf>,

    /// Append Markdown to FILE.
    #[arg(long = "append", visible_alias = "oa", value_name = "FILE")]
    append: Option<PathBuf>,

    /// Only print warnings and errors.
    #[arg(short, long)]
    pub(crate) quiet: bool,

    /// Basic-auth credentials as user:password.
    #[arg(short, long, value_name = "USER:PASSWORD", env = "C2MD_USER", hide_env_values = true)]
    user: Option<String>,

    /// Levels of child pages to include (-1 = all).
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    depth: i64,

    /// Confluence server URL (overrides config).
    #[arg(long)]
    server: Option<String>,

    /// Keep PlantUML macros as code blocks instead of rendering images.
    #[arg(long)]
    no_plantuml: bool,

    /// Attachment folder (overrides config).
    #[arg(short, long, value_name = "DIR")]
    attachments: Option<PathBuf>,

    /// Derive header levels from the page hierarchy.
    #[arg(long, value_name = "BOOL")]
    hierarchy_headers: Option<bool>,

    /// Cut page titles at the first '-'.
    #[arg(long, value_name = "BOOL")]
    transform_titles: Option<bool>,

    /// Emit a header for each root page.
    #[arg(long, value_name = "BOOL")]
    root_page_title: Option<bool>,

    /// Render external links as footnotes.
    #[arg(long, value_name = "BOOL")]
    footnotes: Option<bool>,

    /// Deepest header level; deeper headers become bold text.
    #[arg(long, value_name = "N")]
    max_header_depth: Option<u8>,

    /// Persist the attachment cache between runs.
    #[arg(long, conflicts_with = "no_caching")]
    caching: bool,

    /// Do not persist the attachment cache.
    #[arg(long)]
    no_caching: bool,

    /// Path to configuration file (default: auto-discover c2md.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print help.
    #[arg(short = 'h', long, short_alias = '?', action = ArgAction::Help)]
    help: Option<bool>,
}

impl ConvertArgs {
    /// Execute the convert command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid, pages cannot be fetched
    /// or converted, or the output cannot be written.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let depth = TraversalDepth::try_from(self.depth)?;
        let config = load_config(self.config.as_deref(), &self.cli_settings()?)?;
        let source = Source::new(self.mode.into(), &self.input);

        let client = if source.needs_client() {
            Some(create_client(&config, &source)?)
        } else {
            None
        };
        let roots = source.load_roots(client.as_ref())?;
        let tree: &dyn PageTree = match &client {
            Some(client) => client,
            None => &OfflineTree,
        };

        let mut store = open_store(self.output_dir(), &config.output_resolved);
        let diagrams = &config.diagrams_resolved;
        let renderer = if diagrams.enabled {
            Some(create_renderer(diagrams)?)
        } else {
            None
        };

        let mut converter = Converter::new(
            tree,
            &mut store,
            RenderOptions::from(&config.output_resolved),
            depth,
        );
        if let Some(renderer) = &renderer {
            converter = converter.with_diagrams(DiagramSettings {
                renderer: &**renderer,
                include_dirs: diagrams.include_dirs.clone(),
                dpi: diagrams.dpi,
            });
        }
        let report = converter.convert(&roots)?;

        self.write_markdown(&report.markdown)?;
        print_report(output, &report);
        Ok(())
    }

    fn cli_settings(&self) -> Result<CliSettings, CliError> {
        Ok(CliSettings {
            server: self.server.clone(),
            credentials: self.user.as_deref().map(Credentials::parse).transpose()?,
            attachments_dir: self.attachments.clone(),
            cache_enabled: cache_override(self.caching, self.no_caching),
            hierarchy_headers: self.hierarchy_headers,
            transform_titles: self.transform_titles,
            root_page_title: self.root_page_title,
            footnotes: self.footnotes,
            max_header_depth: self.max_header_depth,
            diagrams_enabled: self.no_plantuml.then_some(false),
        })
    }

    /// Directory attachment links are relative to: the output file's
    /// directory, or the working directory when writing to stdout.
    fn output_dir(&self) -> &Path {
        self.output
            .as_deref()
            .or(self.append.as_deref())
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }

    fn write_markdown(&self, markdown: &str) -> Result<(), CliError> {
        if let Some(path) = &self.output {
            std::fs::write(path, markdown)?;
        } else if let Some(path) = &self.append {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(markdown.as_bytes())?;
        } else {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(markdown.as_bytes())?;
            stdout.flush()?;
        }
        Ok(())
    }
}

/// Client for the configured server. URL sources fall back to the URL's own
/// origin when no server is configured.
fn create_client(config: &Config, source: &Source) -> Result<ConfluenceClient, CliError> {
    let server = match (source, config.confluence.server.as_deref()) {
        (_, Some(_)) => config.require_server()?,
        (Source::Url(url), None) => url_origin(url)
            .ok_or_else(|| CliError::Validation(format!("not an absolute URL: {url}")))?,
        (_, None) => config.require_server()?,
    };
    let credentials = config.confluence.credentials();
    Ok(ConfluenceClient::new(server, credentials.as_ref()))
}

fn print_report(output: &Output, report: &ConversionReport) {
    output.success(&format!("Converted {} page(s)", report.pages));
    if report.attachments_written + report.attachments_reused > 0 {
        output.info(&format!(
            "Attachments: {} written, {} reused from cache",
            report.attachments_written, report.attachments_reused
        ));
    }
    if report.diagrams > 0 {
        output.info(&format!("Diagrams rendered: {}", report.diagrams));
    }

    if !report.warnings.is_empty() {
        output.warning(&format!("\nWarnings ({}):", report.warnings.len()));
        for warning in &report.warnings {
            output.warning(&format!("  - {warning}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    #[command(disable_help_flag = true)]
    struct TestCli {
        #[command(flatten)]
        args: ConvertArgs,
    }

    fn parse(args: &[&str]) -> ConvertArgs {
        let mut argv = vec!["c2md"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).map(|cli| cli.args).ok().unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["12345"]);

        assert_eq!(args.input, "12345");
        assert!(matches!(args.mode, Mode::Wiki));
        assert_eq!(args.depth, -1);
        assert!(!args.quiet);
        assert!(args.output.is_none());
        assert_eq!(args.output_dir(), Path::new("."));
    }

    #[test]
    fn test_negative_depth_is_a_value() {
        let args = parse(&["--depth", "-1", "12345"]);
        assert_eq!(args.depth, -1);

        let args = parse(&["--depth", "2", "12345"]);
        assert_eq!(args.depth, 2);
    }

    #[test]
    fn test_output_and_append_conflict() {
        let result = TestCli::try_parse_from(["c2md", "-o", "a.md", "--oa", "b.md", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_dir_follows_output_file() {
        let args = parse(&["-o", "docs/guide.md", "1"]);
        assert_eq!(args.output_dir(), Path::new("docs"));

        let args = parse(&["--oa", "notes.md", "1"]);
        assert_eq!(args.output_dir(), Path::new("."));
    }

    #[test]
    fn test_cli_settings() {
        let args = parse(&[
            "-m",
            "file",
            "-u",
            "alice:s3cret",
            "--no-plantuml",
            "--footnotes",
            "false",
            "--max-header-depth",
            "3",
            "--no-caching",
            "page.json",
        ]);
        let settings = args.cli_settings().unwrap();

        assert!(matches!(args.mode, Mode::File));
        assert_eq!(settings.credentials.unwrap().user, "alice");
        assert_eq!(settings.diagrams_enabled, Some(false));
        assert_eq!(settings.footnotes, Some(false));
        assert_eq!(settings.hierarchy_headers, None);
        assert_eq!(settings.max_header_depth, Some(3));
        assert_eq!(settings.cache_enabled, Some(false));
    }

    #[test]
    fn test_invalid_credentials() {
        let args = parse(&["-u", "alice", "1"]);
        assert!(matches!(args.cli_settings(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_url_source_uses_url_origin() {
        let config = Config::default();
        let source = Source::Url("https://wiki.example.com/rest/api/content/1".to_owned());
        let client = create_client(&config, &source).unwrap();

        assert_eq!(client.base_url(), "https://wiki.example.com");
    }

    #[test]
    fn test_wiki_source_requires_server() {
        let config = Config::default();
        let source = Source::Wiki("1".to_owned());

        assert!(matches!(
            create_client(&config, &source),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_convert_file_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.json");
        std::fs::write(
            &input,
            r#"{"id": "1", "title": "Guide - Intro", "body": {"storage": {"value": "<p>Hello</p>"}}}"#,
        )
        .unwrap();
        let out = dir.path().join("out.md");
        let config = dir.path().join("c2md.toml");
        std::fs::write(&config, "").unwrap();

        let args = parse(&[
            "-m",
            "file",
            "-q",
            "-c",
            config.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            input.to_str().unwrap(),
        ]);
        args.execute(&Output::new(true)).unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "# Intro\n\nHello\n");
    }
}
