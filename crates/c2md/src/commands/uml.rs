//! `c2md uml` command implementation.

use std::path::{Path, PathBuf};

use c2md_config::{CliSettings, Credentials};
use c2md_confluence::{
    ConfluenceClient, PublishOptions, PublishResult, ROOT_EXPAND, TraversalDepth, UmlPublisher,
};
use clap::{ArgAction, Args};

use super::{cache_override, create_renderer, load_config, open_store};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the uml command.
#[derive(Args)]
pub(crate) struct UmlArgs {
    /// ID of the root page.
    page_id: String,

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

    /// Folder rendered diagrams are saved to (overrides config).
    #[arg(short, long, value_name = "DIR")]
    attachments: Option<PathBuf>,

    /// Persist the attachment cache between runs.
    #[arg(long, conflicts_with = "no_caching")]
    caching: bool,

    /// Do not persist the attachment cache.
    #[arg(long)]
    no_caching: bool,

    /// Upload rendered diagrams that are not attached yet.
    #[arg(long, value_name = "BOOL", default_value_t = false, action = ArgAction::Set)]
    update_attachments: bool,

    /// Insert image tags after diagram macros and save the pages.
    #[arg(long, value_name = "BOOL", default_value_t = false, action = ArgAction::Set)]
    update_page: bool,

    /// Preview changes without updating Confluence.
    #[arg(long)]
    dry_run: bool,

    /// Path to configuration file (default: auto-discover c2md.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print help.
    #[arg(short = 'h', long, short_alias = '?', action = ArgAction::Help)]
    help: Option<bool>,
}

impl UmlArgs {
    /// Execute the uml command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid, a page cannot be fetched
    /// or updated, or a diagram fails to render.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let depth = TraversalDepth::try_from(self.depth)?;
        let config = load_config(self.config.as_deref(), &self.cli_settings()?)?;

        let server = config.require_server()?;
        let credentials = config.confluence.credentials();
        let client = ConfluenceClient::new(server, credentials.as_ref());
        let root = client.get_page(&self.page_id, ROOT_EXPAND)?;
        if let Some(url) = client.page_url(&root) {
            output.info(&format!("Processing {url}"));
        }

        let diagrams = &config.diagrams_resolved;
        let renderer = create_renderer(diagrams)?;
        let mut store = open_store(Path::new("."), &config.output_resolved);

        let options = PublishOptions {
            update_attachments: self.update_attachments,
            update_page: self.update_page,
            dry_run: self.dry_run,
            depth,
            include_dirs: diagrams.include_dirs.clone(),
            dpi: diagrams.dpi,
        };
        let results =
            UmlPublisher::new(&client, &*renderer, &mut store, options).publish(&root)?;

        print_results(output, &results, self.dry_run);
        Ok(())
    }

    fn cli_settings(&self) -> Result<CliSettings, CliError> {
        Ok(CliSettings {
            server: self.server.clone(),
            credentials: self.user.as_deref().map(Credentials::parse).transpose()?,
            attachments_dir: self.attachments.clone(),
            cache_enabled: cache_override(self.caching, self.no_caching),
            ..Default::default()
        })
    }
}

fn print_results(output: &Output, results: &[PublishResult], dry_run: bool) {
    if dry_run {
        output.highlight("\n[DRY RUN] No changes made.");
    }

    for result in results {
        if result.diagrams.is_empty() {
            continue;
        }
        output.info(&format!(
            "\n{} ({}): {} diagram(s)",
            result.title,
            result.page_id,
            result.diagrams.len()
        ));
        for name in &result.uploaded {
            output.info(&format!("  -> {name}"));
        }
        if result.page_updated {
            output.success("  Page updated");
        }
    }

    let diagrams: usize = results.iter().map(|r| r.diagrams.len()).sum();
    let uploaded: usize = results.iter().map(|r| r.uploaded.len()).sum();
    let updated = results.iter().filter(|r| r.page_updated).count();
    output.success(&format!(
        "\nProcessed {} page(s): {diagrams} diagram(s), {uploaded} upload(s), {updated} page update(s)",
        results.len()
    ));
}
