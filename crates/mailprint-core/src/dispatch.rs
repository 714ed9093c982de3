//! Print dispatcher.
//!
//! Runs once per cycle over every artifact, in insertion order:
//!
//! - a `.txt` body whose message also produced an `.html` body is not
//!   printed
//! - empty files are not printed
//! - `.html` is rendered to a `.pdf` sibling and the PDF is printed
//! - everything else is printed as is
//!
//! Every file is removed afterwards, printed or not. Converter, printer and
//! removal failures are logged and never stop the loop.

use std::ffi::OsStr;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::artifact::{ArtifactKind, ArtifactSet};
use crate::settings::Settings;
use crate::{Error, Result};

/// External converter and printer.
pub trait Spooler: Send + Sync {
    /// Renders `html` to `pdf`.
    fn render_pdf(&self, html: &Path, pdf: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Sends `path` to the printer.
    fn print(&self, path: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// Outcome counts of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Files handed to the printer successfully.
    pub printed: usize,
    /// Files deliberately not printed (HTML sibling exists, or empty).
    pub skipped: usize,
    /// Files whose conversion or printing failed.
    pub failed: usize,
}

/// Prints and removes every artifact, then clears the set.
pub async fn dispatch_all<P: Spooler>(spooler: &P, artifacts: &mut ArtifactSet) -> DispatchReport {
    let mut report = DispatchReport::default();

    for artifact in artifacts.iter() {
        let path = &artifact.path;

        if artifact.kind == ArtifactKind::Text && artifacts.contains(&path.with_extension("html"))
        {
            tracing::debug!(path = %path.display(), "HTML body present, not printing text body");
            report.skipped += 1;
            remove_artifact(path).await;
            continue;
        }

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() == 0 => {
                tracing::debug!(path = %path.display(), "Empty artifact, not printing");
                report.skipped += 1;
                remove_artifact(path).await;
                continue;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Cannot stat artifact");
                report.failed += 1;
                remove_artifact(path).await;
                continue;
            }
        }

        let target = if artifact.kind == ArtifactKind::Html {
            let pdf = path.with_extension("pdf");
            let rendered = spooler.render_pdf(path, &pdf).await;
            remove_artifact(path).await;
            if let Err(err) = rendered {
                tracing::error!(path = %path.display(), error = %err, "Converting to PDF failed");
                report.failed += 1;
                remove_artifact(&pdf).await;
                continue;
            }
            pdf
        } else {
            path.clone()
        };

        match spooler.print(&target).await {
            Ok(()) => {
                tracing::info!(path = %target.display(), seq = %artifact.message, "Printed");
                report.printed += 1;
            }
            Err(err) => {
                tracing::error!(path = %target.display(), error = %err, "Printing failed");
                report.failed += 1;
            }
        }
        remove_artifact(&target).await;
    }

    artifacts.clear();
    report
}

/// Deletes an artifact file, logging instead of failing.
pub async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::trace!(path = %path.display(), "Removed artifact"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "Cannot remove artifact"),
    }
}

/// Runs the configured converter and printer as child processes.
#[derive(Debug, Clone)]
pub struct CommandSpooler {
    converter: PathBuf,
    printer: PathBuf,
}

impl CommandSpooler {
    /// Uses the given executables as they are.
    #[must_use]
    pub fn new(converter: impl Into<PathBuf>, printer: impl Into<PathBuf>) -> Self {
        Self {
            converter: converter.into(),
            printer: printer.into(),
        }
    }

    /// Resolves the configured converter and printer on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTool`] for the first one that cannot be found.
    pub fn locate(settings: &Settings) -> Result<Self> {
        let converter = find_program(&settings.converter)
            .ok_or_else(|| Error::MissingTool(settings.converter.clone()))?;
        let printer = find_program(&settings.printer)
            .ok_or_else(|| Error::MissingTool(settings.printer.clone()))?;

        tracing::debug!(
            converter = %converter.display(),
            printer = %printer.display(),
            "Located external programs"
        );
        Ok(Self::new(converter, printer))
    }
}

impl Spooler for CommandSpooler {
    async fn render_pdf(&self, html: &Path, pdf: &Path) -> Result<()> {
        run(&self.converter, &[html.as_os_str(), pdf.as_os_str()]).await
    }

    async fn print(&self, path: &Path) -> Result<()> {
        run(&self.printer, &[path.as_os_str()]).await
    }
}

/// Looks a program up the way a shell would. A name containing a path
/// separator is checked as given.
#[must_use]
pub fn find_program(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

async fn run(program: &Path, args: &[&OsStr]) -> Result<()> {
    let fail = |reason: String| Error::Command {
        program: program.display().to_string(),
        reason,
    };

    tracing::debug!(program = %program.display(), ?args, "Running");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| fail(err.to_string()))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(fail(format!("{}: {}", output.status, stderr.trim())))
    }
}
