//! Streaming compilation.
//!
//! A worker thread runs the same walk as [`crate::Compiler::compile`] but writes markup into a
//! channel as it is produced. Styles and scripts are only known once the walk is over, so their
//! channels receive the aggregated fragments at the end. All three channels close when the
//! worker finishes; [`CompilationStream::wait`] reports how it finished.

use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;

use crate::assets::AssetBundle;
use crate::compiler::{CompileJob, RunSummary};
use crate::error::{CompilerError, Result};
use crate::serializer::Rendered;

pub struct CompilationStream {
    pub html: Receiver<String>,
    pub css: Receiver<String>,
    pub js: Receiver<String>,
    worker: JoinHandle<Result<RunSummary>>,
}

/// Everything a stream produced, drained into strings.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamedOutput {
    pub markup: String,
    pub css: Vec<String>,
    pub js: Vec<String>,
    pub summary: RunSummary,
}

fn send_bundle(sender: &mpsc::Sender<String>, bundle: &AssetBundle) {
    for fragment in bundle.all() {
        if sender.send(fragment.clone()).is_err() {
            tracing::warn!("Asset receiver dropped, discarding remaining fragments");
            return;
        }
    }
}

impl CompilationStream {
    pub(crate) fn spawn(job: CompileJob) -> Result<Self> {
        let (html_tx, html) = mpsc::channel();
        let (css_tx, css) = mpsc::channel();
        let (js_tx, js) = mpsc::channel();

        let worker = std::thread::Builder::new()
            .name("weft-stream".to_string())
            .spawn(move || -> Result<RunSummary> {
                let mut out = Rendered::channel(html_tx);
                let summary = job.run(&mut out)?;
                // Markup is complete before any asset is announced
                drop(out);
                send_bundle(&css_tx, &summary.styles);
                send_bundle(&js_tx, &summary.scripts);
                Ok(summary)
            })
            .map_err(|e| CompilerError::io("<stream>", e))?;

        Ok(Self {
            html,
            css,
            js,
            worker,
        })
    }

    /// Block until the worker is done. Channels stay readable afterwards.
    pub fn wait(self) -> Result<(Receivers, RunSummary)> {
        let Self {
            html,
            css,
            js,
            worker,
        } = self;
        let summary = worker.join().map_err(|panic| CompilerError::Worker {
            message: panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string()),
        })??;
        Ok((Receivers { html, css, js }, summary))
    }

    /// Wait for the worker and drain every channel.
    pub fn collect(self) -> Result<StreamedOutput> {
        let (receivers, summary) = self.wait()?;
        Ok(StreamedOutput {
            markup: receivers.html.try_iter().collect(),
            css: receivers.css.try_iter().collect(),
            js: receivers.js.try_iter().collect(),
            summary,
        })
    }
}

/// The three output channels of a finished stream.
pub struct Receivers {
    pub html: Receiver<String>,
    pub css: Receiver<String>,
    pub js: Receiver<String>,
}
