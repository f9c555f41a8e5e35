//! Wiring of one source, its listeners and its writers into a migration.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use arbor_backend::Backend;
use arbor_schema::SchemaRegistry;
use tracing::{info, warn, Level};

use crate::backend_reader::BackendReader;
use crate::backend_writer::BackendWriter;
use crate::compress::open_input;
use crate::error::PipelineResult;
use crate::handler::{Fanout, Handler};
use crate::listener::{CountingListener, CountingReader, EventCounts, LoggingListener, ProgressListener, TimerListener};
use crate::processor::SchemaProcessor;
use crate::writer::Writer;
use crate::xmi::{XmiOutput, XmiReader, XmiWriter};

/// zstd level used for compressed XMI output.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

enum Source {
    Xmi {
        input: Box<dyn Read>,
        consumed: Arc<AtomicU64>,
        total: Option<u64>,
    },
    Backend(Arc<dyn Backend>),
}

/// Builds and runs a migration.
///
/// ```text
/// Migrator::from_xmi_path(registry, "model.xmi")?
///     .to_backend(backend, 4)?
///     .with_counter(counts)
///     .migrate()?;
/// ```
///
/// Listeners observe every event before the writers receive it. Each
/// writer gets its own accumulator, so several targets can be filled from a
/// single read of the source.
pub struct Migrator {
    registry: Arc<SchemaRegistry>,
    source: Source,
    listeners: Vec<Box<dyn Handler>>,
    writers: Vec<Box<dyn Handler>>,
}

impl Migrator {
    fn with_source(registry: Arc<SchemaRegistry>, source: Source) -> Self {
        Self {
            registry,
            source,
            listeners: Vec::new(),
            writers: Vec::new(),
        }
    }

    /// Read an XMI document, plain or zstd-compressed.
    pub fn from_xmi(registry: Arc<SchemaRegistry>, input: impl Read + 'static) -> Self {
        Self::from_counted(registry, input, None)
    }

    pub fn from_xmi_path(registry: Arc<SchemaRegistry>, path: impl AsRef<Path>) -> PipelineResult<Self> {
        let file = File::open(path.as_ref())?;
        let total = file.metadata()?.len();
        Ok(Self::from_counted(registry, file, Some(total)))
    }

    fn from_counted(registry: Arc<SchemaRegistry>, input: impl Read + 'static, total: Option<u64>) -> Self {
        let input = CountingReader::new(input);
        let consumed = input.consumed();
        Self::with_source(
            registry,
            Source::Xmi {
                input: Box::new(input),
                consumed,
                total,
            },
        )
    }

    /// Read the contents of a backend, from the resource root down.
    pub fn from_backend(registry: Arc<SchemaRegistry>, backend: Arc<dyn Backend>) -> Self {
        Self::with_source(registry, Source::Backend(backend))
    }

    /// Write into a backend; `workers == 0` writes on the reading thread.
    pub fn to_backend(mut self, backend: Arc<dyn Backend>, workers: usize) -> PipelineResult<Self> {
        let mut sink = BackendWriter::new(backend);
        if workers > 0 {
            sink = sink.with_workers(workers)?;
        }
        self.writers.push(Box::new(Writer::new(sink)));
        Ok(self)
    }

    pub fn to_xmi(mut self, output: XmiOutput) -> PipelineResult<Self> {
        let sink = XmiWriter::new(output, Arc::clone(&self.registry))?;
        self.writers.push(Box::new(Writer::new(sink)));
        Ok(self)
    }

    /// Write an XMI file, zstd-compressed when `compress` is set.
    pub fn to_xmi_path(self, path: impl AsRef<Path>, compress: bool) -> PipelineResult<Self> {
        let file = File::create(path.as_ref())?;
        let output = if compress {
            XmiOutput::compressed(BufWriter::new(file), DEFAULT_COMPRESSION_LEVEL)?
        } else {
            XmiOutput::plain(file)
        };
        self.to_xmi(output)
    }

    pub fn with_listener(mut self, listener: impl Handler + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    pub fn with_logger(self, level: Level) -> Self {
        self.with_listener(LoggingListener::new(level))
    }

    pub fn with_counter(self, counts: Arc<EventCounts>) -> Self {
        self.with_listener(CountingListener::new(counts))
    }

    pub fn with_timer(self) -> Self {
        self.with_listener(TimerListener::new())
    }

    /// Log progress through the source; only file sources know their size.
    pub fn with_progress(self) -> Self {
        let listener = match &self.source {
            Source::Xmi {
                consumed,
                total: Some(total),
                ..
            } => ProgressListener::new(Arc::clone(consumed), *total),
            _ => {
                warn!("source size unknown, progress is not reported");
                return self;
            }
        };
        self.with_listener(listener)
    }

    /// Run the migration to completion.
    pub fn migrate(self) -> PipelineResult<()> {
        if self.writers.is_empty() {
            warn!("migration has no writer");
        }
        let mut fanout = Fanout::new();
        for handler in self.listeners.into_iter().chain(self.writers) {
            fanout.push(handler);
        }

        match self.source {
            Source::Xmi { input, .. } => {
                let input = open_input(input)?;
                let mut processor = SchemaProcessor::new(self.registry, fanout);
                XmiReader::new(input).read(&mut processor)?;
            }
            Source::Backend(backend) => {
                BackendReader::new(backend, self.registry).read(&mut fanout)?;
            }
        }
        Ok(())
    }
}

/// Copy every record of `source` into `target`, across mappings or engines.
pub fn copy_backend(source: &dyn Backend, target: &dyn Backend) -> PipelineResult<()> {
    source.copy_to(target)?;
    target.save()?;
    info!(from = %source.name(), to = %target.name(), "backend copied");
    Ok(())
}

/// Helper for writing to an in-memory buffer that stays readable afterwards.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<parking_lot::Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
