//! Handlers that observe the event stream without writing anything.

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arbor_types::Id;
use parking_lot::Mutex;
use tracing::{info, Level};

use crate::error::PipelineResult;
use crate::event::{Attribute, Element, Reference};
use crate::handler::Handler;

fn emit(level: Level, message: std::fmt::Arguments<'_>) {
    match level {
        Level::TRACE => tracing::trace!("{message}"),
        Level::DEBUG => tracing::debug!("{message}"),
        Level::INFO => tracing::info!("{message}"),
        Level::WARN => tracing::warn!("{message}"),
        Level::ERROR => tracing::error!("{message}"),
    }
}

/// Logs every event at a fixed level.
pub struct LoggingListener {
    level: Level,
}

impl LoggingListener {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Handler for LoggingListener {
    fn on_initialize(&mut self) -> PipelineResult<()> {
        emit(self.level, format_args!("migration started"));
        Ok(())
    }

    fn on_start_element(&mut self, e: &Element) -> PipelineResult<()> {
        emit(self.level, format_args!("start {} ({}) root={}", e.id, e.class, e.is_root));
        Ok(())
    }

    fn on_attribute(&mut self, a: &Attribute) -> PipelineResult<()> {
        emit(self.level, format_args!("attribute {}.{} = {:?}", a.owner, a.feature, a.value));
        Ok(())
    }

    fn on_reference(&mut self, r: &Reference) -> PipelineResult<()> {
        emit(
            self.level,
            format_args!("reference {}.{} -> {} containment={}", r.owner, r.feature, r.target, r.containment),
        );
        Ok(())
    }

    fn on_end_element(&mut self, id: Id) -> PipelineResult<()> {
        emit(self.level, format_args!("end {id}"));
        Ok(())
    }

    fn on_complete(&mut self) -> PipelineResult<()> {
        emit(self.level, format_args!("migration complete"));
        Ok(())
    }
}

/// Event totals, shared between a [`CountingListener`] and its creator.
#[derive(Debug, Default)]
pub struct EventCounts {
    elements: AtomicUsize,
    attributes: AtomicUsize,
    references: AtomicUsize,
}

impl EventCounts {
    pub fn elements(&self) -> usize {
        self.elements.load(Ordering::Relaxed)
    }

    pub fn attributes(&self) -> usize {
        self.attributes.load(Ordering::Relaxed)
    }

    pub fn references(&self) -> usize {
        self.references.load(Ordering::Relaxed)
    }
}

/// Counts elements, attribute values and references.
pub struct CountingListener {
    counts: Arc<EventCounts>,
}

impl CountingListener {
    pub fn new(counts: Arc<EventCounts>) -> Self {
        Self { counts }
    }
}

impl Handler for CountingListener {
    fn on_start_element(&mut self, _: &Element) -> PipelineResult<()> {
        self.counts.elements.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_attribute(&mut self, _: &Attribute) -> PipelineResult<()> {
        self.counts.attributes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_reference(&mut self, _: &Reference) -> PipelineResult<()> {
        self.counts.references.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_complete(&mut self) -> PipelineResult<()> {
        info!(
            elements = self.counts.elements(),
            attributes = self.counts.attributes(),
            references = self.counts.references(),
            "events processed"
        );
        Ok(())
    }
}

/// Measures the time from initialization to completion.
#[derive(Default)]
pub struct TimerListener {
    started: Option<Instant>,
    elapsed: Arc<Mutex<Option<Duration>>>,
}

impl TimerListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filled in when the migration completes.
    pub fn elapsed(&self) -> Arc<Mutex<Option<Duration>>> {
        Arc::clone(&self.elapsed)
    }
}

impl Handler for TimerListener {
    fn on_initialize(&mut self) -> PipelineResult<()> {
        self.started = Some(Instant::now());
        Ok(())
    }

    fn on_complete(&mut self) -> PipelineResult<()> {
        if let Some(started) = self.started {
            let elapsed = started.elapsed();
            *self.elapsed.lock() = Some(elapsed);
            info!(elapsed_ms = elapsed.as_millis() as u64, "migration finished");
        }
        Ok(())
    }
}

/// Wraps a source and counts the bytes read from it.
pub struct CountingReader<R> {
    inner: R,
    consumed: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            consumed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn consumed(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.consumed)
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Logs how much of the source has been consumed, in 10% steps.
pub struct ProgressListener {
    consumed: Arc<AtomicU64>,
    total: u64,
    reported: u64,
}

impl ProgressListener {
    pub fn new(consumed: Arc<AtomicU64>, total: u64) -> Self {
        Self {
            consumed,
            total,
            reported: 0,
        }
    }

    fn percent(&self) -> u64 {
        if self.total == 0 {
            return 100;
        }
        (self.consumed.load(Ordering::Relaxed).saturating_mul(100) / self.total).min(100)
    }

    fn report(&mut self) {
        let step = self.percent() / 10 * 10;
        if step > self.reported {
            self.reported = step;
            info!(progress = step, "{step}% of source read");
        }
    }

    /// Last step logged.
    pub fn reported(&self) -> u64 {
        self.reported
    }
}

impl Handler for ProgressListener {
    fn on_start_element(&mut self, _: &Element) -> PipelineResult<()> {
        self.report();
        Ok(())
    }

    fn on_complete(&mut self) -> PipelineResult<()> {
        self.report();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::ClassBean;

    fn element() -> Element {
        Element {
            id: Id::generate(),
            class: ClassBean::new("A", "urn:a"),
            is_root: true,
            feature: None,
        }
    }

    #[test]
    fn counting_listener_counts() {
        let counts = Arc::new(EventCounts::default());
        let mut listener = CountingListener::new(Arc::clone(&counts));
        listener.on_start_element(&element()).unwrap();
        listener
            .on_attribute(&Attribute {
                owner: Id::ROOT,
                feature: "f".into(),
                many: false,
                value: "v".into(),
            })
            .unwrap();
        assert_eq!((counts.elements(), counts.attributes(), counts.references()), (1, 1, 0));
    }

    #[test]
    fn progress_reports_in_steps() {
        let mut reader = CountingReader::new(&[0u8; 100][..]);
        let mut listener = ProgressListener::new(reader.consumed(), 100);
        let mut chunk = [0u8; 35];
        reader.read_exact(&mut chunk).unwrap();
        listener.on_start_element(&element()).unwrap();
        assert_eq!(listener.reported(), 30);
        reader.read_to_end(&mut Vec::new()).unwrap();
        listener.on_complete().unwrap();
        assert_eq!(listener.reported(), 100);
    }

    #[test]
    fn timer_records_elapsed() {
        let mut timer = TimerListener::new();
        let elapsed = timer.elapsed();
        timer.on_initialize().unwrap();
        timer.on_complete().unwrap();
        assert!(elapsed.lock().is_some());
    }
}
