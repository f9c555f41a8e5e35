//! Batching of multi-valued features in front of a [`Sink`].

use arbor_types::Id;
use tracing::trace;

use crate::error::PipelineResult;
use crate::event::{Attribute, Element, Reference};
use crate::handler::Handler;

/// Values of one feature of one object, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchValues {
    Literals(Vec<String>),
    References { containment: bool, targets: Vec<Id> },
}

impl BatchValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Literals(values) => values.len(),
            Self::References { targets, .. } => targets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_containment(&self) -> bool {
        matches!(self, Self::References { containment: true, .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub owner: Id,
    pub feature: String,
    pub many: bool,
    pub values: BatchValues,
}

impl Batch {
    fn key_matches(&self, owner: Id, feature: &str) -> bool {
        self.owner == owner && self.feature == feature
    }
}

/// The target of a [`Writer`]: receives objects and flushed batches.
pub trait Sink {
    fn start_element(&mut self, element: &Element) -> PipelineResult<()>;

    /// Single-valued features arrive as one-value batches as soon as they
    /// are read; multi-valued ones arrive when their batch is flushed.
    fn write(&mut self, batch: Batch) -> PipelineResult<()>;

    fn end_element(&mut self, id: Id) -> PipelineResult<()>;

    fn complete(&mut self) -> PipelineResult<()>;

    /// Hold every batch until its owner closes.
    fn requires_end_before_flush(&self) -> bool {
        false
    }
}

/// Accumulates multi-valued features and hands them to a sink in batches.
///
/// Consecutive values of the same (owner, feature) pair are buffered. A
/// cross-reference or attribute batch is flushed when a value for another
/// pair arrives, when a new element starts, or when its owner closes.
/// Containment batches are flushed when their owner closes, once all of
/// the children are known. Everything left is flushed at end of stream.
pub struct Writer<S: Sink> {
    sink: S,
    pending: Vec<Batch>,
    /// Pair of the last buffered non-containment value.
    last: Option<(Id, String)>,
}

impl<S: Sink> Writer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: Vec::new(),
            last: None,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn flush_where(&mut self, predicate: impl Fn(&Batch) -> bool) -> PipelineResult<()> {
        let (ready, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending).into_iter().partition(|b| predicate(b));
        self.pending = keep;
        if ready.iter().any(|b| !b.values.is_containment()) {
            self.last = None;
        }
        for batch in ready {
            trace!(owner = %batch.owner, feature = %batch.feature, values = batch.values.len(), "flush");
            self.sink.write(batch)?;
        }
        Ok(())
    }

    fn accumulate(&mut self, owner: Id, feature: &str, value: BatchValues) -> PipelineResult<()> {
        let containment = value.is_containment();
        if !containment && !self.sink.requires_end_before_flush() {
            let switched = self
                .last
                .as_ref()
                .is_some_and(|(o, f)| *o != owner || f != feature);
            if switched {
                self.flush_where(|b| !b.values.is_containment())?;
            }
            self.last = Some((owner, feature.to_string()));
        }

        match self.pending.iter_mut().find(|b| b.key_matches(owner, feature)) {
            Some(batch) => match (&mut batch.values, value) {
                (BatchValues::Literals(all), BatchValues::Literals(more)) => all.extend(more),
                (BatchValues::References { targets, .. }, BatchValues::References { targets: more, .. }) => {
                    targets.extend(more)
                }
                // A feature is either an attribute or a reference; keep the first kind seen.
                _ => {}
            },
            None => self.pending.push(Batch {
                owner,
                feature: feature.to_string(),
                many: true,
                values: value,
            }),
        }
        Ok(())
    }
}

impl<S: Sink> Handler for Writer<S> {
    fn on_start_element(&mut self, element: &Element) -> PipelineResult<()> {
        if !self.sink.requires_end_before_flush() {
            self.flush_where(|b| !b.values.is_containment())?;
        }
        self.sink.start_element(element)
    }

    fn on_attribute(&mut self, attribute: &Attribute) -> PipelineResult<()> {
        let values = BatchValues::Literals(vec![attribute.value.clone()]);
        if attribute.many {
            return self.accumulate(attribute.owner, &attribute.feature, values);
        }
        self.sink.write(Batch {
            owner: attribute.owner,
            feature: attribute.feature.clone(),
            many: false,
            values,
        })
    }

    fn on_reference(&mut self, reference: &Reference) -> PipelineResult<()> {
        let values = BatchValues::References {
            containment: reference.containment,
            targets: vec![reference.target],
        };
        if reference.many {
            return self.accumulate(reference.owner, &reference.feature, values);
        }
        self.sink.write(Batch {
            owner: reference.owner,
            feature: reference.feature.clone(),
            many: false,
            values,
        })
    }

    fn on_end_element(&mut self, id: Id) -> PipelineResult<()> {
        self.flush_where(|b| b.owner == id)?;
        self.sink.end_element(id)
    }

    fn on_complete(&mut self) -> PipelineResult<()> {
        self.flush_where(|_| true)?;
        self.sink.complete()
    }
}
