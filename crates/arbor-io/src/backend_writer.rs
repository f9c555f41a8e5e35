use std::sync::Arc;

use arbor_backend::{Backend, BackendResult};
use arbor_schema::resource::{root_class, CONTENTS};
use arbor_types::{ContainerDescriptor, Id, RawValue, SingleFeatureKey};
use tracing::debug;

use crate::error::PipelineResult;
use crate::event::Element;
use crate::pool::WorkerPool;
use crate::writer::{Batch, BatchValues, Sink};

/// Writes the event stream into a backend.
///
/// Each object's metaclass is recorded when it starts. Roots are appended
/// to the resource root's `contents`. A containment batch first records
/// the container of every child, then appends the children to the owner,
/// in the same job.
pub struct BackendWriter {
    backend: Arc<dyn Backend>,
    pool: Option<WorkerPool>,
    roots: SingleFeatureKey,
}

impl BackendWriter {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            pool: None,
            roots: SingleFeatureKey::new(Id::ROOT, CONTENTS),
        }
    }

    /// Dispatch batch writes to `threads` workers.
    pub fn with_workers(mut self, threads: usize) -> PipelineResult<Self> {
        self.pool = Some(WorkerPool::new(threads)?);
        Ok(self)
    }

    fn run(
        &self,
        key: &SingleFeatureKey,
        job: impl FnOnce(&dyn Backend) -> BackendResult<()> + Send + 'static,
    ) -> PipelineResult<()> {
        match &self.pool {
            Some(pool) => {
                let backend = Arc::clone(&self.backend);
                pool.submit(
                    key,
                    Box::new(move || -> PipelineResult<()> {
                        job(backend.as_ref())?;
                        Ok(())
                    }),
                )
            }
            None => Ok(job(self.backend.as_ref())?),
        }
    }
}

impl Sink for BackendWriter {
    fn start_element(&mut self, element: &Element) -> PipelineResult<()> {
        self.backend.metaclass_for(element.id, &element.class)?;
        if element.is_root {
            self.backend.metaclass_for(Id::ROOT, &root_class())?;
            let id = element.id;
            let roots = self.roots.clone();
            self.run(&self.roots, move |backend| {
                backend.container_for(id, ContainerDescriptor::from(roots.clone()))?;
                backend.append_value(&roots, RawValue::Reference(id))?;
                Ok(())
            })?;
        }
        Ok(())
    }

    fn write(&mut self, batch: Batch) -> PipelineResult<()> {
        let key = SingleFeatureKey::new(batch.owner, batch.feature);
        let (values, containers) = match batch.values {
            BatchValues::Literals(literals) => (literals.into_iter().map(RawValue::Literal).collect::<Vec<_>>(), None),
            BatchValues::References { containment, targets } => {
                let containers = containment.then(|| targets.clone());
                (targets.into_iter().map(RawValue::Reference).collect(), containers)
            }
        };
        let many = batch.many;
        let job_key = key.clone();
        self.run(&job_key, move |backend| {
            for child in containers.into_iter().flatten() {
                backend.container_for(child, ContainerDescriptor::from(key.clone()))?;
            }
            if many {
                backend.append_all_values(&key, values)?;
            } else if let Some(value) = values.into_iter().last() {
                backend.value_for(&key, value)?;
            }
            Ok(())
        })
    }

    fn end_element(&mut self, _id: Id) -> PipelineResult<()> {
        Ok(())
    }

    fn complete(&mut self) -> PipelineResult<()> {
        if let Some(pool) = self.pool.take() {
            pool.finish()?;
        }
        self.backend.save()?;
        debug!(backend = %self.backend.name(), "import complete");
        Ok(())
    }
}
