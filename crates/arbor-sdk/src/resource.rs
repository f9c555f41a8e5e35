use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arbor_backend::Backend;
use arbor_schema::resource::{root_class, CONTENTS};
use arbor_schema::{Feature, Value};
use arbor_store::{DirectStore, LoadedObjects, Store, StoreBuilder, StoreError, NO_INDEX};
use arbor_types::{ClassBean, Id, ObjectRef};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{SdkError, SdkResult};
use crate::object::{Binding, PersistentObject};
use crate::options::ResourceOptions;

/// Open/closed flag shared by a resource and the objects bound to it.
pub(crate) struct ResourceState {
    name: String,
    closed: AtomicBool,
}

impl ResourceState {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A set of root objects and everything they contain, stored in one backend.
///
/// The roots are the values of the synthetic root object's `contents`
/// feature. Objects become part of the resource when they are added as a
/// root or contained by an object already in it; their data moves from the
/// transient store into the resource's store at that point.
pub struct Resource {
    context: Arc<Context>,
    state: Arc<ResourceState>,
    store: Arc<dyn Store>,
    loaded: Option<Arc<LoadedObjects>>,
    root: ObjectRef,
    contents: Arc<Feature>,
}

impl Resource {
    /// Open the backend described by `options.backend`.
    pub fn open(context: &Arc<Context>, options: &ResourceOptions) -> SdkResult<Self> {
        let backend = context.backends().open(&options.backend)?;
        Self::with_backend(context, backend, options)
    }

    /// Reopen an existing data directory; its descriptor picks the backend.
    pub fn open_dir(context: &Arc<Context>, dir: impl AsRef<Path>, options: &ResourceOptions) -> SdkResult<Self> {
        let backend = context.backends().open_dir(dir.as_ref())?;
        Self::with_backend(context, backend, options)
    }

    /// An in-memory resource with the default mapping and no decorators.
    pub fn transient(context: &Arc<Context>) -> SdkResult<Self> {
        Self::open(context, &ResourceOptions::default())
    }

    pub fn with_backend(context: &Arc<Context>, backend: Arc<dyn Backend>, options: &ResourceOptions) -> SdkResult<Self> {
        let name = backend.name();
        let base = DirectStore::new(backend, context.schemas());
        let built = StoreBuilder::new(Box::new(base))
            .options(options.store_options()?)
            .cache_capacity(options.cache_capacity)
            .build();

        let root = ObjectRef::new(Id::ROOT, root_class());
        match built.store.update_instance_of(&root) {
            Ok(()) | Err(StoreError::ReadOnly) => {}
            Err(e) => return Err(e.into()),
        }
        let contents = context.schemas().feature(&root_class(), CONTENTS)?;
        info!(backend = %name, options = ?options.options, "resource opened");

        Ok(Self {
            context: Arc::clone(context),
            state: Arc::new(ResourceState {
                name,
                closed: AtomicBool::new(false),
            }),
            store: built.store,
            loaded: built.loaded,
            root,
            contents,
        })
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// The decorated store; objects of this resource go through it.
    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    fn binding(&self) -> SdkResult<Binding> {
        if self.is_closed() {
            return Err(SdkError::Closed);
        }
        Ok(Binding {
            store: Arc::clone(&self.store),
            resource: Some(Arc::clone(&self.state)),
        })
    }

    fn handle(&self, value: Value, binding: &Binding) -> Option<PersistentObject> {
        match value {
            Value::Object(object) => Some(self.context.handle(object, binding)),
            _ => None,
        }
    }

    /// The root objects, in order.
    pub fn contents(&self) -> SdkResult<Vec<PersistentObject>> {
        let binding = self.binding()?;
        let values = self.store.to_vec(&self.root, &self.contents)?;
        Ok(values.into_iter().filter_map(|v| self.handle(v, &binding)).collect())
    }

    pub fn len(&self) -> SdkResult<usize> {
        self.binding()?;
        Ok(self.store.size(&self.root, &self.contents)?)
    }

    pub fn is_empty(&self) -> SdkResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Append `object` to the roots, moving it into this resource first.
    pub fn add_root(&self, object: &PersistentObject) -> SdkResult<()> {
        let binding = self.binding()?;
        let current = self.context.binding_of(object.object_ref(), &binding)?;
        match &current.resource {
            Some(resource) if Arc::ptr_eq(resource, &self.state) => {}
            Some(_) => {
                return Err(SdkError::InvalidOperation(format!(
                    "object {} belongs to another resource",
                    object.id()
                )))
            }
            None => {
                self.context
                    .leave_container(object.object_ref(), current.store.as_ref())?;
                self.context
                    .transfer(object.object_ref(), current.store.as_ref(), &binding)?
            }
        }
        self.store
            .add(&self.root, &self.contents, NO_INDEX, object.to_value())?;
        self.context.forget_container(object.id());
        debug!(id = %object.id(), "root added");
        Ok(())
    }

    /// Remove a root and move it, with its contents, back to the transient store.
    pub fn remove_root(&self, object: &PersistentObject) -> SdkResult<()> {
        self.binding()?;
        let index = self
            .store
            .index_of(&self.root, &self.contents, &object.to_value())?
            .ok_or(SdkError::NotARoot(object.id()))?;
        self.store.remove(&self.root, &self.contents, index)?;
        self.context
            .transfer(object.object_ref(), self.store.as_ref(), &self.context.transient_binding())?;
        debug!(id = %object.id(), "root removed");
        Ok(())
    }

    /// Every object of `class` in this resource; with `strict == false`,
    /// instances of its subclasses too.
    ///
    /// Backends that cannot enumerate instances are answered by walking the
    /// containment tree from the roots.
    pub fn all_instances_of(&self, class: &ClassBean, strict: bool) -> SdkResult<Vec<PersistentObject>> {
        let binding = self.binding()?;
        match self.store.all_instances_of(class, strict) {
            Ok(objects) => Ok(objects
                .into_iter()
                .map(|object| self.context.handle(object, &binding))
                .collect()),
            Err(e) if e.is_unsupported() => {
                debug!(%class, "instance scan unsupported, walking containment");
                self.walk_instances(class, strict, &binding)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn walk_instances(&self, class: &ClassBean, strict: bool, binding: &Binding) -> SdkResult<Vec<PersistentObject>> {
        let schemas = self.context.schemas();
        let matches = |candidate: &ClassBean| {
            if strict {
                candidate == class
            } else {
                schemas.is_super_type_of(class, candidate)
            }
        };

        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<ObjectRef> = self
            .store
            .to_vec(&self.root, &self.contents)?
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(object) => Some(object),
                _ => None,
            })
            .rev()
            .collect();
        while let Some(object) = stack.pop() {
            if !seen.insert(object.id()) {
                continue;
            }
            let info = schemas.class(object.class())?;
            let mut children = Vec::new();
            for feature in info.features().iter().filter(|f| f.is_containment()) {
                for value in self.store.to_vec(&object, feature)? {
                    if let Value::Object(child) = value {
                        children.push(child);
                    }
                }
            }
            stack.extend(children.into_iter().rev());
            if matches(object.class()) {
                found.push(self.context.handle(object, binding));
            }
        }
        Ok(found)
    }

    pub fn save(&self) -> SdkResult<()> {
        self.binding()?;
        self.store.save()?;
        debug!(resource = %self.state.name, "saved");
        Ok(())
    }

    /// Close the store and its backend. Idempotent; objects bound to this
    /// resource fail with [`SdkError::Closed`] afterwards.
    pub fn close(&self) -> SdkResult<()> {
        if self.state.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.store.close()?;
        info!(resource = %self.state.name, "resource closed");
        Ok(())
    }

    /// Distinct objects read so far, when `count-loaded-objects` is on.
    pub fn loaded_objects(&self) -> Option<usize> {
        self.loaded.as_ref().map(|loaded| loaded.count())
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(resource = %self.state.name, error = %e, "close on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_backend::{
        BackendConfig, BackendFactory, BackendRegistry, BackendResult, KvEngine, ManyMapping, MappedBackend,
        MemoryEngine,
    };
    use arbor_store::StoreOption;

    use crate::fixtures::{class, context, file, folder, registry};

    fn text(s: &str) -> Value {
        Value::String(s.into())
    }

    /// An engine without ordered scans.
    struct NoScan(MemoryEngine);

    impl KvEngine for NoScan {
        fn name(&self) -> &'static str {
            "no-scan"
        }

        fn get(&self, key: &[u8]) -> BackendResult<Option<Vec<u8>>> {
            self.0.get(key)
        }

        fn put(&self, key: &[u8], value: &[u8]) -> BackendResult<()> {
            self.0.put(key, value)
        }

        fn delete(&self, key: &[u8]) -> BackendResult<()> {
            self.0.delete(key)
        }

        fn is_persistent(&self) -> bool {
            false
        }
    }

    struct NoScanFactory;

    impl BackendFactory for NoScanFactory {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn create_persistent(&self, config: &BackendConfig) -> BackendResult<Arc<dyn Backend>> {
            Ok(Arc::new(MappedBackend::new(NoScan(MemoryEngine::new()), config.mapping)))
        }
    }

    // -----------------------------------------------------------------------
    // Attachment
    // -----------------------------------------------------------------------

    #[test]
    fn add_root_moves_the_whole_tree() {
        let ctx = context();
        let resource = Resource::transient(&ctx).unwrap();
        let home = folder(&ctx, "home");
        let readme = file(&ctx, "README", 120);
        home.add("children", readme.to_value()).unwrap();
        home.add("tags", text("top")).unwrap();

        resource.add_root(&home).unwrap();

        assert!(home.is_mapped());
        assert!(readme.is_mapped());
        assert_eq!(resource.contents().unwrap(), vec![home.clone()]);
        assert_eq!(home.get("name").unwrap(), Some(text("home")));
        assert_eq!(home.values("tags").unwrap(), vec![text("top")]);
        assert_eq!(readme.get("size").unwrap(), Some(Value::Int(120)));
        assert_eq!(readme.container().unwrap(), Some((home.clone(), "children".to_string())));
        assert!(home.container().unwrap().is_none());

        let transient = ctx.transient_binding().store;
        let name = ctx.schemas().feature(&class("File"), "name").unwrap();
        assert!(!transient.is_set(readme.object_ref(), &name).unwrap());
    }

    #[test]
    fn containing_a_transient_object_attaches_it() {
        let ctx = context();
        let resource = Resource::transient(&ctx).unwrap();
        let home = folder(&ctx, "home");
        resource.add_root(&home).unwrap();

        let main = file(&ctx, "main.rs", 7);
        home.set("primary", main.to_value()).unwrap();

        assert!(main.is_mapped());
        assert_eq!(main.get("size").unwrap(), Some(Value::Int(7)));
        assert_eq!(main.container().unwrap().map(|(_, f)| f), Some("primary".into()));
    }

    #[test]
    fn attaching_a_contained_transient_object_takes_it_out_of_its_parent() {
        let ctx = context();
        let resource = Resource::transient(&ctx).unwrap();
        let home = folder(&ctx, "home");
        resource.add_root(&home).unwrap();
        let scratch = folder(&ctx, "scratch");
        let (draft, notes) = (file(&ctx, "draft", 1), file(&ctx, "notes", 2));
        scratch.add("children", draft.to_value()).unwrap();
        scratch.add("children", notes.to_value()).unwrap();

        home.add("children", draft.to_value()).unwrap();
        resource.add_root(&notes).unwrap();

        assert!(draft.is_mapped());
        assert!(scratch.objects("children").unwrap().is_empty());
        assert_eq!(draft.container().unwrap(), Some((home.clone(), "children".to_string())));
        assert_eq!(resource.contents().unwrap(), vec![home.clone(), notes.clone()]);
    }

    #[test]
    fn moving_within_a_resource_updates_both_parents() {
        let ctx = context();
        let options = ResourceOptions::memory(ManyMapping::Indices)
            .with_option(StoreOption::CacheIsSet)
            .with_option(StoreOption::CacheSize)
            .with_option(StoreOption::CacheFeatures);
        let resource = Resource::open(&ctx, &options).unwrap();
        let (home, pics) = (folder(&ctx, "home"), folder(&ctx, "pics"));
        let photo = file(&ctx, "photo", 3);
        home.add("children", photo.to_value()).unwrap();
        resource.add_root(&home).unwrap();
        resource.add_root(&pics).unwrap();
        assert_eq!(home.len("children").unwrap(), 1);
        assert_eq!(home.get_at("children", 0).unwrap(), Some(photo.to_value()));

        pics.add("children", photo.to_value()).unwrap();

        assert_eq!(home.len("children").unwrap(), 0);
        assert!(home.values("children").unwrap().is_empty());
        assert!(home.get_at("children", 0).is_err());
        assert_eq!(pics.objects("children").unwrap(), vec![photo.clone()]);
        assert_eq!(photo.container().unwrap(), Some((pics.clone(), "children".to_string())));
    }

    #[test]
    fn remove_root_detaches() {
        let ctx = context();
        let resource = Resource::transient(&ctx).unwrap();
        let home = folder(&ctx, "home");
        let readme = file(&ctx, "README", 1);
        home.add("children", readme.to_value()).unwrap();
        resource.add_root(&home).unwrap();

        resource.remove_root(&home).unwrap();

        assert!(!home.is_mapped());
        assert!(!readme.is_mapped());
        assert!(resource.is_empty().unwrap());
        assert_eq!(home.objects("children").unwrap(), vec![readme.clone()]);
        assert_eq!(readme.get("name").unwrap(), Some(text("README")));
        assert!(matches!(resource.remove_root(&home), Err(SdkError::NotARoot(_))));
    }

    #[test]
    fn objects_cannot_move_between_resources() {
        let ctx = context();
        let first = Resource::transient(&ctx).unwrap();
        let second = Resource::transient(&ctx).unwrap();
        let home = folder(&ctx, "home");
        first.add_root(&home).unwrap();
        assert!(matches!(second.add_root(&home), Err(SdkError::InvalidOperation(_))));
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn populate(resource: &Resource, ctx: &Arc<Context>) {
        let home = folder(ctx, "home");
        let pics = folder(ctx, "pics");
        pics.add("children", file(ctx, "photo", 1).to_value()).unwrap();
        home.add("children", file(ctx, "README", 2).to_value()).unwrap();
        home.add("children", pics.to_value()).unwrap();
        resource.add_root(&home).unwrap();
    }

    #[test]
    fn all_instances_by_scan() {
        let ctx = context();
        let resource = Resource::transient(&ctx).unwrap();
        populate(&resource, &ctx);

        assert_eq!(resource.all_instances_of(&class("File"), true).unwrap().len(), 2);
        assert_eq!(resource.all_instances_of(&class("Folder"), true).unwrap().len(), 2);
        assert_eq!(resource.all_instances_of(&class("Node"), false).unwrap().len(), 4);
        assert!(resource.all_instances_of(&class("Node"), true).unwrap().is_empty());
    }

    #[test]
    fn all_instances_falls_back_to_traversal() {
        let backends = BackendRegistry::with_defaults();
        backends.register(Arc::new(NoScanFactory));
        let ctx = Context::with_backends(registry(), Arc::new(backends));
        let resource = Resource::open(&ctx, &ResourceOptions::memory(ManyMapping::Arrays)).unwrap();
        populate(&resource, &ctx);

        let files = resource.all_instances_of(&class("File"), true).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.get("name").unwrap()).collect();
        assert_eq!(names, vec![Some(text("README")), Some(text("photo"))]);
        assert_eq!(resource.all_instances_of(&class("Node"), false).unwrap().len(), 4);
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn close_is_idempotent_and_fences_objects() {
        let ctx = context();
        let resource = Resource::transient(&ctx).unwrap();
        let home = folder(&ctx, "home");
        resource.add_root(&home).unwrap();

        resource.close().unwrap();
        resource.close().unwrap();
        assert!(resource.is_closed());
        assert!(matches!(home.get("name"), Err(SdkError::Closed)));
        assert!(matches!(resource.contents(), Err(SdkError::Closed)));

        let loose = folder(&ctx, "loose");
        assert_eq!(loose.get("name").unwrap(), Some(text("loose")));
    }

    #[test]
    fn counts_loaded_objects() {
        let ctx = context();
        let options = ResourceOptions::default().with_option(StoreOption::CountLoadedObjects);
        let resource = Resource::open(&ctx, &options).unwrap();
        populate(&resource, &ctx);

        let plain = Resource::transient(&ctx).unwrap();
        assert_eq!(plain.loaded_objects(), None);

        let before = resource.loaded_objects().unwrap();
        for root in resource.contents().unwrap() {
            root.get("name").unwrap();
        }
        assert!(resource.loaded_objects().unwrap() > before);
    }

    #[test]
    fn read_only_resource_rejects_attachment() {
        let ctx = context();
        let options = ResourceOptions::default().with_option(StoreOption::ReadOnly);
        let resource = Resource::open(&ctx, &options).unwrap();
        let home = folder(&ctx, "home");
        assert!(matches!(
            resource.add_root(&home),
            Err(SdkError::Store(StoreError::ReadOnly))
        ));
        assert!(resource.is_empty().unwrap());
    }
}
