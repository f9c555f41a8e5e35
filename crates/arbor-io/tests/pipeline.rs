mod common;

use std::sync::Arc;

use arbor_backend::{Backend, ManyMapping, MappedBackend, MemoryEngine, TransientBackend};
use arbor_io::{
    copy_backend, Batch, Element, EventCounts, Migrator, PipelineError, PipelineResult, SchemaProcessor,
    SharedBuffer, Sink, Writer, XmiOutput, XmiReader,
};
use arbor_schema::resource::CONTENTS;
use arbor_types::{ContainerDescriptor, Id, RawValue, SingleFeatureKey};
use common::{backends, registry, sorted_records, DOCUMENT};

fn import(document: &str, backend: Arc<dyn Backend>) -> PipelineResult<()> {
    Migrator::from_xmi(registry(), std::io::Cursor::new(document.to_string()))
        .to_backend(backend, 0)?
        .migrate()
}

fn export(backend: Arc<dyn Backend>, compress: bool) -> Vec<u8> {
    let buffer = SharedBuffer::new();
    let output = if compress {
        XmiOutput::compressed(buffer.clone(), 3).unwrap()
    } else {
        XmiOutput::plain(buffer.clone())
    };
    Migrator::from_backend(registry(), backend)
        .to_xmi(output)
        .unwrap()
        .migrate()
        .unwrap();
    buffer.contents()
}

// -----------------------------------------------------------------------
// Batching
// -----------------------------------------------------------------------

/// Counts what a writer hands over.
#[derive(Default)]
struct Spy {
    batches: Vec<(String, usize)>,
}

impl Sink for Spy {
    fn start_element(&mut self, _element: &Element) -> PipelineResult<()> {
        Ok(())
    }

    fn write(&mut self, batch: Batch) -> PipelineResult<()> {
        self.batches.push((batch.feature, batch.values.len()));
        Ok(())
    }

    fn end_element(&mut self, _id: Id) -> PipelineResult<()> {
        Ok(())
    }

    fn complete(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

#[test]
fn hundred_values_reach_the_sink_as_one_batch() {
    let items: String = (0..100).map(|i| format!("<tags>item{i}</tags>")).collect();
    let document = format!(r#"<tree:Folder xmlns:tree="urn:test:tree" xmlns:xmi="http://www.omg.org/XMI" xmi:id="f">{items}</tree:Folder>"#);

    let mut processor = SchemaProcessor::new(registry(), Writer::new(Spy::default()));
    XmiReader::new(document.as_bytes()).read(&mut processor).unwrap();
    let spy = processor.into_inner().into_sink();

    assert_eq!(spy.batches, vec![("tags".to_string(), 100)]);
}

// -----------------------------------------------------------------------
// Import
// -----------------------------------------------------------------------

#[test]
fn import_links_roots_and_containers() {
    for backend in backends() {
        import(DOCUMENT, Arc::clone(&backend)).unwrap();

        let roots = backend
            .all_values_of(&SingleFeatureKey::new(Id::ROOT, CONTENTS))
            .unwrap();
        assert_eq!(
            roots,
            vec![RawValue::Reference(Id::from_raw("root")), RawValue::Reference(Id::from_raw("loose"))]
        );

        let children = backend
            .all_values_of(&SingleFeatureKey::new(Id::from_raw("root"), "children"))
            .unwrap();
        assert_eq!(
            children,
            vec![RawValue::Reference(Id::from_raw("readme")), RawValue::Reference(Id::from_raw("pics"))]
        );
        assert_eq!(
            backend.container_of(Id::from_raw("photo")).unwrap(),
            Some(ContainerDescriptor::new(Id::from_raw("pics"), "children"))
        );
        assert_eq!(
            backend.container_of(Id::from_raw("main")).unwrap(),
            Some(ContainerDescriptor::new(Id::from_raw("root"), "primary"))
        );
        assert_eq!(
            backend.container_of(Id::from_raw("root")).unwrap(),
            Some(ContainerDescriptor::new(Id::ROOT, CONTENTS))
        );
    }
}

#[test]
fn import_keeps_cross_reference_order_and_literals() {
    let backend: Arc<dyn Backend> = Arc::new(TransientBackend::new());
    import(DOCUMENT, Arc::clone(&backend)).unwrap();

    let favorites = backend
        .all_values_of(&SingleFeatureKey::new(Id::from_raw("root"), "favorites"))
        .unwrap();
    assert_eq!(
        favorites,
        vec![RawValue::Reference(Id::from_raw("readme")), RawValue::Reference(Id::from_raw("photo"))]
    );
    assert_eq!(
        backend
            .value_of(&SingleFeatureKey::new(Id::from_raw("readme"), "size"))
            .unwrap(),
        Some(RawValue::Literal("120".into()))
    );
    assert_eq!(
        backend
            .all_values_of(&SingleFeatureKey::new(Id::from_raw("pics"), "tags"))
            .unwrap(),
        vec![RawValue::Literal("images".into()), RawValue::Literal("shared".into())]
    );
}

#[test]
fn unknown_features_and_bad_values_are_skipped() {
    let document = r#"<tree:Folder xmlns:tree="urn:test:tree" xmlns:xmi="http://www.omg.org/XMI"
            xmi:id="f" name="f" colour="blue">
        <attachments><anything name="x"/></attachments>
        <children xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                  xsi:type="tree:File" xmi:id="a" size="large" kind="TEXT"/>
    </tree:Folder>"#;
    let backend: Arc<dyn Backend> = Arc::new(TransientBackend::new());
    import(document, Arc::clone(&backend)).unwrap();

    let a = Id::from_raw("a");
    assert!(!backend.has_value(&SingleFeatureKey::new(a, "size")).unwrap());
    assert!(backend.has_value(&SingleFeatureKey::new(a, "kind")).unwrap());
    assert!(!backend
        .has_value(&SingleFeatureKey::new(Id::from_raw("f"), "colour"))
        .unwrap());
}

#[test]
fn unclosed_document_fails() {
    let document = r#"<tree:Folder xmlns:tree="urn:test:tree" name="f"><children>"#;
    let backend: Arc<dyn Backend> = Arc::new(TransientBackend::new());
    assert!(matches!(import(document, backend), Err(PipelineError::Malformed(_)) | Err(PipelineError::Xml(_))));
}

#[test]
fn unknown_root_schema_fails() {
    let document = r#"<other:Thing xmlns:other="urn:test:other"/>"#;
    let backend: Arc<dyn Backend> = Arc::new(TransientBackend::new());
    assert!(matches!(import(document, backend), Err(PipelineError::Schema(_))));
}

#[test]
fn workers_write_the_same_records_as_inline_import() {
    let inline: Arc<dyn Backend> = Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Lists));
    import(DOCUMENT, Arc::clone(&inline)).unwrap();

    let parallel: Arc<dyn Backend> = Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Lists));
    Migrator::from_xmi(registry(), std::io::Cursor::new(DOCUMENT))
        .to_backend(Arc::clone(&parallel), 4)
        .unwrap()
        .migrate()
        .unwrap();

    assert_eq!(sorted_records(inline.as_ref()), sorted_records(parallel.as_ref()));
}

// -----------------------------------------------------------------------
// Export and migration
// -----------------------------------------------------------------------

#[test]
fn xmi_round_trip_preserves_records() {
    for compress in [false, true] {
        let first: Arc<dyn Backend> = Arc::new(TransientBackend::new());
        import(DOCUMENT, Arc::clone(&first)).unwrap();

        let bytes = export(Arc::clone(&first), compress);
        assert_eq!(arbor_io::is_compressed(&bytes), compress);

        let second: Arc<dyn Backend> = Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Arrays));
        Migrator::from_xmi(registry(), std::io::Cursor::new(bytes))
            .to_backend(Arc::clone(&second), 0)
            .unwrap()
            .migrate()
            .unwrap();

        assert_eq!(sorted_records(first.as_ref()), sorted_records(second.as_ref()));
    }
}

#[test]
fn one_read_fills_several_targets() {
    let a: Arc<dyn Backend> = Arc::new(TransientBackend::new());
    let b: Arc<dyn Backend> = Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Indices));
    let buffer = SharedBuffer::new();
    let counts = Arc::new(EventCounts::default());

    Migrator::from_xmi(registry(), std::io::Cursor::new(DOCUMENT))
        .with_counter(Arc::clone(&counts))
        .with_timer()
        .to_backend(Arc::clone(&a), 0)
        .unwrap()
        .to_backend(Arc::clone(&b), 2)
        .unwrap()
        .to_xmi(XmiOutput::plain(buffer.clone()))
        .unwrap()
        .migrate()
        .unwrap();

    assert_eq!(sorted_records(a.as_ref()), sorted_records(b.as_ref()));
    assert_eq!(counts.elements(), 6);
    let text = String::from_utf8(buffer.contents()).unwrap();
    assert!(text.contains("tree:Folder"));
    assert!(text.contains("xsi:type=\"tree:File\""));
}

#[test]
fn copy_between_mappings_keeps_records() {
    let source: Arc<dyn Backend> = Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Indices));
    import(DOCUMENT, Arc::clone(&source)).unwrap();

    for mapping in [ManyMapping::Lists, ManyMapping::Arrays] {
        let target = MappedBackend::new(MemoryEngine::new(), mapping);
        copy_backend(source.as_ref(), &target).unwrap();
        assert_eq!(sorted_records(source.as_ref()), sorted_records(&target));
    }
}

#[test]
fn export_to_file_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.xmi.zst");

    let first: Arc<dyn Backend> = Arc::new(TransientBackend::new());
    import(DOCUMENT, Arc::clone(&first)).unwrap();
    Migrator::from_backend(registry(), Arc::clone(&first))
        .to_xmi_path(&path, true)
        .unwrap()
        .migrate()
        .unwrap();

    let second: Arc<dyn Backend> = Arc::new(TransientBackend::new());
    Migrator::from_xmi_path(registry(), &path)
        .unwrap()
        .with_progress()
        .to_backend(Arc::clone(&second), 0)
        .unwrap()
        .migrate()
        .unwrap();

    assert_eq!(sorted_records(first.as_ref()), sorted_records(second.as_ref()));
}
