use metis_core::db::open_db_in_memory;
use metis_core::{
    ContentError, DocumentKey, DocumentTreeBuilder, MemoryDocumentService, ProjectContent,
    ProjectService, ServiceError, SqliteProjectRepository, SqliteTemplateRepository,
    TemplateRepository,
};

const OWNER: &str = "KR18401";

const CONV_TEMPLATE: &str = r#"{
    "id": "template-project",
    "name": "template name",
    "networks": {
        "n1": {
            "id": "n1",
            "name": "Main",
            "dependencies": {"thirdPartyDeps": {
                "d1": {"id": "d1", "name": "torch"}
            }},
            "blocks": {
                "b_in": {"id": "b_in", "name": "in", "type": "In",
                    "position": {"x": 100, "y": 100}, "initVariables": "x = 1"},
                "b_conv": {"id": "b_conv", "name": "conv", "type": "Conv2d",
                    "position": {"x": 100, "y": 150}, "repeats": 2,
                    "parameters": {"in_channels": 3, "bias": true, "padding_mode": "zeros"}},
                "b_out": {"id": "b_out", "name": "out", "type": "Out",
                    "position": {"x": 100, "y": 200}}
            },
            "links": {
                "l1": {"id": "l1", "from": "b_in", "to": "b_conv"},
                "l2": {"id": "l2", "from": "b_conv", "to": "b_out"}
            }
        }
    }
}"#;

const FLOAT_TEMPLATE: &str = r#"{
    "id": "t", "name": "t",
    "networks": {"n1": {"id": "n1", "name": "Main",
        "dependencies": {"thirdPartyDeps": {}},
        "blocks": {"b1": {"id": "b1", "name": "drop", "type": "Conv2d",
            "position": {"x": 0, "y": 0}, "repeats": 1,
            "parameters": {"p": 0.5}}},
        "links": {}}}
}"#;

const MISKEYED_TEMPLATE: &str = r#"{
    "id": "t", "name": "t",
    "networks": {"n1": {"id": "OTHER", "name": "Main",
        "dependencies": {"thirdPartyDeps": {"d1": {"id": "d2", "name": "torch"}}},
        "blocks": {"b1": {"id": "b2", "name": "out", "type": "Out",
            "position": {"x": 0, "y": 0}}},
        "links": {"l1": {"id": "l9", "from": "b1", "to": "b1"}}}}
}"#;

#[test]
fn template_contents_are_validated_on_store() {
    let conn = open_db_in_memory().unwrap();
    let docs = MemoryDocumentService::new();
    let service = ProjectService::new(
        SqliteProjectRepository::try_new(&conn).unwrap(),
        SqliteTemplateRepository::try_new(&conn).unwrap(),
        DocumentTreeBuilder::new(&docs, "projects", "metis-server"),
    );

    let err = service
        .create_template(OWNER, "float", FLOAT_TEMPLATE)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Content(ContentError::Json(_))));
    assert!(err.to_string().contains("unsupported parameter `p` of type float"));

    let template = service.create_template(OWNER, "conv", CONV_TEMPLATE).unwrap();
    let loaded = service
        .find_template(OWNER, &template.id.to_string())
        .unwrap();
    assert_eq!(loaded.contents, CONV_TEMPLATE);
    assert_eq!(loaded.name, "conv");

    assert!(matches!(
        service.find_template("KR18817", &template.id.to_string()),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn project_from_template_copies_tree_with_new_identity() {
    let conn = open_db_in_memory().unwrap();
    let docs = MemoryDocumentService::new();
    let service = ProjectService::new(
        SqliteProjectRepository::try_new(&conn).unwrap(),
        SqliteTemplateRepository::try_new(&conn).unwrap(),
        DocumentTreeBuilder::new(&docs, "projects", "metis-server"),
    );
    let template = service.create_template(OWNER, "conv", CONV_TEMPLATE).unwrap();

    let project = service
        .create_project_from_template(OWNER, "from template", &template.id.to_string())
        .unwrap();
    let project_id = project.id.to_string();

    let root = docs
        .snapshot(&DocumentKey::new("projects", project_id.as_str()))
        .unwrap();
    let node = root.object("project").unwrap();
    assert_eq!(node.string("id"), Some(project_id.as_str()));
    assert_eq!(node.string("name"), Some("from template"));

    let network = node.object("networks").and_then(|n| n.object("n1")).unwrap();
    let conv = network
        .object("blocks")
        .and_then(|b| b.object("b_conv"))
        .unwrap();
    assert_eq!(conv.string("type"), Some("Conv2d"));
    assert_eq!(conv.integer("repeats"), Some(2));
    let parameters = conv.object("parameters").unwrap();
    assert_eq!(parameters.integer("in_channels"), Some(3));
    assert_eq!(parameters.bool("bias"), Some(true));
    assert_eq!(parameters.string("padding_mode"), Some("zeros"));

    let input = network
        .object("blocks")
        .and_then(|b| b.object("b_in"))
        .unwrap();
    assert_eq!(input.string("initVariables"), Some("x = 1"));
    assert_eq!(network.object("links").unwrap().len(), 2);
}

#[test]
fn bad_template_is_rejected_before_any_write() {
    let conn = open_db_in_memory().unwrap();
    let docs = MemoryDocumentService::new();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    // Bypasses validation on store.
    let stored = templates
        .create_template(OWNER, "float", FLOAT_TEMPLATE)
        .unwrap();
    let service = ProjectService::new(
        SqliteProjectRepository::try_new(&conn).unwrap(),
        &templates,
        DocumentTreeBuilder::new(&docs, "projects", "metis-server"),
    );

    let err = service
        .create_project_from_template(OWNER, "never", &stored.id.to_string())
        .unwrap_err();

    assert!(matches!(err, ServiceError::Content(_)));
    assert!(service.list_projects(OWNER).unwrap().is_empty());
    assert_eq!(docs.document_count(), 0);
    assert_eq!(docs.open_sessions(), 0);
}

#[test]
fn collections_keyed_by_foreign_ids_are_rejected_before_any_write() {
    let conn = open_db_in_memory().unwrap();
    let docs = MemoryDocumentService::new();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let stored = templates
        .create_template(OWNER, "miskeyed", MISKEYED_TEMPLATE)
        .unwrap();
    let service = ProjectService::new(
        SqliteProjectRepository::try_new(&conn).unwrap(),
        &templates,
        DocumentTreeBuilder::new(&docs, "projects", "metis-server"),
    );

    let err = service
        .create_template(OWNER, "miskeyed", MISKEYED_TEMPLATE)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Content(ContentError::KeyMismatch { .. })
    ));

    let err = service
        .create_project_from_template(OWNER, "never", &stored.id.to_string())
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Content(ContentError::KeyMismatch { .. })
    ));
    assert!(service.list_projects(OWNER).unwrap().is_empty());
    assert_eq!(docs.document_count(), 0);
    assert_eq!(docs.open_sessions(), 0);
}

#[test]
fn unknown_or_malformed_template_id_creates_nothing() {
    let conn = open_db_in_memory().unwrap();
    let docs = MemoryDocumentService::new();
    let service = ProjectService::new(
        SqliteProjectRepository::try_new(&conn).unwrap(),
        SqliteTemplateRepository::try_new(&conn).unwrap(),
        DocumentTreeBuilder::new(&docs, "projects", "metis-server"),
    );

    assert!(matches!(
        service.create_project_from_template(OWNER, "x", "invalid-id"),
        Err(ServiceError::InvalidId(_))
    ));
    assert!(matches!(
        service.create_project_from_template(OWNER, "x", "00000000000000000000000000000000"),
        Err(ServiceError::NotFound(_))
    ));
    assert!(service.list_projects(OWNER).unwrap().is_empty());
    assert_eq!(docs.document_count(), 0);
}

#[test]
fn stored_tree_survives_json_round_trip() {
    let content = ProjectContent::from_json(CONV_TEMPLATE).unwrap();
    let reparsed = ProjectContent::from_json(&content.to_json().unwrap()).unwrap();
    assert_eq!(reparsed, content);
}
