//! Writes a project's content tree into its collaborative document.
//!
//! # Responsibility
//! - Run the open → attach → update → detach → close sequence for one
//!   project document.
//! - Translate [`ProjectContent`] into the document key/value layout.
//!
//! # Invariants
//! - The whole tree is written inside one update callback, so readers see all
//!   of it or none of it.
//! - The session is closed on every exit path; a failed attach is never
//!   followed by a detach.
//! - Detach or close failures after a committed update are logged, not
//!   returned.

use crate::document::{DocObject, DocResult, DocumentKey, DocumentService, DocumentSession};
use crate::model::content::{Block, BlockKind, Network, ParameterValue, Parameters, ProjectContent};
use log::{info, warn};
use std::time::Instant;

/// Materializes content trees under one document collection.
pub struct DocumentTreeBuilder<D: DocumentService> {
    service: D,
    collection: String,
    token: String,
}

impl<D: DocumentService> DocumentTreeBuilder<D> {
    /// `token` authenticates the builder's own sessions.
    pub fn new(service: D, collection: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            service,
            collection: collection.into(),
            token: token.into(),
        }
    }

    pub fn service(&self) -> &D {
        &self.service
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Document key of the project with textual id `project_id`.
    pub fn document_key(&self, project_id: &str) -> DocumentKey {
        DocumentKey::new(self.collection.as_str(), project_id)
    }

    /// Commits `content` as the state of document `(collection, content.id)`.
    pub fn materialize(&self, content: &ProjectContent) -> DocResult<()> {
        let started_at = Instant::now();
        let key = self.document_key(&content.id);

        let mut session = self.service.open_session(&self.token)?;
        let result = write_document(session.as_mut(), &key, content);
        if let Err(err) = session.close() {
            warn!(
                "event=doc_materialize module=document status=warn stage=close key={} error={}",
                key, err
            );
        }

        match &result {
            Ok(()) => info!(
                "event=doc_materialize module=document status=ok key={} duration_ms={}",
                key,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=doc_materialize module=document status=error key={} duration_ms={} error={}",
                key,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

fn write_document(
    session: &mut dyn DocumentSession,
    key: &DocumentKey,
    content: &ProjectContent,
) -> DocResult<()> {
    session.attach(key)?;

    let result = session.update(key, &mut |root| {
        write_project(root, content);
        Ok(())
    });

    match (&result, session.detach(key)) {
        (_, Ok(())) => {}
        (Ok(()), Err(err)) => warn!(
            "event=doc_detach module=document status=warn key={} committed=true error={}",
            key, err
        ),
        (Err(_), Err(err)) => warn!(
            "event=doc_detach module=document status=warn key={} committed=false error={}",
            key, err
        ),
    }
    result
}

/// Writes the `project` subtree under `root`.
pub fn write_project(root: &mut DocObject, content: &ProjectContent) {
    let mut project = DocObject::new();
    project.set_string("id", content.id.as_str());
    project.set_string("name", content.name.as_str());

    let mut networks = DocObject::new();
    for (network_id, network) in &content.networks {
        networks.set_object(network_id, network_object(network));
    }
    project.set_object("networks", networks);
    root.set_object("project", project);
}

fn network_object(network: &Network) -> DocObject {
    let mut target = DocObject::new();
    target.set_string("id", network.id.as_str());
    target.set_string("name", network.name.as_str());

    let mut third_party_deps = DocObject::new();
    for (dependency_id, dependency) in &network.dependencies.third_party_deps {
        let mut entry = DocObject::new();
        entry.set_string("id", dependency.id.as_str());
        entry.set_string("name", dependency.name.as_str());
        if let Some(alias) = dependency.alias.as_deref().filter(|alias| !alias.is_empty()) {
            entry.set_string("alias", alias);
        }
        if let Some(package) = dependency.package.as_deref().filter(|p| !p.is_empty()) {
            entry.set_string("package", package);
        }
        third_party_deps.set_object(dependency_id, entry);
    }
    let mut dependencies = DocObject::new();
    dependencies.set_object("thirdPartyDeps", third_party_deps);
    target.set_object("dependencies", dependencies);

    let mut blocks = DocObject::new();
    for (block_id, block) in &network.blocks {
        blocks.set_object(block_id, block_object(block));
    }
    target.set_object("blocks", blocks);

    let mut links = DocObject::new();
    for (link_id, link) in &network.links {
        let mut entry = DocObject::new();
        entry.set_string("id", link.id.as_str());
        entry.set_string("from", link.from.as_str());
        entry.set_string("to", link.to.as_str());
        links.set_object(link_id, entry);
    }
    target.set_object("links", links);
    target
}

fn block_object(block: &Block) -> DocObject {
    let mut target = DocObject::new();
    target.set_string("id", block.id.as_str());
    target.set_string("name", block.name.as_str());
    target.set_string("type", block.kind.type_name());
    let mut position = DocObject::new();
    position.set_integer("x", block.position.x);
    position.set_integer("y", block.position.y);
    target.set_object("position", position);

    match &block.kind {
        BlockKind::In { init_variables } => {
            target.set_string("initVariables", init_variables.as_str());
        }
        BlockKind::Out => {}
        BlockKind::Network {
            ref_network,
            repeats,
            parameters,
        } => {
            target.set_string("refNetwork", ref_network.as_str());
            target.set_integer("repeats", *repeats);
            target.set_object("parameters", parameters_object(parameters));
        }
        BlockKind::Normal {
            repeats,
            parameters,
            ..
        } => {
            target.set_integer("repeats", *repeats);
            target.set_object("parameters", parameters_object(parameters));
        }
    }
    target
}

fn parameters_object(parameters: &Parameters) -> DocObject {
    let mut target = DocObject::new();
    for (name, value) in parameters {
        match value {
            ParameterValue::String(text) => target.set_string(name, text.as_str()),
            ParameterValue::Integer(number) => target.set_integer(name, *number),
            ParameterValue::Boolean(flag) => target.set_bool(name, *flag),
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::write_project;
    use crate::document::DocObject;
    use crate::model::content::{
        Block, BlockKind, NormalKind, ParameterValue, Parameters, Position, ProjectContent,
    };

    #[test]
    fn out_block_carries_no_type_specific_fields() {
        let content = ProjectContent::new_default("p1", "demo");
        let mut root = DocObject::new();
        write_project(&mut root, &content);

        let network = content.networks.values().next().unwrap();
        let out = network.blocks.values().find(|b| b.name == "out").unwrap();
        let doc_block = root
            .object("project")
            .and_then(|p| p.object("networks"))
            .and_then(|n| n.object(&network.id))
            .and_then(|n| n.object("blocks"))
            .and_then(|b| b.object(&out.id))
            .unwrap();

        assert_eq!(doc_block.string("type"), Some("Out"));
        assert!(doc_block.get("initVariables").is_none());
        assert!(doc_block.get("repeats").is_none());
    }

    #[test]
    fn normal_block_parameters_keep_their_types() {
        let mut content = ProjectContent::new_default("p1", "demo");
        let mut parameters = Parameters::new();
        parameters.insert("in_channels".to_string(), ParameterValue::Integer(3));
        parameters.insert("bias".to_string(), ParameterValue::Boolean(false));
        parameters.insert("padding_mode".to_string(), ParameterValue::String("zeros".into()));
        let block = Block::new(
            "conv",
            Position { x: 1, y: 2 },
            BlockKind::Normal {
                kind: NormalKind::Conv2d,
                repeats: 1,
                parameters,
            },
        );
        let block_id = block.id.clone();
        let network_id = content.networks.keys().next().unwrap().clone();
        content
            .networks
            .get_mut(&network_id)
            .unwrap()
            .insert_block(block);

        let mut root = DocObject::new();
        write_project(&mut root, &content);
        let params = root
            .object("project")
            .and_then(|p| p.object("networks"))
            .and_then(|n| n.object(&network_id))
            .and_then(|n| n.object("blocks"))
            .and_then(|b| b.object(&block_id))
            .and_then(|b| b.object("parameters"))
            .unwrap();

        assert_eq!(params.integer("in_channels"), Some(3));
        assert_eq!(params.bool("bias"), Some(false));
        assert_eq!(params.string("padding_mode"), Some("zeros"));
    }
}
