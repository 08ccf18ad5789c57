//! Project content tree written into the collaborative document.
//!
//! # Responsibility
//! - Model networks, blocks, links and dependencies of one project.
//! - Build the default tree every new project starts from.
//! - Parse stored template JSON into a validated tree.
//!
//! # Invariants
//! - Every collection is keyed by the id of the entity it holds.
//! - Parameter values are only string, integer or boolean.
//! - Block-specific fields follow the block type (see [`BlockKind`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Name of the network every new project starts with.
pub const DEFAULT_NETWORK_NAME: &str = "Main";

/// Errors raised while reading a content tree from JSON.
#[derive(Debug)]
pub enum ContentError {
    Json(serde_json::Error),
    /// A collection entry whose map key differs from the entity's own id.
    KeyMismatch {
        collection: &'static str,
        key: String,
        id: String,
    },
}

impl Display for ContentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid project content: {err}"),
            Self::KeyMismatch {
                collection,
                key,
                id,
            } => write!(
                f,
                "invalid project content: {collection} entry `{key}` holds id `{id}`"
            ),
        }
    }
}

impl Error for ContentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::KeyMismatch { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Generates an id for a content-tree entity.
pub fn new_content_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Value of one block parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl TryFrom<serde_json::Value> for ParameterValue {
    type Error = &'static str;

    /// Returns the JSON kind name on rejection.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::String(text) => Ok(Self::String(text)),
            serde_json::Value::Bool(flag) => Ok(Self::Boolean(flag)),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(integer) => Ok(Self::Integer(integer)),
                None if number.is_u64() => Err("integer out of range"),
                None => Err("float"),
            },
            serde_json::Value::Null => Err("null"),
            serde_json::Value::Array(_) => Err("array"),
            serde_json::Value::Object(_) => Err("object"),
        }
    }
}

/// Parameter map of one block, keyed by parameter name.
pub type Parameters = BTreeMap<String, ParameterValue>;

/// Canvas position of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

/// Computational block kinds that share the `repeats` + `parameters` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalKind {
    Conv2d,
    // Wire name kept as stored by existing clients.
    BatchNorm2d,
    Relu,
    MaxPool2d,
}

impl NormalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conv2d => "Conv2d",
            Self::BatchNorm2d => "BachNorm2d",
            Self::Relu => "ReLU",
            Self::MaxPool2d => "MaxPool2d",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "Conv2d" => Some(Self::Conv2d),
            "BachNorm2d" => Some(Self::BatchNorm2d),
            "ReLU" => Some(Self::Relu),
            "MaxPool2d" => Some(Self::MaxPool2d),
            _ => None,
        }
    }
}

/// Block variant together with its type-specific fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    In {
        init_variables: String,
    },
    Out,
    /// Reference to another network of the same project.
    Network {
        ref_network: String,
        repeats: i64,
        parameters: Parameters,
    },
    Normal {
        kind: NormalKind,
        repeats: i64,
        parameters: Parameters,
    },
}

impl BlockKind {
    /// Stored `type` value of this block.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::In { .. } => "In",
            Self::Out => "Out",
            Self::Network { .. } => "Network",
            Self::Normal { kind, .. } => kind.as_str(),
        }
    }
}

/// One block of a network diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct Block {
    pub id: String,
    pub name: String,
    pub position: Position,
    pub kind: BlockKind,
}

impl Block {
    pub fn new(name: impl Into<String>, position: Position, kind: BlockKind) -> Self {
        Self {
            id: new_content_id(),
            name: name.into(),
            position,
            kind,
        }
    }
}

/// Flat JSON shape of a block as stored in templates.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    id: String,
    name: String,
    #[serde(rename = "type")]
    block_type: String,
    position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    init_variables: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ref_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repeats: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameters: Option<BTreeMap<String, serde_json::Value>>,
}

impl TryFrom<RawBlock> for Block {
    type Error = String;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let kind = match raw.block_type.as_str() {
            "In" => BlockKind::In {
                init_variables: raw.init_variables.unwrap_or_default(),
            },
            "Out" => BlockKind::Out,
            "Network" => BlockKind::Network {
                ref_network: raw.ref_network.unwrap_or_default(),
                repeats: raw.repeats.unwrap_or_default(),
                parameters: parse_parameters(&raw.id, raw.parameters)?,
            },
            other => {
                let kind = NormalKind::parse(other)
                    .ok_or_else(|| format!("unknown block type `{other}` in block {}", raw.id))?;
                BlockKind::Normal {
                    kind,
                    repeats: raw.repeats.unwrap_or_default(),
                    parameters: parse_parameters(&raw.id, raw.parameters)?,
                }
            }
        };

        Ok(Self {
            id: raw.id,
            name: raw.name,
            position: raw.position,
            kind,
        })
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        let block_type = block.kind.type_name().to_string();
        let mut raw = RawBlock {
            id: block.id,
            name: block.name,
            block_type,
            position: block.position,
            init_variables: None,
            ref_network: None,
            repeats: None,
            parameters: None,
        };
        match block.kind {
            BlockKind::In { init_variables } => raw.init_variables = Some(init_variables),
            BlockKind::Out => {}
            BlockKind::Network {
                ref_network,
                repeats,
                parameters,
            } => {
                raw.ref_network = Some(ref_network);
                raw.repeats = Some(repeats);
                raw.parameters = Some(parameters_to_json(parameters));
            }
            BlockKind::Normal {
                repeats,
                parameters,
                ..
            } => {
                raw.repeats = Some(repeats);
                raw.parameters = Some(parameters_to_json(parameters));
            }
        }
        raw
    }
}

fn parse_parameters(
    block_id: &str,
    raw: Option<BTreeMap<String, serde_json::Value>>,
) -> Result<Parameters, String> {
    let mut parameters = Parameters::new();
    for (name, value) in raw.unwrap_or_default() {
        let value = ParameterValue::try_from(value).map_err(|found| {
            format!("unsupported parameter `{name}` of type {found} in block {block_id}")
        })?;
        parameters.insert(name, value);
    }
    Ok(parameters)
}

fn parameters_to_json(parameters: Parameters) -> BTreeMap<String, serde_json::Value> {
    parameters
        .into_iter()
        .map(|(name, value)| {
            let json = match value {
                ParameterValue::String(text) => serde_json::Value::String(text),
                ParameterValue::Integer(number) => serde_json::Value::from(number),
                ParameterValue::Boolean(flag) => serde_json::Value::Bool(flag),
            };
            (name, json)
        })
        .collect()
}

/// Connection between two blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// Package imported by generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, alias: Option<&str>) -> Self {
        Self {
            id: new_content_id(),
            name: name.into(),
            alias: alias.map(str::to_string),
            package: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    pub third_party_deps: BTreeMap<String, Dependency>,
}

impl Dependencies {
    /// `torch` and `torch.nn as nn`.
    pub fn new_default() -> Self {
        let mut deps = Self::default();
        deps.insert(Dependency::new("torch", None));
        deps.insert(Dependency::new("torch.nn", Some("nn")));
        deps
    }

    pub fn insert(&mut self, dependency: Dependency) {
        self.third_party_deps
            .insert(dependency.id.clone(), dependency);
    }
}

/// One network diagram of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub dependencies: Dependencies,
    pub blocks: BTreeMap<String, Block>,
    pub links: BTreeMap<String, Link>,
}

impl Network {
    /// Network `Main` with an `in` and an `out` block and no links.
    pub fn new_default() -> Self {
        let mut network = Self {
            id: new_content_id(),
            name: DEFAULT_NETWORK_NAME.to_string(),
            dependencies: Dependencies::new_default(),
            blocks: BTreeMap::new(),
            links: BTreeMap::new(),
        };
        network.insert_block(Block::new(
            "in",
            Position { x: 100, y: 100 },
            BlockKind::In {
                init_variables: String::new(),
            },
        ));
        network.insert_block(Block::new("out", Position { x: 100, y: 200 }, BlockKind::Out));
        network
    }

    pub fn insert_block(&mut self, block: Block) {
        self.blocks.insert(block.id.clone(), block);
    }

    pub fn insert_link(&mut self, link: Link) {
        self.links.insert(link.id.clone(), link);
    }
}

/// Full content tree of one project document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContent {
    pub id: String,
    pub name: String,
    pub networks: BTreeMap<String, Network>,
}

impl ProjectContent {
    /// Content every newly created project starts with.
    pub fn new_default(id: impl Into<String>, name: impl Into<String>) -> Self {
        let network = Network::new_default();
        let mut networks = BTreeMap::new();
        networks.insert(network.id.clone(), network);
        Self {
            id: id.into(),
            name: name.into(),
            networks,
        }
    }

    /// Parses and validates a JSON content tree.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let content: Self = serde_json::from_str(json)?;
        content.check_keys()?;
        Ok(content)
    }

    /// Checks that every collection is keyed by its entities' ids.
    pub fn check_keys(&self) -> Result<(), ContentError> {
        check_keyed("networks", &self.networks, |network| &network.id)?;
        for network in self.networks.values() {
            check_keyed(
                "thirdPartyDeps",
                &network.dependencies.third_party_deps,
                |dependency| &dependency.id,
            )?;
            check_keyed("blocks", &network.blocks, |block| &block.id)?;
            check_keyed("links", &network.links, |link| &link.id)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ContentError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebinds a parsed tree to a new project identity.
    pub fn restamp(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.id = id.into();
        self.name = name.into();
        self
    }
}

fn check_keyed<T>(
    collection: &'static str,
    entries: &BTreeMap<String, T>,
    id_of: impl Fn(&T) -> &String,
) -> Result<(), ContentError> {
    match entries.iter().find(|(key, entry)| *key != id_of(*entry)) {
        Some((key, entry)) => Err(ContentError::KeyMismatch {
            collection,
            key: key.clone(),
            id: id_of(entry).clone(),
        }),
        None => Ok(()),
    }
}
