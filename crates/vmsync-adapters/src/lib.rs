//! Remote source contract, vPIC client, and markup-to-record transformation.

use anyhow::Result;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, warn};
use vmsync_core::{Make, RawDocument, VehicleType};
use vmsync_storage::{FetchError, HttpClientConfig, HttpFetcher};

pub const CRATE_NAME: &str = "vmsync-adapters";

pub const DEFAULT_VPIC_BASE_URL: &str = "https://vpic.nhtsa.dot.gov/api/vehicles";

const ROOT_ELEMENT: &str = "Response";
const MAKE_RECORD: &str = "AllVehicleMakes";
const TYPE_RECORD: &str = "VehicleTypesForMakeIds";

/// Text nodes sharing an element with child elements are kept under this key.
const MIXED_TEXT_KEY: &str = "_";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed markup: {0}")]
    Markup(String),
    #[error("missing `{0}` in document")]
    MissingField(String),
    #[error("reported count `{0}` is not a number")]
    BadCount(String),
    #[error("unexpected document shape: {0}")]
    UnexpectedShape(String),
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Generic tree decoded from a markup document.
///
/// Follows the usual markup-to-object collapsing: text-only elements become
/// strings, elements with children become objects, repeated siblings become
/// lists, and a lone child stays a bare object.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTree {
    root_name: String,
    root: JsonValue,
}

impl ParsedTree {
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Walks object keys below the root element.
    pub fn get(&self, path: &[&str]) -> Option<&JsonValue> {
        let mut cur = &self.root;
        for segment in path {
            cur = cur.get(*segment)?;
        }
        Some(cur)
    }
}

struct Frame {
    name: String,
    children: JsonMap<String, JsonValue>,
    text: String,
}

impl Frame {
    fn open(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            children: JsonMap::new(),
            text: String::new(),
        }
    }

    fn close(self) -> (String, JsonValue) {
        let text = self.text.trim();
        let value = if self.children.is_empty() {
            JsonValue::String(text.to_string())
        } else {
            let mut children = self.children;
            if !text.is_empty() {
                children.insert(MIXED_TEXT_KEY.to_string(), JsonValue::String(text.to_string()));
            }
            JsonValue::Object(children)
        };
        (self.name, value)
    }
}

fn insert_child(children: &mut JsonMap<String, JsonValue>, name: String, value: JsonValue) {
    match children.get_mut(&name) {
        // Element values are never lists themselves, so a list here means
        // earlier siblings with the same name.
        Some(JsonValue::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = JsonValue::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

fn attach(
    stack: &mut [Frame],
    root: &mut Option<(String, JsonValue)>,
    name: String,
    value: JsonValue,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => {
            insert_child(&mut parent.children, name, value);
            Ok(())
        }
        None if root.is_some() => Err(ParseError::Markup(format!(
            "second root element <{name}>"
        ))),
        None => {
            *root = Some((name, value));
            Ok(())
        }
    }
}

/// Decode a markup document into a [`ParsedTree`].
pub fn parse(document: &[u8]) -> Result<ParsedTree, ParseError> {
    let mut reader = Reader::from_reader(document);
    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, JsonValue)> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ParseError::Markup(e.to_string()))?;
        match event {
            Event::Start(start) => stack.push(Frame::open(start.name().as_ref())),
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| ParseError::Markup("closing tag without opening tag".into()))?;
                let (name, value) = frame.close();
                attach(&mut stack, &mut root, name, value)?;
            }
            Event::Empty(empty) => {
                let name = String::from_utf8_lossy(empty.name().as_ref()).into_owned();
                attach(&mut stack, &mut root, name, JsonValue::String(String::new()))?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| ParseError::Markup(e.to_string()))?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(ParseError::Markup(
                            "text content outside of the root element".into(),
                        ))
                    }
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Markup(format!(
            "document ended inside <{}>",
            open.name
        )));
    }
    let (root_name, root) = root.ok_or_else(|| ParseError::Markup("empty document".into()))?;
    Ok(ParsedTree { root_name, root })
}

fn expect_response(tree: &ParsedTree) -> Result<(), ParseError> {
    if tree.root_name() != ROOT_ELEMENT {
        return Err(ParseError::UnexpectedShape(format!(
            "root element <{}>, expected <{ROOT_ELEMENT}>",
            tree.root_name()
        )));
    }
    Ok(())
}

/// The `Count` the source reports for its result set.
pub fn reported_count(tree: &ParsedTree) -> Result<u64, ParseError> {
    expect_response(tree)?;
    let raw = tree
        .get(&["Count"])
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ParseError::MissingField("Count".into()))?;
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ParseError::BadCount(raw.to_string()))
}

fn as_record<'a>(
    value: &'a JsonValue,
    record: &str,
) -> Result<&'a JsonMap<String, JsonValue>, ParseError> {
    value
        .as_object()
        .ok_or_else(|| ParseError::UnexpectedShape(format!("<{record}> is not a record")))
}

/// Result records under `Results/<record>`, normalized to a list.
///
/// The source does not wrap a single record in a list and drops the list
/// entirely when empty, so the reported count decides how to read it.
fn collect_records<'a>(
    tree: &'a ParsedTree,
    record: &str,
) -> Result<Vec<&'a JsonMap<String, JsonValue>>, ParseError> {
    let count = reported_count(tree)?;
    if count == 0 {
        return Ok(Vec::new());
    }

    let nested = tree
        .get(&["Results", record])
        .ok_or_else(|| ParseError::MissingField(format!("Results/{record}")))?;

    let records = if count == 1 {
        match nested {
            JsonValue::Object(single) => vec![single],
            JsonValue::Array(items) if items.len() == 1 => vec![as_record(&items[0], record)?],
            _ => {
                return Err(ParseError::UnexpectedShape(format!(
                    "count 1 but <{record}> is neither a record nor a one-element list"
                )))
            }
        }
    } else {
        match nested {
            JsonValue::Array(items) => items
                .iter()
                .map(|item| as_record(item, record))
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(ParseError::UnexpectedShape(format!(
                    "count {count} but <{record}> is not a list"
                )))
            }
        }
    };

    if records.len() as u64 != count {
        warn!(
            record,
            reported = count,
            actual = records.len(),
            "reported count differs from record count"
        );
    }
    Ok(records)
}

fn field_text(
    record: &JsonMap<String, JsonValue>,
    record_name: &str,
    field: &str,
) -> Result<String, ParseError> {
    match record.get(field) {
        Some(JsonValue::String(s)) => Ok(s.trim().to_string()),
        Some(_) => Err(ParseError::UnexpectedShape(format!(
            "<{record_name}>/<{field}> is not text"
        ))),
        None => Err(ParseError::MissingField(format!("{record_name}/{field}"))),
    }
}

fn required_id(
    record: &JsonMap<String, JsonValue>,
    record_name: &str,
    field: &str,
) -> Result<String, ParseError> {
    let id = field_text(record, record_name, field)?;
    if id.is_empty() {
        return Err(ParseError::MissingField(format!("{record_name}/{field}")));
    }
    Ok(id)
}

/// Every make in an all-makes document, as shells with no types.
pub fn extract_makes(tree: &ParsedTree) -> Result<Vec<Make>, ParseError> {
    collect_records(tree, MAKE_RECORD)?
        .into_iter()
        .map(|record| {
            Ok(Make::shell(
                required_id(record, MAKE_RECORD, "Make_ID")?,
                field_text(record, MAKE_RECORD, "Make_Name")?,
            ))
        })
        .collect()
}

/// Vehicle types in a types-for-make document, in source order.
pub fn extract_types(tree: &ParsedTree) -> Result<Vec<VehicleType>, ParseError> {
    collect_records(tree, TYPE_RECORD)?
        .into_iter()
        .map(|record| {
            Ok(VehicleType::new(
                required_id(record, TYPE_RECORD, "VehicleTypeId")?,
                field_text(record, TYPE_RECORD, "VehicleTypeName")?,
            ))
        })
        .collect()
}

/// The two logical reads the remote source offers.
#[async_trait]
pub trait MakeSource: Send + Sync {
    fn source_id(&self) -> &'static str;

    async fn fetch_all_makes(&self) -> Result<RawDocument, FetchError>;

    async fn fetch_types_for_make(&self, make_id: &str) -> Result<RawDocument, FetchError>;
}

fn parse_document(document: &RawDocument) -> Result<ParsedTree, ParseError> {
    debug!(
        url = %document.url,
        fetched_at = %document.fetched_at,
        bytes = document.body.len(),
        "parsing source document"
    );
    parse(&document.body)
}

pub async fn fetch_makes(source: &dyn MakeSource) -> Result<Vec<Make>, AdapterError> {
    let document = source.fetch_all_makes().await?;
    Ok(extract_makes(&parse_document(&document)?)?)
}

pub async fn fetch_types(
    source: &dyn MakeSource,
    make_id: &str,
) -> Result<Vec<VehicleType>, AdapterError> {
    let document = source.fetch_types_for_make(make_id).await?;
    Ok(extract_types(&parse_document(&document)?)?)
}

/// Number of makes the source currently lists.
pub async fn fetch_make_count(source: &dyn MakeSource) -> Result<u64, AdapterError> {
    Ok(fetch_makes(source).await?.len() as u64)
}

#[derive(Debug)]
pub struct VpicSource {
    http: HttpFetcher,
    base_url: String,
}

impl VpicSource {
    pub fn new(base_url: impl Into<String>, http: HttpClientConfig) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(http)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn all_makes_url(&self) -> String {
        format!("{}/getallmakes?format=xml", self.base_url)
    }

    pub fn types_url(&self, make_id: &str) -> String {
        format!(
            "{}/GetVehicleTypesForMakeId/{}?format=xml",
            self.base_url,
            make_id.trim()
        )
    }

    async fn get(&self, url: String) -> Result<RawDocument, FetchError> {
        let response = self.http.fetch_bytes(&url).await?;
        Ok(RawDocument::new(response.final_url, response.body))
    }
}

#[async_trait]
impl MakeSource for VpicSource {
    fn source_id(&self) -> &'static str {
        "vpic"
    }

    async fn fetch_all_makes(&self) -> Result<RawDocument, FetchError> {
        self.get(self.all_makes_url()).await
    }

    async fn fetch_types_for_make(&self, make_id: &str) -> Result<RawDocument, FetchError> {
        self.get(self.types_url(make_id)).await
    }
}
