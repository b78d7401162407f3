//! Document codec.
//!
//! A document is a Markdown file with two parts:
//!
//! - a header of `- **Field**: value` lines drawn from a fixed vocabulary
//!   ([`Metadata`]), and
//! - one or more fenced ` ```yaml ` blocks holding the payload mapping.
//!
//! [`encode`] always writes the header in a fixed order followed by a single
//! block. [`decode`] is lenient: header lines may appear in any order, in any
//! list style, with or without surrounding backticks; unknown fields are
//! dropped; blocks that fail to parse are recorded in
//! [`Decoded::skipped`] and otherwise ignored. Later blocks overwrite keys
//! from earlier ones.
//!
//! Known limitation: metadata values are written unescaped, so a value with
//! an embedded newline does not survive a round trip. A value that is itself
//! wrapped in backticks is written inside one extra pair, which [`decode`]
//! strips again. The payload fence is always longer than any backtick run in
//! the payload, so payload strings are safe.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::store::document::Scope;

/// The nested configuration mapping a document carries.
pub type Payload = Map<String, Value>;

const FENCE: &str = "```";
const FENCE_CHAR: char = '`';
const PAYLOAD_FENCE_TAGS: [&str; 2] = ["yaml", "yml"];

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:[-*+][ \t]+)?\*\*(?P<label>[^*\n]+?):?\*\*:?[ \t]?(?P<value>.*)$")
        .expect("valid header regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Kind,
    Name,
    TemplateId,
    ProjectName,
    Version,
    Revision,
    Description,
    Author,
    Creator,
    ProjectType,
    CreatedAt,
    UpdatedAt,
}

/// Header order used by [`encode`].
const FIELDS: [Field; 12] = [
    Field::Kind,
    Field::Name,
    Field::TemplateId,
    Field::ProjectName,
    Field::Version,
    Field::Revision,
    Field::Description,
    Field::Author,
    Field::Creator,
    Field::ProjectType,
    Field::CreatedAt,
    Field::UpdatedAt,
];

impl Field {
    fn label(self) -> &'static str {
        match self {
            Field::Kind => "Kind",
            Field::Name => "Name",
            Field::TemplateId => "Template ID",
            Field::ProjectName => "Project Name",
            Field::Version => "Version",
            Field::Revision => "Revision",
            Field::Description => "Description",
            Field::Author => "Author",
            Field::Creator => "Creator",
            Field::ProjectType => "Project Type",
            Field::CreatedAt => "Created At",
            Field::UpdatedAt => "Updated At",
        }
    }

    fn from_label(raw: &str) -> Option<Field> {
        let wanted = normalize_label(raw);
        FIELDS
            .into_iter()
            .find(|field| normalize_label(field.label()) == wanted)
    }

    fn get(self, meta: &Metadata) -> Option<String> {
        match self {
            Field::Kind => meta.kind.map(|scope| scope.as_str().to_string()),
            Field::Name => meta.name.clone(),
            Field::TemplateId => meta.template_id.clone(),
            Field::ProjectName => meta.project_name.clone(),
            Field::Version => meta.version.clone(),
            Field::Revision => meta.revision.map(|rev| rev.to_string()),
            Field::Description => meta.description.clone(),
            Field::Author => meta.author.clone(),
            Field::Creator => meta.creator.clone(),
            Field::ProjectType => meta.project_type.clone(),
            Field::CreatedAt => meta.created_at.clone(),
            Field::UpdatedAt => meta.updated_at.clone(),
        }
    }

    fn is_set(self, meta: &Metadata) -> bool {
        match self {
            Field::Kind => meta.kind.is_some(),
            Field::Revision => meta.revision.is_some(),
            other => other.get(meta).is_some(),
        }
    }

    fn set(self, meta: &mut Metadata, value: String) -> Result<(), String> {
        match self {
            Field::Kind => meta.kind = Some(value.parse::<Scope>()?),
            Field::Revision => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|err| format!("invalid revision `{value}`: {err}"))?;
                meta.revision = Some(parsed);
            }
            Field::Name => meta.name = Some(value),
            Field::TemplateId => meta.template_id = Some(value),
            Field::ProjectName => meta.project_name = Some(value),
            Field::Version => meta.version = Some(value),
            Field::Description => meta.description = Some(value),
            Field::Author => meta.author = Some(value),
            Field::Creator => meta.creator = Some(value),
            Field::ProjectType => meta.project_type = Some(value),
            Field::CreatedAt => meta.created_at = Some(value),
            Field::UpdatedAt => meta.updated_at = Some(value),
        }
        Ok(())
    }
}

fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Something [`decode`] could not use. The rest of the document still decodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedBlock {
    /// 1-based line where the offending block or header line starts.
    pub line: usize,
    /// `yaml block` or the metadata label that failed.
    pub what: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub metadata: Metadata,
    pub payload: Payload,
    pub skipped: Vec<SkippedBlock>,
}

impl Decoded {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

fn document_title(meta: &Metadata) -> String {
    let base = meta
        .name
        .as_deref()
        .or(meta.project_name.as_deref())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Untitled");
    match meta.kind {
        Some(Scope::History) => format!("{base} (generation history)"),
        Some(Scope::Template) => format!("{base} (template)"),
        Some(Scope::System) => format!("{base} (system settings)"),
        None => base.to_string(),
    }
}

/// Render a document. Only metadata fields that are set are written.
pub fn encode(metadata: &Metadata, payload: &Payload) -> StoreResult<String> {
    let yaml =
        serde_yaml::to_string(payload).map_err(|err| StoreError::Serialize(err.to_string()))?;

    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", document_title(metadata)));
    for field in FIELDS {
        if !field.is_set(metadata) {
            continue;
        }
        let value = field.get(metadata).unwrap_or_default();
        if is_code_span(&value) {
            out.push_str(&format!("- **{}**: `{}`\n", field.label(), value));
        } else {
            out.push_str(&format!("- **{}**: {}\n", field.label(), value));
        }
    }
    let fence = payload_fence(&yaml);
    out.push_str("\n## Configuration\n\n");
    out.push_str(&fence);
    out.push_str(PAYLOAD_FENCE_TAGS[0]);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&fence);
    out.push('\n');
    Ok(out)
}

/// A fence one backtick longer than the longest run inside `body`.
fn payload_fence(body: &str) -> String {
    let longest = body
        .split(|ch: char| ch != FENCE_CHAR)
        .map(str::len)
        .max()
        .unwrap_or(0);
    FENCE_CHAR
        .to_string()
        .repeat((longest + 1).max(FENCE.len()))
}

/// Best-effort read of a document; never fails.
pub fn decode(text: &str) -> Decoded {
    decode_inner(text, true)
}

/// Header-only read used by listings; payload blocks are not parsed.
pub fn decode_metadata(text: &str) -> (Metadata, Vec<SkippedBlock>) {
    let decoded = decode_inner(text, false);
    (decoded.metadata, decoded.skipped)
}

fn is_code_span(value: &str) -> bool {
    value.len() >= 2 && value.starts_with(FENCE_CHAR) && value.ends_with(FENCE_CHAR)
}

fn strip_code_span(value: &str) -> String {
    if is_code_span(value) {
        return value[1..value.len() - 1].to_string();
    }
    value.to_string()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn fence_len(trimmed: &str) -> usize {
    trimmed.chars().take_while(|ch| *ch == FENCE_CHAR).count()
}

/// `(fence length, info tag)` for an opening fence line.
fn opening_fence(trimmed: &str) -> Option<(usize, &str)> {
    let len = fence_len(trimmed);
    (len >= FENCE.len()).then(|| (len, trimmed[len..].trim()))
}

struct OpenBlock {
    start_line: usize,
    indent: usize,
    fence_len: usize,
    parse: bool,
    body: Vec<String>,
}

impl OpenBlock {
    /// A close needs at least as many backticks as the opener and no deeper
    /// indentation, so fence-like lines inside indented payload text do not
    /// end the block.
    fn is_closed_by(&self, line: &str) -> bool {
        let trimmed = line.trim();
        indent_of(line) <= self.indent
            && trimmed.len() >= self.fence_len
            && trimmed.chars().all(|ch| ch == FENCE_CHAR)
    }

    fn text(&self) -> String {
        let mut text = self.body.join("\n");
        if !self.body.is_empty() {
            text.push('\n');
        }
        text
    }
}

fn decode_inner(text: &str, with_payload: bool) -> Decoded {
    let mut out = Decoded::default();
    let mut seen: Vec<Field> = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        if let Some(block) = open.as_mut() {
            if block.is_closed_by(line) {
                let Some(block) = open.take() else {
                    continue;
                };
                if block.parse && with_payload {
                    merge_block(&mut out, block.start_line, &block.text());
                }
            } else {
                block.body.push(line.to_string());
            }
            continue;
        }

        if let Some((fence_len, tag)) = opening_fence(trimmed) {
            let tag = tag.to_ascii_lowercase();
            open = Some(OpenBlock {
                start_line: line_no,
                indent: indent_of(line),
                fence_len,
                parse: PAYLOAD_FENCE_TAGS.contains(&tag.as_str()),
                body: Vec::new(),
            });
            continue;
        }

        let Some(caps) = HEADER_LINE.captures(line) else {
            continue;
        };
        let Some(field) = Field::from_label(&caps["label"]) else {
            continue;
        };
        if seen.contains(&field) {
            continue;
        }
        seen.push(field);
        let value = strip_code_span(&caps["value"]);
        if let Err(reason) = field.set(&mut out.metadata, value) {
            out.skipped.push(SkippedBlock {
                line: line_no,
                what: field.label().to_string(),
                reason,
            });
        }
    }

    if let Some(block) = open
        && block.parse
        && with_payload
    {
        out.skipped.push(SkippedBlock {
            line: block.start_line,
            what: "yaml block".to_string(),
            reason: "unterminated fence".to_string(),
        });
    }

    out
}

fn merge_block(out: &mut Decoded, start_line: usize, body: &str) {
    let skip = |reason: String| SkippedBlock {
        line: start_line,
        what: "yaml block".to_string(),
        reason,
    };

    match serde_yaml::from_str::<Value>(body) {
        Ok(Value::Object(map)) => out.payload.extend(map),
        Ok(Value::Null) => {}
        Ok(other) => out.skipped.push(skip(format!(
            "expected a mapping, found {}",
            json_kind(&other)
        ))),
        Err(err) => out.skipped.push(skip(err.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_metadata() -> Metadata {
        Metadata {
            kind: Some(Scope::Template),
            name: Some("Spring Boot Basic".to_string()),
            template_id: Some("spring-boot-basic".to_string()),
            version: Some("1.0.0".to_string()),
            revision: Some(3),
            description: Some("Monolith starter: web + jpa".to_string()),
            author: Some("scaffolder".to_string()),
            created_at: Some("2024-01-01 12:00:00".to_string()),
            updated_at: Some("2024-01-02 08:30:00".to_string()),
            ..Metadata::default()
        }
    }

    fn sample_payload() -> Payload {
        let value = json!({
            "project": {"name": "demo", "version": "1.0.0", "java_version": "17"},
            "tech_stack": {
                "database": "mysql",
                "cache": ["redis", "caffeine"],
                "nosql": {"mongodb": false, "elasticsearch": true}
            },
            "generation": {"generate_tests": true, "output_dir": "./output"},
            "notes": "line one\nline two",
            "ratio": 0.75,
            "count": 12,
            "nothing": null
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn encode_then_decode_is_lossless() {
        let meta = sample_metadata();
        let payload = sample_payload();
        let text = encode(&meta, &payload).expect("encode");
        let decoded = decode(&text);
        assert!(decoded.is_clean(), "skipped: {:?}", decoded.skipped);
        assert_eq!(decoded.metadata, meta);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn encode_writes_fixed_header_order() {
        let text = encode(&sample_metadata(), &Payload::new()).expect("encode");
        let kind = text.find("**Kind**").expect("kind");
        let name = text.find("**Name**").expect("name");
        let updated = text.find("**Updated At**").expect("updated");
        assert!(kind < name && name < updated);
        assert!(!text.contains("**Creator**"));
    }

    #[test]
    fn absent_fields_stay_absent() {
        let meta = Metadata {
            name: Some("only a name".to_string()),
            ..Metadata::default()
        };
        let decoded = decode(&encode(&meta, &Payload::new()).expect("encode"));
        assert_eq!(decoded.metadata, meta);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn empty_metadata_value_round_trips() {
        let meta = Metadata {
            description: Some(String::new()),
            ..Metadata::default()
        };
        let decoded = decode(&encode(&meta, &Payload::new()).expect("encode"));
        assert_eq!(decoded.metadata.description.as_deref(), Some(""));
    }

    #[test]
    fn malformed_block_is_skipped_and_reported() {
        let text = "\
- **Name**: hand edited
```yaml
project:
  name: ok
```

```yaml
tech_stack: [unclosed
```

```yaml
generation:
  generate_docker: false
```
";
        let decoded = decode(text);
        assert_eq!(decoded.metadata.name.as_deref(), Some("hand edited"));
        assert!(decoded.payload.contains_key("project"));
        assert!(decoded.payload.contains_key("generation"));
        assert!(!decoded.payload.contains_key("tech_stack"));
        assert_eq!(decoded.skipped.len(), 1);
        assert_eq!(decoded.skipped[0].line, 7);
    }

    #[test]
    fn later_blocks_overwrite_earlier_keys() {
        let text = "```yaml\na: 1\nb: 1\n```\n```yml\nb: 2\n```\n";
        let decoded = decode(text);
        assert_eq!(decoded.payload.get("a"), Some(&json!(1)));
        assert_eq!(decoded.payload.get("b"), Some(&json!(2)));
    }

    #[test]
    fn non_mapping_and_unterminated_blocks_are_reported() {
        let text = "```yaml\n- a\n- b\n```\n```yaml\nc: 3\n";
        let decoded = decode(text);
        assert!(decoded.payload.is_empty());
        assert_eq!(decoded.skipped.len(), 2);
        assert!(decoded.skipped[0].reason.contains("mapping"));
        assert_eq!(decoded.skipped[1].reason, "unterminated fence");
    }

    #[test]
    fn hand_edited_header_variants_are_accepted() {
        let text = "\
* **template_id**: `spring-boot-web`
**Version:** 2.0.0
- **Revision**: many
- **Kind**: template
- **Favourite colour**: teal
";
        let decoded = decode(text);
        assert_eq!(
            decoded.metadata.template_id.as_deref(),
            Some("spring-boot-web")
        );
        assert_eq!(decoded.metadata.version.as_deref(), Some("2.0.0"));
        assert_eq!(decoded.metadata.kind, Some(Scope::Template));
        assert_eq!(decoded.metadata.revision, None);
        assert_eq!(decoded.skipped.len(), 1);
        assert_eq!(decoded.skipped[0].what, "Revision");
    }

    #[test]
    fn header_lines_inside_other_fences_are_ignored() {
        let text = "- **Name**: real\n```text\n- **Name**: fake\n- **Author**: fake\n```\n";
        let decoded = decode(text);
        assert_eq!(decoded.metadata.name.as_deref(), Some("real"));
        assert_eq!(decoded.metadata.author, None);
        assert!(decoded.is_clean());
    }

    #[test]
    fn multiline_strings_and_fence_lines_survive() {
        let value = json!({
            "readme": "intro\n```\nafter fence",
            "longer": "````\nfour ticks",
            "script": "line\n  indented\n",
            "blank": "\n",
            "tail": 1
        });
        let Value::Object(payload) = value else {
            unreachable!()
        };
        let text = encode(&Metadata::default(), &payload).expect("encode");
        assert!(text.contains("\n`````yaml\n"), "fence not widened:\n{text}");

        let decoded = decode(&text);
        assert!(decoded.is_clean(), "skipped: {:?}", decoded.skipped);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn shorter_or_deeper_fence_does_not_close_block() {
        let text = "````yaml\na: |\n  x\n  ````\nb: 2\n````\n";
        let decoded = decode(text);
        assert!(decoded.is_clean(), "skipped: {:?}", decoded.skipped);
        assert_eq!(decoded.payload.get("a"), Some(&json!("x\n````\n")));
        assert_eq!(decoded.payload.get("b"), Some(&json!(2)));

        let short = decode("````yaml\nd: 1\n```\n");
        assert!(short.payload.is_empty());
        assert_eq!(short.skipped[0].reason, "unterminated fence");
    }

    #[test]
    fn padded_and_backticked_metadata_round_trips() {
        let meta = Metadata {
            name: Some(" padded".to_string()),
            author: Some("trailing ".to_string()),
            description: Some("`code`".to_string()),
            template_id: Some("``".to_string()),
            creator: Some("`".to_string()),
            ..Metadata::default()
        };
        let decoded = decode(&encode(&meta, &Payload::new()).expect("encode"));
        assert_eq!(decoded.metadata, meta);
    }

    #[test]
    fn decode_metadata_does_not_parse_payload() {
        let text = "- **Name**: listed\n```yaml\n: : broken\n```\n";
        let (meta, skipped) = decode_metadata(text);
        assert_eq!(meta.name.as_deref(), Some("listed"));
        assert!(skipped.is_empty());
    }

    fn meta_value() -> impl Strategy<Value = String> {
        "[ `]?[a-zA-Z0-9._-]{1,16}( [a-zA-Z0-9._-]{1,8})?[ `]?"
    }

    fn payload_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 _.:/-]{0,16}".prop_map(Value::String),
            "([a-z ]{0,6}\n?(```)?){0,3}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn round_trip_holds_for_plain_values(
            name in proptest::option::of(meta_value()),
            author in proptest::option::of(meta_value()),
            created_at in proptest::option::of(meta_value()),
            revision in proptest::option::of(any::<u64>()),
            payload in prop::collection::btree_map("[a-z_]{1,8}", payload_value(), 0..5),
        ) {
            let meta = Metadata {
                kind: Some(Scope::History),
                name,
                author,
                created_at,
                revision,
                ..Metadata::default()
            };
            let payload: Payload = payload.into_iter().collect();
            let text = encode(&meta, &payload).expect("encode");
            let decoded = decode(&text);
            prop_assert!(decoded.is_clean());
            prop_assert_eq!(decoded.metadata, meta);
            prop_assert_eq!(decoded.payload, payload);
        }
    }
}
