use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::models::{
    ApiDraft, CanonicalBody, Extractor, HttpMethod, RigEnv, Validator, ValueType, Variable,
};

/// Body sections of an inbound API payload. Each section may arrive in any of
/// the shapes accepted by [`FormatService::format`].
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PayloadSections {
    #[schema(value_type = Option<Object>)]
    pub header: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub request: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub variables: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub extract: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub validate: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub hooks: Option<Value>,
}

impl PayloadSections {
    /// Field-wise merge, `self` wins
    fn or(self, other: PayloadSections) -> PayloadSections {
        PayloadSections {
            header: self.header.or(other.header),
            request: self.request.or(other.request),
            variables: self.variables.or(other.variables),
            extract: self.extract.or(other.extract),
            validate: self.validate.or(other.validate),
            hooks: self.hooks.or(other.hooks),
        }
    }
}

/// Loosely-structured API definition as submitted by a client
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ApiPayload {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub project: Option<i32>,
    #[serde(alias = "nodeId")]
    pub relation: Option<i32>,
    pub times: Option<u32>,
    pub rig_id: Option<i32>,
    pub rig_env: Option<RigEnv>,
    /// Sections may also be nested under `body`
    pub body: Option<PayloadSections>,
    #[serde(flatten)]
    pub sections: PayloadSections,
}

// ============ Section shapes ============

/// Editor row: `{key, value, desc, type}`
#[derive(Debug, Deserialize)]
struct Row {
    key: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<ValueType>,
}

#[derive(Debug, Deserialize)]
struct ValidateRow {
    #[serde(default = "default_comparator")]
    comparator: String,
    actual: String,
    #[serde(default)]
    expect: Value,
    #[serde(default, rename = "type")]
    kind: Option<ValueType>,
}

fn default_comparator() -> String {
    "equals".to_string()
}

#[derive(Debug, Deserialize)]
struct HookRow {
    #[serde(default)]
    setup: String,
    #[serde(default)]
    teardown: String,
}

#[derive(Debug, Default, Deserialize)]
struct HookLists {
    #[serde(default)]
    setup_hooks: Vec<String>,
    #[serde(default)]
    teardown_hooks: Vec<String>,
}

/// Keyed section (headers, form data, params, files)
#[derive(Debug)]
enum MapSection {
    Rows(Vec<Row>),
    Described {
        values: Map<String, Value>,
        desc: BTreeMap<String, String>,
    },
    Plain(Map<String, Value>),
}

/// Ordered name/value section (variables, extractors)
#[derive(Debug)]
enum PairSection {
    Rows(Vec<Row>),
    Described {
        pairs: Vec<(String, Value)>,
        desc: BTreeMap<String, String>,
    },
    Plain(Vec<(String, Value)>),
}

#[derive(Debug)]
enum ValidateSection {
    Rows(Vec<ValidateRow>),
    Pairs(Vec<Map<String, Value>>),
}

#[derive(Debug)]
enum HooksSection {
    Rows(Vec<HookRow>),
    Lists(HookLists),
}

fn invalid(section: &str, detail: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("invalid `{}` section: {}", section, detail))
}

fn is_row(item: &Value, marker: &str) -> bool {
    item.as_object().is_some_and(|obj| obj.contains_key(marker))
}

fn rows_from<T: for<'de> Deserialize<'de>>(items: Vec<Value>, section: &str) -> AppResult<Vec<T>> {
    serde_json::from_value(Value::Array(items)).map_err(|e| invalid(section, e))
}

fn desc_from(value: Option<Value>, section: &str) -> AppResult<BTreeMap<String, String>> {
    match value {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(value) => serde_json::from_value(value).map_err(|e| invalid(section, e)),
    }
}

/// Flatten `[{k: v}, {k2: v2}]` into ordered pairs
fn pairs_from(items: Vec<Value>, section: &str) -> AppResult<Vec<(String, Value)>> {
    let mut pairs = Vec::new();
    for item in items {
        match item {
            Value::Object(map) => pairs.extend(map),
            other => return Err(invalid(section, format!("expected an object, got {}", other))),
        }
    }
    Ok(pairs)
}

fn typed_value(
    value: Value,
    kind: Option<ValueType>,
    section: &str,
    key: &str,
) -> AppResult<Value> {
    match (kind, value) {
        (Some(kind), Value::String(text)) => kind
            .coerce(&text)
            .map_err(|e| invalid(section, format!("{}: {}", key, e))),
        (_, value) => Ok(value),
    }
}

/// Keep only non-empty descriptions of keys that are present
fn prune_desc<'a>(
    desc: BTreeMap<String, String>,
    keys: impl Iterator<Item = &'a String>,
) -> BTreeMap<String, String> {
    let keys: Vec<&String> = keys.collect();
    desc.into_iter()
        .filter(|(k, d)| !d.is_empty() && keys.contains(&k))
        .collect()
}

/// Trim keys and drop the blank ones, as row input does
fn clean_keys<I: IntoIterator<Item = (String, Value)>, C: FromIterator<(String, Value)>>(
    entries: I,
) -> C {
    entries
        .into_iter()
        .filter_map(|(key, value)| {
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value))
        })
        .collect()
}

fn clean_desc(desc: BTreeMap<String, String>) -> BTreeMap<String, String> {
    desc.into_iter()
        .map(|(key, text)| (key.trim().to_string(), text))
        .collect()
}

fn clean_hooks(hooks: Vec<String>) -> Vec<String> {
    hooks
        .into_iter()
        .map(|hook| hook.trim().to_string())
        .filter(|hook| !hook.is_empty())
        .collect()
}

impl MapSection {
    fn from_value(value: Value, wrapper: &str, section: &str) -> AppResult<Self> {
        match value {
            Value::Null => Ok(MapSection::Plain(Map::new())),
            Value::Array(items) => rows_from(items, section).map(MapSection::Rows),
            Value::Object(mut map) => match map.remove(wrapper) {
                Some(Value::Object(values)) => {
                    let desc = desc_from(map.remove("desc"), section)?;
                    Ok(MapSection::Described { values, desc })
                }
                Some(other) => {
                    map.insert(wrapper.to_string(), other);
                    Ok(MapSection::Plain(map))
                }
                None => Ok(MapSection::Plain(map)),
            },
            other => Err(invalid(section, format!("unexpected value {}", other))),
        }
    }

    fn resolve(self, section: &str) -> AppResult<(Map<String, Value>, BTreeMap<String, String>)> {
        match self {
            MapSection::Rows(rows) => {
                let mut values = Map::new();
                let mut desc = BTreeMap::new();
                for Row {
                    key,
                    value,
                    desc: row_desc,
                    kind,
                } in rows
                {
                    let key = key.trim().to_string();
                    if key.is_empty() {
                        continue;
                    }
                    let value = typed_value(value, kind, section, &key)?;
                    if let Some(text) = row_desc.filter(|d| !d.is_empty()) {
                        desc.insert(key.clone(), text);
                    }
                    values.insert(key, value);
                }
                Ok((values, desc))
            }
            MapSection::Described { values, desc } => {
                let values: Map<String, Value> = clean_keys(values);
                let desc = prune_desc(clean_desc(desc), values.keys());
                Ok((values, desc))
            }
            MapSection::Plain(values) => Ok((clean_keys(values), BTreeMap::new())),
        }
    }
}

impl PairSection {
    fn from_value(value: Value, wrapper: &str, section: &str) -> AppResult<Self> {
        match value {
            Value::Null => Ok(PairSection::Plain(Vec::new())),
            Value::Array(items) if items.iter().all(|item| is_row(item, "key")) => {
                rows_from(items, section).map(PairSection::Rows)
            }
            Value::Array(items) => pairs_from(items, section).map(PairSection::Plain),
            Value::Object(mut map) => match map.remove(wrapper) {
                Some(Value::Array(items)) => {
                    let desc = desc_from(map.remove("desc"), section)?;
                    let pairs = pairs_from(items, section)?;
                    Ok(PairSection::Described { pairs, desc })
                }
                Some(other) => {
                    map.insert(wrapper.to_string(), other);
                    Ok(PairSection::Plain(map.into_iter().collect()))
                }
                None => Ok(PairSection::Plain(map.into_iter().collect())),
            },
            other => Err(invalid(section, format!("unexpected value {}", other))),
        }
    }

    fn resolve(self, section: &str) -> AppResult<(Vec<(String, Value)>, BTreeMap<String, String>)> {
        match self {
            PairSection::Rows(rows) => {
                let mut pairs = Vec::new();
                let mut desc = BTreeMap::new();
                for Row {
                    key,
                    value,
                    desc: row_desc,
                    kind,
                } in rows
                {
                    let key = key.trim().to_string();
                    if key.is_empty() {
                        continue;
                    }
                    let value = typed_value(value, kind, section, &key)?;
                    if let Some(text) = row_desc.filter(|d| !d.is_empty()) {
                        desc.insert(key.clone(), text);
                    }
                    pairs.push((key, value));
                }
                Ok((pairs, desc))
            }
            PairSection::Described { pairs, desc } => {
                let pairs: Vec<(String, Value)> = clean_keys(pairs);
                let desc = prune_desc(clean_desc(desc), pairs.iter().map(|(k, _)| k));
                Ok((pairs, desc))
            }
            PairSection::Plain(pairs) => Ok((clean_keys(pairs), BTreeMap::new())),
        }
    }
}

impl ValidateSection {
    fn from_value(value: Value) -> AppResult<Self> {
        let items = match value {
            Value::Null => return Ok(ValidateSection::Rows(Vec::new())),
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("validate") {
                Some(Value::Array(items)) => items,
                _ => return Err(invalid("validate", "expected a `validate` list")),
            },
            other => return Err(invalid("validate", format!("unexpected value {}", other))),
        };

        if items.iter().all(|item| is_row(item, "actual")) {
            rows_from(items, "validate").map(ValidateSection::Rows)
        } else {
            rows_from(items, "validate").map(ValidateSection::Pairs)
        }
    }

    fn resolve(self) -> AppResult<Vec<Validator>> {
        match self {
            ValidateSection::Rows(rows) => rows
                .into_iter()
                .filter(|row| !row.actual.trim().is_empty())
                .map(|row| {
                    let expect = typed_value(row.expect, row.kind, "validate", &row.actual)?;
                    Ok(Validator {
                        comparator: row.comparator,
                        actual: row.actual,
                        expect,
                    })
                })
                .collect(),
            ValidateSection::Pairs(items) => {
                let mut validators = Vec::new();
                for (comparator, operands) in items.into_iter().flatten() {
                    let Value::Array(mut operands) = operands else {
                        return Err(invalid("validate", format!("`{}` needs [actual, expect]", comparator)));
                    };
                    if operands.len() != 2 {
                        return Err(invalid("validate", format!("`{}` needs [actual, expect]", comparator)));
                    }
                    let expect = operands.pop().unwrap_or(Value::Null);
                    let actual = match operands.pop() {
                        Some(Value::String(actual)) => actual,
                        _ => {
                            return Err(invalid(
                                "validate",
                                format!("`{}` actual must be a string", comparator),
                            ))
                        }
                    };
                    validators.push(Validator {
                        comparator,
                        actual,
                        expect,
                    });
                }
                Ok(validators)
            }
        }
    }
}

impl HooksSection {
    fn from_value(value: Value) -> AppResult<Self> {
        match value {
            Value::Null => Ok(HooksSection::Lists(HookLists::default())),
            Value::Array(items) => rows_from(items, "hooks").map(HooksSection::Rows),
            value @ Value::Object(_) => serde_json::from_value(value)
                .map(HooksSection::Lists)
                .map_err(|e| invalid("hooks", e)),
            other => Err(invalid("hooks", format!("unexpected value {}", other))),
        }
    }

    fn resolve(self) -> (Vec<String>, Vec<String>) {
        match self {
            HooksSection::Rows(rows) => {
                let setup = rows
                    .iter()
                    .map(|row| row.setup.trim())
                    .filter(|hook| !hook.is_empty())
                    .map(str::to_string)
                    .collect();
                let teardown = rows
                    .iter()
                    .map(|row| row.teardown.trim())
                    .filter(|hook| !hook.is_empty())
                    .map(str::to_string)
                    .collect();
                (setup, teardown)
            }
            HooksSection::Lists(lists) => (
                clean_hooks(lists.setup_hooks),
                clean_hooks(lists.teardown_hooks),
            ),
        }
    }
}

fn header_value(key: &str, value: Value) -> AppResult<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(invalid("header", format!("`{}` must be a scalar, got {}", key, other))),
    }
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("`{}` is required", field)))
}

// ============ Format ============

/// Inbound normalization: client payload to canonical body
pub struct FormatService;

impl FormatService {
    /// Validate a payload and build its canonical body. Pure: project
    /// resolution and persistence are left to the caller.
    pub fn format(payload: ApiPayload) -> AppResult<ApiDraft> {
        let name = required(payload.name, "name")?;
        let url = required(payload.url, "url")?;
        let method: HttpMethod = required(payload.method, "method")?
            .parse()
            .map_err(AppError::Validation)?;
        let project_id = payload
            .project
            .ok_or_else(|| AppError::Validation("`project` is required".to_string()))?;
        let times = payload.times.unwrap_or(1);
        if times == 0 {
            return Err(AppError::Validation("`times` must be at least 1".to_string()));
        }

        let sections = payload.sections.or(payload.body.unwrap_or_default());

        let mut body = CanonicalBody::new(&name, &url, method);
        body.times = times;

        if let Some(header) = sections.header {
            let (values, desc) = MapSection::from_value(header, "header", "header")?.resolve("header")?;
            for (key, value) in values {
                let value = header_value(&key, value)?;
                body.request.headers.insert(key, value);
            }
            body.desc.header = desc;
        }

        if let Some(request) = sections.request {
            Self::apply_request(&mut body, request)?;
        }

        if let Some(variables) = sections.variables {
            let (pairs, desc) =
                PairSection::from_value(variables, "variables", "variables")?.resolve("variables")?;
            body.variables = pairs
                .into_iter()
                .map(|(name, value)| Variable { name, value })
                .collect();
            body.desc.variables = desc;
        }

        if let Some(extract) = sections.extract {
            let (pairs, desc) =
                PairSection::from_value(extract, "extract", "extract")?.resolve("extract")?;
            body.extract = pairs
                .into_iter()
                .map(|(name, path)| match path {
                    Value::String(path) => Ok(Extractor { name, path }),
                    other => Err(invalid("extract", format!("`{}` path must be a string, got {}", name, other))),
                })
                .collect::<AppResult<Vec<_>>>()?;
            body.desc.extract = desc;
        }

        if let Some(validate) = sections.validate {
            body.validate = ValidateSection::from_value(validate)?.resolve()?;
        }

        if let Some(hooks) = sections.hooks {
            let (setup, teardown) = HooksSection::from_value(hooks)?.resolve();
            body.setup_hooks = setup;
            body.teardown_hooks = teardown;
        }

        Ok(ApiDraft {
            name,
            url,
            method,
            project_id,
            relation: payload.relation.unwrap_or(0),
            rig_id: payload.rig_id,
            rig_env: payload.rig_env.unwrap_or_default(),
            body,
        })
    }

    fn apply_request(body: &mut CanonicalBody, request: Value) -> AppResult<()> {
        let mut request = match request {
            Value::Null => return Ok(()),
            Value::Object(map) => map,
            other => return Err(invalid("request", format!("unexpected value {}", other))),
        };

        if let Some(form) = request.remove("form").or_else(|| request.remove("data")) {
            let (values, desc) = MapSection::from_value(form, "data", "request.form")?.resolve("request.form")?;
            body.request.data = values;
            body.desc.data = desc;
        }

        if let Some(params) = request.remove("params") {
            let (values, desc) =
                MapSection::from_value(params, "params", "request.params")?.resolve("request.params")?;
            body.request.params = values;
            body.desc.params = desc;
        }

        if let Some(files) = request.remove("files") {
            let (values, desc) =
                MapSection::from_value(files, "files", "request.files")?.resolve("request.files")?;
            body.request.files = values;
            body.desc.files = desc;
        }

        let json = request.remove("json").or_else(|| request.remove("json_data"));
        body.request.json = match json {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) if text.trim().is_empty() => None,
            Some(Value::String(text)) => Some(
                serde_json::from_str(&text).map_err(|e| invalid("request.json", e))?,
            ),
            Some(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
            Some(other) => {
                return Err(invalid("request.json", format!("unexpected value {}", other)))
            }
        };

        Ok(())
    }
}
