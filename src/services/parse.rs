use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppResult;
use crate::models::{CanonicalBody, HttpMethod, ValueType};

/// Editor row for keyed and named sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRow {
    pub key: String,
    pub value: Value,
    pub desc: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValueType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorRow {
    pub comparator: String,
    pub actual: String,
    pub expect: String,
    #[serde(rename = "type")]
    pub kind: ValueType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRow {
    pub setup: String,
    pub teardown: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRows {
    pub form: Vec<FieldRow>,
    pub params: Vec<FieldRow>,
    pub files: Vec<FieldRow>,
    /// Pretty-printed JSON body, empty when the request has none
    pub json: String,
}

/// Executable request description expanded from a canonical body.
///
/// Sections the body leaves out come back as a single blank row so that an
/// editor always has a line to fill in; Format skips blank rows, so this
/// shape can be submitted back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableRequest {
    pub name: String,
    pub times: u32,
    pub url: String,
    pub method: HttpMethod,
    pub header: Vec<FieldRow>,
    pub request: RequestRows,
    pub variables: Vec<FieldRow>,
    pub extract: Vec<FieldRow>,
    pub validate: Vec<ValidatorRow>,
    pub hooks: Vec<HookRow>,
}

fn blank_row(kind: Option<ValueType>) -> FieldRow {
    FieldRow {
        key: String::new(),
        value: Value::String(String::new()),
        desc: String::new(),
        kind,
    }
}

fn or_blank(rows: Vec<FieldRow>, kind: Option<ValueType>) -> Vec<FieldRow> {
    if rows.is_empty() {
        vec![blank_row(kind)]
    } else {
        rows
    }
}

fn typed_row(key: &str, value: &Value, desc: &BTreeMap<String, String>) -> FieldRow {
    let (kind, text) = ValueType::render(value);
    FieldRow {
        key: key.to_string(),
        value: Value::String(text),
        desc: desc.get(key).cloned().unwrap_or_default(),
        kind: Some(kind),
    }
}

fn typed_rows(values: &Map<String, Value>, desc: &BTreeMap<String, String>) -> Vec<FieldRow> {
    let rows = values
        .iter()
        .map(|(key, value)| typed_row(key, value, desc))
        .collect();
    or_blank(rows, Some(ValueType::String))
}

/// Outbound expansion: canonical body to executable request
pub struct ParseService;

impl ParseService {
    /// Decode a stored body and expand it
    pub fn parse_stored(text: &str) -> AppResult<ExecutableRequest> {
        let body = CanonicalBody::decode(text)?;
        Ok(Self::parse(&body))
    }

    pub fn parse(body: &CanonicalBody) -> ExecutableRequest {
        let desc = &body.desc;

        let header = body
            .request
            .headers
            .iter()
            .map(|(key, value)| FieldRow {
                key: key.clone(),
                value: Value::String(value.clone()),
                desc: desc.header.get(key).cloned().unwrap_or_default(),
                kind: None,
            })
            .collect();

        let json = body
            .request
            .json
            .as_ref()
            .and_then(|json| serde_json::to_string_pretty(json).ok())
            .unwrap_or_default();

        let variables = body
            .variables
            .iter()
            .map(|variable| typed_row(&variable.name, &variable.value, &desc.variables))
            .collect();

        let extract = body
            .extract
            .iter()
            .map(|extractor| FieldRow {
                key: extractor.name.clone(),
                value: Value::String(extractor.path.clone()),
                desc: desc.extract.get(&extractor.name).cloned().unwrap_or_default(),
                kind: None,
            })
            .collect();

        let mut validate: Vec<ValidatorRow> = body
            .validate
            .iter()
            .map(|validator| {
                let (kind, expect) = ValueType::render(&validator.expect);
                ValidatorRow {
                    comparator: validator.comparator.clone(),
                    actual: validator.actual.clone(),
                    expect,
                    kind,
                }
            })
            .collect();
        if validate.is_empty() {
            validate.push(ValidatorRow {
                comparator: "equals".to_string(),
                actual: String::new(),
                expect: String::new(),
                kind: ValueType::String,
            });
        }

        let hook_count = body
            .setup_hooks
            .len()
            .max(body.teardown_hooks.len())
            .max(1);
        let hooks = (0..hook_count)
            .map(|i| HookRow {
                setup: body.setup_hooks.get(i).cloned().unwrap_or_default(),
                teardown: body.teardown_hooks.get(i).cloned().unwrap_or_default(),
            })
            .collect();

        ExecutableRequest {
            name: body.name.clone(),
            times: body.times,
            url: body.request.url.clone(),
            method: body.request.method,
            header: or_blank(header, None),
            request: RequestRows {
                form: typed_rows(&body.request.data, &desc.data),
                params: typed_rows(&body.request.params, &desc.params),
                files: typed_rows(&body.request.files, &desc.files),
                json,
            },
            variables: or_blank(variables, Some(ValueType::String)),
            extract: or_blank(extract, None),
            validate,
            hooks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::{ApiPayload, FormatService};
    use serde_json::json;

    fn formatted(value: Value) -> CanonicalBody {
        let payload: ApiPayload = serde_json::from_value(value).unwrap();
        FormatService::format(payload).unwrap().body
    }

    #[test]
    fn test_parse_minimal_body_defaults() {
        let body = CanonicalBody::new("ping", "/ping", HttpMethod::Head);
        let request = ParseService::parse(&body);

        assert_eq!(request.url, "/ping");
        assert_eq!(request.method, HttpMethod::Head);
        assert_eq!(request.times, 1);
        assert_eq!(request.header, vec![blank_row(None)]);
        assert_eq!(request.request.form, vec![blank_row(Some(ValueType::String))]);
        assert_eq!(request.request.json, "");
        assert_eq!(request.validate.len(), 1);
        assert_eq!(request.validate[0].comparator, "equals");
        assert_eq!(
            request.hooks,
            vec![HookRow {
                setup: String::new(),
                teardown: String::new()
            }]
        );
    }

    #[test]
    fn test_parse_keeps_url_and_method() {
        let body = formatted(json!({
            "name": "get user",
            "url": "/api/user",
            "method": "GET",
            "project": 7
        }));
        let request = ParseService::parse(&body);

        assert_eq!(request.url, "/api/user");
        assert_eq!(request.method, HttpMethod::Get);
    }

    #[test]
    fn test_parse_expands_sections() {
        let body = formatted(json!({
            "name": "login",
            "url": "/api/login",
            "method": "POST",
            "project": 1,
            "header": {"header": {"Content-Type": "application/json"}, "desc": {"Content-Type": "json"}},
            "request": {"json": {"user": "alice"}, "params": {"params": {"page": 2}, "desc": {}}},
            "validate": {"validate": [{"equals": ["status_code", 200]}, {"contains": ["content.msg", "ok"]}]},
            "extract": {"extract": [{"token": "content.token"}], "desc": {}},
            "hooks": {"setup_hooks": ["${a()}", "${b()}"], "teardown_hooks": ["${c()}"]}
        }));
        let request = ParseService::parse(&body);

        assert_eq!(request.header[0].key, "Content-Type");
        assert_eq!(request.header[0].desc, "json");
        assert_eq!(request.request.params[0].value, json!("2"));
        assert_eq!(request.request.params[0].kind, Some(ValueType::Integer));
        assert_eq!(
            serde_json::from_str::<Value>(&request.request.json).unwrap(),
            json!({"user": "alice"})
        );
        assert_eq!(request.validate.len(), 2);
        assert_eq!(request.validate[0].expect, "200");
        assert_eq!(request.validate[0].kind, ValueType::Integer);
        assert_eq!(request.validate[1].comparator, "contains");
        assert_eq!(request.extract[0].value, json!("content.token"));
        assert_eq!(request.hooks.len(), 2);
        assert_eq!(request.hooks[1].setup, "${b()}");
        assert_eq!(request.hooks[1].teardown, "");
    }

    #[test]
    fn test_parse_output_formats_back_to_same_body() {
        let body = formatted(json!({
            "name": "order",
            "url": "/api/orders",
            "method": "PUT",
            "project": 3,
            "times": 2,
            "header": {"header": {"X-Token": "t"}, "desc": {"X-Token": "auth"}},
            "request": {
                "form": {"data": {"qty": 3, "price": 9.5, "gift": false}, "desc": {"qty": "count"}},
                "params": {"params": {"ids": [1, 2]}, "desc": {}},
                "json": {"note": "fragile"}
            },
            "variables": {"variables": [{"user": "bob"}, {"opts": {"a": 1}}], "desc": {"user": "who"}},
            "extract": {"extract": [{"id": "content.id"}], "desc": {"id": "order id"}},
            "validate": {"validate": [{"equals": ["status_code", 200]}, {"equals": ["content.ok", true]}]},
            "hooks": {"setup_hooks": ["${login()}"], "teardown_hooks": ["${logout()}", "${clean()}"]}
        }));

        let request = ParseService::parse(&body);
        let mut resubmitted = serde_json::to_value(&request).unwrap();
        resubmitted["project"] = json!(3);

        assert_eq!(formatted(resubmitted), body);
    }

    #[test]
    fn test_list_shapes_with_blanks_and_big_integers_format_back() {
        let body = formatted(json!({
            "name": "bulk",
            "url": "/api/bulk",
            "method": "POST",
            "project": 3,
            "header": {"": "dropped", " X-Trace ": "1"},
            "variables": [{"": 1}, {"limit": 18446744073709551615u64}, {"offset": -1}],
            "hooks": {"setup_hooks": ["", "  ${login()} "], "teardown_hooks": ["   "]}
        }));

        assert_eq!(body.request.headers.len(), 1);
        assert_eq!(body.request.headers["X-Trace"], "1");
        assert_eq!(body.variables.len(), 2);
        assert_eq!(body.variables[0].value, json!(u64::MAX));
        assert_eq!(body.setup_hooks, vec!["${login()}".to_string()]);
        assert!(body.teardown_hooks.is_empty());

        let request = ParseService::parse(&body);
        let mut resubmitted = serde_json::to_value(&request).unwrap();
        resubmitted["project"] = json!(3);

        assert_eq!(formatted(resubmitted), body);
    }

    #[test]
    fn test_parse_stored_rejects_malformed_text() {
        let err = ParseService::parse_stored("{'name': 'eval me'}").unwrap_err();
        assert!(matches!(err, AppError::MalformedBody(_)));

        let text = CanonicalBody::new("ok", "/ok", HttpMethod::Get).encode().unwrap();
        assert_eq!(ParseService::parse_stored(&text).unwrap().url, "/ok");
    }
}
