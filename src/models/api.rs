use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::models::CanonicalBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("unsupported HTTP method `{}`", other)),
        }
    }
}

/// Debug state of an API definition, stored as a small integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiTag {
    #[default]
    Untested,
    Passed,
    Failed,
    AutoPassed,
}

impl ApiTag {
    pub fn code(&self) -> i16 {
        match self {
            ApiTag::Untested => 0,
            ApiTag::Passed => 1,
            ApiTag::Failed => 2,
            ApiTag::AutoPassed => 3,
        }
    }

    /// Unknown codes read back as `Untested`
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => ApiTag::Passed,
            2 => ApiTag::Failed,
            3 => ApiTag::AutoPassed,
            _ => ApiTag::Untested,
        }
    }
}

impl FromStr for ApiTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "untested" | "0" => Ok(ApiTag::Untested),
            "passed" | "1" => Ok(ApiTag::Passed),
            "failed" | "2" => Ok(ApiTag::Failed),
            "auto_passed" | "3" => Ok(ApiTag::AutoPassed),
            other => Err(format!("unknown tag `{}`", other)),
        }
    }
}

/// Environment an API definition is exercised against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RigEnv {
    #[default]
    Test,
    Production,
    Staging,
}

impl RigEnv {
    pub fn code(&self) -> i16 {
        match self {
            RigEnv::Test => 0,
            RigEnv::Production => 1,
            RigEnv::Staging => 2,
        }
    }

    pub fn from_code(code: i16) -> Self {
        match code {
            1 => RigEnv::Production,
            2 => RigEnv::Staging,
            _ => RigEnv::Test,
        }
    }
}

impl FromStr for RigEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "test" | "0" => Ok(RigEnv::Test),
            "production" | "1" => Ok(RigEnv::Production),
            "staging" | "2" => Ok(RigEnv::Staging),
            other => Err(format!("unknown rig environment `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Api {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub body: String, // versioned canonical body, see CanonicalBody::encode
    pub url: String,
    pub method: String,
    pub relation: i32,
    pub tag: ApiTag,
    pub rig_id: Option<i32>,
    pub rig_env: RigEnv,
    pub creator: Option<String>,
    pub updater: Option<String>,
    pub deleted: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Normalized API definition ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ApiDraft {
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    pub project_id: i32,
    pub relation: i32,
    pub rig_id: Option<i32>,
    pub rig_env: RigEnv,
    pub body: CanonicalBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!(" Patch ".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert!("FETCH".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_tag_codes() {
        for tag in [
            ApiTag::Untested,
            ApiTag::Passed,
            ApiTag::Failed,
            ApiTag::AutoPassed,
        ] {
            assert_eq!(ApiTag::from_code(tag.code()), tag);
        }
        assert_eq!(ApiTag::from_code(42), ApiTag::Untested);
        assert_eq!("auto_passed".parse::<ApiTag>(), Ok(ApiTag::AutoPassed));
        assert!("green".parse::<ApiTag>().is_err());
    }

    #[test]
    fn test_rig_env_parsing() {
        assert_eq!("staging".parse::<RigEnv>(), Ok(RigEnv::Staging));
        assert_eq!("1".parse::<RigEnv>(), Ok(RigEnv::Production));
        assert_eq!(RigEnv::from_code(RigEnv::Staging.code()), RigEnv::Staging);
    }
}
