//! Request shapes for the two query families (category and keyword trends).
//!
//! Every shape is declared once here: the typed structs serialize directly to
//! the upstream wire body, `from_args` validates raw tool arguments into them,
//! and the `*_schema` functions advertise the same value tables to agents.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ValidationError;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid date regex"));

/// Closed set of string values accepted for an argument.
pub trait Choice: Copy + Sized + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    /// Extra spellings accepted on input, never emitted.
    fn alias(_raw: &str) -> Option<Self> {
        None
    }

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|value| value.as_str() == raw)
            .or_else(|| Self::alias(raw))
    }

    fn values() -> Vec<&'static str> {
        Self::ALL.iter().map(|value| value.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Date,
    Week,
    Month,
}

impl Choice for TimeUnit {
    const ALL: &'static [Self] = &[TimeUnit::Date, TimeUnit::Week, TimeUnit::Month];

    fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Date => "date",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
        }
    }

    fn alias(raw: &str) -> Option<Self> {
        (raw == "day").then_some(TimeUnit::Date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Pc,
    Mobile,
    All,
}

impl Choice for Device {
    const ALL: &'static [Self] = &[Device::Pc, Device::Mobile, Device::All];

    fn as_str(self) -> &'static str {
        match self {
            Device::Pc => "pc",
            Device::Mobile => "mobile",
            Device::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
    #[serde(rename = "a")]
    All,
}

impl Choice for Gender {
    const ALL: &'static [Self] = &[Gender::Male, Gender::Female, Gender::All];

    fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "m",
            Gender::Female => "f",
            Gender::All => "a",
        }
    }

    fn alias(raw: &str) -> Option<Self> {
        match raw {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "all" => Some(Gender::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBucket {
    #[serde(rename = "10")]
    Teens,
    #[serde(rename = "20")]
    Twenties,
    #[serde(rename = "30")]
    Thirties,
    #[serde(rename = "40")]
    Forties,
    #[serde(rename = "50")]
    Fifties,
    #[serde(rename = "60")]
    SixtiesPlus,
}

impl Choice for AgeBucket {
    const ALL: &'static [Self] = &[
        AgeBucket::Teens,
        AgeBucket::Twenties,
        AgeBucket::Thirties,
        AgeBucket::Forties,
        AgeBucket::Fifties,
        AgeBucket::SixtiesPlus,
    ];

    fn as_str(self) -> &'static str {
        match self {
            AgeBucket::Teens => "10",
            AgeBucket::Twenties => "20",
            AgeBucket::Thirties => "30",
            AgeBucket::Forties => "40",
            AgeBucket::Fifties => "50",
            AgeBucket::SixtiesPlus => "60",
        }
    }
}

/// A labelled set of upstream codes (category ids or keywords).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamGroup {
    pub name: String,
    pub param: Vec<String>,
}

impl ParamGroup {
    pub fn new(name: impl Into<String>, param: &[&str]) -> Self {
        Self {
            name: name.into(),
            param: param.iter().map(|code| code.to_string()).collect(),
        }
    }
}

/// Query window shared by both families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start_date: String,
    pub end_date: String,
    pub time_unit: TimeUnit,
}

/// Optional demographic/device filters. Absent fields stay off the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Segment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ages: Option<Vec<AgeBucket>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryQuery {
    #[serde(flatten)]
    pub period: Period,
    pub category: Vec<ParamGroup>,
    #[serde(flatten)]
    pub segment: Segment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordQuery {
    #[serde(flatten)]
    pub period: Period,
    pub category: String,
    pub keyword: Vec<ParamGroup>,
    #[serde(flatten)]
    pub segment: Segment,
}

/// Tool argument carrying the category groups (wire name: `category`).
pub const CATEGORIES_ARG: &str = "categories";
/// Tool argument carrying the keyword groups (wire name: `keyword`).
pub const KEYWORDS_ARG: &str = "keywords";

impl CategoryQuery {
    pub fn from_args(args: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self {
            period: Period::from_args(args)?,
            category: param_groups(args, CATEGORIES_ARG)?,
            segment: Segment::from_args(args)?,
        })
    }
}

impl KeywordQuery {
    pub fn from_args(args: &Map<String, Value>) -> Result<Self, ValidationError> {
        let period = Period::from_args(args)?;
        let category = match args.get("category") {
            None | Some(Value::Null) => return Err(ValidationError::missing("category")),
            Some(Value::String(code)) => code.clone(),
            Some(_) => return Err(ValidationError::wrong_type("category", "a string")),
        };
        Ok(Self {
            period,
            category,
            keyword: param_groups(args, KEYWORDS_ARG)?,
            segment: Segment::from_args(args)?,
        })
    }
}

impl Period {
    pub fn new(start_date: &str, end_date: &str, time_unit: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            start_date: date(start_date, "startDate")?,
            end_date: date(end_date, "endDate")?,
            time_unit: TimeUnit::parse(time_unit)
                .ok_or_else(|| not_one_of::<TimeUnit>("timeUnit"))?,
        })
    }

    fn from_args(args: &Map<String, Value>) -> Result<Self, ValidationError> {
        let start_date = required_str(args, "startDate")?;
        let end_date = required_str(args, "endDate")?;
        let time_unit = required_str(args, "timeUnit")?;
        Self::new(start_date, end_date, time_unit)
    }
}

impl Segment {
    fn from_args(args: &Map<String, Value>) -> Result<Self, ValidationError> {
        let ages_key = if args.contains_key("ages") {
            "ages"
        } else {
            "ageBuckets"
        };
        Ok(Self {
            device: optional_choice(args, "device")?,
            gender: optional_choice(args, "gender")?,
            ages: optional_ages(args, ages_key)?,
        })
    }
}

fn date(raw: &str, field: &str) -> Result<String, ValidationError> {
    if DATE_RE.is_match(raw) {
        Ok(raw.to_string())
    } else {
        Err(ValidationError::new(
            field,
            format!("'{field}' must be a date in YYYY-MM-DD format (got '{raw}')"),
        ))
    }
}

fn not_one_of<T: Choice>(field: &str) -> ValidationError {
    ValidationError::new(
        field,
        format!("'{field}' must be one of: {}", T::values().join(", ")),
    )
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, ValidationError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(ValidationError::missing(key)),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(ValidationError::wrong_type(key, "a string")),
    }
}

fn optional_choice<T: Choice>(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<T>, ValidationError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => T::parse(raw).map(Some).ok_or_else(|| not_one_of::<T>(key)),
        Some(_) => Err(ValidationError::wrong_type(key, "a string")),
    }
}

fn optional_ages(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<AgeBucket>>, ValidationError> {
    let items = match args.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ValidationError::wrong_type(key, "an array of age buckets")),
    };
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        // Agents frequently send bare integers; coerce them to the string form.
        let raw = match item {
            Value::String(raw) => raw.clone(),
            Value::Number(number) if number.is_u64() => number.to_string(),
            _ => {
                return Err(ValidationError::wrong_type(
                    &format!("{key}[{index}]"),
                    "a string",
                ));
            }
        };
        let bucket = AgeBucket::parse(&raw)
            .ok_or_else(|| not_one_of::<AgeBucket>(&format!("{key}[{index}]")))?;
        out.push(bucket);
    }
    Ok(Some(out))
}

fn param_groups(args: &Map<String, Value>, key: &str) -> Result<Vec<ParamGroup>, ValidationError> {
    let items = match args.get(key) {
        None | Some(Value::Null) => return Err(ValidationError::missing(key)),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::wrong_type(
                key,
                "an array of {name, param} objects",
            ));
        }
    };

    let mut groups = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let field = format!("{key}[{index}]");
        let obj = item
            .as_object()
            .ok_or_else(|| ValidationError::wrong_type(&field, "an object"))?;

        let name = match obj.get("name") {
            Some(Value::String(name)) => name.clone(),
            None | Some(Value::Null) => {
                return Err(ValidationError::missing(&format!("{field}.name")));
            }
            Some(_) => {
                return Err(ValidationError::wrong_type(&format!("{field}.name"), "a string"));
            }
        };

        let param_field = format!("{field}.param");
        let codes = match obj.get("param") {
            Some(Value::Array(codes)) => codes,
            None | Some(Value::Null) => return Err(ValidationError::missing(&param_field)),
            Some(_) => {
                return Err(ValidationError::wrong_type(&param_field, "an array of strings"));
            }
        };
        let param = codes
            .iter()
            .map(|code| code.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ValidationError::wrong_type(&param_field, "an array of strings"))?;

        groups.push(ParamGroup { name, param });
    }
    Ok(groups)
}

fn period_properties() -> Map<String, Value> {
    let date = json!({
        "type": "string",
        "pattern": "^\\d{4}-\\d{2}-\\d{2}$",
        "description": "Date in YYYY-MM-DD format"
    });
    let mut properties = Map::new();
    properties.insert("startDate".to_string(), date.clone());
    properties.insert("endDate".to_string(), date);
    properties.insert(
        "timeUnit".to_string(),
        json!({
            "type": "string",
            "enum": TimeUnit::values(),
            "description": "Bucket size for each data point"
        }),
    );
    properties
}

fn segment_properties() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "device".to_string(),
        json!({ "type": "string", "enum": Device::values() }),
    );
    properties.insert(
        "gender".to_string(),
        json!({
            "type": "string",
            "enum": Gender::values(),
            "description": "m = male, f = female, a = all"
        }),
    );
    properties.insert(
        "ages".to_string(),
        json!({
            "type": "array",
            "items": { "type": "string", "enum": AgeBucket::values() }
        }),
    );
    properties
}

fn param_group_array_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "description": description,
        "items": {
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "param": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["name", "param"]
        }
    })
}

/// JSON Schema for tools taking a [`CategoryQuery`].
pub fn category_query_schema() -> Value {
    let mut properties = period_properties();
    properties.insert(
        CATEGORIES_ARG.to_string(),
        param_group_array_schema("Category groups: display name plus upstream category codes"),
    );
    properties.extend(segment_properties());
    json!({
        "type": "object",
        "properties": properties,
        "required": ["startDate", "endDate", "timeUnit", CATEGORIES_ARG]
    })
}

/// JSON Schema for tools taking a [`KeywordQuery`].
pub fn keyword_query_schema() -> Value {
    let mut properties = period_properties();
    properties.insert(
        "category".to_string(),
        json!({ "type": "string", "description": "Upstream category code the keywords belong to" }),
    );
    properties.insert(
        KEYWORDS_ARG.to_string(),
        param_group_array_schema("Keyword groups: display name plus search keywords"),
    );
    properties.extend(segment_properties());
    json!({
        "type": "object",
        "properties": properties,
        "required": ["startDate", "endDate", "timeUnit", "category", KEYWORDS_ARG]
    })
}
