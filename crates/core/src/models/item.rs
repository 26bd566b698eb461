use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SchedulerError};

/// 条目分类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCategory {
    Engineering,
    Data,
    Design,
    Product,
    Marketing,
    Sales,
    Support,
    #[default]
    Other,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 8] = [
        ItemCategory::Engineering,
        ItemCategory::Data,
        ItemCategory::Design,
        ItemCategory::Product,
        ItemCategory::Marketing,
        ItemCategory::Sales,
        ItemCategory::Support,
        ItemCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Engineering => "ENGINEERING",
            ItemCategory::Data => "DATA",
            ItemCategory::Design => "DESIGN",
            ItemCategory::Product => "PRODUCT",
            ItemCategory::Marketing => "MARKETING",
            ItemCategory::Sales => "SALES",
            ItemCategory::Support => "SUPPORT",
            ItemCategory::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let upper = value.to_ascii_uppercase();
        Self::ALL.into_iter().find(|c| c.as_str() == upper)
    }
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 发现的条目（职位等）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveredItem {
    pub id: String,
    pub source: String,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub requirements: Vec<String>,
    pub locator: Option<String>,
    /// 未识别的附加字段原样保留
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub category: ItemCategory,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Worker上报字段的别名，排在前面的优先
const ID_KEYS: [&str; 5] = ["id", "jobId", "job_id", "itemId", "item_id"];
const TITLE_KEYS: [&str; 1] = ["title"];
const ORGANIZATION_KEYS: [&str; 3] = ["organization", "company", "companyName"];
const LOCATION_KEYS: [&str; 1] = ["location"];
const DESCRIPTION_KEYS: [&str; 2] = ["description", "summary"];
const REQUIREMENT_KEYS: [&str; 3] = ["requirements", "skills", "qualifications"];
const LOCATOR_KEYS: [&str; 4] = ["locator", "url", "link", "href"];

impl DiscoveredItem {
    /// 从Worker载荷解析条目
    ///
    /// 缺少ID时由定位URL派生稳定ID；两者都缺失则视为无效条目。
    pub fn from_payload(source: &str, value: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(fields) = value else {
            return Err(SchedulerError::InvalidResultPayload(format!(
                "条目必须是JSON对象, 实际为: {}",
                json_type_name(value)
            )));
        };
        let mut fields = fields.clone();

        let locator = take_text(&mut fields, &LOCATOR_KEYS).map(|l| l.trim().to_string());
        let id = match take_field(&mut fields, &ID_KEYS).as_ref().and_then(id_to_string) {
            Some(id) => id,
            None => match &locator {
                Some(url) => derive_item_id(url),
                None => {
                    return Err(SchedulerError::InvalidResultPayload(
                        "条目缺少ID和定位URL".to_string(),
                    ))
                }
            },
        };
        let title = take_text(&mut fields, &TITLE_KEYS);
        let organization = take_text(&mut fields, &ORGANIZATION_KEYS);
        let location = take_text(&mut fields, &LOCATION_KEYS);
        let description = take_text(&mut fields, &DESCRIPTION_KEYS);
        let requirements = take_field(&mut fields, &REQUIREMENT_KEYS)
            .map(requirement_list)
            .unwrap_or_default();

        let now = Utc::now();
        Ok(Self {
            id,
            source: source.to_string(),
            title,
            organization,
            location,
            description,
            requirements,
            locator,
            attributes: fields,
            category: ItemCategory::Other,
            discovered_at: now,
            updated_at: now,
        })
    }

    /// 用详情结果覆盖已有字段，保留首次发现时间
    pub fn merge_detail(&mut self, detail: DiscoveredItem) {
        if detail.title.is_some() {
            self.title = detail.title;
        }
        if detail.organization.is_some() {
            self.organization = detail.organization;
        }
        if detail.location.is_some() {
            self.location = detail.location;
        }
        if detail.description.is_some() {
            self.description = detail.description;
        }
        if !detail.requirements.is_empty() {
            self.requirements = detail.requirements;
        }
        if detail.locator.is_some() {
            self.locator = detail.locator;
        }
        self.attributes.extend(detail.attributes);
        self.updated_at = detail.updated_at;
    }

    /// 参与分类的文本：标题、描述和要求
    pub fn classification_text(&self) -> String {
        let mut text = String::new();
        for part in [self.title.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
        {
            text.push_str(part);
            text.push(' ');
        }
        text.push_str(&self.requirements.join(" "));
        text.to_lowercase()
    }

    /// 大小写不敏感的子串匹配（标题、机构、描述、要求）
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        let fields = [
            self.title.as_deref(),
            self.organization.as_deref(),
            self.description.as_deref(),
        ];
        fields
            .into_iter()
            .flatten()
            .any(|f| f.to_lowercase().contains(&needle))
            || self
                .requirements
                .iter()
                .any(|r| r.to_lowercase().contains(&needle))
    }
}

/// 由定位URL派生条目ID
pub fn derive_item_id(locator: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, locator.trim().as_bytes())
        .simple()
        .to_string()
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// 移除字段的全部别名，返回第一个非空值
fn take_field(
    fields: &mut serde_json::Map<String, serde_json::Value>,
    keys: &[&str],
) -> Option<serde_json::Value> {
    let mut found = None;
    for key in keys {
        if let Some(value) = fields.remove(*key) {
            if found.is_none() && !is_blank(&value) {
                found = Some(value);
            }
        }
    }
    found
}

fn take_text(
    fields: &mut serde_json::Map<String, serde_json::Value>,
    keys: &[&str],
) -> Option<String> {
    take_field(fields, keys).and_then(|value| match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn requirement_list(value: serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        serde_json::Value::String(s) => s
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
