//! Core types for CNPJ enrichment
//!
//! - Lookup payload (CNPJá `office` response shape)
//! - Lookup collaborator trait and its failure reasons
//! - Classified output records

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cnpj_common::{Category, RunCounters};

// ============================================================================
// Lookup payload
// ============================================================================

/// Company record returned by the lookup service
///
/// Every field is optional and decoded on its own. Absent keys, explicit
/// `null`s and values of an unexpected JSON type all decode to `None`, so one
/// odd field never costs the rest of the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficePayload {
    /// CNPJ as echoed back by the service
    #[serde(default, deserialize_with = "lenient::text")]
    pub tax_id: Option<String>,
    /// Trade name
    #[serde(default, deserialize_with = "lenient::text")]
    pub alias: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub company: Option<CompanyInfo>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub phones: Option<Vec<PhoneEntry>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub emails: Option<Vec<EmailEntry>>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub main_activity: Option<Activity>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub side_activities: Option<Vec<Activity>>,
}

/// Nested company block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    /// Legal name
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhoneEntry {
    /// Area code (DDD), sometimes sent as a number
    #[serde(default, deserialize_with = "lenient::text")]
    pub area: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailEntry {
    #[serde(default, deserialize_with = "lenient::text")]
    pub address: Option<String>,
}

/// Economic activity (CNAE) description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, deserialize_with = "lenient::text")]
    pub text: Option<String>,
}

/// Per-field decoders that map a value of the wrong shape to `None`
mod lenient {
    use serde::de::{DeserializeOwned, Deserializer};
    use serde::Deserialize;
    use serde_json::Value;

    /// Strings as-is, numbers in their JSON spelling
    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            value @ Value::Object(_) => T::deserialize(value).ok(),
            _ => None,
        })
    }

    /// Non-arrays become `None`; entries that do not decode are dropped
    pub fn list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(_) => T::deserialize(item).ok(),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        })
    }
}

// ============================================================================
// Lookup collaborator
// ============================================================================

/// Why a lookup produced no payload
///
/// The pipeline treats every variant as absence; the distinction exists for
/// logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    /// Service answered with a non-2xx status
    #[error("not found (HTTP {0})")]
    NotFound(u16),

    /// Body was not a JSON object of the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Connection, timeout or body read failure
    #[error("transport failure: {0}")]
    Transport(String),
}

impl LookupError {
    /// Short machine-friendly reason, used as a log field
    pub fn reason(&self) -> &'static str {
        match self {
            LookupError::NotFound(_) => "not_found",
            LookupError::Malformed(_) => "malformed",
            LookupError::Transport(_) => "transport",
        }
    }
}

/// Lookup collaborator: given a CNPJ, return a payload or a failure reason
///
/// Implementations do not pace themselves; the pipeline's rate governor
/// spaces calls.
#[async_trait::async_trait]
pub trait CnpjLookup: Send + Sync {
    /// Collaborator name for logs
    fn name(&self) -> &'static str;

    async fn lookup(&self, cnpj: &str) -> Result<OfficePayload, LookupError>;
}

// ============================================================================
// Classified output
// ============================================================================

/// Contact data extracted from a payload, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactRecord {
    pub cnpj: String,
    pub name: String,
    /// `" / "`-joined phone numbers
    pub phone: String,
    /// `" / "`-joined email addresses
    pub email: String,
}

impl ContactRecord {
    /// At least one of phone/email is present
    pub fn has_contact(&self) -> bool {
        !self.phone.is_empty() || !self.email.is_empty()
    }
}

/// One report row
///
/// Field order and names define the CSV header: `cnpj,name,phone,email,status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub cnpj: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    #[serde(rename = "status")]
    pub category: Category,
}

impl ClassifiedRecord {
    /// Row with empty contact fields
    pub fn empty(cnpj: impl Into<String>, category: Category) -> Self {
        Self {
            cnpj: cnpj.into(),
            name: String::new(),
            phone: String::new(),
            email: String::new(),
            category,
        }
    }

    pub fn already_queried(cnpj: impl Into<String>) -> Self {
        Self::empty(cnpj, Category::AlreadyQueried)
    }

    pub fn not_found(cnpj: impl Into<String>) -> Self {
        Self::empty(cnpj, Category::NotFound)
    }

    pub fn from_contact(contact: ContactRecord, category: Category) -> Self {
        Self {
            cnpj: contact.cnpj,
            name: contact.name,
            phone: contact.phone,
            email: contact.email,
            category,
        }
    }
}
