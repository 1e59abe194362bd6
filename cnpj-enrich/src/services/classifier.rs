//! Payload classification
//!
//! Maps a lookup payload to a business category and a contact record, then
//! applies the contact-presence rule that decides whether the row survives.

use crate::types::{Category, ClassifiedRecord, ContactRecord, OfficePayload};

/// Activity keyword marking a software developer (case-insensitive)
pub const DEVELOPER_KEYWORD: &str = "desenvolvimento";

/// Separator for multi-valued phone/email fields
pub const MULTI_VALUE_SEPARATOR: &str = " / ";

/// Classify a lookup payload
///
/// Absence yields `(NotFound, None)`. Missing nested blocks degrade to empty
/// strings and lists; this never fails.
pub fn classify(payload: Option<&OfficePayload>) -> (Category, Option<ContactRecord>) {
    let Some(data) = payload else {
        return (Category::NotFound, None);
    };

    let contact = ContactRecord {
        cnpj: data.tax_id.clone().unwrap_or_default(),
        name: display_name(data),
        phone: format_phones(data),
        email: format_emails(data),
    };

    let category = if is_developer(data) {
        Category::Developer
    } else {
        Category::NonDeveloper
    };

    (category, Some(contact))
}

/// Apply the contact-presence rule
///
/// A classified contact is kept only if it carries a CNPJ and at least one
/// phone or email. Otherwise the row is `NotFound` with empty contact fields,
/// keyed by the queried identifier.
pub fn finalize_record(
    queried_cnpj: &str,
    category: Category,
    contact: Option<ContactRecord>,
) -> ClassifiedRecord {
    match contact {
        Some(contact) if !contact.cnpj.is_empty() && contact.has_contact() => {
            ClassifiedRecord::from_contact(contact, category)
        }
        _ => ClassifiedRecord::not_found(queried_cnpj),
    }
}

/// Alias first, then the company's legal name
fn display_name(data: &OfficePayload) -> String {
    data.alias
        .as_deref()
        .filter(|alias| !alias.is_empty())
        .or_else(|| data.company.as_ref().and_then(|c| c.name.as_deref()))
        .unwrap_or_default()
        .to_string()
}

/// `(area) number` for every entry that has both parts
fn format_phones(data: &OfficePayload) -> String {
    data.phones
        .iter()
        .flatten()
        .filter_map(|phone| match (phone.area.as_deref(), phone.number.as_deref()) {
            (Some(area), Some(number)) if !area.is_empty() && !number.is_empty() => {
                Some(format!("({}) {}", area, number))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(MULTI_VALUE_SEPARATOR)
}

fn format_emails(data: &OfficePayload) -> String {
    data.emails
        .iter()
        .flatten()
        .filter_map(|email| email.address.as_deref())
        .filter(|address| !address.is_empty())
        .collect::<Vec<_>>()
        .join(MULTI_VALUE_SEPARATOR)
}

/// Main activity plus every side activity, searched for the keyword
fn is_developer(data: &OfficePayload) -> bool {
    let main = data.main_activity.iter().filter_map(|a| a.text.as_deref());
    let side = data
        .side_activities
        .iter()
        .flatten()
        .filter_map(|a| a.text.as_deref());

    main.chain(side)
        .any(|text| text.to_lowercase().contains(DEVELOPER_KEYWORD))
}
