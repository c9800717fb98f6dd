//! Redaction categories and the instruction sent to the classifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of personal data the user wants removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Name,
    Email,
    Address,
    #[serde(rename = "Phone Number")]
    PhoneNumber,
}

impl Category {
    /// Canonical order; the instruction always lists categories in this order.
    pub const ALL: [Category; 4] = [
        Category::Name,
        Category::Email,
        Category::Address,
        Category::PhoneNumber,
    ];

    /// Label shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Name => "Name",
            Category::Email => "Email",
            Category::Address => "Address",
            Category::PhoneNumber => "Phone Number",
        }
    }

    /// Plural noun used inside the instruction.
    pub fn classifier_label(&self) -> &'static str {
        match self {
            Category::Name => "names",
            Category::Email => "emails",
            Category::Address => "addresses",
            Category::PhoneNumber => "phone numbers",
        }
    }

    /// Field key expected in the classifier's JSON reply.
    pub fn field_key(&self) -> &'static str {
        match self {
            Category::Name => "Name",
            Category::Email => "Email",
            Category::Address => "Address",
            Category::PhoneNumber => "Phone",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown redaction category: {0:?} (expected Name, Email, Address or Phone Number)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "name" | "names" => Ok(Category::Name),
            "email" | "emails" => Ok(Category::Email),
            "address" | "addresses" => Ok(Category::Address),
            "phone" | "phonenumber" | "phonenumbers" => Ok(Category::PhoneNumber),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

fn canonical(categories: &[Category]) -> Vec<Category> {
    Category::ALL
        .iter()
        .copied()
        .filter(|c| categories.contains(c))
        .collect()
}

/// Field names every classifier entry must carry for this selection, in the
/// order the instruction lists them.
pub fn expected_fields(categories: &[Category]) -> Vec<&'static str> {
    canonical(categories).iter().map(Category::field_key).collect()
}

/// Builds the classifier instruction for the selected categories.
///
/// Returns an empty string when nothing is selected; callers must treat that
/// as "do not run".
pub fn build_system_prompt(categories: &[Category]) -> String {
    let selected = canonical(categories);
    if selected.is_empty() {
        return String::new();
    }

    let labels = selected
        .iter()
        .map(Category::classifier_label)
        .collect::<Vec<_>>()
        .join(", ");

    let entry = selected
        .iter()
        .map(|c| format!("\"{}\": \"\"", c.field_key()))
        .collect::<Vec<_>>()
        .join(",");
    let example = format!("{{\"1\":{{{entry}}}, \"2\":{{{entry}}}}}");

    format!(
        "You are an expert in identifying sensitive information. Extract all {labels} from the following text. \
Output the answer in JSON format, The Key should be the ordinal number of the information found, \
for example '1','2','3' etc. If not found, the corresponding values should be an empty string. \
The output should look like: {example}. Only return the JSON, nothing else."
    )
}
