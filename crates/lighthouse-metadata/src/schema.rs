//! Published-content metadata schema
//!
//! A resolved payload is accepted when it is a JSON object carrying every
//! field in [`REQUIRED_FIELDS`] as a string and a non-empty `sources` map.
//! Optional fields are type-checked only when present. Unknown fields pass
//! through unless the validator is built with [`SchemaValidator::strict`].

use lighthouse_core::SchemaError;
use lighthouse_core::ValidatedMetadata;
use lighthouse_core::traits::MetadataValidator;
use serde_json::{Map, Value};

/// String fields every metadata payload must carry
pub const REQUIRED_FIELDS: &[&str] = &[
    "title",
    "description",
    "author",
    "language",
    "license",
    "content-type",
];

/// Metadata versions the validator understands
pub const KNOWN_VERSIONS: &[&str] = &["0.0.1", "0.0.2", "0.0.3"];

const OPTIONAL_STRING_FIELDS: &[&str] = &["thumbnail", "preview", "license_url", "pubkey"];
const OTHER_KNOWN_FIELDS: &[&str] = &["sources", "ver", "nsfw", "fee", "txid"];

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator {
    strict: bool,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject fields the schema does not name
    pub fn strict() -> Self {
        Self { strict: true }
    }

    fn check(&self, fields: &Map<String, Value>) -> Result<(), SchemaError> {
        for field in REQUIRED_FIELDS {
            match fields.get(*field) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(SchemaError::new(format!("{} must be a string", field))),
                None => return Err(SchemaError::new(format!("missing field {}", field))),
            }
        }

        check_sources(fields.get("sources"))?;

        if let Some(ver) = fields.get("ver") {
            match ver.as_str() {
                Some(v) if KNOWN_VERSIONS.contains(&v) => {}
                Some(v) => return Err(SchemaError::new(format!("unknown version {}", v))),
                None => return Err(SchemaError::new("ver must be a string")),
            }
        }

        for field in OPTIONAL_STRING_FIELDS {
            if let Some(value) = fields.get(*field)
                && !value.is_string()
            {
                return Err(SchemaError::new(format!("{} must be a string", field)));
            }
        }

        if let Some(nsfw) = fields.get("nsfw")
            && !nsfw.is_boolean()
        {
            return Err(SchemaError::new("nsfw must be a boolean"));
        }

        if let Some(fee) = fields.get("fee") {
            check_fee(fee)?;
        }

        if self.strict
            && let Some(unknown) = fields.keys().find(|k| !is_known_field(k))
        {
            return Err(SchemaError::new(format!("unknown field {}", unknown)));
        }

        Ok(())
    }
}

impl MetadataValidator for SchemaValidator {
    fn validate(&self, payload: &Value) -> Result<ValidatedMetadata, SchemaError> {
        let fields = payload
            .as_object()
            .ok_or_else(|| SchemaError::new("metadata is not an object"))?;

        self.check(fields)?;

        Ok(ValidatedMetadata::new(fields.clone()))
    }
}

fn is_known_field(key: &str) -> bool {
    REQUIRED_FIELDS.contains(&key)
        || OPTIONAL_STRING_FIELDS.contains(&key)
        || OTHER_KNOWN_FIELDS.contains(&key)
}

// sources: { "<stream type>": "<stream hash>", ... }, at least one entry
fn check_sources(sources: Option<&Value>) -> Result<(), SchemaError> {
    let sources = match sources {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(SchemaError::new("sources must be an object")),
        None => return Err(SchemaError::new("missing field sources")),
    };

    if sources.is_empty() {
        return Err(SchemaError::new("sources is empty"));
    }
    if let Some((key, _)) = sources.iter().find(|(_, v)| !v.is_string()) {
        return Err(SchemaError::new(format!("source {} must be a string", key)));
    }
    Ok(())
}

// fee: { "<currency>": { "amount": <number>, "address": "<string>" } }
fn check_fee(fee: &Value) -> Result<(), SchemaError> {
    let currencies = fee
        .as_object()
        .ok_or_else(|| SchemaError::new("fee must be an object"))?;

    for (currency, terms) in currencies {
        let amount = terms.get("amount").and_then(Value::as_f64);
        match amount {
            Some(a) if a >= 0.0 => {}
            Some(_) => {
                return Err(SchemaError::new(format!(
                    "fee amount for {} is negative",
                    currency
                )));
            }
            None => {
                return Err(SchemaError::new(format!(
                    "fee for {} needs a numeric amount",
                    currency
                )));
            }
        }
        if !terms.get("address").is_some_and(Value::is_string) {
            return Err(SchemaError::new(format!(
                "fee for {} needs an address",
                currency
            )));
        }
    }
    Ok(())
}
