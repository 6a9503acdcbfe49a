//! Values resolved by the database service rather than the client.

use bson::{Bson, doc};

use crate::errors::CloudError;

/// Placeholder for the server's clock at write time, shifted by `offset_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerDate {
    pub offset_ms: i64,
}

impl ServerDate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_offset(offset_ms: i64) -> Self {
        Self { offset_ms }
    }
}

impl From<ServerDate> for Bson {
    fn from(d: ServerDate) -> Self {
        Bson::Document(doc! { "$serverDate": { "offset": d.offset_ms } })
    }
}

const REGEX_OPTIONS: &[char] = &['i', 'm', 's', 'x', 'u'];

/// A regular-expression match evaluated by the database service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbRegExp {
    regexp: String,
    options: String,
}

impl DbRegExp {
    pub fn new(regexp: impl Into<String>, options: impl Into<String>) -> Result<Self, CloudError> {
        let regexp = regexp.into();
        let options = options.into();
        if regexp.is_empty() {
            return Err(CloudError::invalid("regexp must not be empty"));
        }
        if let Some(c) = options.chars().find(|c| !REGEX_OPTIONS.contains(c)) {
            return Err(CloudError::invalid(format!("unknown regexp option: {c}")));
        }
        #[cfg(feature = "regex")]
        regex::Regex::new(&regexp)
            .map_err(|e| CloudError::invalid(format!("invalid regexp: {e}")))?;
        Ok(Self { regexp, options })
    }

    pub fn regexp(&self) -> &str {
        &self.regexp
    }

    pub fn options(&self) -> &str {
        &self.options
    }
}

impl From<DbRegExp> for Bson {
    fn from(r: DbRegExp) -> Self {
        Bson::Document(doc! { "$regex": r.regexp, "$options": r.options })
    }
}
