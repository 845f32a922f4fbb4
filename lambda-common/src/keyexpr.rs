//! Mapping between bus paths and Zenoh key expressions.
//!
//! Key expressions follow the pattern
//! `<prefix>/<service>/<path>` where `<path>` is the bus path without its
//! leading slash. External writes arrive on `<prefix>/<service>/@/set/<path>`.

use crate::error::{Error, Result};

/// Default key expression prefix.
pub const DEFAULT_KEY_PREFIX: &str = "lambda";

/// Bus service name for a device instance, e.g. `lambda_40`.
pub fn service_name(device_instance: u32) -> String {
    format!("lambda_{:02}", device_instance)
}

/// Builder for the bridge's key expressions.
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
    service: String,
}

impl KeyExprBuilder {
    pub fn new(prefix: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            service: service.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Key expression for a bus path.
    ///
    /// # Example
    /// ```
    /// use lambda_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("lambda", "lambda_40");
    /// assert_eq!(builder.build("/Ac/Power").unwrap(), "lambda/lambda_40/Ac/Power");
    /// ```
    pub fn build(&self, path: &str) -> Result<String> {
        Ok(format!(
            "{}/{}/{}",
            self.prefix,
            self.service,
            path_segments(path)?
        ))
    }

    /// Key expression an external writer uses to set a bus path.
    pub fn set_key(&self, path: &str) -> Result<String> {
        Ok(format!(
            "{}/{}/@/set/{}",
            self.prefix,
            self.service,
            path_segments(path)?
        ))
    }

    /// Wildcard matching every external write for this service.
    ///
    /// # Example
    /// ```
    /// use lambda_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("lambda", "lambda_40");
    /// assert_eq!(builder.set_wildcard(), "lambda/lambda_40/@/set/**");
    /// ```
    pub fn set_wildcard(&self) -> String {
        format!("{}/{}/@/set/**", self.prefix, self.service)
    }

    /// Key expression for bridge status.
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.prefix)
    }

    /// Recover the bus path from an external write key.
    ///
    /// Returns `None` if the key is not a set key of this service.
    pub fn parse_set_key(&self, key: &str) -> Option<String> {
        let rest = key
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')?
            .strip_prefix(self.service.as_str())?
            .strip_prefix("/@/set/")?;
        if rest.is_empty() {
            return None;
        }
        Some(format!("/{}", rest))
    }
}

/// Strip the leading slash from a bus path and check it is usable as a key.
fn path_segments(path: &str) -> Result<&str> {
    let trimmed = path
        .strip_prefix('/')
        .ok_or_else(|| Error::Path(path.to_string()))?;

    let valid = !trimmed.is_empty()
        && trimmed.split('/').all(|segment| {
            !segment.is_empty() && !segment.contains(['*', '$', '?', '#', '@'])
        });

    if valid {
        Ok(trimmed)
    } else {
        Err(Error::Path(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_is_zero_padded() {
        assert_eq!(service_name(7), "lambda_07");
        assert_eq!(service_name(40), "lambda_40");
        assert_eq!(service_name(123), "lambda_123");
    }

    #[test]
    fn test_key_builder() {
        let builder = KeyExprBuilder::new("lambda", "lambda_40");

        assert_eq!(
            builder.build("/Ac/Energy/Forward").unwrap(),
            "lambda/lambda_40/Ac/Energy/Forward"
        );
        assert_eq!(
            builder.set_key("/State").unwrap(),
            "lambda/lambda_40/@/set/State"
        );
        assert_eq!(builder.status_key(), "lambda/@/status");
    }

    #[test]
    fn test_invalid_paths() {
        let builder = KeyExprBuilder::new("lambda", "lambda_40");

        assert!(builder.build("State").is_err());
        assert!(builder.build("/").is_err());
        assert!(builder.build("/Ac//Power").is_err());
        assert!(builder.build("/Ac/*").is_err());
    }

    #[test]
    fn test_parse_set_key() {
        let builder = KeyExprBuilder::new("lambda", "lambda_40");

        assert_eq!(
            builder.parse_set_key("lambda/lambda_40/@/set/Ac/Power"),
            Some("/Ac/Power".to_string())
        );
        assert_eq!(builder.parse_set_key("lambda/lambda_41/@/set/State"), None);
        assert_eq!(builder.parse_set_key("lambda/lambda_40/State"), None);
        assert_eq!(builder.parse_set_key("lambda/lambda_40/@/set/"), None);
    }
}
