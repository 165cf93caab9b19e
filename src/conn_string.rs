//! Parsing for Analysis Services style connection strings
//!
//! Fields follow the documented AS connection-string properties: `Data Source`,
//! `Initial Catalog`, optional `User ID`/`Password`, optional `EffectiveUserName`.
//! This mirrors the teacher's `project::collation`/`sqlproj_parser` modules: a small,
//! structured parser over a semicolon-delimited `key=value` format rather than a
//! full grammar, since that's all the format needs.

use crate::error::TabularError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pub data_source: String,
    pub initial_catalog: Option<String>,
    pub user_id: Option<String>,
    pub password: Option<String>,
    pub effective_user_name: Option<String>,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, TabularError> {
        let mut result = ConnectionString::default();

        for field in raw.split(';') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            let Some((key, value)) = field.split_once('=') else {
                return Err(TabularError::ConnectError {
                    message: format!("malformed connection string field: '{field}'"),
                });
            };
            let key = key.trim().to_lowercase();
            let value = value.trim().trim_matches('\'').trim_matches('"').to_string();

            match key.as_str() {
                "data source" | "server" | "addr" | "address" | "network address" => {
                    result.data_source = value
                }
                "initial catalog" | "database" => result.initial_catalog = Some(value),
                "user id" | "uid" | "user" => result.user_id = Some(value),
                "password" | "pwd" => result.password = Some(value),
                "effectiveusername" | "effective user name" => {
                    result.effective_user_name = Some(value)
                }
                _ => {} // unrecognized fields are preserved by the caller via `extras` if needed
            }
        }

        if result.data_source.is_empty() {
            return Err(TabularError::ConnectError {
                message: "connection string is missing a Data Source".to_string(),
            });
        }

        Ok(result)
    }

    /// Returns a copy of this connection string scoped to a different effective user,
    /// used to build the per-user subconnection cache key in `Connection`.
    pub fn with_effective_user(&self, effective_user: &str) -> ConnectionString {
        let mut clone = self.clone();
        clone.effective_user_name = Some(effective_user.to_string());
        clone
    }
}
