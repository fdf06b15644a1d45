use crate::{Context, Error, Result};
use std::fmt::{self, Debug, Write};
use url::Url;

/// Drivers whose database is a local file or an in memory instance: their URL
/// is `<driver>://<path>` without user or host.
const FILE_DRIVERS: &[&str] = &["sqlite", "duckdb"];

/// Everything needed to reach a database.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub driver: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: Option<u16>,
    /// Database name, or the file path for file based drivers.
    pub database: String,
}

impl Credentials {
    /// Credentials of a file based database (`sqlite`, `duckdb`).
    pub fn file(driver: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            database: path.into(),
            ..Default::default()
        }
    }

    pub fn is_file_based(&self) -> bool {
        FILE_DRIVERS.contains(&self.driver.as_str())
    }

    /// Connection URL, user and password are percent-encoded.
    pub fn to_url(&self) -> String {
        let mut url = String::with_capacity(64);
        let _ = write!(url, "{}://", self.driver);
        if self.is_file_based() {
            url.push_str(&self.database);
            return url;
        }
        if !self.user.is_empty() {
            url.push_str(&urlencoding::encode(&self.user));
            if !self.password.is_empty() {
                url.push(':');
                url.push_str(&urlencoding::encode(&self.password));
            }
            url.push('@');
        }
        url.push_str(&self.host);
        if let Some(port) = self.port {
            let _ = write!(url, ":{}", port);
        }
        url.push('/');
        url.push_str(&urlencoding::encode(&self.database));
        url
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let context = || format!("Cannot decode the connection URL `{}`", url);
        let Some((driver, rest)) = url.split_once("://") else {
            return Err(Error::msg("Missing the `<driver>://` prefix").context(context()));
        };
        if FILE_DRIVERS.contains(&driver) {
            let database = rest.split_once('?').map_or(rest, |(path, _)| path);
            return Ok(Self::file(driver, database));
        }
        let parsed = Url::parse(url).with_context(context)?;
        let decode = |v: &str| {
            urlencoding::decode(v)
                .map(|v| v.into_owned())
                .with_context(context)
        };
        Ok(Self {
            driver: driver.to_string(),
            user: decode(parsed.username())?,
            password: decode(parsed.password().unwrap_or_default())?,
            host: parsed.host_str().unwrap_or_default().to_string(),
            port: parsed.port(),
            database: decode(parsed.path().trim_start_matches('/'))?,
        })
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("driver", &self.driver)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}
