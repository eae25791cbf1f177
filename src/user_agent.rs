use std::sync::OnceLock;

use regex::Regex;

use crate::{RequestSessionError, Result};

const USER_AGENT_PATTERN: &str = r"^(?P<service_name>\S.+?)/(?P<version>\S.+?) \((?P<organization>\S.+?) (?P<environment>\S.+?)\)(?: ?(?P<sys_info>.*))$";

fn user_agent_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(USER_AGENT_PATTERN).expect("user agent pattern is a valid regex")
    })
}

/// Parts of a `service/version (organization environment) sys_info` User-Agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAgentComponents {
    pub service_name: String,
    pub version: String,
    pub organization: String,
    pub environment: String,
    pub sys_info: Option<String>,
}

impl UserAgentComponents {
    pub fn new(
        service_name: impl Into<String>,
        version: impl Into<String>,
        organization: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            version: version.into(),
            organization: organization.into(),
            environment: environment.into(),
            sys_info: None,
        }
    }

    pub fn with_sys_info(mut self, sys_info: impl Into<String>) -> Self {
        self.sys_info = Some(sys_info.into());
        self
    }

    /// Renders and validates the User-Agent header value.
    pub fn to_header_value(&self) -> Result<String> {
        let rendered = format!(
            "{}/{} ({} {}) {}",
            self.service_name,
            self.version,
            self.organization,
            self.environment,
            self.sys_info.as_deref().unwrap_or_default()
        );
        let rendered = rendered.trim().to_owned();

        if !user_agent_pattern().is_match(&rendered) {
            return Err(RequestSessionError::InvalidUserAgent(format!(
                "provided User-Agent string is not valid: {rendered:?}"
            )));
        }
        Ok(rendered)
    }
}
