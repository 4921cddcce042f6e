//! SIP account identity.

use serde::{Deserialize, Serialize};

const AUTH_PASS_FLAG: &str = "auth_pass=";

fn default_port() -> u16 {
    5060
}

/// The account baresip registers with.
///
/// Add `regint=0` to `flags` to suppress registration. The password is
/// sent to baresip as an `auth_pass=` URI parameter.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user: String,
    pub password: String,
    pub gateway: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub flags: Vec<String>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            gateway: String::new(),
            port: default_port(),
            flags: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("gateway", &self.gateway)
            .field("port", &self.port)
            .field("flags", &self.flags)
            .finish()
    }
}

impl Identity {
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        gateway: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            gateway: gateway.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Whether enough is set to register an account.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.user.is_empty() && !self.gateway.is_empty()
    }

    /// The identity as a `sip:` address with its flags.
    ///
    /// The password flag goes on a copy of the flags, so repeated calls
    /// never accumulate `auth_pass=` entries.
    #[must_use]
    pub fn sip(&self) -> String {
        let flags: Vec<String> = self
            .flags
            .iter()
            .filter(|flag| !flag.starts_with(AUTH_PASS_FLAG))
            .cloned()
            .chain(std::iter::once(format!("{AUTH_PASS_FLAG}{}", self.password)))
            .collect();
        format!(
            "sip:{}@{}:{};{}",
            self.user,
            self.gateway,
            self.port,
            flags.join(";")
        )
    }

    /// `user@gateway:port`, safe to log.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}@{}:{}", self.user, self.gateway, self.port)
    }
}
