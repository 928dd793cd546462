use std::{collections::HashSet, time::Duration};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;

use crate::{model::InstanceId, prelude::*};
use super::HttpHost;


#[derive(Debug, confique::Config)]
pub(crate) struct OpencastConfig {
    /// All Opencast instances this service talks to. Each instance needs a
    /// unique numeric `id`, which is what course/series mappings refer to.
    /// At most one instance can be marked as `default`; if none is, the
    /// first one is the default.
    ///
    /// Some HTTP requests to Opencast contain the unencrypted password, so
    /// using HTTPS is strongly encouraged. In fact, HTTP is only allowed if
    /// the host resolves to a loopback address.
    ///
    /// Example:
    ///
    ///     [[opencast.instances]]
    ///     id = 1
    ///     name = "Main"
    ///     host = "https://oc.my-uni.edu"
    ///     user = "admin"
    ///     password = "opencast"
    ///     default = true
    ///     lti = { consumer_key = "CONSUMERKEY", consumer_secret = "CONSUMERSECRET" }
    pub(crate) instances: Vec<InstanceConfig>,

    /// Timeout for each request to Opencast.
    #[config(default = "30s", deserialize_with = crate::config::deserialize_duration)]
    pub(crate) timeout: Duration,
}

/// One configured Opencast instance.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct InstanceConfig {
    pub(crate) id: InstanceId,

    /// Human readable name, only used in logs and the `check` output.
    #[serde(default)]
    pub(crate) name: Option<String>,

    /// Scheme and authority of the node running the external API.
    pub(crate) host: HttpHost,

    /// User for the external API. Needs permission to list and delete events.
    pub(crate) user: String,

    pub(crate) password: SecretString,

    #[serde(default)]
    pub(crate) default: bool,

    /// Credentials for LTI launches into tools of this instance. LTI
    /// launches are unavailable if this is not set.
    #[serde(default)]
    pub(crate) lti: Option<LtiCredentials>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LtiCredentials {
    pub(crate) consumer_key: String,
    pub(crate) consumer_secret: SecretString,
}

impl InstanceConfig {
    /// Name for logs: the configured name or the ID.
    pub(crate) fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("'{name}' (ID {})", self.id),
            None => format!("ID {}", self.id),
        }
    }

    pub(crate) fn basic_auth_header(&self) -> SecretString {
        use base64::Engine as _;

        let credentials = format!("{}:{}", self.user, self.password.expose_secret());
        let encoded_credentials = base64::engine::general_purpose::STANDARD.encode(credentials);
        SecretString::from(format!("Basic {encoded_credentials}"))
    }
}

impl OpencastConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.instances.is_empty() {
            bail!("no Opencast instance configured: 'opencast.instances' must not be empty");
        }

        let mut seen = HashSet::new();
        for instance in &self.instances {
            if !seen.insert(instance.id) {
                bail!("duplicate Opencast instance ID {} in 'opencast.instances'", instance.id);
            }
        }

        let defaults = self.instances.iter().filter(|i| i.default).count();
        if defaults > 1 {
            bail!("{defaults} Opencast instances are marked as 'default', but at most one may be");
        }

        Ok(())
    }

    pub(crate) fn default_instance(&self) -> Option<&InstanceConfig> {
        self.instances.iter().find(|i| i.default).or(self.instances.first())
    }

    pub(crate) fn instance(&self, id: InstanceId) -> Option<&InstanceConfig> {
        self.instances.iter().find(|i| i.id == id)
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;
    use secrecy::{ExposeSecret as _, SecretString};

    use crate::model::InstanceId;
    use super::{InstanceConfig, OpencastConfig};

    fn instance(id: i32, default: bool) -> InstanceConfig {
        InstanceConfig {
            id: InstanceId(id),
            name: None,
            host: "https://oc.my-uni.edu".parse().unwrap(),
            user: "admin".into(),
            password: SecretString::from("opencast"),
            default,
            lti: None,
        }
    }

    fn config(instances: Vec<InstanceConfig>) -> OpencastConfig {
        OpencastConfig { instances, timeout: Duration::from_secs(30) }
    }

    #[test]
    fn validate_ok() {
        config(vec![instance(1, true), instance(2, false)]).validate().unwrap();
        config(vec![instance(1, false)]).validate().unwrap();
    }

    #[test]
    fn validate_errors() {
        config(vec![]).validate().unwrap_err();
        config(vec![instance(1, false), instance(1, false)]).validate().unwrap_err();
        config(vec![instance(1, true), instance(2, true)]).validate().unwrap_err();
    }

    #[test]
    fn default_instance() {
        let c = config(vec![instance(1, false), instance(2, true)]);
        assert_eq!(c.default_instance().unwrap().id, InstanceId(2));

        let c = config(vec![instance(3, false), instance(2, false)]);
        assert_eq!(c.default_instance().unwrap().id, InstanceId(3));
    }

    #[test]
    fn basic_auth() {
        // "admin:opencast"
        assert_eq!(
            instance(1, false).basic_auth_header().expose_secret(),
            "Basic YWRtaW46b3BlbmNhc3Q=",
        );
    }
}
