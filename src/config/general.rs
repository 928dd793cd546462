use super::HttpHost;


#[derive(Debug, confique::Config)]
pub(crate) struct GeneralConfig {
    /// Full name of the site (e.g. the LMS this service is attached to). Sent
    /// as `tool_consumer_instance_description` in LTI launches.
    pub(crate) site_name: String,

    /// Public URL of the host LMS (without path). Its host name is used as
    /// `tool_consumer_instance_guid` in LTI launches.
    ///
    /// Example: "https://lms.my-uni.edu".
    pub(crate) wwwroot: HttpHost,

    /// Language used for LTI launches when the session does not specify one.
    #[config(default = "en")]
    pub(crate) default_language: String,
}

impl GeneralConfig {
    /// The instance GUID we send as tool consumer. This is the host name of
    /// `wwwroot`, without port.
    pub(crate) fn instance_guid(&self) -> &str {
        self.wwwroot.authority.host()
    }
}
