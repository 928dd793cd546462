//! Building signed LTI 1.0 basic launch requests into Opencast tools (Studio,
//! the video editor, the series/video management tools under `/ltitools`).
//!
//! The launch is a plain form POST of the parameters built here to the
//! instance's `/lti` endpoint. Opencast checks the OAuth signature with the
//! shared consumer secret and then logs the user in with the roles we pass.

use std::collections::BTreeMap;

use rand::{distr::Alphanumeric, Rng as _};
use secrecy::ExposeSecret as _;
use serde::{Deserialize, Serialize};

use crate::{
    config::{GeneralConfig, InstanceConfig, LtiCredentials},
    model::{Course, SeriesId, VideoId},
    prelude::*,
};

pub(crate) mod oauth;



/// Tool launched when no custom tool is requested.
pub(crate) const DEFAULT_TOOL: &str = "/ltitools";

/// Everything about the current request the launch depends on. Passed in
/// explicitly by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LaunchContext {
    pub(crate) user: LtiUser,
    pub(crate) course: Course,
    #[serde(default)]
    pub(crate) session: LtiSession,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LtiUser {
    pub(crate) id: i64,
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) firstname: String,
    #[serde(default)]
    pub(crate) lastname: String,
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) role: LtiRole,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LtiSession {
    /// Language of the current session, e.g. `de`.
    pub(crate) locale: Option<String>,
}

/// The LTI role of the launching user within the course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum LtiRole {
    #[default]
    Learner,
    Instructor,
    Administrator,
}

impl LtiRole {
    fn as_lti_roles(self) -> &'static str {
        match self {
            LtiRole::Learner => "Learner",
            LtiRole::Instructor => "Instructor",
            LtiRole::Administrator => "Instructor,urn:lti:sysrole:ims/lis/Administrator,\
                urn:lti:instrole:ims/lis/Administrator",
        }
    }
}

/// A fully signed launch: POST `params` as form to `endpoint`.
#[derive(Debug, Serialize)]
pub(crate) struct Launch {
    pub(crate) endpoint: String,
    pub(crate) params: BTreeMap<String, String>,
}

/// The random and time dependent parts of a launch.
#[derive(Debug)]
pub(crate) struct Freshness {
    pub(crate) nonce: String,
    pub(crate) timestamp: i64,
    pub(crate) resource_link_id: String,
}

impl Freshness {
    pub(crate) fn generate() -> Self {
        let mut rng = rand::rng();
        let nonce = (&mut rng).sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let resource_link_id = format!(
            "o{}-{}",
            rng.random_range(1000..10000),
            rng.random_range(1000..10000),
        );

        Self {
            nonce,
            timestamp: chrono::Utc::now().timestamp(),
            resource_link_id,
        }
    }
}

/// The `/lti` endpoint of the given instance.
pub(crate) fn endpoint(instance: &InstanceConfig) -> String {
    format!("{}/lti", instance.host)
}

/// Builds launch parameters for the LTI tool `custom_tool` of the instance
/// behind `endpoint` and signs them with `credentials`.
pub(crate) fn build_launch(
    credentials: &LtiCredentials,
    endpoint: &str,
    custom_tool: &str,
    context: &LaunchContext,
    site: &GeneralConfig,
) -> Launch {
    build_launch_with(credentials, endpoint, custom_tool, context, site, Freshness::generate())
}

/// Like [`build_launch`] with the instance's endpoint and credentials.
/// Fails if the instance has no LTI credentials configured.
pub(crate) fn build_launch_for(
    instance: &InstanceConfig,
    custom_tool: &str,
    context: &LaunchContext,
    site: &GeneralConfig,
) -> Result<Launch> {
    let credentials = instance.lti.as_ref().ok_or_else(|| {
        anyhow!("no LTI credentials configured for Opencast instance {}", instance.label())
    })?;

    Ok(build_launch(credentials, &endpoint(instance), custom_tool, context, site))
}

pub(crate) fn build_launch_with(
    credentials: &LtiCredentials,
    endpoint: &str,
    custom_tool: &str,
    context: &LaunchContext,
    site: &GeneralConfig,
    freshness: Freshness,
) -> Launch {
    let LaunchContext { user, course, session } = context;
    let mut params = BTreeMap::new();
    let mut set = |key: &str, value: String| {
        params.insert(key.to_owned(), value);
    };

    // OAuth
    set("oauth_version", "1.0".into());
    set("oauth_nonce", freshness.nonce);
    set("oauth_timestamp", freshness.timestamp.to_string());
    set("oauth_consumer_key", credentials.consumer_key.clone());
    set("oauth_signature_method", oauth::SIGNATURE_METHOD.into());
    set("oauth_callback", "about:blank".into());

    // LTI message
    set("lti_version", "LTI-1p0".into());
    set("lti_message_type", "basic-lti-launch-request".into());
    set("resource_link_id", freshness.resource_link_id);
    set("resource_link_title", "Opencast".into());
    set("launch_presentation_document_target", "iframe".into());
    let locale = session.locale.as_deref()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or(&site.default_language);
    set("launch_presentation_locale", locale.to_owned());
    let tool = match custom_tool.trim() {
        "" => DEFAULT_TOOL,
        tool => tool,
    };
    set("custom_tool", tool.to_owned());

    // Consumer
    set("tool_consumer_info_product_family_code", "coursecast".into());
    set("tool_consumer_info_version", crate::version::identifier());
    set("tool_consumer_instance_guid", site.instance_guid().to_owned());
    set("tool_consumer_instance_description", site.site_name.clone());
    set("ext_lms", "coursecast".into());

    // Course
    set("context_id", course.id.to_string());
    set("context_label", course.shortname.trim().to_owned());
    set("context_title", course.fullname.trim().to_owned());
    set("context_type", "CourseSection".into());

    // User
    let given = user.firstname.trim();
    let family = user.lastname.trim();
    let full = match (given, family) {
        ("", "") => user.username.clone(),
        ("", name) | (name, "") => name.to_owned(),
        (given, family) => format!("{given} {family}"),
    };
    set("user_id", user.id.to_string());
    set("ext_user_username", user.username.clone());
    set("lis_person_name_given", if given.is_empty() { user.username.clone() } else { given.to_owned() });
    set("lis_person_name_family", if family.is_empty() { user.username.clone() } else { family.to_owned() });
    set("lis_person_name_full", full);
    if let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) {
        set("lis_person_contact_email_primary", email.to_owned());
    }
    set("roles", user.role.as_lti_roles().into());

    let base = oauth::base_string(
        "POST",
        endpoint,
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    );
    let signature = oauth::sign(&base, credentials.consumer_secret.expose_secret(), "");
    params.insert("oauth_signature".into(), signature);

    Launch {
        endpoint: endpoint.to_owned(),
        params,
    }
}

/// Custom tool path for uploading into `series` with Opencast Studio.
/// After the recording is done, Studio offers a link back to `return_to`.
pub(crate) fn studio_tool(series: &SeriesId, return_to: Option<(&str, &str)>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("upload.seriesId", series.as_str());
    if let Some((label, target)) = return_to {
        query.append_pair("return.label", label);
        query.append_pair("return.target", target);
    }
    format!("/studio?{}", query.finish())
}

/// Custom tool path for opening `video` in the Opencast video editor.
pub(crate) fn editor_tool(video: &VideoId) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("id", video.as_str())
        .finish();
    format!("/editor-ui/index.html?{query}")
}
