use std::time::Duration;

use bytes::Bytes;
use hyper::{
    Request, Response, StatusCode,
    body::Incoming,
    http::{self, request, uri::Uri},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tap::TapFallible;

use crate::{
    config::{HttpHost, InstanceConfig},
    model::{InstanceId, RemoteVideo, SeriesId, VideoId},
    prelude::*,
    util::{download_body, ByteBody, HttpClient, UNRESERVED},
};


/// Sends requests to the external API of one Opencast instance.
pub(crate) struct OcClient {
    http_client: HttpClient,
    instance: InstanceId,
    host: HttpHost,
    auth_header: SecretString,
    username: String,
    timeout: Duration,
}

impl OcClient {
    const VERSION_PATH: &'static str = "/api/version";
    const EVENTS_PATH: &'static str = "/api/events";

    pub(crate) fn new(
        http_client: HttpClient,
        instance: &InstanceConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            instance: instance.id,
            host: instance.host.clone(),
            auth_header: instance.basic_auth_header(),
            username: instance.user.clone(),
            timeout,
        }
    }

    pub(crate) fn instance(&self) -> InstanceId {
        self.instance
    }

    pub(crate) async fn external_api_versions(&self) -> Result<ExternalApiVersions> {
        let req = self.authed_req_builder(Self::VERSION_PATH)?
            .body(ByteBody::new(Bytes::new()))
            .context("failed to build request")?;
        let (uri, response) = self.send(req).await?;
        let (out, _) = self.deserialize_response(response, &uri).await?;
        Ok(out)
    }

    /// Returns all events that are part of the given series.
    pub(crate) async fn series_videos(&self, series: &SeriesId) -> Result<Vec<RemoteVideo>> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("filter", &format!("is_part_of:{series}"))
            .append_pair("sort", "start_date:ASC")
            .finish();
        let pq = format!("{}?{query}", Self::EVENTS_PATH);
        let req = self.authed_req_builder(&pq)?
            .body(ByteBody::new(Bytes::new()))
            .context("failed to build request")?;

        trace!("Fetching videos of series {series} from instance {}", self.instance);
        let (uri, response) = self.send(req).await?;
        let (videos, body_len) = self
            .deserialize_response::<Vec<RemoteVideo>>(response, &uri)
            .await?;
        debug!(
            "Received {} videos ({} KiB) of series {series} from instance {}",
            videos.len(),
            body_len / 1024,
            self.instance,
        );

        Ok(videos)
    }

    /// Returns the event with the given ID or `None` if Opencast does not know
    /// it (or it is not visible to our user).
    pub(crate) async fn video(&self, id: &VideoId) -> Result<Option<RemoteVideo>> {
        let pq = format!("{}/{}", Self::EVENTS_PATH, encode_path_segment(id.as_str()));
        let req = self.authed_req_builder(&pq)?
            .body(ByteBody::new(Bytes::new()))
            .context("failed to build request")?;

        let (uri, response) = self.send(req).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let (video, _) = self.deserialize_response(response, &uri).await?;
        Ok(Some(video))
    }

    /// Requests deletion of an event and returns the status code Opencast
    /// answered with. Interpreting it is up to the caller.
    pub(crate) async fn delete_video(&self, id: &VideoId) -> Result<StatusCode> {
        let pq = format!("{}/{}", Self::EVENTS_PATH, encode_path_segment(id.as_str()));
        let req = self.authed_req_builder(&pq)?
            .method(http::Method::DELETE)
            .body(ByteBody::new(Bytes::new()))
            .context("failed to build request")?;

        let (_, response) = self.send(req).await?;
        Ok(response.status())
    }

    async fn send(&self, req: Request<ByteBody>) -> Result<(Uri, Response<Incoming>)> {
        let uri = req.uri().clone();
        trace!("Sending {} request to '{uri}'", req.method());
        let response = tokio::time::timeout(self.timeout, self.http_client.request(req))
            .await
            .with_context(|| format!("HTTP request timed out (to '{uri}')"))?
            .with_context(|| format!("HTTP request failed (to '{uri}')"))?;

        Ok((uri, response))
    }

    fn authed_req_builder(&self, path_and_query: &str) -> Result<request::Builder> {
        let uri = self.host.with_path_and_query(path_and_query)?;
        Request::builder()
            .uri(uri)
            .header(http::header::AUTHORIZATION, self.auth_header.expose_secret())
            .header(http::header::ACCEPT, "application/json")
            .pipe(Ok)
    }

    async fn deserialize_response<T: for<'de> serde::Deserialize<'de>>(
        &self,
        response: Response<Incoming>,
        uri: &Uri,
    ) -> Result<(T, usize)> {
        let (parts, body) = response.into_parts();
        let body: Bytes = download_body(body).await
            .with_context(|| format!("failed to download body from '{uri}'"))?;

        if parts.status != StatusCode::OK {
            trace!("HTTP response: {:#?}", parts);
            if parts.status == StatusCode::UNAUTHORIZED {
                bail!(
                    "Requesting '{}' with login '{}:******' returned {}. \
                        Check 'user' and 'password' of Opencast instance {}!",
                    uri, self.username, parts.status, self.instance,
                );
            } else {
                bail!(
                    "API returned unexpected HTTP code {} (for '{}', authenticating as '{}')",
                    parts.status, uri, self.username,
                );
            }
        }

        let out = serde_json::from_slice::<T>(&body)
            .with_context(|| format!("Failed to deserialize API response from {uri}"))
            .tap_err(|_| trace!("HTTP response: {:#?}", parts))?;

        Ok((out, body.len()))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExternalApiVersions {
    pub(crate) default: String,
    pub(crate) versions: Vec<String>,
}

/// Opencast identifiers are usually UUIDs, but nothing stops an admin from
/// using other strings.
fn encode_path_segment(s: &str) -> impl std::fmt::Display + '_ {
    percent_encoding::utf8_percent_encode(s, UNRESERVED)
}


#[cfg(test)]
mod tests {
    use super::encode_path_segment;
    use crate::model::RemoteVideo;

    #[test]
    fn path_segment_encoding() {
        assert_eq!(
            encode_path_segment("c0ffee-42").to_string(),
            "c0ffee-42",
        );
        assert_eq!(encode_path_segment("a/../b").to_string(), "a%2F..%2Fb");
    }

    #[test]
    fn parse_event_list() {
        let json = r#"[
            {
                "identifier": "6d3004e0-d34b-4e2a-9b2c-4f3c2d8f1b8e",
                "title": "Lecture 1",
                "is_part_of": "7a9c2e61-1bd7-4a7b-8d55-3b3a2c1f0e9d",
                "processing_state": "SUCCEEDED",
                "duration": 0
            },
            { "identifier": "b1" }
        ]"#;
        let videos: Vec<RemoteVideo> = serde_json::from_str(json).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].title, "Lecture 1");
        assert_eq!(
            videos[0].series.as_ref().map(|s| s.as_str()),
            Some("7a9c2e61-1bd7-4a7b-8d55-3b3a2c1f0e9d"),
        );
        assert_eq!(videos[1].identifier.as_str(), "b1");
        assert_eq!(videos[1].series, None);
    }
}
