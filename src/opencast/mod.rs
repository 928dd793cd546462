//! Everything related to talking to Opencast.

use std::future::Future;
use hyper::StatusCode;

use crate::{
    config::OpencastConfig,
    db::{DbMappingStore, MappingStore},
    model::{CourseId, InstanceId, RemoteVideo, SeriesId, SeriesMapping, VideoId},
    prelude::*,
};

mod client;

pub(crate) use self::client::OcClient;


/// The operations the course cleanup needs from one Opencast instance.
pub(crate) trait ApiBridge: Send + Sync {
    fn instance(&self) -> InstanceId;

    /// Series the course is associated with on this instance. This is based on
    /// the stored mappings, which may still list courses that were deleted.
    fn course_series(
        &self,
        course: CourseId,
    ) -> impl Future<Output = Result<Vec<SeriesMapping>>> + Send;

    /// All videos of the series. `Err` if the list could not be fetched.
    fn series_videos(
        &self,
        series: &SeriesId,
    ) -> impl Future<Output = Result<Vec<RemoteVideo>>> + Send;

    /// Requests deletion of the video and returns the raw status code. `Err`
    /// only if no response was received.
    fn delete_video(&self, video: &VideoId) -> impl Future<Output = Result<StatusCode>> + Send;
}

/// The API bridge of one configured Opencast instance.
pub(crate) struct OcBridge {
    client: OcClient,
    store: DbMappingStore,
}

impl OcBridge {
    /// Creates one bridge per configured instance, in configuration order.
    /// All of them share one HTTP client.
    pub(crate) fn for_all_instances(
        config: &OpencastConfig,
        store: &DbMappingStore,
    ) -> Result<Vec<Self>> {
        let http_client = crate::util::http_client()?;
        let bridges = config.instances.iter()
            .map(|instance| Self {
                client: OcClient::new(http_client.clone(), instance, config.timeout),
                store: store.clone(),
            })
            .collect();

        Ok(bridges)
    }

    pub(crate) fn client(&self) -> &OcClient {
        &self.client
    }
}

impl ApiBridge for OcBridge {
    fn instance(&self) -> InstanceId {
        self.client.instance()
    }

    async fn course_series(&self, course: CourseId) -> Result<Vec<SeriesMapping>> {
        self.store.course_series(course, self.client.instance()).await
    }

    async fn series_videos(&self, series: &SeriesId) -> Result<Vec<RemoteVideo>> {
        self.client.series_videos(series).await
    }

    async fn delete_video(&self, video: &VideoId) -> Result<StatusCode> {
        self.client.delete_video(video).await
    }
}
