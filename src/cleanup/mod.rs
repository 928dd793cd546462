//! Cleaning up Opencast after a course was deleted.
//!
//! For every configured instance and every series the deleted course was
//! linked to, we check whether another surviving course still uses that
//! series. If not, all videos of the series are deleted in Opencast. Every
//! failure is logged and only affects the series or video it happened for;
//! the cleanup always runs through everything it can reach. Nothing in the
//! local database is changed.

use std::fmt;
use hyper::StatusCode;
use futures::future::BoxFuture;

use crate::{
    config::OpencastConfig,
    db::{DbMappingStore, MappingStore},
    events::{CourseEvent, Observer},
    model::{CourseId, SeriesId},
    opencast::{ApiBridge, OcBridge},
    prelude::*,
};

#[cfg(test)]
mod tests;


/// Observer that deletes videos of orphaned series when a course is deleted.
pub(crate) struct CourseCleanup<B, S> {
    bridges: Vec<B>,
    store: S,
}

/// What happened during one cleanup run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct CleanupReport {
    /// Series that were left alone because another course still uses them.
    pub(crate) series_in_use: u32,
    /// Series that were orphaned and whose videos were processed.
    pub(crate) series_orphaned: u32,
    /// Series skipped because the mapping check or the video list failed.
    pub(crate) series_failed: u32,
    /// Instances for which the series of the course could not be loaded.
    pub(crate) instances_failed: u32,
    /// Videos Opencast accepted the deletion for (202 or 204).
    pub(crate) videos_deleted: u32,
    /// Videos Opencast did not know anymore (404).
    pub(crate) videos_already_gone: u32,
    /// Videos whose deletion failed.
    pub(crate) delete_failures: u32,
}

impl CleanupReport {
    pub(crate) fn has_failures(&self) -> bool {
        self.series_failed > 0 || self.instances_failed > 0 || self.delete_failures > 0
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} series orphaned, {} still in use, {} failed; \
                {} videos deleted, {} already gone, {} failed to delete",
            self.series_orphaned,
            self.series_in_use,
            self.series_failed + self.instances_failed,
            self.videos_deleted,
            self.videos_already_gone,
            self.delete_failures,
        )
    }
}

/// How Opencast answered a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeleteOutcome {
    Deleted,
    AlreadyGone,
    Failed,
}

impl DeleteOutcome {
    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Self::Deleted,
            StatusCode::NOT_FOUND => Self::AlreadyGone,
            _ => Self::Failed,
        }
    }
}

impl<B: ApiBridge, S: MappingStore> CourseCleanup<B, S> {
    pub(crate) fn new(bridges: Vec<B>, store: S) -> Self {
        Self { bridges, store }
    }

    /// Runs the cleanup for the given (already deleted) course.
    pub(crate) async fn run(&self, course: CourseId) -> CleanupReport {
        info!("Cleaning up Opencast series of deleted course {course}");
        let mut report = CleanupReport::default();

        for bridge in &self.bridges {
            let instance = bridge.instance();
            let mappings = match bridge.course_series(course).await {
                Ok(mappings) => mappings,
                Err(e) => {
                    error!(
                        "Failed to load series of course {course} for Opencast instance \
                            {instance}, skipping instance: {e:#}",
                    );
                    report.instances_failed += 1;
                    continue;
                }
            };

            trace!("Course {course} has {} series on instance {instance}", mappings.len());
            for mapping in mappings {
                self.cleanup_series(bridge, course, &mapping.series, &mut report).await;
            }
        }

        if report.has_failures() {
            warn!("Cleanup for course {course} finished with errors: {report}");
        } else {
            info!("Cleanup for course {course} finished: {report}");
        }

        report
    }

    async fn cleanup_series(
        &self,
        bridge: &B,
        course: CourseId,
        series: &SeriesId,
        report: &mut CleanupReport,
    ) {
        let instance = bridge.instance();

        match self.store.has_surviving_referrer(series, instance, course).await {
            Ok(true) => {
                debug!("Series {series} (instance {instance}) is still used by another course");
                report.series_in_use += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                error!(
                    "Could not check whether series {series} (instance {instance}) \
                        is still in use, not touching it: {e:#}",
                );
                report.series_failed += 1;
                return;
            }
        }

        let videos = match bridge.series_videos(series).await {
            Ok(videos) => videos,
            Err(e) => {
                error!(
                    "Failed to fetch videos of orphaned series {series} \
                        (instance {instance}), skipping series: {e:#}",
                );
                report.series_failed += 1;
                return;
            }
        };

        info!(
            "Series {series} (instance {instance}) is orphaned, deleting its {} videos",
            videos.len(),
        );
        report.series_orphaned += 1;

        for video in &videos {
            let id = &video.identifier;
            let status = match bridge.delete_video(id).await {
                Ok(status) => status,
                Err(e) => {
                    error!(
                        "Failed to delete video {id} of series {series} \
                            (instance {instance}): {e:#}",
                    );
                    report.delete_failures += 1;
                    continue;
                }
            };

            match DeleteOutcome::from_status(status) {
                DeleteOutcome::Deleted => {
                    debug!("Deleted video {id} of series {series}");
                    report.videos_deleted += 1;
                }
                DeleteOutcome::AlreadyGone => {
                    debug!("Video {id} of series {series} was already deleted");
                    report.videos_already_gone += 1;
                }
                DeleteOutcome::Failed => {
                    error!(
                        "Opencast instance {instance} answered {status} when deleting \
                            video {id} of series {series}",
                    );
                    report.delete_failures += 1;
                }
            }
        }
    }
}

impl CourseCleanup<OcBridge, DbMappingStore> {
    /// Cleanup across all configured Opencast instances.
    pub(crate) fn from_config(config: &OpencastConfig, store: DbMappingStore) -> Result<Self> {
        let bridges = OcBridge::for_all_instances(config, &store)?;
        Ok(Self::new(bridges, store))
    }
}

impl<B, S> Observer for CourseCleanup<B, S>
where
    B: ApiBridge + 'static,
    S: MappingStore + 'static,
{
    fn name(&self) -> &'static str {
        "course-cleanup"
    }

    fn notify<'a>(&'a self, event: &'a CourseEvent) -> BoxFuture<'a, ()> {
        match *event {
            CourseEvent::Deleted { course } => self.run(course).map(|_| ()).boxed(),
        }
    }
}
