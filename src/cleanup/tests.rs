use std::{
    collections::{HashMap, HashSet},
    sync::{atomic::{AtomicUsize, Ordering}, Arc, Mutex},
};
use hyper::StatusCode;
use tracing::{subscriber::DefaultGuard, Event, Level, Subscriber};
use tracing_subscriber::{layer::{Context as LayerContext, Layer}, prelude::*};

use crate::{
    db::MappingStore,
    model::{CourseId, InstanceId, RemoteVideo, SeriesId, SeriesMapping, VideoId},
    opencast::ApiBridge,
    prelude::*,
};
use super::{CleanupReport, CourseCleanup};


/// Counts `error!` events emitted on the current thread.
#[derive(Clone, Default)]
struct ErrorCount(Arc<AtomicUsize>);

impl ErrorCount {
    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCount {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn count_errors() -> (ErrorCount, DefaultGuard) {
    let errors = ErrorCount::default();
    let guard = tracing_subscriber::registry().with(errors.clone()).set_default();
    (errors, guard)
}


const A: InstanceId = InstanceId(1);
const B: InstanceId = InstanceId(2);

/// Surviving courses and all stored mappings, shared by the fake store and
/// the fake bridges.
#[derive(Default)]
struct World {
    courses: HashSet<CourseId>,
    mappings: Vec<SeriesMapping>,
}

impl World {
    fn course(mut self, id: i64) -> Self {
        self.courses.insert(CourseId(id));
        self
    }

    fn map(mut self, course: i64, instance: InstanceId, series: &str) -> Self {
        self.mappings.push(SeriesMapping {
            course: CourseId(course),
            instance,
            series: SeriesId(series.into()),
            is_default: false,
        });
        self
    }
}

struct FakeStore {
    world: Arc<World>,
    fail: bool,
}

impl MappingStore for FakeStore {
    async fn course_series(&self, course: CourseId, instance: InstanceId) -> Result<Vec<SeriesMapping>> {
        Ok(self.world.mappings.iter()
            .filter(|m| m.course == course && m.instance == instance)
            .cloned()
            .collect())
    }

    async fn has_surviving_referrer(
        &self,
        series: &SeriesId,
        instance: InstanceId,
        deleted: CourseId,
    ) -> Result<bool> {
        if self.fail {
            bail!("database is gone");
        }

        Ok(self.world.mappings.iter().any(|m| {
            &m.series == series
                && m.instance == instance
                && m.course != deleted
                && self.world.courses.contains(&m.course)
        }))
    }
}

type DeleteLog = Arc<Mutex<Vec<(InstanceId, String)>>>;

struct FakeBridge {
    instance: InstanceId,
    world: Arc<World>,
    /// `None` means fetching the video list fails.
    videos: HashMap<String, Option<Vec<&'static str>>>,
    /// Status per video; 204 if not listed. `None` means no response at all.
    statuses: HashMap<&'static str, Option<u16>>,
    fail_course_series: bool,
    deletes: DeleteLog,
}

impl FakeBridge {
    fn new(instance: InstanceId, world: &Arc<World>, deletes: &DeleteLog) -> Self {
        Self {
            instance,
            world: Arc::clone(world),
            videos: HashMap::new(),
            statuses: HashMap::new(),
            fail_course_series: false,
            deletes: Arc::clone(deletes),
        }
    }

    fn series(mut self, series: &str, videos: &[&'static str]) -> Self {
        self.videos.insert(series.into(), Some(videos.to_vec()));
        self
    }

    fn broken_series(mut self, series: &str) -> Self {
        self.videos.insert(series.into(), None);
        self
    }

    fn status(mut self, video: &'static str, status: Option<u16>) -> Self {
        self.statuses.insert(video, status);
        self
    }
}

impl ApiBridge for FakeBridge {
    fn instance(&self) -> InstanceId {
        self.instance
    }

    async fn course_series(&self, course: CourseId) -> Result<Vec<SeriesMapping>> {
        if self.fail_course_series {
            bail!("connection refused");
        }

        Ok(self.world.mappings.iter()
            .filter(|m| m.course == course && m.instance == self.instance)
            .cloned()
            .collect())
    }

    async fn series_videos(&self, series: &SeriesId) -> Result<Vec<RemoteVideo>> {
        match self.videos.get(series.as_str()) {
            Some(Some(videos)) => Ok(videos.iter()
                .map(|id| RemoteVideo {
                    identifier: VideoId((*id).into()),
                    title: format!("Video {id}"),
                    series: Some(series.clone()),
                })
                .collect()),
            Some(None) => bail!("API returned unexpected HTTP code 500"),
            None => Ok(vec![]),
        }
    }

    async fn delete_video(&self, video: &VideoId) -> Result<StatusCode> {
        self.deletes.lock().unwrap().push((self.instance, video.as_str().to_owned()));
        match self.statuses.get(video.as_str()) {
            None => Ok(StatusCode::NO_CONTENT),
            Some(Some(code)) => Ok(StatusCode::from_u16(*code).unwrap()),
            Some(None) => bail!("HTTP request timed out"),
        }
    }
}

fn store(world: &Arc<World>) -> FakeStore {
    FakeStore { world: Arc::clone(world), fail: false }
}

fn deleted(log: &DeleteLog) -> Vec<(InstanceId, String)> {
    let mut out = log.lock().unwrap().clone();
    out.sort();
    out
}

fn entries(list: &[(InstanceId, &str)]) -> Vec<(InstanceId, String)> {
    list.iter().map(|(i, v)| (*i, v.to_string())).collect()
}


#[tokio::test]
async fn orphaned_series_videos_are_deleted_once() {
    let world = Arc::new(World::default().map(1, A, "s1"));
    let log = DeleteLog::default();
    let bridge = FakeBridge::new(A, &world, &log).series("s1", &["v1", "v2", "v3"]);

    let report = CourseCleanup::new(vec![bridge], store(&world)).run(CourseId(1)).await;

    assert_eq!(deleted(&log), entries(&[(A, "v1"), (A, "v2"), (A, "v3")]));
    assert_eq!(report, CleanupReport {
        series_orphaned: 1,
        videos_deleted: 3,
        ..CleanupReport::default()
    });
}

#[tokio::test]
async fn series_used_by_surviving_course_is_kept() {
    let world = Arc::new(World::default()
        .course(2)
        .map(1, A, "s1")
        .map(2, A, "s1"));
    let log = DeleteLog::default();
    let bridge = FakeBridge::new(A, &world, &log).series("s1", &["v1"]);

    let report = CourseCleanup::new(vec![bridge], store(&world)).run(CourseId(1)).await;

    assert!(deleted(&log).is_empty());
    assert_eq!(report.series_in_use, 1);
    assert_eq!(report.series_orphaned, 0);
}

#[tokio::test]
async fn mapping_of_other_deleted_course_does_not_keep_series() {
    // Course 2 also maps to the series but does not exist anymore.
    let world = Arc::new(World::default()
        .map(1, A, "s1")
        .map(2, A, "s1"));
    let log = DeleteLog::default();
    let bridge = FakeBridge::new(A, &world, &log).series("s1", &["v1"]);

    CourseCleanup::new(vec![bridge], store(&world)).run(CourseId(1)).await;

    assert_eq!(deleted(&log), entries(&[(A, "v1")]));
}

#[tokio::test]
async fn same_series_on_other_instance_does_not_keep_series() {
    let world = Arc::new(World::default()
        .course(2)
        .map(1, A, "s1")
        .map(2, B, "s1"));
    let log = DeleteLog::default();
    let bridge = FakeBridge::new(A, &world, &log).series("s1", &["v1"]);

    CourseCleanup::new(vec![bridge], store(&world)).run(CourseId(1)).await;

    assert_eq!(deleted(&log), entries(&[(A, "v1")]));
}

#[tokio::test]
async fn success_and_failure_status_codes() {
    let (errors, _guard) = count_errors();
    let world = Arc::new(World::default().map(1, A, "s1"));
    let log = DeleteLog::default();
    let bridge = FakeBridge::new(A, &world, &log)
        .series("s1", &["accepted", "no-content", "gone", "error", "forbidden", "timeout", "last"])
        .status("accepted", Some(202))
        .status("no-content", Some(204))
        .status("gone", Some(404))
        .status("error", Some(500))
        .status("forbidden", Some(403))
        .status("timeout", None)
        .status("last", Some(202));

    let report = CourseCleanup::new(vec![bridge], store(&world)).run(CourseId(1)).await;

    // Every video was attempted, failures did not stop the loop.
    assert_eq!(log.lock().unwrap().len(), 7);
    assert_eq!(report.videos_deleted, 3);
    assert_eq!(report.videos_already_gone, 1);
    assert_eq!(report.delete_failures, 3);
    assert!(report.has_failures());

    // Exactly one error line per failed video.
    assert_eq!(errors.get(), 3);
}

#[tokio::test]
async fn fetch_error_skips_only_that_series() {
    let (errors, _guard) = count_errors();
    let world = Arc::new(World::default()
        .map(1, A, "broken")
        .map(1, A, "fine")
        .map(1, B, "other"));
    let log = DeleteLog::default();
    let bridge_a = FakeBridge::new(A, &world, &log)
        .broken_series("broken")
        .series("fine", &["v1"]);
    let bridge_b = FakeBridge::new(B, &world, &log).series("other", &["v2"]);

    let report = CourseCleanup::new(vec![bridge_a, bridge_b], store(&world))
        .run(CourseId(1))
        .await;

    assert_eq!(deleted(&log), entries(&[(A, "v1"), (B, "v2")]));
    assert_eq!(report.series_failed, 1);
    assert_eq!(report.series_orphaned, 2);
    assert_eq!(errors.get(), 1);
}

#[tokio::test]
async fn failing_instance_does_not_stop_others() {
    let world = Arc::new(World::default()
        .map(1, A, "s1")
        .map(1, B, "s2"));
    let log = DeleteLog::default();
    let mut bridge_a = FakeBridge::new(A, &world, &log).series("s1", &["v1"]);
    bridge_a.fail_course_series = true;
    let bridge_b = FakeBridge::new(B, &world, &log).series("s2", &["v2"]);

    let report = CourseCleanup::new(vec![bridge_a, bridge_b], store(&world))
        .run(CourseId(1))
        .await;

    assert_eq!(deleted(&log), entries(&[(B, "v2")]));
    assert_eq!(report.instances_failed, 1);
}

#[tokio::test]
async fn failing_referrer_check_deletes_nothing() {
    let world = Arc::new(World::default().map(1, A, "s1"));
    let log = DeleteLog::default();
    let bridge = FakeBridge::new(A, &world, &log).series("s1", &["v1"]);
    let store = FakeStore { world: Arc::clone(&world), fail: true };

    let report = CourseCleanup::new(vec![bridge], store).run(CourseId(1)).await;

    assert!(deleted(&log).is_empty());
    assert_eq!(report.series_failed, 1);
}

// Course C has mappings to S1 (instance A) and S2 (instance B). S1 is also
// mapped to surviving course C2. S2 contains V1 and V2.
#[tokio::test]
async fn two_instances_scenario() {
    const C: i64 = 10;
    const C2: i64 = 20;
    let world = Arc::new(World::default()
        .course(C2)
        .map(C, A, "S1")
        .map(C2, A, "S1")
        .map(C, B, "S2"));
    let log = DeleteLog::default();
    let bridge_a = FakeBridge::new(A, &world, &log).series("S1", &["V0"]);
    let bridge_b = FakeBridge::new(B, &world, &log).series("S2", &["V1", "V2"]);

    let report = CourseCleanup::new(vec![bridge_a, bridge_b], store(&world))
        .run(CourseId(C))
        .await;

    assert_eq!(deleted(&log), entries(&[(B, "V1"), (B, "V2")]));
    assert_eq!(report, CleanupReport {
        series_in_use: 1,
        series_orphaned: 1,
        videos_deleted: 2,
        ..CleanupReport::default()
    });
}

#[tokio::test]
async fn rerun_after_deletion_is_clean() {
    let (errors, _guard) = count_errors();
    let world = Arc::new(World::default().map(1, A, "s1"));
    let log = DeleteLog::default();
    let bridge = FakeBridge::new(A, &world, &log)
        .series("s1", &["v1", "v2"])
        .status("v1", Some(404))
        .status("v2", Some(404));

    let report = CourseCleanup::new(vec![bridge], store(&world)).run(CourseId(1)).await;

    assert_eq!(report.videos_already_gone, 2);
    assert_eq!(report.delete_failures, 0);
    assert!(!report.has_failures());
    assert_eq!(errors.get(), 0);
}

#[tokio::test]
async fn course_without_series_does_nothing() {
    let world = Arc::new(World::default().course(1).map(2, A, "s1"));
    let log = DeleteLog::default();
    let bridge = FakeBridge::new(A, &world, &log).series("s1", &["v1"]);

    let report = CourseCleanup::new(vec![bridge], store(&world)).run(CourseId(1)).await;

    assert!(deleted(&log).is_empty());
    assert_eq!(report, CleanupReport::default());
}
