//! Items that define the domain data model.
//!
//! These are used in multiple situations (loading from DB, talking to
//! Opencast, HTTP payloads), which is why they don't live in one of those
//! modules.

use std::fmt;
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};


/// ID of a course in the host LMS. Stored as `bigint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, ToSql, FromSql)]
#[serde(transparent)]
#[postgres(transparent)]
pub(crate) struct CourseId(pub(crate) i64);

/// ID of a configured Opencast instance. Stored as `int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, ToSql, FromSql)]
#[serde(transparent)]
#[postgres(transparent)]
pub(crate) struct InstanceId(pub(crate) i32);

/// Opencast identifier of a series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, ToSql, FromSql)]
#[serde(transparent)]
#[postgres(transparent)]
pub(crate) struct SeriesId(pub(crate) String);

/// Opencast identifier of an event (a video).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct VideoId(pub(crate) String);

macro_rules! impl_display {
    ($($ty:ident),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    self.0.fmt(f)
                }
            }
        )+
    };
}

impl_display!(CourseId, InstanceId, SeriesId, VideoId);

impl SeriesId {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl VideoId {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}


/// A local mirror of a course of the host LMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Course {
    pub(crate) id: CourseId,
    pub(crate) shortname: String,
    pub(crate) fullname: String,
}

/// Persisted association of a course with an Opencast series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SeriesMapping {
    pub(crate) course: CourseId,
    pub(crate) instance: InstanceId,
    pub(crate) series: SeriesId,
    pub(crate) is_default: bool,
}

/// A video as returned by Opencast. Only ever read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RemoteVideo {
    pub(crate) identifier: VideoId,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default, rename = "is_part_of", skip_serializing_if = "Option::is_none")]
    pub(crate) series: Option<SeriesId>,
}
