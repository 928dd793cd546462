//! The course/series mapping store.

use std::future::Future;
use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::{
    db::DbConnection,
    model::{Course, CourseId, InstanceId, SeriesId, SeriesMapping},
    prelude::*,
};


/// Read access to course/series mappings as needed by the course cleanup.
pub(crate) trait MappingStore: Send + Sync {
    /// Returns all series the given course is mapped to on the given instance.
    /// The course itself does not need to exist anymore.
    fn course_series(
        &self,
        course: CourseId,
        instance: InstanceId,
    ) -> impl Future<Output = Result<Vec<SeriesMapping>>> + Send;

    /// Returns whether any course other than `deleted` that still exists maps
    /// to `series` on `instance`.
    fn has_surviving_referrer(
        &self,
        series: &SeriesId,
        instance: InstanceId,
        deleted: CourseId,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Mapping store backed by the `courses` and `course_series` tables.
#[derive(Clone)]
pub(crate) struct DbMappingStore {
    pool: Pool,
}

impl DbMappingStore {
    pub(crate) fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<DbConnection> {
        self.pool.get().await.context("failed to get DB connection from pool")
    }

    /// Inserts the course or updates its names.
    pub(crate) async fn upsert_course(&self, course: &Course) -> Result<()> {
        let db = self.connection().await?;
        db.execute(
            "insert into courses (id, shortname, fullname) values ($1, $2, $3) \
                on conflict (id) do update set shortname = $2, fullname = $3",
            &dbargs![&course.id, &course.shortname, &course.fullname],
        ).await.context("failed to upsert course")?;
        Ok(())
    }

    /// Removes the course from the mirror. Mappings are left alone. Returns
    /// `false` if there was no such course.
    pub(crate) async fn remove_course(&self, course: CourseId) -> Result<bool> {
        let db = self.connection().await?;
        let affected = db.execute("delete from courses where id = $1", &[&course]).await
            .context("failed to delete course")?;
        Ok(affected > 0)
    }

    pub(crate) async fn course(&self, course: CourseId) -> Result<Option<Course>> {
        let db = self.connection().await?;
        let row = db.query_opt("select id, shortname, fullname from courses where id = $1", &[&course])
            .await?;
        Ok(row.map(|row| Course {
            id: row.get("id"),
            shortname: row.get("shortname"),
            fullname: row.get("fullname"),
        }))
    }

    pub(crate) async fn courses(&self) -> Result<Vec<Course>> {
        let db = self.connection().await?;
        let rows = db.query("select id, shortname, fullname from courses order by id", &[]).await?;
        Ok(rows.iter().map(|row| Course {
            id: row.get("id"),
            shortname: row.get("shortname"),
            fullname: row.get("fullname"),
        }).collect())
    }

    /// Links a course to a series. If `is_default` is set, any previous
    /// default series of that course on that instance loses its flag.
    pub(crate) async fn link(&self, mapping: &SeriesMapping) -> Result<()> {
        let mut db = self.connection().await?;
        let tx = db.transaction().await?;
        if mapping.is_default {
            tx.execute(
                "update course_series set is_default = false \
                    where course_id = $1 and ocinstance_id = $2",
                &dbargs![&mapping.course, &mapping.instance],
            ).await?;
        }
        tx.execute(
            "insert into course_series (course_id, ocinstance_id, series, is_default) \
                values ($1, $2, $3, $4) \
                on conflict (course_id, ocinstance_id, series) do update set is_default = $4",
            &dbargs![&mapping.course, &mapping.instance, &mapping.series, &mapping.is_default],
        ).await.context("failed to insert course/series mapping")?;
        tx.commit().await?;
        Ok(())
    }

    /// Removes a mapping. Returns `false` if it did not exist.
    pub(crate) async fn unlink(
        &self,
        course: CourseId,
        instance: InstanceId,
        series: &SeriesId,
    ) -> Result<bool> {
        let db = self.connection().await?;
        let affected = db.execute(
            "delete from course_series \
                where course_id = $1 and ocinstance_id = $2 and series = $3",
            &dbargs![&course, &instance, series],
        ).await?;
        Ok(affected > 0)
    }

    /// All mappings, optionally restricted to one course.
    pub(crate) async fn mappings(&self, course: Option<CourseId>) -> Result<Vec<SeriesMapping>> {
        let db = self.connection().await?;
        let rows = db.query(
            "select course_id, ocinstance_id, series, is_default from course_series \
                where $1::bigint is null or course_id = $1 \
                order by course_id, ocinstance_id, series",
            &[&course],
        ).await?;
        Ok(rows.iter().map(mapping_from_row).collect())
    }
}

fn mapping_from_row(row: &Row) -> SeriesMapping {
    SeriesMapping {
        course: row.get("course_id"),
        instance: row.get("ocinstance_id"),
        series: row.get("series"),
        is_default: row.get("is_default"),
    }
}

impl MappingStore for DbMappingStore {
    async fn course_series(
        &self,
        course: CourseId,
        instance: InstanceId,
    ) -> Result<Vec<SeriesMapping>> {
        let db = self.connection().await?;
        let rows = db.query(
            "select course_id, ocinstance_id, series, is_default from course_series \
                where course_id = $1 and ocinstance_id = $2 \
                order by is_default desc, series",
            &dbargs![&course, &instance],
        ).await.context("failed to load series of course")?;
        Ok(rows.iter().map(mapping_from_row).collect())
    }

    async fn has_surviving_referrer(
        &self,
        series: &SeriesId,
        instance: InstanceId,
        deleted: CourseId,
    ) -> Result<bool> {
        let db = self.connection().await?;
        let row = db.query_one(
            "select exists(
                select from course_series
                    join courses on courses.id = course_series.course_id
                    where course_series.series = $1
                        and course_series.ocinstance_id = $2
                        and course_series.course_id <> $3
            )",
            &dbargs![series, &instance, &deleted],
        ).await.context("failed to check for other courses using series")?;
        Ok(row.get::<_, bool>(0))
    }
}
