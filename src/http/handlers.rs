use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{header, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::{collections::HashMap, sync::Arc, time::Instant};

use crate::{
    db::MappingStore,
    events::CourseEvent,
    forms,
    lti::{self, LaunchContext},
    model::{Course, CourseId, InstanceId, RemoteVideo},
    opencast::OcBridge,
    prelude::*,
    table::Listing,
};
use super::{log, response, Context, Request, Response};


/// Bodies larger than this are rejected, whether announced via
/// `Content-Length` or streamed chunked. All our endpoints take small JSON or
/// form bodies.
const MAX_BODY_SIZE: u64 = 1024 * 1024;

/// Main HTTP entry point, called for each incoming request.
pub(super) async fn handle(req: Request, ctx: Arc<Context>) -> Response {
    log::req::log(&req);
    if ctx.config.log.log_http_headers {
        log::headers::log(&req);
    }

    let before = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/').to_owned();
    let segments = path.split('/').skip(1).collect::<Vec<_>>();
    let params = query_params(&req);

    let result = match (&method, segments.as_slice()) {
        (&Method::PUT, ["courses", id]) => match parse_id(id) {
            Some(id) => put_course(id, req, &ctx).await,
            None => Ok(response::bad_request("invalid course ID")),
        },
        (&Method::DELETE, ["courses", id]) => match parse_id(id) {
            Some(id) => delete_course(id, &ctx).await,
            None => Ok(response::bad_request("invalid course ID")),
        },
        (&Method::GET, ["courses", id, "videos"]) => match parse_id(id) {
            Some(id) => course_videos(id, &params, &ctx).await,
            None => Ok(response::bad_request("invalid course ID")),
        },
        (&Method::POST, ["events", "course-deleted"]) => course_deleted_event(req, &ctx).await,
        (&Method::GET, ["forms"]) => Ok(response::json(StatusCode::OK, &forms::ALL)),
        (&Method::GET, ["forms", name]) => get_form(name, &params, &ctx).await,
        (&Method::POST, ["forms", name]) => submit_form(name, req).await,
        (&Method::POST, ["lti", "launch"]) => lti_launch(req, &ctx).await,
        (&Method::GET, ["version"]) => {
            Ok(response::json(StatusCode::OK, &crate::version::identifier()))
        }

        (_, ["courses", _] | ["courses", _, "videos"] | ["events", "course-deleted"]
            | ["forms"] | ["forms", _] | ["lti", "launch"] | ["version"]) => Ok(response::method_not_allowed()),
        _ => Ok(response::not_found()),
    };

    let response = result.unwrap_or_else(|e| {
        error!("Error handling {method} {path}: {e:?}");
        response::internal_server_error()
    });
    log::resp::log(&method, &path, response.status(), before.elapsed());
    response
}

fn parse_id(s: &str) -> Option<CourseId> {
    s.parse().ok().map(CourseId)
}

fn query_params(req: &Request) -> HashMap<String, String> {
    req.uri().query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Reads the whole body. `Ok(Err(_))` is a response to send instead.
async fn read_body(req: Request) -> Result<Result<Bytes, Response>> {
    let content_length = req.headers().get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    read_limited(req.into_body(), content_length).await
}

async fn read_limited<B>(body: B, content_length: Option<u64>) -> Result<Result<Bytes, Response>>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if content_length.is_some_and(|len| len > MAX_BODY_SIZE) {
        return Ok(Err(response::bad_request("request body too large")));
    }

    match Limited::new(body, MAX_BODY_SIZE as usize).collect().await {
        Ok(collected) => Ok(Ok(collected.to_bytes())),
        Err(e) if e.is::<LengthLimitError>() => {
            Ok(Err(response::bad_request("request body too large")))
        }
        Err(e) => Err(anyhow!("failed to read request body: {e}")),
    }
}

async fn read_json<T: DeserializeOwned>(req: Request) -> Result<Result<T, Response>> {
    let body = match read_body(req).await? {
        Ok(body) => body,
        Err(response) => return Ok(Err(response)),
    };

    Ok(serde_json::from_slice(&body)
        .map_err(|e| response::bad_request(format!("invalid JSON body: {e}"))))
}

impl Context {
    /// The bridge of the given instance, or of the default instance.
    fn bridge(&self, instance: Option<InstanceId>) -> Option<&OcBridge> {
        let id = match instance {
            Some(id) => id,
            None => self.config.opencast.default_instance()?.id,
        };
        self.bridges.iter().find(|b| b.client().instance() == id)
    }
}

/// Parses the instance from query parameter `key`, if present.
fn instance_param(params: &HashMap<String, String>, key: &str) -> Result<Option<InstanceId>, Response> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s.parse().map(|id| Some(InstanceId(id)))
            .map_err(|_| response::bad_request(format!("invalid instance ID '{s}'"))),
    }
}


// ----- Courses & events ---------------------------------------------------

#[derive(Deserialize)]
struct CourseBody {
    shortname: String,
    fullname: String,
}

async fn put_course(id: CourseId, req: Request, ctx: &Context) -> Result<Response> {
    let body = match read_json::<CourseBody>(req).await? {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };

    let course = Course { id, shortname: body.shortname, fullname: body.fullname };
    ctx.store.upsert_course(&course).await?;
    debug!("Stored course {id} ('{}')", course.shortname);
    Ok(response::no_content())
}

/// Removes the course mirror row, then runs the observers of the deletion.
/// Deleting an unknown course still notifies observers, as a retried event
/// might find the row already gone.
async fn delete_course(id: CourseId, ctx: &Context) -> Result<Response> {
    if !ctx.store.remove_course(id).await? {
        debug!("Course {id} was not in the mirror table");
    }

    ctx.events.publish(&CourseEvent::Deleted { course: id }).await;
    Ok(response::no_content())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseDeletedBody {
    course_id: CourseId,
}

async fn course_deleted_event(req: Request, ctx: &Context) -> Result<Response> {
    let body = match read_json::<CourseDeletedBody>(req).await? {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };

    ctx.events.publish(&CourseEvent::Deleted { course: body.course_id }).await;
    Ok(response::no_content())
}

async fn course_videos(
    course: CourseId,
    params: &HashMap<String, String>,
    ctx: &Context,
) -> Result<Response> {
    let instance = match instance_param(params, "instance") {
        Ok(instance) => instance,
        Err(response) => return Ok(response),
    };
    let Some(bridge) = ctx.bridge(instance) else {
        return Ok(response::bad_request("unknown Opencast instance"));
    };

    let mut videos = Vec::<RemoteVideo>::new();
    for mapping in ctx.store.course_series(course, bridge.client().instance()).await? {
        match bridge.client().series_videos(&mapping.series).await {
            Ok(found) => videos.extend(found),
            Err(e) => {
                warn!("Failed to list videos of series {}: {e:#}", mapping.series);
                return Ok(response::service_unavailable());
            }
        }
    }

    let listing = Listing::new(videos, "There are no videos in this course yet.");
    Ok(response::json(StatusCode::OK, &listing))
}


// ----- Forms --------------------------------------------------------------

async fn get_form(name: &str, params: &HashMap<String, String>, ctx: &Context) -> Result<Response> {
    let Some(form) = forms::by_name(name) else {
        return Ok(response::not_found());
    };

    let instance = match instance_param(params, "ocinstanceid") {
        Ok(instance) => instance,
        Err(response) => return Ok(response),
    };
    let Some(bridge) = ctx.bridge(instance) else {
        return Ok(response::bad_request("unknown Opencast instance"));
    };

    let view = form.view(params, bridge.client()).await?;
    Ok(response::json(StatusCode::OK, &view))
}

async fn submit_form(name: &str, req: Request) -> Result<Response> {
    let Some(form) = forms::by_name(name) else {
        return Ok(response::not_found());
    };

    let body = match read_body(req).await? {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };
    let input = form_urlencoded::parse(&body).into_owned().collect::<HashMap<_, _>>();

    let out = match form.validate(&input) {
        Ok(submission) => {
            debug!("Valid '{name}' submission for handler '{}'", submission.handler);
            response::json(StatusCode::OK, &submission)
        }
        Err(errors) => {
            debug!("Invalid '{name}' submission: {errors:?}");
            response::json(
                StatusCode::UNPROCESSABLE_ENTITY,
                &serde_json::json!({ "errors": errors }),
            )
        }
    };
    Ok(out)
}


// ----- LTI ----------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LaunchBody {
    #[serde(default)]
    instance: Option<InstanceId>,
    #[serde(default)]
    tool: String,
    #[serde(flatten)]
    context: LaunchContext,
}

async fn lti_launch(req: Request, ctx: &Context) -> Result<Response> {
    let body = match read_json::<LaunchBody>(req).await? {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };

    let instance = match body.instance {
        Some(id) => ctx.config.opencast.instance(id),
        None => ctx.config.opencast.default_instance(),
    };
    let Some(instance) = instance else {
        return Ok(response::bad_request("unknown Opencast instance"));
    };

    let out = match lti::build_launch_for(instance, &body.tool, &body.context, &ctx.config.general) {
        Ok(launch) => response::json(StatusCode::OK, &launch),
        Err(e) => response::bad_request(format!("{e:#}")),
    };
    Ok(out)
}


#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::{Full, StreamBody};
    use hyper::{body::Frame, StatusCode};
    use std::convert::Infallible;

    use super::{read_limited, MAX_BODY_SIZE};

    /// A body without known length, like a chunked request.
    fn chunked(chunks: usize, chunk_size: usize) -> StreamBody<
        futures::stream::Iter<std::vec::IntoIter<Result<Frame<Bytes>, Infallible>>>,
    > {
        let frames = (0..chunks)
            .map(|_| Ok(Frame::data(Bytes::from(vec![b'x'; chunk_size]))))
            .collect::<Vec<_>>();
        StreamBody::new(futures::stream::iter(frames))
    }

    #[tokio::test]
    async fn small_chunked_body_is_read() {
        let body = read_limited(chunked(4, 1024), None).await.unwrap();
        match body {
            Ok(bytes) => assert_eq!(bytes.len(), 4 * 1024),
            Err(_) => panic!("small body was rejected"),
        }
    }

    #[tokio::test]
    async fn oversized_chunked_body_is_rejected() {
        let mib = MAX_BODY_SIZE as usize;
        match read_limited(chunked(4, mib), None).await.unwrap() {
            Ok(bytes) => panic!("accepted {} bytes", bytes.len()),
            Err(response) => assert_eq!(response.status(), StatusCode::BAD_REQUEST),
        }
    }

    #[tokio::test]
    async fn announced_length_is_checked_upfront() {
        let body = Full::new(Bytes::from_static(b"{}"));
        match read_limited(body, Some(MAX_BODY_SIZE + 1)).await.unwrap() {
            Ok(_) => panic!("oversized Content-Length was accepted"),
            Err(response) => assert_eq!(response.status(), StatusCode::BAD_REQUEST),
        }

        let body = Full::new(Bytes::from_static(b"{}"));
        assert!(read_limited(body, Some(2)).await.unwrap().is_ok());
    }
}
