use crate::relay::forward::{RelayError, Relayed, Upstream};
use crate::relay::upload::UploadForm;
use attendcore::protocol::routes::{
    self as api, ErrorBody, MISSING_FIELDS_MESSAGE, NO_IMAGE_MESSAGE, UPLOAD_TOO_LARGE_MESSAGE,
};
use log::{info, warn};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::reject::PayloadTooLarge;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// What the multipart extractor made of a request body.
enum Upload {
    Form(FormData),
    TooLarge,
    /// Not multipart, or unreadable as such; answered as missing fields.
    Absent,
}

/// The `/api` surface: three upload relays and the history lookup.
///
/// Every route is a single round trip to the backend. Nothing is shared
/// between requests except the immutable [`Upstream`].
pub fn api_routes(
    upstream: Arc<Upstream>,
    max_upload_bytes: u64,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let upstream = warp::any().map(move || upstream.clone());
    // Requests that are not multipart at all still reach the handler, which
    // answers 400 instead of a bare rejection.
    let form = warp::multipart::form()
        .max_length(max_upload_bytes)
        .map(Upload::Form)
        .or_else(|rejection: Rejection| async move {
            if rejection.find::<PayloadTooLarge>().is_some() {
                Ok::<_, Rejection>((Upload::TooLarge,))
            } else {
                Ok((Upload::Absent,))
            }
        });

    let mark_in = warp::path!("api" / "mark_in")
        .and(warp::post())
        .and(form.clone())
        .and(upstream.clone())
        .and_then(|form: Upload, upstream: Arc<Upstream>| {
            mark_open(api::MARK_IN, form, upstream)
        });

    let mark_out = warp::path!("api" / "mark_out")
        .and(warp::post())
        .and(form.clone())
        .and(upstream.clone())
        .and_then(|form: Upload, upstream: Arc<Upstream>| {
            mark_open(api::MARK_OUT, form, upstream)
        });

    let mark_online = warp::path!("api" / "mark_online")
        .and(warp::post())
        .and(form)
        .and(upstream.clone())
        .and_then(mark_online);

    let history = warp::path!("api" / "get_history" / String)
        .and(warp::get())
        .and(upstream)
        .and_then(get_history);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_header("content-type");

    mark_in
        .or(mark_out)
        .unify()
        .or(mark_online)
        .unify()
        .or(history)
        .unify()
        .with(cors)
        .with(warp::log("gateway::access"))
}

async fn mark_open(
    route: &'static str,
    form: Upload,
    upstream: Arc<Upstream>,
) -> Result<Response, Rejection> {
    let upload = match read_form(form).await {
        Ok(upload) => upload,
        Err(reply) => return Ok(reply),
    };
    let Some(image) = upload.image else {
        return Ok(error_reply(StatusCode::BAD_REQUEST, NO_IMAGE_MESSAGE));
    };
    info!("relaying {} ({} bytes)", route, image.bytes.len());
    let outcome = upstream.submit(route, image, None).await;
    Ok(relay_reply(route, outcome, &upstream))
}

async fn mark_online(form: Upload, upstream: Arc<Upstream>) -> Result<Response, Rejection> {
    let upload = match read_form(form).await {
        Ok(upload) => upload,
        Err(reply) => return Ok(reply),
    };
    let reg_no = upload.identity().map(String::from);
    let (Some(image), Some(reg_no)) = (upload.image, reg_no) else {
        return Ok(error_reply(StatusCode::BAD_REQUEST, MISSING_FIELDS_MESSAGE));
    };
    info!(
        "relaying {} for {} ({} bytes)",
        api::MARK_ONLINE,
        reg_no,
        image.bytes.len()
    );
    let outcome = upstream.submit(api::MARK_ONLINE, image, Some(&reg_no)).await;
    Ok(relay_reply(api::MARK_ONLINE, outcome, &upstream))
}

async fn get_history(reg_no: String, upstream: Arc<Upstream>) -> Result<Response, Rejection> {
    info!("relaying {} for {}", api::GET_HISTORY, reg_no);
    let outcome = upstream.history(&reg_no).await;
    Ok(relay_reply(api::GET_HISTORY, outcome, &upstream))
}

/// Oversized bodies are answered here; anything else unreadable counts as empty.
async fn read_form(form: Upload) -> Result<UploadForm, Response> {
    let form = match form {
        Upload::Form(form) => form,
        Upload::Absent => return Ok(UploadForm::default()),
        Upload::TooLarge => {
            return Err(error_reply(
                StatusCode::PAYLOAD_TOO_LARGE,
                UPLOAD_TOO_LARGE_MESSAGE,
            ))
        }
    };
    match UploadForm::read(form).await {
        Ok(upload) => Ok(upload),
        Err(err) => {
            warn!("unreadable multipart upload: {}", err);
            Ok(UploadForm::default())
        }
    }
}

fn relay_reply(
    operation: &str,
    outcome: Result<Relayed, RelayError>,
    upstream: &Upstream,
) -> Response {
    match outcome {
        Ok(relayed) => {
            warp::reply::with_header(relayed.body, "content-type", relayed.content_type)
                .into_response()
        }
        Err(err) => {
            warn!("{} relay failed: {}", operation, err);
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                &api::upstream_message(upstream.label()),
            )
        }
    }
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorBody::new(message)), status).into_response()
}
