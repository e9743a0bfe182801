use std::collections::HashMap;
use std::io::Cursor;

use axum::{
    body::StreamBody,
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use maplit::hashmap;
use tokio_util::io::ReaderStream;

lazy_static::lazy_static! {
    /// Page assets compiled into the binary, by `directory/file`
    static ref ASSETS: HashMap<&'static str, &'static [u8]> = hashmap! {
        "js/script.js" => include_bytes!("wwwroot/js/script.js").as_ref(),
        "css/site.css" => include_bytes!("wwwroot/css/site.css").as_ref(),
        "images/favicon.svg" => include_bytes!("wwwroot/images/favicon.svg").as_ref(),
    };
}

fn asset_response(file: &str, data: &'static [u8]) -> Response {
    let mime_type = mime_guess::from_path(file).first_or_octet_stream();
    let headers = [
        (header::CONTENT_TYPE, mime_type.to_string()),
        // the page changes with the binary, revalidate on reload
        (header::CACHE_CONTROL, "no-cache".to_owned()),
    ];
    let body = StreamBody::new(ReaderStream::new(Cursor::new(data)));
    (headers, body).into_response()
}

/// Handle static files: js, css, images
pub(crate) async fn handle_static(Path((path, file)): Path<(String, String)>) -> Response {
    match ASSETS.get(format!("{path}/{file}").as_str()) {
        Some(data) => asset_response(&file, *data),
        None => {
            tracing::debug!("No static asset {}/{}", path, file);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
