use std::{convert::Infallible, net::SocketAddr};

use bytes::Bytes;
use filedrop::{ContentEncoding, ErrorBody, FileListing, FileStore, UploadReceipt};
use futures_util::StreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, BodyStream, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{
    ACCEPT_ENCODING, CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE,
};
use hyper::{Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;

// The download stream is Send but not Sync, so the response body is the
// unsync flavour of hyper's boxed body.
type Body = UnsyncBoxBody<Bytes, std::io::Error>;

// A handler for incoming requests.
async fn handle(store: FileStore, req: Request<Incoming>) -> Result<Response<Body>, Infallible> {
    // Every filedrop error maps to a status code and a JSON body.
    let response = route(store, req)
        .await
        .unwrap_or_else(|err| json(err.status(), &ErrorBody::from(&err)));

    Ok(response)
}

async fn route(store: FileStore, req: Request<Incoming>) -> filedrop::Result<Response<Body>> {
    match (req.method(), req.uri().path()) {
        // Receive a multipart/form-data upload and stream it into the store.
        (&Method::POST, "/upload") => {
            let content_type = req
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_owned();
            let content_length = req
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());

            // Convert the body into a stream of data frames.
            let body = BodyStream::new(req.into_body()).filter_map(|result| async move {
                result.map(|frame| frame.into_data().ok()).transpose()
            });

            let progress = |transferred: u64, _total: Option<u64>, percent: f64| {
                println!("upload progress: {} bytes ({:.1}%)", transferred, percent);
            };

            let stored = filedrop::upload(&store, &content_type, content_length, body, progress)
                .await?;
            println!("stored {} ({} bytes)", stored.file_name, stored.size);

            Ok(json(StatusCode::OK, &UploadReceipt::new(&stored)))
        }

        // List everything currently in the store.
        (&Method::GET, "/files") => {
            let files = store.list().await?;
            Ok(json(StatusCode::OK, &FileListing::new(files)))
        }

        // Stream a stored file back, gzip-compressed when the client asks.
        (&Method::GET, path) if path.starts_with("/download/") => {
            let name = percent_decode_str(&path["/download/".len()..]).decode_utf8_lossy();
            let encoding = ContentEncoding::negotiate(
                req.headers()
                    .get(ACCEPT_ENCODING)
                    .and_then(|value| value.to_str().ok()),
            );

            let reply = filedrop::download(&store, &name, encoding).await?;

            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(CONTENT_DISPOSITION, reply.disposition());
            if let Some(length) = reply.content_length() {
                builder = builder.header(CONTENT_LENGTH, length);
            }
            if reply.encoding() == ContentEncoding::Gzip {
                builder = builder.header(CONTENT_ENCODING, reply.encoding().as_str());
            }

            let frames = reply.into_stream().map(|chunk| {
                chunk
                    .map(Frame::data)
                    .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))
            });

            Ok(builder.body(StreamBody::new(frames).boxed_unsync()).unwrap())
        }

        _ => Ok(json(
            StatusCode::NOT_FOUND,
            &serde_json::json!({ "error": "No such route" }),
        )),
    }
}

fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    let body = serde_json::to_vec(value).unwrap_or_default();

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::from(body).map_err(|never| match never {}).boxed_unsync())
        .unwrap()
}

#[tokio::main]
async fn main() {
    let store = FileStore::open("uploads").await.unwrap();

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    println!("Server running at: {}", addr);
    println!("POST /upload, GET /files, GET /download/<name>");

    loop {
        let (socket, _remote_addr) = listener.accept().await.unwrap();
        let socket = hyper_util::rt::TokioIo::new(socket);
        let store = store.clone();
        tokio::spawn(async move {
            let service = hyper::service::service_fn(move |req| handle(store.clone(), req));
            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(socket, service)
                .await
            {
                eprintln!("server error: {}", e);
            }
        });
    }
}
