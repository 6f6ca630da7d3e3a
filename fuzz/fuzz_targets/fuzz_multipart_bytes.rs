#![no_main]

use std::convert::Infallible;

use bytes::Bytes;
use filedrop::Multipart;
use futures_util::stream::once;
use futures_util::StreamExt;
use libfuzzer_sys::fuzz_target;
use tokio::runtime;

fuzz_target!(|data: &[u8]| {
    let data = data.to_vec();
    let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });

    let multipart = Multipart::new(stream, "X-BOUNDARY");

    let rt = runtime::Builder::new_current_thread().build().expect("runtime");
    rt.block_on(async {
        let mut part = match multipart.file().await {
            Ok(part) => part,
            Err(_) => return,
        };

        while let Some(chunk) = part.next().await {
            if chunk.is_err() {
                return;
            }
        }
    })
});
