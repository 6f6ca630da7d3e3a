use filedrop::Multipart;
use tokio::io::AsyncRead;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate an `AsyncRead` and the boundary from somewhere e.g. a server
    // request body.
    let (reader, boundary) = get_async_reader_from_somewhere().await;

    // Create a `Multipart` instance from that async reader and the boundary.
    let multipart = Multipart::with_reader(reader, boundary);

    // Resolve the first file part; headers are parsed at this point.
    let part = multipart.file().await?;
    println!("File Name: {:?}", part.file_name());
    println!("Field Name: {:?}", part.field_name());
    println!("Content-Type: {:?}", part.content_type());

    // Read the payload as text.
    let content = part.text().await?;
    println!("Content: {:?}", content);

    Ok(())
}

// Generate an `AsyncRead` and the boundary from somewhere e.g. a server
// request body.
async fn get_async_reader_from_somewhere() -> (impl AsyncRead + Send + 'static, &'static str) {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a-text-file.txt\"\r\nContent-Type: text/plain\r\n\r\nHello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDARY--\r\n";

    (data.as_bytes(), "X-BOUNDARY")
}
