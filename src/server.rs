//! Request dispatcher: one connection in, one peripheral side effect plus
//! one response out.
//!
//! `serve_one` is generic over the connection so the test runner can drive
//! it with an in-memory transport instead of a real socket.

use core::fmt::Write as _;

use embassy_futures::select::{Either, select};
use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::Duration;
use embedded_io_async::{Read, Write};
use heapless::String;

use crate::config::{HTTP_PORT, REQUEST_BUFFER_SIZE, SOCKET_TIMEOUT_SECS};
use crate::model::{Rgb, SensorReading};
use crate::request::{self, Request, Route};
use crate::traits::{HumiditySensor, RgbLed, TextDisplay};

pub const INDEX_HTML: &str = include_str!("../html/index.html");

const DISPLAY_CONFIRMATION: &str = "Text displayed on OLED";

const STATUS_OK: &str = "200 OK";
const STATUS_BAD_REQUEST: &str = "400 Bad Request";
const STATUS_SERVER_ERROR: &str = "500 Internal Server Error";

/// Owned summary of a parsed request head, so the borrow on the receive
/// buffer can be dropped before the body is read.
#[derive(Debug, Clone, Copy)]
struct Classified {
    color: Option<Rgb>,
    route: Route,
    content_length: Option<usize>,
    header_end: usize,
}

/// Service exactly one connection: read the request, perform at most one
/// LED write, then write exactly one response. The caller closes the
/// connection afterwards.
pub async fn serve_one<C, L, S, D>(
    conn: &mut C,
    led: &mut L,
    sensor: &mut S,
    display: &mut D,
) -> Result<(), &'static str>
where
    C: Read + Write,
    L: RgbLed,
    S: HumiditySensor,
    D: TextDisplay,
{
    let mut buf = [0u8; REQUEST_BUFFER_SIZE];
    let mut total = 0usize;

    // Read until the end of headers, EOF, or a full buffer.
    loop {
        let n = conn
            .read(&mut buf[total..])
            .await
            .map_err(|_| "socket read failed")?;
        if n == 0 {
            break;
        }
        total += n;
        if total >= buf.len() {
            break;
        }
        if buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    if total == 0 {
        // Client connected and went away; nothing to answer.
        return Ok(());
    }

    // Classify from the head, then drop the buffer borrow so the body can
    // still be read into the same buffer. Only the bytes up to the header
    // terminator are decoded, so a binary body cannot mask a parsable head.
    let classified = {
        let head_len = buf[..total]
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map(|i| i + 4)
            .unwrap_or(total);
        let head = core::str::from_utf8(&buf[..head_len]).unwrap_or("");
        match Request::parse(head) {
            Some(req) => Classified {
                color: request::color_command(req.target),
                route: req.route(),
                content_length: req.content_length,
                header_end: req.header_end,
            },
            None => {
                // Nothing resembling a request line: answer with the
                // control page rather than dropping the connection.
                return respond(conn, STATUS_OK, "text/html", INDEX_HTML).await;
            }
        }
    };

    // The LED write always precedes the response write.
    if let Some(color) = classified.color {
        if let Err(e) = led.set_pixel(0, color).and_then(|()| led.commit()) {
            esp_println::println!("[HTTP] LED write failed: {}", e);
        }
    }

    match classified.route {
        Route::Sensor => {
            let reading = match sensor.read() {
                Ok((temperature, humidity)) => SensorReading::new(temperature, humidity),
                Err(e) => {
                    esp_println::println!("[HTTP] Sensor read failed: {}", e);
                    SensorReading::UNAVAILABLE
                }
            };
            let body = sensor_json(&reading);
            respond(conn, STATUS_OK, "application/json", &body).await
        }
        Route::Display => {
            serve_display(conn, display, &mut buf, total, &classified).await
        }
        Route::Index => respond(conn, STATUS_OK, "text/html", INDEX_HTML).await,
    }
}

/// `{"temp":T,"humidity":H}` with numeric fields, or the `"N/A"` sentinel
/// for whichever value is unavailable.
fn sensor_json(reading: &SensorReading) -> String<64> {
    let mut body: String<64> = String::new();

    let _ = body.push_str("{\"temp\":");
    match reading.temperature {
        Some(t) => {
            let _ = write!(body, "{:.1}", t);
        }
        None => {
            let _ = body.push_str("\"N/A\"");
        }
    }
    let _ = body.push_str(",\"humidity\":");
    match reading.humidity {
        Some(h) => {
            let _ = write!(body, "{:.1}", h);
        }
        None => {
            let _ = body.push_str("\"N/A\"");
        }
    }
    let _ = body.push_str("}");

    body
}

async fn serve_display<C, D>(
    conn: &mut C,
    display: &mut D,
    buf: &mut [u8],
    mut total: usize,
    classified: &Classified,
) -> Result<(), &'static str>
where
    C: Read + Write,
    D: TextDisplay,
{
    let Some(content_length) = classified.content_length else {
        return respond(
            conn,
            STATUS_BAD_REQUEST,
            "text/plain",
            "Missing Content-Length",
        )
        .await;
    };

    let body_end = classified.header_end.saturating_add(content_length);
    if body_end > buf.len() {
        return respond(conn, STATUS_BAD_REQUEST, "text/plain", "Body too large").await;
    }

    // The first read may have stopped at the end of headers; keep reading
    // until Content-Length bytes of body have arrived.
    while total < body_end {
        let n = conn
            .read(&mut buf[total..])
            .await
            .map_err(|_| "socket read failed")?;
        if n == 0 {
            break;
        }
        total += n;
    }

    if total < body_end {
        return respond(conn, STATUS_BAD_REQUEST, "text/plain", "Truncated body").await;
    }

    let body = core::str::from_utf8(&buf[classified.header_end..body_end]).unwrap_or("");
    let Some(text) = request::json_text_field(body) else {
        // A bad body must never take the server down; answer 400 and keep
        // the accept loop alive for the next client.
        return respond(conn, STATUS_BAD_REQUEST, "text/plain", "Invalid JSON body").await;
    };

    esp_println::println!("[OLED] Displaying text: {}", text);

    let drawn = display
        .clear()
        .and_then(|()| display.draw_text(text, 0, 0))
        .and_then(|()| display.update());

    match drawn {
        Ok(()) => respond(conn, STATUS_OK, "text/plain", DISPLAY_CONFIRMATION).await,
        Err(e) => {
            esp_println::println!("[HTTP] Display write failed: {}", e);
            respond(conn, STATUS_SERVER_ERROR, "text/plain", "Display error").await
        }
    }
}

async fn respond<C>(
    conn: &mut C,
    status: &str,
    content_type: &str,
    body: &str,
) -> Result<(), &'static str>
where
    C: Write,
{
    let mut header: String<128> = String::new();
    let _ = write!(
        header,
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );

    conn.write_all(header.as_bytes())
        .await
        .map_err(|_| "socket write failed")?;
    conn.write_all(body.as_bytes())
        .await
        .map_err(|_| "socket write failed")?;
    conn.flush().await.map_err(|_| "socket flush failed")
}

/// Accept loop over both interfaces. One connection is serviced at a time;
/// whichever interface accepts first wins, the other keeps waiting in its
/// backlog. Never returns.
pub async fn serve_forever<L, S, D>(
    sta_stack: Stack<'static>,
    ap_stack: Stack<'static>,
    led: &mut L,
    sensor: &mut S,
    display: &mut D,
) -> !
where
    L: RgbLed,
    S: HumiditySensor,
    D: TextDisplay,
{
    let mut sta_rx = [0u8; 1024];
    let mut sta_tx = [0u8; 1024];
    let mut ap_rx = [0u8; 1024];
    let mut ap_tx = [0u8; 1024];

    esp_println::println!("[HTTP] Serving on port {}", HTTP_PORT);

    loop {
        let mut sta_socket = TcpSocket::new(sta_stack, &mut sta_rx, &mut sta_tx);
        let mut ap_socket = TcpSocket::new(ap_stack, &mut ap_rx, &mut ap_tx);
        sta_socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));
        ap_socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));

        let accepted = select(sta_socket.accept(HTTP_PORT), ap_socket.accept(HTTP_PORT)).await;
        let socket = match accepted {
            Either::First(Ok(())) => &mut sta_socket,
            Either::Second(Ok(())) => &mut ap_socket,
            Either::First(Err(e)) | Either::Second(Err(e)) => {
                esp_println::println!("[HTTP] Accept error: {:?}", e);
                continue;
            }
        };

        if let Err(e) = serve_one(socket, led, sensor, display).await {
            esp_println::println!("[HTTP] Connection error: {}", e);
        }

        socket.close();
        socket.abort();
    }
}
