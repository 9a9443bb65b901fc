#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use wisp::model::Rgb;
use wisp::request::{self, Request, Route};
use wisp::server::serve_one;
use wisp::traits::{HumiditySensor, RgbLed, TextDisplay};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

// Test result tracking
struct TestResults {
    passed: u32,
    failed: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.total += 1;
        if condition {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_eq<T: PartialEq + core::fmt::Debug>(&mut self, left: T, right: T, test_name: &str) {
        self.total += 1;
        if left == right {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED: {:?} != {:?}", test_name, left, right);
        }
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

/// In-memory transport standing in for a TCP socket.
struct MockConnection {
    input: &'static [u8],
    read_pos: usize,
    output: heapless::Vec<u8, 8192>,
}

impl MockConnection {
    fn new(input: &'static [u8]) -> Self {
        Self {
            input,
            read_pos: 0,
            output: heapless::Vec::new(),
        }
    }

    fn response(&self) -> &str {
        core::str::from_utf8(&self.output).unwrap_or("")
    }
}

impl embedded_io_async::ErrorType for MockConnection {
    type Error = core::convert::Infallible;
}

impl embedded_io_async::Read for MockConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let remaining = &self.input[self.read_pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl embedded_io_async::Write for MockConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let _ = self.output.extend_from_slice(buf);
        Ok(buf.len())
    }
}

struct MockLed {
    staged: Rgb,
    committed: heapless::Vec<Rgb, 8>,
}

impl MockLed {
    fn new() -> Self {
        Self {
            staged: Rgb::OFF,
            committed: heapless::Vec::new(),
        }
    }
}

impl RgbLed for MockLed {
    fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<(), &'static str> {
        if index != 0 {
            return Err("pixel index out of range");
        }
        self.staged = color;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), &'static str> {
        self.committed
            .push(self.staged)
            .map_err(|_| "commit log full")
    }
}

struct MockSensor {
    result: Result<(f32, f32), &'static str>,
}

impl HumiditySensor for MockSensor {
    fn read(&mut self) -> Result<(f32, f32), &'static str> {
        self.result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DisplayOp {
    Clear,
    Draw(heapless::String<32>),
    Update,
}

struct MockDisplay {
    ops: heapless::Vec<DisplayOp, 8>,
}

impl MockDisplay {
    fn new() -> Self {
        Self {
            ops: heapless::Vec::new(),
        }
    }
}

impl TextDisplay for MockDisplay {
    fn clear(&mut self) -> Result<(), &'static str> {
        self.ops.push(DisplayOp::Clear).map_err(|_| "op log full")
    }

    fn draw_text(&mut self, text: &str, _x: i32, _y: i32) -> Result<(), &'static str> {
        let mut s: heapless::String<32> = heapless::String::new();
        let _ = s.push_str(text);
        self.ops.push(DisplayOp::Draw(s)).map_err(|_| "op log full")
    }

    fn update(&mut self) -> Result<(), &'static str> {
        self.ops.push(DisplayOp::Update).map_err(|_| "op log full")
    }
}

/// Run one request through the dispatcher against fresh mocks.
async fn run_request(
    raw: &'static [u8],
    led: &mut MockLed,
    sensor: &mut MockSensor,
    display: &mut MockDisplay,
) -> MockConnection {
    let mut conn = MockConnection::new(raw);
    if let Err(e) = serve_one(&mut conn, led, sensor, display).await {
        esp_println::println!("  (serve_one error: {})", e);
    }
    conn
}

fn working_sensor() -> MockSensor {
    MockSensor {
        result: Ok((22.0, 45.0)),
    }
}

fn test_request_parsing(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Request parsing");

    let req = Request::parse("GET /sensor?RGB=red HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
    results.assert_eq(req.method, "GET", "method extracted");
    results.assert_eq(req.path, "/sensor", "path split from query");
    results.assert_eq(req.target, "/sensor?RGB=red", "full target kept");
    results.assert_eq(req.route(), Route::Sensor, "sensor route");

    let req = Request::parse("POST /display HTTP/1.1\r\ncontent-length: 16\r\n\r\n").unwrap();
    results.assert_eq(req.content_length, Some(16), "content-length case-insensitive");
    results.assert_eq(req.route(), Route::Display, "display route");

    let req = Request::parse("GET /favicon.ico HTTP/1.1\r\n\r\n").unwrap();
    results.assert_eq(req.route(), Route::Index, "unknown path falls to index");

    // Method matters: POST /sensor is not a sensor request
    let req = Request::parse("POST /sensor HTTP/1.1\r\n\r\n").unwrap();
    results.assert_eq(req.route(), Route::Index, "sensor route requires GET");

    results.assert(Request::parse("\r\n\r\n").is_none(), "empty head rejected");
}

fn test_color_classification(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Color classification");

    results.assert_eq(
        request::color_command("/?RGB=red"),
        Some(Rgb::RED),
        "named red",
    );
    results.assert_eq(
        request::color_command("/?RGB=green"),
        Some(Rgb::GREEN),
        "named green",
    );
    results.assert_eq(
        request::color_command("/?RGB=blue"),
        Some(Rgb::BLUE),
        "named blue",
    );
    results.assert_eq(
        request::color_command("/?R=10&G=20&B=30"),
        Some(Rgb::new(10, 20, 30)),
        "numeric triple",
    );
    results.assert_eq(
        request::color_command("/?R=10&G=20"),
        None,
        "missing &B= ignored",
    );
    results.assert_eq(
        request::color_command("/?R=ab&G=20&B=30"),
        None,
        "non-numeric component ignored",
    );
    results.assert_eq(
        request::color_command("/?R=300&G=20&B=-1"),
        Some(Rgb::new(255, 20, 0)),
        "out-of-range clamps to [0,255]",
    );
    results.assert_eq(request::color_command("/"), None, "plain target has no command");
}

fn test_json_text_field(results: &mut TestResults) {
    esp_println::println!("\n[TEST] JSON text extraction");

    results.assert_eq(
        request::json_text_field("{\"text\":\"hello\"}"),
        Some("hello"),
        "plain text field",
    );
    results.assert_eq(
        request::json_text_field("{ \"text\" : \"spaced\" }"),
        Some("spaced"),
        "whitespace tolerated",
    );
    results.assert_eq(
        request::json_text_field("{\"other\":1}"),
        None,
        "missing text field",
    );
    results.assert_eq(request::json_text_field("not json"), None, "garbage body");
}

async fn test_named_colors(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Named color requests");

    let cases: [(&'static [u8], Rgb, &str); 3] = [
        (b"GET /?RGB=red HTTP/1.1\r\nHost: x\r\n\r\n", Rgb::RED, "red commits (255,0,0)"),
        (b"GET /?RGB=green HTTP/1.1\r\nHost: x\r\n\r\n", Rgb::GREEN, "green commits (0,255,0)"),
        (b"GET /?RGB=blue HTTP/1.1\r\nHost: x\r\n\r\n", Rgb::BLUE, "blue commits (0,0,255)"),
    ];

    for (raw, expected, name) in cases {
        let mut led = MockLed::new();
        let mut sensor = working_sensor();
        let mut display = MockDisplay::new();
        let conn = run_request(raw, &mut led, &mut sensor, &mut display).await;

        results.assert_eq(led.committed.len(), 1, "exactly one commit");
        results.assert_eq(led.committed[0], expected, name);
        results.assert(conn.response().starts_with("HTTP/1.1 200 OK"), "still serves 200");
        results.assert(
            conn.response().contains("Content-Type: text/html"),
            "color request falls through to control page",
        );
    }
}

async fn test_numeric_colors(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Numeric color requests");

    let mut led = MockLed::new();
    let mut sensor = working_sensor();
    let mut display = MockDisplay::new();
    let _ = run_request(
        b"GET /?R=10&G=20&B=30 HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert_eq(led.committed.len(), 1, "numeric triple commits once");
    results.assert_eq(led.committed[0], Rgb::new(10, 20, 30), "extracts (10,20,30)");

    let mut led = MockLed::new();
    let conn = run_request(
        b"GET /?R=10&G=20 HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert_eq(led.committed.len(), 0, "malformed triple performs no LED write");
    results.assert(
        conn.response().contains("Content-Type: text/html"),
        "malformed triple still serves the page",
    );

    let mut led = MockLed::new();
    let _ = run_request(
        b"GET /?R=300&G=20&B=-1 HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert_eq(
        led.committed[0],
        Rgb::new(255, 20, 0),
        "boundary values clamp instead of wrapping",
    );
}

async fn test_sensor_endpoint(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Sensor endpoint");

    let mut led = MockLed::new();
    let mut sensor = working_sensor();
    let mut display = MockDisplay::new();
    let conn = run_request(
        b"GET /sensor HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(conn.response().starts_with("HTTP/1.1 200 OK"), "sensor read is 200");
    results.assert(
        conn.response().contains("Content-Type: application/json"),
        "sensor response is JSON",
    );
    results.assert(
        conn.response().contains("\"temp\":22.0"),
        "numeric temperature field",
    );
    results.assert(
        conn.response().contains("\"humidity\":45.0"),
        "numeric humidity field",
    );

    let mut sensor = MockSensor {
        result: Err("DHT11 checksum mismatch"),
    };
    let conn = run_request(
        b"GET /sensor HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(
        conn.response().starts_with("HTTP/1.1 200 OK"),
        "sensor failure still answers 200",
    );
    results.assert(
        conn.response().contains("\"temp\":\"N/A\""),
        "temperature sentinel on failure",
    );
    results.assert(
        conn.response().contains("\"humidity\":\"N/A\""),
        "humidity sentinel on failure",
    );
}

async fn test_index_page(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Control page");

    let mut led = MockLed::new();
    let mut sensor = working_sensor();
    let mut display = MockDisplay::new();
    let conn = run_request(
        b"GET / HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(conn.response().starts_with("HTTP/1.1 200 OK"), "index is 200");
    results.assert(
        conn.response().contains("Content-Type: text/html"),
        "index is text/html",
    );
    results.assert(
        conn.response().contains("RGB=red"),
        "page carries the named color links",
    );
    results.assert_eq(led.committed.len(), 0, "plain page request touches no LED");
}

async fn test_display_endpoint(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Display endpoint");

    let mut led = MockLed::new();
    let mut sensor = working_sensor();
    let mut display = MockDisplay::new();
    let conn = run_request(
        b"POST /display HTTP/1.1\r\nContent-Length: 16\r\n\r\n{\"text\":\"hello\"}",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(conn.response().starts_with("HTTP/1.1 200 OK"), "display post is 200");
    results.assert(
        conn.response().contains("Text displayed on OLED"),
        "plain-text confirmation body",
    );

    let mut expected_draw: heapless::String<32> = heapless::String::new();
    let _ = expected_draw.push_str("hello");
    results.assert_eq(display.ops.len(), 3, "display touched exactly three times");
    results.assert_eq(display.ops[0].clone(), DisplayOp::Clear, "clear first");
    results.assert_eq(
        display.ops[1].clone(),
        DisplayOp::Draw(expected_draw),
        "then draw(\"hello\")",
    );
    results.assert_eq(display.ops[2].clone(), DisplayOp::Update, "then update");
}

async fn test_display_error_policy(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Display error policy");

    let mut led = MockLed::new();
    let mut sensor = working_sensor();
    let mut display = MockDisplay::new();

    let conn = run_request(
        b"POST /display HTTP/1.1\r\nContent-Length: 10\r\n\r\n{\"nope\":1}",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(
        conn.response().starts_with("HTTP/1.1 400 Bad Request"),
        "body without text field answers 400",
    );
    results.assert_eq(display.ops.len(), 0, "display untouched on bad body");

    let conn = run_request(
        b"POST /display HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(
        conn.response().starts_with("HTTP/1.1 400 Bad Request"),
        "missing Content-Length answers 400",
    );

    // Client promises 32 body bytes but hangs up after 10
    let conn = run_request(
        b"POST /display HTTP/1.1\r\nContent-Length: 32\r\n\r\n{\"text\":\"",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(
        conn.response().starts_with("HTTP/1.1 400 Bad Request"),
        "truncated body answers 400",
    );
    results.assert(
        conn.response().contains("Truncated body"),
        "truncated body names the error",
    );
    results.assert_eq(display.ops.len(), 0, "display untouched on truncated body");

    // Declared body would overflow the request buffer
    let conn = run_request(
        b"POST /display HTTP/1.1\r\nContent-Length: 4096\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(
        conn.response().starts_with("HTTP/1.1 400 Bad Request"),
        "oversized body answers 400",
    );
    results.assert(
        conn.response().contains("Body too large"),
        "oversized body names the error",
    );

    // A binary body that arrives with the head must not blank the head:
    // the request still routes to /display and fails on the body alone
    let conn = run_request(
        b"POST /display HTTP/1.1\r\nContent-Length: 4\r\n\r\n\xff\xfe\xfd\xfc",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(
        conn.response().starts_with("HTTP/1.1 400 Bad Request"),
        "binary body answers 400, not the control page",
    );

    // The dispatcher survives the bad request: the next one is served
    let conn = run_request(
        b"GET / HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert(
        conn.response().starts_with("HTTP/1.1 200 OK"),
        "dispatcher keeps serving after a 400",
    );
}

async fn test_idempotence_and_composition(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Idempotence and composition");

    let mut led = MockLed::new();
    let mut sensor = working_sensor();
    let mut display = MockDisplay::new();

    let _ = run_request(
        b"GET /?RGB=red HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    let after_first = led.staged;
    let _ = run_request(
        b"GET /?RGB=red HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert_eq(led.staged, after_first, "same command twice, same state");
    results.assert_eq(led.committed.len(), 2, "one commit per request");

    // Color checks are independent of routing: one request can do both
    let mut led = MockLed::new();
    let conn = run_request(
        b"GET /sensor?RGB=red HTTP/1.1\r\nHost: x\r\n\r\n",
        &mut led,
        &mut sensor,
        &mut display,
    )
    .await;
    results.assert_eq(led.committed.len(), 1, "combined request sets the LED");
    results.assert(
        conn.response().contains("Content-Type: application/json"),
        "combined request still answers the sensor JSON",
    );
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("\n==========================================");
    esp_println::println!("=== Dispatcher Test Runner ===");
    esp_println::println!("==========================================");

    esp_alloc::heap_allocator!(size: 64 * 1024);

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let mut results = TestResults::new();

    test_request_parsing(&mut results);
    test_color_classification(&mut results);
    test_json_text_field(&mut results);
    test_named_colors(&mut results).await;
    test_numeric_colors(&mut results).await;
    test_sensor_endpoint(&mut results).await;
    test_index_page(&mut results).await;
    test_display_endpoint(&mut results).await;
    test_display_error_policy(&mut results).await;
    test_idempotence_and_composition(&mut results).await;

    results.print_summary();

    esp_println::println!("\nTest run complete. Looping...");
    loop {
        if results.failed == 0 {
            Timer::after(Duration::from_millis(200)).await;
        } else {
            Timer::after(Duration::from_millis(1000)).await;
        }
    }
}
