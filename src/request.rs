//! HTTP request tokenizing and command classification.
//!
//! The wire protocol is a permissive HTTP/1.x subset: only the request line
//! and the `Content-Length` header are ever consulted. Color classification
//! is independent of routing, so a single request can carry a color command
//! *and* address the sensor or display endpoint.

use crate::model::Rgb;

/// Structured view over one raw request head.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub method: &'a str,
    /// Full request target: path plus optional query string.
    pub target: &'a str,
    pub path: &'a str,
    pub content_length: Option<usize>,
    /// Byte offset of the first body byte (just past `\r\n\r\n`).
    pub header_end: usize,
}

/// Where a request gets routed once color commands are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Sensor,
    Display,
    Index,
}

impl<'a> Request<'a> {
    /// Tokenize a request head. Returns `None` only when there is no
    /// parsable request line at all; missing headers never fail.
    pub fn parse(head: &'a str) -> Option<Request<'a>> {
        let mut lines = head.lines();
        let request_line = lines.next()?;

        let mut parts = request_line.split_whitespace();
        let method = parts.next()?;
        let target = parts.next()?;

        let path = match target.split_once('?') {
            Some((path, _)) => path,
            None => target,
        };

        let mut content_length = None;
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse::<usize>().ok();
                }
            }
        }

        let header_end = match head.find("\r\n\r\n") {
            Some(idx) => idx + 4,
            None => head.len(),
        };

        Some(Request {
            method,
            target,
            path,
            content_length,
            header_end,
        })
    }

    pub fn route(&self) -> Route {
        match (self.method, self.path) {
            ("GET", "/sensor") => Route::Sensor,
            ("POST", "/display") => Route::Display,
            _ => Route::Index,
        }
    }
}

/// Extract a color command from the request target, if any.
///
/// Named colors win over the numeric form, in the fixed order red, green,
/// blue. The numeric form needs all three of `R=`, `&G=`, `&B=`; any parse
/// failure silently drops the command, leaving the LED untouched.
pub fn color_command(target: &str) -> Option<Rgb> {
    if target.contains("RGB=red") {
        return Some(Rgb::RED);
    }
    if target.contains("RGB=green") {
        return Some(Rgb::GREEN);
    }
    if target.contains("RGB=blue") {
        return Some(Rgb::BLUE);
    }
    numeric_color(target)
}

fn numeric_color(target: &str) -> Option<Rgb> {
    if !(target.contains("R=") && target.contains("&G=") && target.contains("&B=")) {
        return None;
    }

    let r = component_after(target, "R=")?;
    let g = component_after(target, "&G=")?;
    let b = component_after(target, "&B=")?;

    // Out-of-range components clamp rather than wrap: 256 becomes 255,
    // -1 becomes 0.
    Some(Rgb::new(clamp_component(r), clamp_component(g), clamp_component(b)))
}

/// Parse the integer following the first occurrence of `marker`.
fn component_after(target: &str, marker: &str) -> Option<i32> {
    let idx = target.find(marker)? + marker.len();
    let rest = &target[idx..];

    let end = rest
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());

    rest[..end].parse::<i32>().ok()
}

fn clamp_component(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Pull the `text` string out of a JSON body like `{"text": "hello"}`.
///
/// This is a scan, not a JSON parser: the first `"text"` key is located and
/// the following quoted string returned verbatim (no escape processing).
pub fn json_text_field(body: &str) -> Option<&str> {
    let key = body.find("\"text\"")?;
    let rest = &body[key + "\"text\"".len()..];
    let rest = rest[rest.find(':')? + 1..].trim_start();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(&rest[..end])
}
