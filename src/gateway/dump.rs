//! Request dumps for verbose mode. Observation only; nothing here may alter
//! how a request is handled.

use axum::extract::Request;

/// Render an inbound request the way it arrived on the wire, minus the body.
pub fn inbound(req: &Request) -> String {
    let mut out = format!("{} {} {:?}\r\n", req.method(), req.uri(), req.version());

    for (name, value) in req.headers() {
        out.push_str(&format!("{}: {}\r\n", name, value.to_str().unwrap_or("<binary>")));
    }

    out.push_str("\r\n<body ignored>");
    out
}

/// Render the constructed upstream request before dispatch.
pub fn upstream(req: &reqwest::Request) -> String {
    let url = req.url();
    let mut out = format!(
        "{} {} HTTP/1.1\r\nhost: {}\r\n",
        req.method(),
        url.path(),
        url.host_str().unwrap_or("<none>")
    );

    for (name, value) in req.headers() {
        out.push_str(&format!("{}: {}\r\n", name, value.to_str().unwrap_or("<binary>")));
    }

    out.push_str("\r\n<empty body>");
    out
}
