//! Built-in handler kinds.

use std::fmt::Write as _;

use axum::http::{header, HeaderValue, StatusCode};

use crate::dispatch::{DispatchContext, Exchange, Handler, HandlerError};

/// Fixed status, content type and body.
#[derive(Debug, Clone)]
pub struct StaticHandler {
    pub status: StatusCode,
    pub content_type: HeaderValue,
    pub body: String,
}

impl Handler for StaticHandler {
    fn handle(&self, exchange: &mut Exchange, _cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        exchange.response.set_status(self.status);
        exchange
            .response
            .set_header(header::CONTENT_TYPE, self.content_type.clone());
        exchange.response.write_str(&self.body);
        Ok(())
    }
}

/// Writes back what the current dispatch saw, one `key: value` per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl Handler for EchoHandler {
    fn handle(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        let mut out = String::new();
        let _ = writeln!(out, "method: {}", exchange.request.method);
        let _ = writeln!(out, "path: {}", cx.path());
        let _ = writeln!(out, "dispatch: {}", cx.dispatch_type());
        if let Some(mapping) = cx.mapping() {
            let _ = writeln!(out, "handler: {}", mapping.handler_name);
            let _ = writeln!(out, "pattern: {}", mapping.matched_pattern);
        }
        let _ = writeln!(out, "servlet_path: {}", cx.servlet_path());
        if let Some(info) = cx.path_info() {
            let _ = writeln!(out, "path_info: {}", info);
        }
        if let Some(query) = &exchange.request.query {
            let _ = writeln!(out, "query: {}", query);
        }

        let mut attributes: Vec<(&String, &String)> = exchange.request.attributes.iter().collect();
        attributes.sort();
        for (key, value) in attributes {
            let _ = writeln!(out, "{}: {}", key, value);
        }

        exchange.response.set_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        exchange.response.write_str(&out);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ForwardHandler {
    pub target: String,
}

impl Handler for ForwardHandler {
    fn handle(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        cx.forward(exchange, &self.target)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IncludeHandler {
    pub targets: Vec<String>,
}

impl Handler for IncludeHandler {
    fn handle(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        for target in &self.targets {
            cx.include(exchange, target)?;
        }
        Ok(())
    }
}

/// Always fails with the configured status and failure-type chain.
#[derive(Debug, Clone)]
pub struct FailHandler {
    pub status: StatusCode,
    pub failure_types: Vec<String>,
    pub message: String,
}

impl Handler for FailHandler {
    fn handle(&self, _exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        let message = if self.message.is_empty() {
            format!("{} failed", cx.handler_name().unwrap_or("handler"))
        } else {
            self.message.clone()
        };
        let error = self
            .failure_types
            .iter()
            .fold(HandlerError::new(self.status, message), |e, t| e.with_failure_type(t.clone()));
        Err(error)
    }
}

#[derive(Debug, Clone)]
pub struct SendErrorHandler {
    pub status: StatusCode,
    pub message: Option<String>,
}

impl Handler for SendErrorHandler {
    fn handle(&self, exchange: &mut Exchange, _cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        exchange
            .response
            .send_error(self.status, self.message.as_deref())?;
        Ok(())
    }
}
