//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::http::Method;
use webapp_router::dispatch::{
    handler_fn, DispatchContext, Exchange, Filter, FilterAction, Handler, HandlerError, Request,
};
use webapp_router::Deployment;

/// Ordered record of what chain elements ran.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Records `+name` before and `-name` after, and answers with `action`.
pub struct RecordingFilter {
    name: String,
    journal: Journal,
    action: FilterAction,
}

impl Filter for RecordingFilter {
    fn before(&self, _exchange: &mut Exchange, _cx: &DispatchContext<'_>) -> Result<FilterAction, HandlerError> {
        self.journal.push(format!("+{}", self.name));
        Ok(self.action)
    }

    fn after(&self, _exchange: &mut Exchange, _cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        self.journal.push(format!("-{}", self.name));
        Ok(())
    }
}

pub fn recording_filter(journal: &Journal, name: &str, action: FilterAction) -> Arc<dyn Filter> {
    Arc::new(RecordingFilter {
        name: name.to_string(),
        journal: journal.clone(),
        action,
    })
}

/// Records `name:DISPATCH` and writes `name` to the body.
pub fn recording_handler(journal: &Journal, name: &'static str) -> Arc<dyn Handler> {
    let journal = journal.clone();
    handler_fn(move |exchange, cx| {
        journal.push(format!("{}:{}", name, cx.dispatch_type()));
        exchange.response.write_str(name);
        Ok(())
    })
}

pub fn get(deployment: &Deployment, path: &str) -> Exchange {
    deployment.exchange(Request::from_uri(Method::GET, path))
}

pub fn body(exchange: &Exchange) -> String {
    String::from_utf8_lossy(exchange.response.body()).into_owned()
}
